//! Unified error types for the mesh node firmware.
//!
//! Each subsystem owns a small `Copy` error enum; all of them convert into
//! the top-level [`Error`] so the event loop's error handling stays uniform.
//! None of these are fatal: the worst outcome of any failure path is a
//! dropped response or a degraded reading.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// One or more service-registration steps failed.
    Registration(RegistrationError),
    /// The measurement source could not be sampled.
    Sample(SampleError),
    /// A raw sample could not be converted to engineering units.
    Conversion(ConversionError),
    /// A response could not be built or sent.
    Response(ResponseError),
    /// A timer could not be created or armed.
    Timer(TimerError),
    /// Peripheral or stack initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registration(e) => write!(f, "registration: {e}"),
            Self::Sample(e) => write!(f, "sample: {e}"),
            Self::Conversion(e) => write!(f, "conversion: {e}"),
            Self::Response(e) => write!(f, "response: {e}"),
            Self::Timer(e) => write!(f, "timer: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Directory (SRP client) errors
// ---------------------------------------------------------------------------

/// Failure reported by the service-directory subsystem for a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryError {
    /// No buffer / service entry available.
    NoBufs,
    /// The call was rejected in the client's current state.
    InvalidState,
    /// Argument rejected (empty name, zero-capacity buffer, ...).
    InvalidArgs,
    /// An entry with the same name is already registered.
    Duplicated,
    /// Any other stack error code.
    Stack(i32),
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoBufs => write!(f, "no buffers"),
            Self::InvalidState => write!(f, "invalid state"),
            Self::InvalidArgs => write!(f, "invalid arguments"),
            Self::Duplicated => write!(f, "duplicated entry"),
            Self::Stack(code) => write!(f, "stack error {code}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Registration errors
// ---------------------------------------------------------------------------

/// One step of the ordered service-registration sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RegistrationStep {
    SetCallback = 0b0000_0001,
    SetHostName = 0b0000_0010,
    EnableAutoHostAddress = 0b0000_0100,
    AllocateService = 0b0000_1000,
    SetNames = 0b0001_0000,
    SetPort = 0b0010_0000,
    AddService = 0b0100_0000,
    EnableAutoStart = 0b1000_0000,
}

impl RegistrationStep {
    /// Every step, in execution order.
    pub const ALL: [Self; 8] = [
        Self::SetCallback,
        Self::SetHostName,
        Self::EnableAutoHostAddress,
        Self::AllocateService,
        Self::SetNames,
        Self::SetPort,
        Self::AddService,
        Self::EnableAutoStart,
    ];

    /// Return the bitmask for this step.
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for RegistrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetCallback => write!(f, "set callback"),
            Self::SetHostName => write!(f, "set host name"),
            Self::EnableAutoHostAddress => write!(f, "enable auto host address"),
            Self::AllocateService => write!(f, "allocate service"),
            Self::SetNames => write!(f, "set names"),
            Self::SetPort => write!(f, "set port"),
            Self::AddService => write!(f, "add service"),
            Self::EnableAutoStart => write!(f, "enable auto start"),
        }
    }
}

/// The registration sequence ran to the end but some steps failed.
///
/// `failed` is a bitfield of [`RegistrationStep::mask`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationError {
    pub failed: u8,
}

impl RegistrationError {
    pub fn has_failed(&self, step: RegistrationStep) -> bool {
        self.failed & step.mask() != 0
    }

    /// Iterate the failed steps in execution order.
    pub fn failed_steps(&self) -> impl Iterator<Item = RegistrationStep> + '_ {
        RegistrationStep::ALL
            .into_iter()
            .filter(move |s| self.has_failed(*s))
    }
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "incomplete, failed steps:")?;
        for step in self.failed_steps() {
            write!(f, " [{step}]")?;
        }
        Ok(())
    }
}

impl From<RegistrationError> for Error {
    fn from(e: RegistrationError) -> Self {
        Self::Registration(e)
    }
}

// ---------------------------------------------------------------------------
// Measurement errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleError {
    /// ADC read returned an error or timed out.
    AdcReadFailed,
    /// The fuel gauge did not answer.
    GaugeUnavailable,
}

impl fmt::Display for SampleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdcReadFailed => write!(f, "ADC read failed"),
            Self::GaugeUnavailable => write!(f, "fuel gauge unavailable"),
        }
    }
}

impl From<SampleError> for Error {
    fn from(e: SampleError) -> Self {
        Self::Sample(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionError {
    /// Raw value sits at or beyond the converter's valid input range.
    OutOfRange,
    /// The conversion produced a non-finite result.
    NotFinite,
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange => write!(f, "raw value out of range"),
            Self::NotFinite => write!(f, "non-finite result"),
        }
    }
}

impl From<ConversionError> for Error {
    fn from(e: ConversionError) -> Self {
        Self::Conversion(e)
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseError {
    /// The stack could not allocate a response message.
    NoBufs,
    /// Header, token or payload could not be written into the message.
    Build,
    /// The stack refused to send the message.
    Send(i32),
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoBufs => write!(f, "cannot allocate response"),
            Self::Build => write!(f, "cannot build response"),
            Self::Send(code) => write!(f, "send failed ({code})"),
        }
    }
}

impl From<ResponseError> for Error {
    fn from(e: ResponseError) -> Self {
        Self::Response(e)
    }
}

// ---------------------------------------------------------------------------
// Timer errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    /// The timer service has no slot for this id (not created at boot).
    NotCreated,
    /// The platform refused to start the timer.
    StartFailed(i32),
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotCreated => write!(f, "timer not created"),
            Self::StartFailed(rc) => write!(f, "start failed (rc={rc})"),
        }
    }
}

impl From<TimerError> for Error {
    fn from(e: TimerError) -> Self {
        Self::Timer(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_error_lists_failed_steps_in_order() {
        let e = RegistrationError {
            failed: RegistrationStep::AddService.mask() | RegistrationStep::SetHostName.mask(),
        };
        let steps: Vec<_> = e.failed_steps().collect();
        assert_eq!(
            steps,
            vec![RegistrationStep::SetHostName, RegistrationStep::AddService]
        );
        assert_eq!(
            e.to_string(),
            "incomplete, failed steps: [set host name] [add service]"
        );
    }

    #[test]
    fn step_masks_are_distinct() {
        let all = RegistrationStep::ALL
            .iter()
            .fold(0u8, |acc, s| {
                assert_eq!(acc & s.mask(), 0);
                acc | s.mask()
            });
        assert_eq!(all, 0xFF);
    }

    #[test]
    fn errors_convert_into_top_level() {
        let e: Error = TimerError::StartFailed(-1).into();
        assert_eq!(e.to_string(), "timer: start failed (rc=-1)");
        let e: Error = ConversionError::OutOfRange.into();
        assert!(matches!(e, Error::Conversion(ConversionError::OutOfRange)));
    }
}
