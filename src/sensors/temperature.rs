//! Temperature sources.
//!
//! - [`NtcThermistor`]: 10 kOhm @ 25 C, B = 3950, in a voltage divider with
//!   a fixed 10 kOhm resistor on ADC1.  The Beta equation converts the
//!   divider voltage to temperature.
//! - [`SimulatedTemperature`]: bench source for boards without a sensor.
//!
//! ## Dual-target design
//!
//! On ESP-IDF the thermistor reads its ADC1 channel through the oneshot
//! driver in `hw_init`.  On host/test it reads a static `AtomicU16` for
//! injection.

use core::sync::atomic::AtomicU16;
#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::Ordering;

use crate::app::ports::MeasurementPort;
#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;
use crate::error::{ConversionError, SampleError};

static SIM_TEMP_ADC: AtomicU16 = AtomicU16::new(2048);

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_temp_adc(raw: u16) {
    SIM_TEMP_ADC.store(raw, Ordering::Relaxed);
}

const R25: f32 = 10_000.0;
const BETA: f32 = 3950.0;
const T25_K: f32 = 298.15;
const R_DIVIDER: f32 = 10_000.0;
const ADC_MAX: f32 = 4095.0;
const V_REF: f32 = 3.3;

/// Divider voltage to Celsius.  Fails near the rails, where the
/// thermistor is open or shorted.
pub fn adc_to_celsius(raw: i32) -> Result<f32, ConversionError> {
    let voltage = (raw as f32 / ADC_MAX) * V_REF;
    if voltage <= 0.01 || voltage >= (V_REF - 0.01) {
        return Err(ConversionError::OutOfRange);
    }
    let r_ntc = R_DIVIDER * voltage / (V_REF - voltage);
    let inv_t = (1.0 / T25_K) + (1.0 / BETA) * (r_ntc / R25).ln();
    if inv_t <= 0.0 {
        return Err(ConversionError::OutOfRange);
    }
    let celsius = (1.0 / inv_t) - 273.15;
    if celsius.is_finite() {
        Ok(celsius)
    } else {
        Err(ConversionError::NotFinite)
    }
}

pub struct NtcThermistor;

impl NtcThermistor {
    pub fn new() -> Self {
        Self
    }

    #[cfg(target_os = "espidf")]
    fn read_adc(&self) -> Result<u16, SampleError> {
        hw_init::adc1_read(hw_init::ADC1_CH_TEMP)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_adc(&self) -> Result<u16, SampleError> {
        Ok(SIM_TEMP_ADC.load(Ordering::Relaxed))
    }
}

impl Default for NtcThermistor {
    fn default() -> Self {
        Self::new()
    }
}

impl MeasurementPort for NtcThermistor {
    fn sample(&mut self) -> Result<i32, SampleError> {
        self.read_adc().map(i32::from)
    }

    fn to_engineering_units(&self, raw: i32) -> Result<f32, ConversionError> {
        adc_to_celsius(raw)
    }

    fn unit(&self) -> &'static str {
        "\u{00b0}C"
    }
}

// ── Simulated source ──────────────────────────────────────────

const SIM_START_C: i32 = 23;
const SIM_LOW_C: i32 = 16;
const SIM_HIGH_C: i32 = 39;

/// Walks by one degree per sample and reverses once it leaves 16..=39 °C.
pub struct SimulatedTemperature {
    value: i32,
    step: i32,
}

impl SimulatedTemperature {
    pub fn new() -> Self {
        Self {
            value: SIM_START_C,
            step: 1,
        }
    }
}

impl Default for SimulatedTemperature {
    fn default() -> Self {
        Self::new()
    }
}

impl MeasurementPort for SimulatedTemperature {
    fn sample(&mut self) -> Result<i32, SampleError> {
        if self.value > SIM_HIGH_C || self.value < SIM_LOW_C {
            self.step = -self.step;
        }
        self.value += self.step;
        Ok(self.value)
    }

    fn to_engineering_units(&self, raw: i32) -> Result<f32, ConversionError> {
        Ok(raw as f32)
    }

    fn unit(&self) -> &'static str {
        "\u{00b0}C"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midscale_is_room_temperature() {
        // Equal divider arms: R_ntc == R25 → 25 °C.
        let c = adc_to_celsius(2048).unwrap();
        assert!((c - 25.0).abs() < 0.5, "got {c}");
    }

    #[test]
    fn higher_voltage_is_colder() {
        // NTC on the high side of the ADC tap: more resistance → more volts.
        assert!(adc_to_celsius(3000).unwrap() < adc_to_celsius(1000).unwrap());
    }

    #[test]
    fn rails_fail_conversion() {
        assert_eq!(adc_to_celsius(0), Err(ConversionError::OutOfRange));
        assert_eq!(adc_to_celsius(4095), Err(ConversionError::OutOfRange));
    }

    #[test]
    fn simulated_walks_and_reverses() {
        let mut s = SimulatedTemperature::new();
        let values: Vec<i32> = (0..60).map(|_| s.sample().unwrap()).collect();
        assert_eq!(values[0], 24);
        assert!(values.iter().all(|v| (15..=40).contains(v)));
        assert!(values.windows(2).all(|w| (w[0] - w[1]).abs() == 1));
        assert!(values.contains(&40) && values.contains(&15));
    }

    #[test]
    fn sim_adc_feeds_thermistor() {
        sim_set_temp_adc(2048);
        let mut t = NtcThermistor::new();
        let raw = t.sample().unwrap();
        assert_eq!(raw, 2048);
    }
}
