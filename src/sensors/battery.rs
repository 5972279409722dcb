//! Battery state-of-charge source.
//!
//! Cell voltage is sampled through a 2:1 divider on ADC1 and mapped to a
//! charge percentage along a typical Li-ion discharge curve.  The raw
//! sample is the cell voltage in millivolts.

use core::sync::atomic::AtomicU16;
#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::Ordering;

use crate::app::ports::MeasurementPort;
#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;
use crate::error::{ConversionError, SampleError};

static SIM_BATTERY_MV: AtomicU16 = AtomicU16::new(3900);

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_battery_mv(mv: u16) {
    SIM_BATTERY_MV.store(mv, Ordering::Relaxed);
}

/// Plausible cell voltage window; outside it the gauge is disconnected
/// or the divider is faulty.
const MIN_PLAUSIBLE_MV: i32 = 2500;
const MAX_PLAUSIBLE_MV: i32 = 4500;

/// (millivolts, percent), descending.
const DISCHARGE_CURVE: [(i32, f32); 11] = [
    (4200, 100.0),
    (4100, 90.0),
    (4000, 80.0),
    (3920, 70.0),
    (3850, 60.0),
    (3790, 50.0),
    (3750, 40.0),
    (3710, 30.0),
    (3670, 20.0),
    (3600, 10.0),
    (3300, 0.0),
];

/// Cell voltage to state of charge, linearly interpolated.
pub fn millivolts_to_percent(mv: i32) -> Result<f32, ConversionError> {
    if !(MIN_PLAUSIBLE_MV..=MAX_PLAUSIBLE_MV).contains(&mv) {
        return Err(ConversionError::OutOfRange);
    }
    let (top_mv, top_pct) = DISCHARGE_CURVE[0];
    if mv >= top_mv {
        return Ok(top_pct);
    }
    for pair in DISCHARGE_CURVE.windows(2) {
        let (hi_mv, hi_pct) = pair[0];
        let (lo_mv, lo_pct) = pair[1];
        if mv >= lo_mv {
            let t = (mv - lo_mv) as f32 / (hi_mv - lo_mv) as f32;
            return Ok(lo_pct + t * (hi_pct - lo_pct));
        }
    }
    Ok(0.0)
}

pub struct FuelGauge;

impl FuelGauge {
    pub fn new() -> Self {
        Self
    }

    #[cfg(target_os = "espidf")]
    fn read_millivolts(&self) -> Result<u16, SampleError> {
        let raw = hw_init::adc1_read(hw_init::ADC1_CH_BATTERY)
            .map_err(|_| SampleError::GaugeUnavailable)?;
        // 12-bit over 3.3 V, then undo the 2:1 divider.
        Ok(((u32::from(raw) * 3300 / 4095) * 2) as u16)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_millivolts(&self) -> Result<u16, SampleError> {
        Ok(SIM_BATTERY_MV.load(Ordering::Relaxed))
    }
}

impl Default for FuelGauge {
    fn default() -> Self {
        Self::new()
    }
}

impl MeasurementPort for FuelGauge {
    fn sample(&mut self) -> Result<i32, SampleError> {
        self.read_millivolts().map(i32::from)
    }

    fn to_engineering_units(&self, raw: i32) -> Result<f32, ConversionError> {
        millivolts_to_percent(raw)
    }

    fn unit(&self) -> &'static str {
        "%"
    }
}
