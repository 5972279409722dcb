//! Sensor subsystem — measurement sources and the caching [`SensorReader`].
//!
//! Every source implements [`MeasurementPort`]; the reader turns a raw
//! sample into a one-byte [`Reading`] and degrades instead of failing:
//!
//! | Sample | Conversion | Reported value          | Quality     |
//! |--------|------------|-------------------------|-------------|
//! | ok     | ok         | engineering value       | `Converted` |
//! | ok     | failed     | raw sample (saturated)  | `Raw`       |
//! | failed | —          | last reading            | `Cached`    |

pub mod battery;
pub mod temperature;

use log::{debug, warn};

use crate::app::ports::MeasurementPort;
use crate::config::MeasurementKind;
use crate::error::{ConversionError, SampleError};
use battery::FuelGauge;
use temperature::{NtcThermistor, SimulatedTemperature};

/// How a [`Reading`] was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Converted,
    /// Conversion failed; the value is the raw sample.
    Raw,
    /// Sampling failed; the value is the previous reading.
    Cached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    pub value: i8,
    pub quality: Quality,
}

impl Default for Reading {
    fn default() -> Self {
        Self {
            value: 0,
            quality: Quality::Cached,
        }
    }
}

fn saturate_f32(v: f32) -> i8 {
    v.round().clamp(f32::from(i8::MIN), f32::from(i8::MAX)) as i8
}

fn saturate_i32(v: i32) -> i8 {
    v.clamp(i32::from(i8::MIN), i32::from(i8::MAX)) as i8
}

/// On-demand reader with a one-value cache.
pub struct SensorReader<M> {
    source: M,
    last: Reading,
}

impl<M: MeasurementPort> SensorReader<M> {
    pub fn new(source: M) -> Self {
        Self {
            source,
            last: Reading::default(),
        }
    }

    /// Sample once and return the best value available.  Never fails.
    pub fn read(&mut self) -> Reading {
        let raw = match self.source.sample() {
            Ok(raw) => raw,
            Err(e) => {
                warn!("SENSOR: sample failed ({e}), reporting cached {}", self.last.value);
                return Reading {
                    value: self.last.value,
                    quality: Quality::Cached,
                };
            }
        };

        let reading = match self.source.to_engineering_units(raw) {
            Ok(v) => Reading {
                value: saturate_f32(v),
                quality: Quality::Converted,
            },
            Err(e) => {
                warn!("SENSOR: conversion of raw {raw} failed ({e}), reporting raw value");
                Reading {
                    value: saturate_i32(raw),
                    quality: Quality::Raw,
                }
            }
        };
        debug!("SENSOR: {}{} ({:?})", reading.value, self.source.unit(), reading.quality);
        self.last = reading;
        reading
    }

    /// Most recent reading without sampling.
    pub fn last(&self) -> Reading {
        self.last
    }

    pub fn source(&self) -> &M {
        &self.source
    }
}

// ── Source selection ──────────────────────────────────────────

/// The configured source behind the `temperature` resource.
pub enum MeasurementSource {
    Ntc(NtcThermistor),
    Battery(FuelGauge),
    Simulated(SimulatedTemperature),
}

impl MeasurementSource {
    pub fn from_kind(kind: MeasurementKind) -> Self {
        match kind {
            MeasurementKind::Temperature => Self::Ntc(NtcThermistor::new()),
            MeasurementKind::BatteryCharge => Self::Battery(FuelGauge::new()),
            MeasurementKind::Simulated => Self::Simulated(SimulatedTemperature::new()),
        }
    }
}

impl MeasurementPort for MeasurementSource {
    fn sample(&mut self) -> Result<i32, SampleError> {
        match self {
            Self::Ntc(s) => s.sample(),
            Self::Battery(s) => s.sample(),
            Self::Simulated(s) => s.sample(),
        }
    }

    fn to_engineering_units(&self, raw: i32) -> Result<f32, ConversionError> {
        match self {
            Self::Ntc(s) => s.to_engineering_units(raw),
            Self::Battery(s) => s.to_engineering_units(raw),
            Self::Simulated(s) => s.to_engineering_units(raw),
        }
    }

    fn unit(&self) -> &'static str {
        match self {
            Self::Ntc(s) => s.unit(),
            Self::Battery(s) => s.unit(),
            Self::Simulated(s) => s.unit(),
        }
    }
}
