//! Sample types produced by the analog front end.

use crate::core::Sample;
use serde::{Deserialize, Serialize};

/// One reading from the bio-amplifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleReading {
    /// Raw ADC counts
    pub value: Sample,
    /// Electrode contact status (both lead-off lines low)
    pub leads_connected: bool,
    /// Sample clock time in milliseconds since the source started
    pub timestamp_ms: u64,
}

impl SampleReading {
    pub fn new(value: Sample, timestamp_ms: u64) -> Self {
        Self {
            value,
            leads_connected: true,
            timestamp_ms,
        }
    }

    pub fn lead_off(value: Sample, timestamp_ms: u64) -> Self {
        Self {
            value,
            leads_connected: false,
            timestamp_ms,
        }
    }
}

/// Converter resolution and reference, used to bound and scale raw values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdcSpec {
    pub resolution_bits: u8,
    pub reference_voltage: f32,
}

impl Default for AdcSpec {
    fn default() -> Self {
        Self {
            resolution_bits: 12,
            reference_voltage: 3.3,
        }
    }
}

impl AdcSpec {
    pub fn new(resolution_bits: u8, reference_voltage: f32) -> Self {
        Self {
            resolution_bits: resolution_bits.clamp(1, 16),
            reference_voltage,
        }
    }

    /// Largest value the converter can report (4095 for 12 bits).
    pub fn max_value(&self) -> Sample {
        ((1u32 << self.resolution_bits.clamp(1, 16)) - 1) as Sample
    }

    /// Clamp an arbitrary integer into the converter range.
    pub fn clamp(&self, raw: i64) -> Sample {
        raw.clamp(0, i64::from(self.max_value())) as Sample
    }

    /// Voltage corresponding to a raw reading.
    pub fn to_voltage(&self, value: Sample) -> f32 {
        f32::from(value) * self.reference_voltage / f32::from(self.max_value())
    }
}
