//! Sample sources for the signal pipeline.
//!
//! Sources stand in for the analog front end: they produce one
//! [`SampleReading`] per sampling tick, carrying the raw value and the
//! electrode contact status. Live sources deliver readings over a bounded
//! channel from their own thread; recordings are parsed up front.

pub mod replay;
pub mod synthetic;
pub mod types;

use crossbeam_channel::Receiver;

// Re-export commonly used types
pub use replay::ReplaySource;
pub use synthetic::{LeadOffWindow, SyntheticConfig, SyntheticSensor, SyntheticWaveform};
pub use types::{AdcSpec, SampleReading};

/// A live producer of samples.
pub trait SampleSource {
    /// Start producing samples in the background.
    fn start(&mut self) -> Result<(), SensorError>;

    /// Stop producing samples.
    fn stop(&mut self);

    /// Check if the source is currently running.
    fn is_running(&self) -> bool;

    /// Get the receiver for readings.
    fn receiver(&self) -> &Receiver<SampleReading>;
}

/// Errors that can occur while acquiring samples.
#[derive(Debug)]
pub enum SensorError {
    AlreadyRunning,
    InvalidConfig(String),
    Io(String),
    Parse { line: usize, message: String },
}

impl std::fmt::Display for SensorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorError::AlreadyRunning => write!(f, "Sample source is already running"),
            SensorError::InvalidConfig(e) => write!(f, "Invalid sensor configuration: {e}"),
            SensorError::Io(e) => write!(f, "IO error: {e}"),
            SensorError::Parse { line, message } => {
                write!(f, "Parse error on line {line}: {message}")
            }
        }
    }
}

impl std::error::Error for SensorError {}
