//! Biosignal Monitor - single-channel heartbeat monitoring.
//!
//! This library samples a bio-amplifier (ECG front end), smooths the stream,
//! detects heartbeats, estimates heart rate and scores signal quality. Results
//! are exposed as a read-only snapshot for a local dashboard.
//!
//! # Constraints
//!
//! - **Fixed memory**: every buffer is sized once when the pipeline is built
//! - **Keeps pace**: each sample is processed synchronously in bounded time
//! - **Never fails**: insufficient data is reported as 0, never as an error
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Biosignal Monitor                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌────────────┐    │
//! │  │  Sensor  │──▶│   Ring   │──▶│  Moving  │──▶│  Detector  │    │
//! │  │ (thread) │   │  buffer  │   │ average  │   │  (edges)   │    │
//! │  └──────────┘   └──────────┘   └──────────┘   └────────────┘    │
//! │        │              │                             │           │
//! │        ▼              ▼                             ▼           │
//! │  ┌──────────┐   ┌──────────┐                  ┌────────────┐    │
//! │  │ Monitor  │   │ Quality  │◀─────────────────│ Heart rate │    │
//! │  │ policies │   │  scorer  │                  │ estimator  │    │
//! │  └──────────┘   └──────────┘                  └────────────┘    │
//! │                       │                                         │
//! │                       ▼                                         │
//! │                 ┌──────────┐                                    │
//! │                 │ Snapshot │──▶ dashboard                       │
//! │                 └──────────┘                                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use biosignal_monitor::config::PipelineConfig;
//! use biosignal_monitor::core::SignalProcessingPipeline;
//!
//! let mut pipeline = SignalProcessingPipeline::new(PipelineConfig::default());
//!
//! // One call per sample, with the sample clock in milliseconds
//! let snapshot = pipeline.process_sample(1800, 0);
//! assert_eq!(snapshot.bpm, 0);
//! assert!(!pipeline.consume_detected_flag());
//! ```

pub mod config;
pub mod core;
pub mod monitor;
pub mod runner;
pub mod sensor;
pub mod telemetry;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use config::{Config, PipelineConfig};
pub use core::{
    BeatEvent, BeatObserver, PipelineSnapshot, SharedPipeline, SignalProcessingPipeline,
};
pub use monitor::{Monitor, MonitorCondition, SystemStatus};
pub use runner::{MonitorReport, Runner};
pub use sensor::{SampleReading, SampleSource, SensorError, SyntheticSensor};
pub use telemetry::{SessionStats, SharedSessionStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Notice displayed to users before monitoring starts.
pub const SAFETY_NOTICE: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║             BIOSIGNAL MONITOR - NOT A MEDICAL DEVICE             ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This software estimates heart rate from a single bio-amplifier  ║
║  channel for bench, hobby and educational use.                   ║
║                                                                  ║
║  ✓ WHAT IT DOES:                                                 ║
║    • Smooths the signal with a short moving average              ║
║    • Detects beats from threshold crossings                      ║
║    • Averages recent beat intervals into a heart rate            ║
║    • Scores signal quality from amplitude variability            ║
║                                                                  ║
║  ✗ WHAT IT DOES NOT DO:                                          ║
║    • Diagnose any condition or detect arrhythmias                ║
║    • Guarantee clinical accuracy                                 ║
║    • Store signal history beyond its in-memory windows           ║
║                                                                  ║
║  Never use these readings for medical decisions.                 ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safety_notice_contents() {
        assert!(SAFETY_NOTICE.contains("NOT A MEDICAL DEVICE"));
        assert!(SAFETY_NOTICE.contains("DOES NOT DO"));
        assert!(SAFETY_NOTICE.contains("medical decisions"));
    }
}
