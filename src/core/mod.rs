//! Real-time signal processing core.
//!
//! This module contains:
//! - Fixed-capacity sample window with mean/variance statistics
//! - Moving-average smoothing filter
//! - Threshold-crossing heartbeat detector
//! - Interval-window heart rate estimator
//! - Variance-based signal quality scorer
//! - The pipeline façade composing all of the above per sample

pub mod detector;
pub mod filter;
pub mod pipeline;
pub mod quality;
pub mod rate;
pub mod ring;

/// Raw or filtered amplitude in ADC counts.
pub type Sample = u16;

// Re-export commonly used types
pub use detector::{
    BeatEvent, BeatObserver, DetectorOutcome, DetectorState, HeartbeatDetector, TracingObserver,
};
pub use filter::MovingAverageFilter;
pub use pipeline::{PipelineSnapshot, SharedPipeline, SignalProcessingPipeline, WindowStatistics};
pub use quality::{QualityLevel, SignalQualityScorer};
pub use rate::{is_plausible_bpm, HeartRateEstimator, MAX_BPM, MIN_BPM};
pub use ring::SampleRingBuffer;
