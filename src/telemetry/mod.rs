//! Session telemetry for the biosignal monitor.
//!
//! Counts what the run loop did (samples, beats, rejections, lead-off time,
//! resets) so it can be shown on the dashboard and persisted between runs.

pub mod stats;

// Re-export commonly used types
pub use stats::{
    create_shared_stats, create_shared_stats_with_persistence, SessionStats, SharedSessionStats,
    StatsObserver, StatsSnapshot,
};
