//! Atomic session counters with optional persistence.

use crate::core::detector::{BeatEvent, BeatObserver};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for the current session.
#[derive(Debug)]
pub struct SessionStats {
    /// Samples fed to the pipeline
    samples_processed: AtomicU64,
    /// Accepted heartbeats
    beats_detected: AtomicU64,
    /// Rising edges discarded as implausible
    intervals_rejected: AtomicU64,
    /// Samples skipped because the leads were off
    lead_off_samples: AtomicU64,
    /// Pipeline resets
    resets: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            samples_processed: AtomicU64::new(0),
            beats_detected: AtomicU64::new(0),
            intervals_rejected: AtomicU64::new(0),
            lead_off_samples: AtomicU64::new(0),
            resets: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create session stats that accumulate on top of a persisted total.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut stats = Self::new();
        stats.persist_path = Some(path);

        if let Err(e) = stats.load() {
            tracing::warn!("Could not load previous session stats: {e}");
        }

        stats
    }

    pub fn record_sample(&self) {
        self.samples_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_beat(&self) {
        self.beats_detected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected_interval(&self) {
        self.intervals_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lead_off_sample(&self) {
        self.lead_off_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reset(&self) {
        self.resets.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            samples_processed: self.samples_processed.load(Ordering::Relaxed),
            beats_detected: self.beats_detected.load(Ordering::Relaxed),
            intervals_rejected: self.intervals_rejected.load(Ordering::Relaxed),
            lead_off_samples: self.lead_off_samples.load(Ordering::Relaxed),
            resets: self.resets.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Samples processed: {}\n\
             - Heartbeats detected: {}\n\
             - Implausible intervals discarded: {}\n\
             - Samples skipped (leads off): {}\n\
             - Pipeline resets: {}\n\
             - Session duration: {} seconds",
            stats.samples_processed,
            stats.beats_detected,
            stats.intervals_rejected,
            stats.lead_off_samples,
            stats.resets,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                samples_processed: stats.samples_processed,
                beats_detected: stats.beats_detected,
                intervals_rejected: stats.intervals_rejected,
                lead_off_samples: stats.lead_off_samples,
                resets: stats.resets,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.samples_processed
                    .store(persisted.samples_processed, Ordering::Relaxed);
                self.beats_detected
                    .store(persisted.beats_detected, Ordering::Relaxed);
                self.intervals_rejected
                    .store(persisted.intervals_rejected, Ordering::Relaxed);
                self.lead_off_samples
                    .store(persisted.lead_off_samples, Ordering::Relaxed);
                self.resets.store(persisted.resets, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the session counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub samples_processed: u64,
    pub beats_detected: u64,
    pub intervals_rejected: u64,
    pub lead_off_samples: u64,
    pub resets: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    samples_processed: u64,
    beats_detected: u64,
    intervals_rejected: u64,
    lead_off_samples: u64,
    resets: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared session stats.
pub type SharedSessionStats = Arc<SessionStats>;

pub fn create_shared_stats() -> SharedSessionStats {
    Arc::new(SessionStats::new())
}

pub fn create_shared_stats_with_persistence(path: PathBuf) -> SharedSessionStats {
    Arc::new(SessionStats::with_persistence(path))
}

/// Pipeline observer feeding beat and rejection counts into session stats.
#[derive(Debug, Clone)]
pub struct StatsObserver {
    stats: SharedSessionStats,
}

impl StatsObserver {
    pub fn new(stats: SharedSessionStats) -> Self {
        Self { stats }
    }
}

impl BeatObserver for StatsObserver {
    fn on_beat(&mut self, _event: &BeatEvent, _bpm: u16) {
        self.stats.record_beat();
    }

    fn on_rejected(&mut self, _interval_ms: u32, _now_ms: u64) {
        self.stats.record_rejected_interval();
    }
}
