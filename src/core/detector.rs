//! Threshold-crossing heartbeat detector.
//!
//! The detector tracks whether the filtered signal is above or below a fixed
//! threshold. Only rising edges (below → above) are of interest. Every rising
//! edge re-anchors the timing reference, whether or not the interval it closes
//! turns out to be plausible, so a single bad edge can never lock detection
//! out. There is no hysteresis: noise hovering around the threshold can
//! produce spurious edges.

use crate::core::Sample;
use serde::{Deserialize, Serialize};

/// Detector state relative to the beat threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectorState {
    BelowThreshold,
    AboveThreshold,
}

/// A validated heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeatEvent {
    /// Time since the previous rising edge in milliseconds
    pub interval_ms: u32,
    /// Time of the rising edge that produced this beat
    pub timestamp_ms: u64,
}

/// Result of feeding one filtered sample to the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorOutcome {
    /// No rising edge on this sample
    None,
    /// First rising edge since construction or reset; nothing to measure yet
    FirstEdge,
    /// Rising edge closing a plausible interval
    Beat(BeatEvent),
    /// Rising edge closing an implausible interval, discarded
    Rejected { interval_ms: u32 },
}

/// Receives detector events as they happen.
///
/// Implementations must not block: they run inline on the sampling path.
pub trait BeatObserver {
    /// Called for every accepted beat, after the rate estimate is updated.
    fn on_beat(&mut self, event: &BeatEvent, bpm: u16);

    /// Called when a rising edge closes an implausible interval.
    fn on_rejected(&mut self, _interval_ms: u32, _now_ms: u64) {}
}

/// Observer that reports detections through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl BeatObserver for TracingObserver {
    fn on_beat(&mut self, event: &BeatEvent, bpm: u16) {
        tracing::debug!(
            bpm,
            interval_ms = event.interval_ms,
            at_ms = event.timestamp_ms,
            "heartbeat detected"
        );
    }

    fn on_rejected(&mut self, interval_ms: u32, now_ms: u64) {
        tracing::trace!(interval_ms, at_ms = now_ms, "implausible beat interval discarded");
    }
}

/// Edge-triggered heartbeat detector with interval validation.
#[derive(Debug, Clone)]
pub struct HeartbeatDetector {
    threshold: Sample,
    min_interval_ms: u32,
    max_interval_ms: u32,
    state: DetectorState,
    /// Time of the last rising edge, accepted or not
    last_edge_ms: Option<u64>,
    /// Time of the last accepted beat
    last_beat_ms: Option<u64>,
}

impl HeartbeatDetector {
    pub fn new(threshold: Sample, min_interval_ms: u32, max_interval_ms: u32) -> Self {
        Self {
            threshold,
            min_interval_ms,
            max_interval_ms,
            state: DetectorState::BelowThreshold,
            last_edge_ms: None,
            last_beat_ms: None,
        }
    }

    /// Feed one filtered sample observed at `now_ms`.
    pub fn update(&mut self, filtered: Sample, now_ms: u64) -> DetectorOutcome {
        let next = if filtered > self.threshold {
            DetectorState::AboveThreshold
        } else {
            DetectorState::BelowThreshold
        };

        let rising = self.state == DetectorState::BelowThreshold
            && next == DetectorState::AboveThreshold;
        self.state = next;

        if !rising {
            return DetectorOutcome::None;
        }

        let previous = self.last_edge_ms.replace(now_ms);
        let Some(previous) = previous else {
            return DetectorOutcome::FirstEdge;
        };

        let interval_ms = now_ms.saturating_sub(previous).min(u64::from(u32::MAX)) as u32;
        if self.is_valid_interval(interval_ms) {
            self.last_beat_ms = Some(now_ms);
            DetectorOutcome::Beat(BeatEvent {
                interval_ms,
                timestamp_ms: now_ms,
            })
        } else {
            DetectorOutcome::Rejected { interval_ms }
        }
    }

    /// Whether an interval lies in the physiological plausibility window.
    pub fn is_valid_interval(&self, interval_ms: u32) -> bool {
        (self.min_interval_ms..=self.max_interval_ms).contains(&interval_ms)
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn threshold(&self) -> Sample {
        self.threshold
    }

    pub fn last_edge_ms(&self) -> Option<u64> {
        self.last_edge_ms
    }

    pub fn last_beat_ms(&self) -> Option<u64> {
        self.last_beat_ms
    }

    pub fn reset(&mut self) {
        self.state = DetectorState::BelowThreshold;
        self.last_edge_ms = None;
        self.last_beat_ms = None;
    }
}
