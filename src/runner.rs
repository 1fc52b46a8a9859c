//! Drives the pipeline from a stream of readings.
//!
//! The runner is the surrounding application around the signal core: it skips
//! samples while the electrodes are off, resets the pipeline when contact
//! returns, consumes the one-shot beat flag, applies the monitoring policies
//! and keeps session counters. It publishes a [`MonitorReport`] for readers on
//! other threads.

use crate::config::Config;
use crate::core::{PipelineSnapshot, SharedPipeline, SignalProcessingPipeline, TracingObserver};
use crate::monitor::{LeadTransition, Monitor, MonitorCondition, Observation, SystemStatus};
use crate::sensor::SampleReading;
use crate::telemetry::{SharedSessionStats, StatsObserver};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

/// Monitoring state published after every reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorReport {
    pub condition: MonitorCondition,
    pub status: SystemStatus,
    pub leads_connected: bool,
    pub last_beat_ms: Option<u64>,
    pub last_sample_ms: Option<u64>,
    /// Valid beats handled since the runner started; survives pipeline resets
    pub beat_count: u64,
}

impl Default for MonitorReport {
    fn default() -> Self {
        Self {
            condition: MonitorCondition::Ok,
            status: SystemStatus::Initializing,
            leads_connected: false,
            last_beat_ms: None,
            last_sample_ms: None,
            beat_count: 0,
        }
    }
}

/// Thread-safe handle to the latest report.
pub type SharedReport = Arc<RwLock<MonitorReport>>;

/// What happened to one reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Pipeline output, absent when the sample was skipped for lead-off
    pub snapshot: Option<PipelineSnapshot>,
    /// Whether this reading produced a valid beat
    pub beat: bool,
    pub condition: MonitorCondition,
}

pub struct Runner {
    pipeline: SharedPipeline,
    monitor: Monitor,
    stats: SharedSessionStats,
    report: SharedReport,
    reset_on_reconnect: bool,
    beat_count: u64,
}

impl Runner {
    /// Build a pipeline from the configuration, wired to tracing and stats.
    pub fn new(config: &Config, stats: SharedSessionStats) -> Self {
        let pipeline = SignalProcessingPipeline::new(config.pipeline.clone())
            .with_observer(Box::new(TracingObserver))
            .with_observer(Box::new(StatsObserver::new(stats.clone())));

        Self {
            pipeline: SharedPipeline::new(pipeline),
            monitor: Monitor::new(&config.monitor, config.pipeline.min_signal_quality),
            stats,
            report: Arc::new(RwLock::new(MonitorReport::default())),
            reset_on_reconnect: config.monitor.reset_on_reconnect,
            beat_count: 0,
        }
    }

    /// Process one reading from the sensor.
    pub fn handle(&mut self, reading: SampleReading) -> Tick {
        let transition = self
            .monitor
            .update_leads(reading.leads_connected, reading.timestamp_ms);

        if !reading.leads_connected {
            self.stats.record_lead_off_sample();
            self.publish(reading.timestamp_ms);
            return Tick {
                snapshot: None,
                beat: false,
                condition: self.monitor.condition(),
            };
        }

        if transition == LeadTransition::Reconnected && self.reset_on_reconnect {
            self.pipeline.reset();
            self.stats.record_reset();
            tracing::info!(at_ms = reading.timestamp_ms, "leads reconnected, pipeline reset");
        }

        let (snapshot, beat, warmed_up) = self.pipeline.with(|p| {
            let snapshot = p.process_sample(reading.value, reading.timestamp_ms);
            (snapshot, p.consume_detected_flag(), p.is_warmed_up())
        });
        self.stats.record_sample();
        if beat {
            self.beat_count += 1;
        }

        let condition = self.monitor.observe(Observation {
            now_ms: reading.timestamp_ms,
            beat_detected: beat,
            quality: snapshot.quality,
            warmed_up,
        });
        self.publish(reading.timestamp_ms);

        Tick {
            snapshot: Some(snapshot),
            beat,
            condition,
        }
    }

    fn publish(&self, now_ms: u64) {
        let report = MonitorReport {
            condition: self.monitor.condition(),
            status: self.monitor.status(),
            leads_connected: self.monitor.leads_connected(),
            last_beat_ms: self.monitor.last_beat_ms(),
            last_sample_ms: Some(now_ms),
            beat_count: self.beat_count,
        };
        *self.report.write().unwrap_or_else(PoisonError::into_inner) = report;
    }

    pub fn pipeline(&self) -> &SharedPipeline {
        &self.pipeline
    }

    pub fn report(&self) -> &SharedReport {
        &self.report
    }

    pub fn stats(&self) -> &SharedSessionStats {
        &self.stats
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }
}

/// Read the latest report, tolerating a poisoned lock.
pub fn read_report(report: &SharedReport) -> MonitorReport {
    *report.read().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::create_shared_stats;

    fn runner() -> Runner {
        Runner::new(&Config::default(), create_shared_stats())
    }

    #[test]
    fn test_lead_off_samples_skipped() {
        let mut r = runner();
        let tick = r.handle(SampleReading::lead_off(4095, 0));
        assert_eq!(tick.snapshot, None);
        assert_eq!(tick.condition, MonitorCondition::LeadsDisconnected);

        let stats = r.stats().stats();
        assert_eq!(stats.lead_off_samples, 1);
        assert_eq!(stats.samples_processed, 0);
        assert_eq!(r.pipeline().snapshot(), PipelineSnapshot::default());
        assert!(!read_report(r.report()).leads_connected);
    }

    #[test]
    fn test_reconnect_resets_pipeline() {
        let mut r = runner();
        for i in 0..10u64 {
            r.handle(SampleReading::new(1000, i * 2));
        }
        assert_eq!(r.pipeline().snapshot().filtered, 1000);

        r.handle(SampleReading::lead_off(4095, 20));
        let tick = r.handle(SampleReading::new(1000, 22));
        // Filter restarted from zero: first output is 1000 / 5
        assert_eq!(tick.snapshot.map(|s| s.filtered), Some(200));
        assert_eq!(r.stats().stats().resets, 1);
        assert!(read_report(r.report()).leads_connected);
    }

    #[test]
    fn test_beats_reach_monitor_and_stats() {
        let mut r = runner();
        let mut t = 0u64;
        let mut beats = 0;
        // Square pulses every 800 ms, 10 samples wide
        for _ in 0..5 {
            for i in 0..400u64 {
                let value = if i < 10 { 3500 } else { 1000 };
                if r.handle(SampleReading::new(value, t)).beat {
                    beats += 1;
                }
                t += 2;
            }
        }

        assert_eq!(beats, 4);
        assert_eq!(r.stats().stats().beats_detected, 4);
        assert_eq!(r.pipeline().snapshot().bpm, 75);
        assert!(r.monitor().last_beat_ms().is_some());
        let report = read_report(r.report());
        assert_eq!(report.last_beat_ms, r.monitor().last_beat_ms());
        assert_eq!(report.beat_count, 4);
    }

    #[test]
    fn test_beat_count_outlives_consumed_flag() {
        let mut r = runner();
        let mut t = 0u64;
        let mut counts = Vec::new();
        for _ in 0..3 {
            for i in 0..400u64 {
                let value = if i < 10 { 3500 } else { 1000 };
                if r.handle(SampleReading::new(value, t)).beat {
                    counts.push(read_report(r.report()).beat_count);
                }
                t += 2;
            }
        }

        // The pipeline flag is already consumed, the report still shows the beat
        assert!(!r.pipeline().snapshot().beat_detected);
        assert_eq!(counts, vec![1, 2]);

        // A reset on reconnect does not rewind the count
        r.handle(SampleReading::lead_off(4095, t));
        r.handle(SampleReading::new(1000, t + 2));
        assert_eq!(read_report(r.report()).beat_count, 2);
    }
}
