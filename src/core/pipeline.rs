//! Per-sample processing pipeline and its externally visible snapshot.
//!
//! One call to [`SignalProcessingPipeline::process_sample`] runs the whole
//! chain in a fixed order:
//!
//! ```text
//! raw ──▶ ring buffer ──▶ moving average ──▶ detector ──▶ rate estimator ──▶ quality
//!                                               │            (valid beats)
//!                                               ▼
//!                                           observers
//! ```
//!
//! The pipeline itself is single-threaded. [`SharedPipeline`] puts one mutex
//! around it for the case where a sampling thread and a dashboard both touch
//! it.

use crate::config::PipelineConfig;
use crate::core::detector::{BeatObserver, DetectorOutcome, HeartbeatDetector};
use crate::core::filter::MovingAverageFilter;
use crate::core::quality::{QualityLevel, SignalQualityScorer};
use crate::core::rate::HeartRateEstimator;
use crate::core::ring::SampleRingBuffer;
use crate::core::Sample;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Derived state at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    /// Moving-average output, same range as the raw input
    pub filtered: Sample,
    /// Heart rate estimate; 0 before the first valid beat
    pub bpm: u16,
    /// Signal quality in `[0, 100]`
    pub quality: u8,
    /// Whether the most recent sample produced a valid beat
    pub beat_detected: bool,
}

/// Raw-window statistics, both 0 until the window has filled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowStatistics {
    pub mean: Sample,
    pub variance: u32,
}

/// Filter, detector, rate estimator and quality scorer for one channel.
pub struct SignalProcessingPipeline {
    config: PipelineConfig,
    window: SampleRingBuffer,
    filter: MovingAverageFilter,
    detector: HeartbeatDetector,
    estimator: HeartRateEstimator,
    scorer: SignalQualityScorer,
    quality: u8,
    beat_detected: bool,
    observers: Vec<Box<dyn BeatObserver + Send>>,
}

impl SignalProcessingPipeline {
    /// Allocate every buffer for the given configuration.
    pub fn new(config: PipelineConfig) -> Self {
        tracing::debug!(
            sample_window = config.sample_window,
            filter_window = config.filter_window,
            threshold = config.beat_threshold,
            interval_window = config.interval_window,
            "signal pipeline initialized"
        );

        Self {
            window: SampleRingBuffer::new(config.sample_window),
            filter: MovingAverageFilter::new(config.filter_window),
            detector: HeartbeatDetector::new(
                config.beat_threshold,
                config.min_interval_ms,
                config.max_interval_ms,
            ),
            estimator: HeartRateEstimator::new(config.interval_window),
            scorer: SignalQualityScorer::new(
                config.min_signal_quality,
                config.good_signal_quality,
            ),
            quality: 0,
            beat_detected: false,
            observers: Vec::new(),
            config,
        }
    }

    /// Attach an observer notified of beats and rejected intervals.
    pub fn with_observer(mut self, observer: Box<dyn BeatObserver + Send>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Run one raw sample, observed at `now_ms`, through the whole chain.
    pub fn process_sample(&mut self, raw: Sample, now_ms: u64) -> PipelineSnapshot {
        self.window.push(raw);
        let filtered = self.filter.apply(raw);

        self.beat_detected = false;
        match self.detector.update(filtered, now_ms) {
            DetectorOutcome::Beat(event) => {
                let bpm = self.estimator.record(event.interval_ms);
                self.beat_detected = true;
                for observer in &mut self.observers {
                    observer.on_beat(&event, bpm);
                }
            }
            DetectorOutcome::Rejected { interval_ms } => {
                for observer in &mut self.observers {
                    observer.on_rejected(interval_ms, now_ms);
                }
            }
            DetectorOutcome::FirstEdge | DetectorOutcome::None => {}
        }

        self.quality = self.scorer.score(&self.window, self.estimator.bpm());
        self.snapshot()
    }

    /// Current derived state; does not clear the detected flag.
    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            filtered: self.filter.output(),
            bpm: self.estimator.bpm(),
            quality: self.quality,
            beat_detected: self.beat_detected,
        }
    }

    /// Return whether a beat was flagged and clear the flag.
    pub fn consume_detected_flag(&mut self) -> bool {
        std::mem::take(&mut self.beat_detected)
    }

    pub fn filtered(&self) -> Sample {
        self.filter.output()
    }

    pub fn bpm(&self) -> u16 {
        self.estimator.bpm()
    }

    /// Accepted intervals currently averaged into the heart rate.
    pub fn valid_intervals(&self) -> usize {
        self.estimator.valid_intervals()
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn quality_level(&self) -> QualityLevel {
        self.scorer.classify(self.quality)
    }

    pub fn is_signal_good(&self) -> bool {
        self.scorer.is_good(self.quality)
    }

    pub fn mean(&self) -> Sample {
        self.window.mean()
    }

    pub fn variance(&self) -> u32 {
        self.window.variance()
    }

    pub fn statistics(&self) -> WindowStatistics {
        WindowStatistics {
            mean: self.window.mean(),
            variance: self.window.variance(),
        }
    }

    /// Whether the raw window has filled since construction or reset.
    pub fn is_warmed_up(&self) -> bool {
        self.window.is_filled()
    }

    pub fn threshold(&self) -> Sample {
        self.detector.threshold()
    }

    /// Time of the last accepted beat, for caller-side timeout policies.
    pub fn last_beat_ms(&self) -> Option<u64> {
        self.detector.last_beat_ms()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Zero every buffer and counter. Observers are kept.
    pub fn reset(&mut self) {
        self.window.reset();
        self.filter.reset();
        self.detector.reset();
        self.estimator.reset();
        self.quality = 0;
        self.beat_detected = false;
        tracing::debug!("signal pipeline reset");
    }
}

/// Thread-safe handle: one lock around every call.
#[derive(Clone)]
pub struct SharedPipeline {
    inner: Arc<Mutex<SignalProcessingPipeline>>,
}

impl SharedPipeline {
    pub fn new(pipeline: SignalProcessingPipeline) -> Self {
        Self {
            inner: Arc::new(Mutex::new(pipeline)),
        }
    }

    // Every pipeline state is consistent between calls, so a panic elsewhere
    // while holding the lock leaves nothing half-written.
    fn lock(&self) -> MutexGuard<'_, SignalProcessingPipeline> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn process_sample(&self, raw: Sample, now_ms: u64) -> PipelineSnapshot {
        self.lock().process_sample(raw, now_ms)
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        self.lock().snapshot()
    }

    pub fn consume_detected_flag(&self) -> bool {
        self.lock().consume_detected_flag()
    }

    pub fn reset(&self) {
        self.lock().reset();
    }

    /// Run a closure with exclusive access to the pipeline.
    pub fn with<R>(&self, f: impl FnOnce(&mut SignalProcessingPipeline) -> R) -> R {
        f(&mut self.lock())
    }
}
