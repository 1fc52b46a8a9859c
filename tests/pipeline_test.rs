//! End-to-end behavior of the signal processing pipeline

use biosignal_monitor::config::PipelineConfig;
use biosignal_monitor::core::{PipelineSnapshot, SignalProcessingPipeline, MAX_BPM, MIN_BPM};
use biosignal_monitor::sensor::{SyntheticConfig, SyntheticWaveform};

fn pipeline_with(config: PipelineConfig) -> SignalProcessingPipeline {
    SignalProcessingPipeline::new(config)
}

/// Feed a square wave: `high` for one sample, then `low`, one rising edge per
/// `period_ms`, sampled every `step_ms`.
fn square_wave(period_ms: u64, step_ms: u64, periods: u64) -> Vec<(u16, u64)> {
    let mut samples = Vec::new();
    let mut t = 0;
    while t < period_ms * periods {
        let value = if t % period_ms == 0 { 3000 } else { 0 };
        samples.push((value, t));
        t += step_ms;
    }
    samples
}

#[test]
fn test_constant_input_reaches_value_by_fifth_sample() {
    let mut pipeline = pipeline_with(PipelineConfig::default());
    let filtered: Vec<u16> = (0..10)
        .map(|i| pipeline.process_sample(1000, i * 2).filtered)
        .collect();

    assert_eq!(filtered[4], 1000);
    assert!(filtered[4..].iter().all(|&v| v == 1000));
    assert!(filtered[..4].iter().all(|&v| v < 1000));
}

#[test]
fn test_alternating_edges_settle_at_150_bpm() {
    // Unfiltered so every 3000 sample is a rising edge, 400 ms apart
    let mut pipeline = pipeline_with(PipelineConfig {
        filter_window: 1,
        ..PipelineConfig::default()
    });

    let mut beats = 0;
    for (value, t) in square_wave(400, 200, 20) {
        pipeline.process_sample(value, t);
        if pipeline.consume_detected_flag() {
            beats += 1;
        }
    }

    // The first edge only anchors timing
    assert_eq!(beats, 19);
    assert_eq!(pipeline.bpm(), 150);
}

#[test]
fn test_rejected_edge_moves_timing_reference() {
    let mut pipeline = pipeline_with(PipelineConfig {
        filter_window: 1,
        ..PipelineConfig::default()
    });

    // Valid beat at 800 ms
    for (value, t) in [(3000, 0), (0, 400), (3000, 800), (0, 850)] {
        pipeline.process_sample(value, t);
    }
    assert_eq!(pipeline.bpm(), 75);

    // Edge 100 ms after the previous one is discarded
    let snapshot = pipeline.process_sample(3000, 900);
    assert!(!snapshot.beat_detected);
    assert_eq!(pipeline.bpm(), 75);

    // Next edge is measured from 900, giving 600 ms rather than 700 ms
    pipeline.process_sample(0, 1000);
    let snapshot = pipeline.process_sample(3000, 1500);
    assert!(snapshot.beat_detected);
    // Average of 800 and 600 is 700 -> 85 BPM
    assert_eq!(snapshot.bpm, 85);
}

#[test]
fn test_quality_zero_until_window_fills() {
    let mut pipeline = pipeline_with(PipelineConfig::default());
    for i in 0..99u64 {
        let value = if i % 2 == 0 { 0 } else { 4000 };
        assert_eq!(pipeline.process_sample(value, i * 2).quality, 0);
    }
    assert_eq!(pipeline.mean(), 0);
    assert_eq!(pipeline.variance(), 0);

    pipeline.process_sample(4000, 198);
    assert!(pipeline.variance() > 0);
}

#[test]
fn test_bpm_bounded_and_retained() {
    let mut pipeline = pipeline_with(PipelineConfig::default());
    let mut seen_beat = false;
    let mut last_bpm = 0;

    let waveform = SyntheticWaveform::new(SyntheticConfig {
        bpm: 90,
        noise: 200,
        ..SyntheticConfig::default()
    });

    for reading in waveform.take(10_000) {
        let snapshot = pipeline.process_sample(reading.value, reading.timestamp_ms);
        assert!(snapshot.quality <= 100);

        if snapshot.beat_detected {
            seen_beat = true;
        } else if seen_beat {
            assert_eq!(snapshot.bpm, last_bpm, "bpm changed without a beat");
        }
        if seen_beat {
            assert!((MIN_BPM..=MAX_BPM).contains(&snapshot.bpm));
        }
        last_bpm = snapshot.bpm;
    }

    assert!(seen_beat);
}

#[test]
fn test_synthetic_rate_is_recovered() {
    let mut pipeline = pipeline_with(PipelineConfig::default());
    let waveform = SyntheticWaveform::new(SyntheticConfig {
        bpm: 75,
        noise: 0,
        ..SyntheticConfig::default()
    });

    // 400-sample beats; stop 20 samples into the 13th so the raw window
    // holds a whole QRS complex
    for reading in waveform.take(4_820) {
        pipeline.process_sample(reading.value, reading.timestamp_ms);
    }

    assert_eq!(pipeline.bpm(), 75);
    assert!(pipeline.variance() > 0);
    assert!(pipeline.quality() > 0);
}

#[test]
fn test_identical_histories_give_identical_outputs() {
    let run = || -> Vec<PipelineSnapshot> {
        let mut pipeline = pipeline_with(PipelineConfig::default());
        SyntheticWaveform::new(SyntheticConfig::default())
            .take(3_000)
            .map(|r| pipeline.process_sample(r.value, r.timestamp_ms))
            .collect()
    };

    assert_eq!(run(), run());
}

#[test]
fn test_reset_matches_fresh_pipeline() {
    let readings: Vec<_> = SyntheticWaveform::new(SyntheticConfig::default())
        .take(2_000)
        .collect();

    let mut reused = pipeline_with(PipelineConfig::default());
    for r in &readings {
        reused.process_sample(r.value, r.timestamp_ms);
    }
    reused.reset();

    let mut fresh = pipeline_with(PipelineConfig::default());
    for r in &readings {
        assert_eq!(
            reused.process_sample(r.value, r.timestamp_ms),
            fresh.process_sample(r.value, r.timestamp_ms)
        );
    }
}

#[test]
fn test_wide_filter_window_at_full_scale() {
    let config = PipelineConfig {
        filter_window: 70_000,
        ..PipelineConfig::default()
    };
    assert!(config.validate().is_ok());

    let mut pipeline = pipeline_with(config);
    let last = (0..70_000u64)
        .map(|i| pipeline.process_sample(u16::MAX, i * 2))
        .last()
        .unwrap();
    assert_eq!(last.filtered, u16::MAX);
    assert!(last.quality <= 100);
}
