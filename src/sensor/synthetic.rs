//! Synthetic ECG-like source for bench runs without hardware.
//!
//! The waveform is a flat baseline with a triangular QRS spike once per beat
//! and optional seeded noise. Timestamps follow the logical sample clock, so a
//! given configuration always produces the same reading sequence; the
//! background thread only paces delivery to real time.

use crate::config::SamplingConfig;
use crate::sensor::types::SampleReading;
use crate::sensor::{SampleSource, SensorError};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Width of the simulated QRS complex.
const QRS_WIDTH_MS: u64 = 40;

/// Span of simulated electrode detachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadOffWindow {
    pub start: Duration,
    pub duration: Duration,
}

impl LeadOffWindow {
    fn contains(&self, timestamp_ms: u64) -> bool {
        let start = self.start.as_millis() as u64;
        let end = start + self.duration.as_millis() as u64;
        (start..end).contains(&timestamp_ms)
    }
}

/// Parameters of the simulated signal.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Sample clock and converter
    pub sampling: SamplingConfig,
    /// Simulated heart rate
    pub bpm: u16,
    /// Resting level in ADC counts
    pub baseline: u16,
    /// Height of the QRS spike above baseline
    pub amplitude: u16,
    /// Peak uniform noise in ADC counts
    pub noise: u16,
    pub seed: u64,
    pub lead_off: Option<LeadOffWindow>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            sampling: SamplingConfig::default(),
            bpm: 72,
            baseline: 1500,
            amplitude: 1800,
            noise: 40,
            seed: 0x5EED,
            lead_off: None,
        }
    }
}

impl SyntheticConfig {
    pub fn validate(&self) -> Result<(), SensorError> {
        self.sampling
            .validate()
            .map_err(|e| SensorError::InvalidConfig(e.to_string()))?;
        if !(1..=300).contains(&self.bpm) {
            return Err(SensorError::InvalidConfig(format!(
                "bpm must be in 1..=300, got {}",
                self.bpm
            )));
        }
        Ok(())
    }
}

/// Deterministic sample generator behind [`SyntheticSensor`].
#[derive(Debug, Clone)]
pub struct SyntheticWaveform {
    config: SyntheticConfig,
    rng: StdRng,
    index: u64,
    period_samples: u64,
    qrs_samples: u64,
}

impl SyntheticWaveform {
    pub fn new(config: SyntheticConfig) -> Self {
        let rate = u64::from(config.sampling.sample_rate_hz.max(1));
        let period_samples = (rate * 60 / u64::from(config.bpm.max(1))).max(1);
        let qrs_samples = (rate * QRS_WIDTH_MS / 1000).max(2);

        Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            index: 0,
            period_samples,
            qrs_samples,
        }
    }

    /// Produce the next reading on the sample clock.
    pub fn next_reading(&mut self) -> SampleReading {
        let timestamp_ms = self.config.sampling.timestamp_ms(self.index);
        let phase = self.index % self.period_samples;
        self.index += 1;
        let adc = self.config.sampling.adc();

        if let Some(window) = self.config.lead_off {
            if window.contains(timestamp_ms) {
                // A detached electrode drives the amplifier output to the rail
                return SampleReading::lead_off(adc.max_value(), timestamp_ms);
            }
        }

        let mut value = i64::from(self.config.baseline);
        if phase < self.qrs_samples {
            let half = self.qrs_samples as f64 / 2.0;
            let shape = 1.0 - ((phase as f64 - half).abs() / half);
            value += (f64::from(self.config.amplitude) * shape) as i64;
        }
        if self.config.noise > 0 {
            let noise = i64::from(self.config.noise);
            value += self.rng.gen_range(-noise..=noise);
        }

        SampleReading::new(adc.clamp(value), timestamp_ms)
    }
}

impl Iterator for SyntheticWaveform {
    type Item = SampleReading;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_reading())
    }
}

/// Background-thread sensor producing a synthetic waveform in real time.
pub struct SyntheticSensor {
    config: SyntheticConfig,
    sender: Sender<SampleReading>,
    receiver: Receiver<SampleReading>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl SyntheticSensor {
    pub fn new(config: SyntheticConfig) -> Self {
        // Use a bounded channel to prevent unbounded memory growth
        let (sender, receiver) = bounded(10_000);

        Self {
            config,
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }
}

impl SampleSource for SyntheticSensor {
    fn start(&mut self) -> Result<(), SensorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(SensorError::AlreadyRunning);
        }
        self.config.validate()?;

        self.running.store(true, Ordering::SeqCst);

        let sender = self.sender.clone();
        let running = self.running.clone();
        let config = self.config.clone();

        let handle = thread::spawn(move || {
            run_sampling_loop(sender, running.clone(), config);
            running.store(false, Ordering::SeqCst);
        });

        self.thread_handle = Some(handle);
        tracing::info!(
            sample_rate_hz = self.config.sampling.sample_rate_hz,
            bpm = self.config.bpm,
            "synthetic sensor started"
        );
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn receiver(&self) -> &Receiver<SampleReading> {
        &self.receiver
    }
}

impl Drop for SyntheticSensor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_sampling_loop(sender: Sender<SampleReading>, running: Arc<AtomicBool>, config: SyntheticConfig) {
    let interval = config.sampling.sample_interval();
    let mut waveform = SyntheticWaveform::new(config);
    let mut next_tick = Instant::now();
    let mut dropped: u64 = 0;

    while running.load(Ordering::SeqCst) {
        match sender.try_send(waveform.next_reading()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                dropped += 1;
                if dropped.is_power_of_two() {
                    tracing::warn!(dropped, "sample channel full, readings dropped");
                }
            }
            Err(TrySendError::Disconnected(_)) => break,
        }

        next_tick += interval;
        let now = Instant::now();
        if next_tick > now {
            thread::sleep(next_tick - now);
        } else if now - next_tick > interval * 100 {
            // Fell far behind the sample clock; resynchronise instead of bursting
            next_tick = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waveform_is_deterministic() {
        let a: Vec<_> = SyntheticWaveform::new(SyntheticConfig::default())
            .take(1000)
            .collect();
        let b: Vec<_> = SyntheticWaveform::new(SyntheticConfig::default())
            .take(1000)
            .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_waveform_timestamps_follow_sample_clock() {
        let readings: Vec<_> = SyntheticWaveform::new(SyntheticConfig::default())
            .take(5)
            .map(|r| r.timestamp_ms)
            .collect();
        assert_eq!(readings, vec![0, 2, 4, 6, 8]);
    }

    #[test]
    fn test_waveform_spikes_once_per_beat() {
        let config = SyntheticConfig {
            bpm: 60,
            noise: 0,
            ..SyntheticConfig::default()
        };
        let readings: Vec<_> = SyntheticWaveform::new(config).take(1500).collect();
        let peaks = readings
            .windows(2)
            .filter(|w| w[0].value <= 2048 && w[1].value > 2048)
            .count();
        // Beats start at 0 s, 1 s, 2 s
        assert_eq!(peaks, 3);
        assert!(readings.iter().all(|r| r.value <= 4095));
    }

    #[test]
    fn test_lead_off_window() {
        let config = SyntheticConfig {
            lead_off: Some(LeadOffWindow {
                start: Duration::from_millis(100),
                duration: Duration::from_millis(50),
            }),
            ..SyntheticConfig::default()
        };
        let readings: Vec<_> = SyntheticWaveform::new(config).take(100).collect();
        let off: Vec<_> = readings.iter().filter(|r| !r.leads_connected).collect();
        assert_eq!(off.len(), 25);
        assert!(off.iter().all(|r| r.value == 4095));
        assert_eq!(off[0].timestamp_ms, 100);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut sensor = SyntheticSensor::new(SyntheticConfig {
            bpm: 0,
            ..SyntheticConfig::default()
        });
        assert!(matches!(sensor.start(), Err(SensorError::InvalidConfig(_))));
        assert!(!sensor.is_running());

        let mut sensor = SyntheticSensor::new(SyntheticConfig {
            sampling: SamplingConfig {
                sample_rate_hz: 0,
                ..SamplingConfig::default()
            },
            ..SyntheticConfig::default()
        });
        assert!(matches!(sensor.start(), Err(SensorError::InvalidConfig(_))));
    }

    #[test]
    fn test_sensor_delivers_readings() {
        let mut sensor = SyntheticSensor::new(SyntheticConfig {
            sampling: SamplingConfig {
                sample_rate_hz: 1000,
                ..SamplingConfig::default()
            },
            ..SyntheticConfig::default()
        });
        sensor.start().unwrap();
        assert!(matches!(sensor.start(), Err(SensorError::AlreadyRunning)));

        let first = sensor
            .receiver()
            .recv_timeout(Duration::from_secs(2))
            .unwrap();
        assert_eq!(first.timestamp_ms, 0);

        sensor.stop();
        assert!(!sensor.is_running());
    }
}
