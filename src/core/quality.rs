//! Variance-based signal quality heuristic.
//!
//! Low amplitude variability and an implausible heart rate are both treated as
//! evidence of poor electrode contact or noise. The score is a heuristic, not
//! a calibrated classifier, and "window not yet filled" is reported the same
//! way as "no usable signal": 0.

use crate::core::rate::is_plausible_bpm;
use crate::core::ring::SampleRingBuffer;
use serde::{Deserialize, Serialize};

/// Variance mapped onto the top of the quality scale.
pub const VARIANCE_FULL_SCALE: u32 = 1_000_000;

/// Points removed when the heart rate estimate is out of range.
pub const IMPLAUSIBLE_RATE_PENALTY: u8 = 30;

/// Coarse classification of a quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    Poor,
    Fair,
    Good,
}

/// Scores the raw sample window each tick.
#[derive(Debug, Clone, Copy)]
pub struct SignalQualityScorer {
    min_quality: u8,
    good_quality: u8,
}

impl Default for SignalQualityScorer {
    fn default() -> Self {
        Self::new(20, 70)
    }
}

impl SignalQualityScorer {
    /// Create a scorer with the thresholds used by [`Self::classify`].
    pub fn new(min_quality: u8, good_quality: u8) -> Self {
        Self {
            min_quality,
            good_quality,
        }
    }

    /// Quality in `[0, 100]` for the given window and current BPM estimate.
    pub fn score(&self, window: &SampleRingBuffer, bpm: u16) -> u8 {
        if !window.is_filled() {
            return 0;
        }

        let mapped = u64::from(window.variance()) * 100 / u64::from(VARIANCE_FULL_SCALE);
        let quality = mapped.min(100) as u8;

        if is_plausible_bpm(bpm) {
            quality
        } else {
            quality.saturating_sub(IMPLAUSIBLE_RATE_PENALTY)
        }
    }

    pub fn classify(&self, quality: u8) -> QualityLevel {
        if quality >= self.good_quality {
            QualityLevel::Good
        } else if quality >= self.min_quality {
            QualityLevel::Fair
        } else {
            QualityLevel::Poor
        }
    }

    /// Whether the score reaches the "good signal" threshold.
    pub fn is_good(&self, quality: u8) -> bool {
        quality >= self.good_quality
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_with(values: &[u16]) -> SampleRingBuffer {
        let mut ring = SampleRingBuffer::new(values.len());
        for &v in values {
            ring.push(v);
        }
        ring
    }

    #[test]
    fn test_unfilled_window_scores_zero() {
        let mut ring = SampleRingBuffer::new(100);
        for _ in 0..99 {
            ring.push(4095);
        }
        assert_eq!(SignalQualityScorer::default().score(&ring, 75), 0);
    }

    #[test]
    fn test_variance_mapping() {
        // Alternating 0/2000: mean 1000, variance 1_000_000 -> 100
        let ring = window_with(&[0, 2000, 0, 2000]);
        assert_eq!(ring.variance(), 1_000_000);
        assert_eq!(SignalQualityScorer::default().score(&ring, 75), 100);

        // Alternating 500/1500: variance 250_000 -> 25
        let ring = window_with(&[500, 1500, 500, 1500]);
        assert_eq!(SignalQualityScorer::default().score(&ring, 75), 25);
    }

    #[test]
    fn test_mapping_clamped_to_100() {
        let ring = window_with(&[0, 4095, 0, 4095]);
        assert!(ring.variance() > VARIANCE_FULL_SCALE);
        assert_eq!(SignalQualityScorer::default().score(&ring, 75), 100);
    }

    #[test]
    fn test_implausible_rate_penalty() {
        let scorer = SignalQualityScorer::default();
        let ring = window_with(&[500, 1500, 500, 1500]);
        assert_eq!(scorer.score(&ring, 0), 0);

        let ring = window_with(&[0, 2000, 0, 2000]);
        assert_eq!(scorer.score(&ring, 0), 70);
        assert_eq!(scorer.score(&ring, 201), 70);
        assert_eq!(scorer.score(&ring, 200), 100);
    }

    #[test]
    fn test_classification() {
        let scorer = SignalQualityScorer::default();
        assert_eq!(scorer.classify(0), QualityLevel::Poor);
        assert_eq!(scorer.classify(19), QualityLevel::Poor);
        assert_eq!(scorer.classify(20), QualityLevel::Fair);
        assert_eq!(scorer.classify(70), QualityLevel::Good);
        assert!(scorer.is_good(70));
        assert!(!scorer.is_good(69));
    }
}
