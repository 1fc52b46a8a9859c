//! Streaming moving-average (boxcar FIR) smoother.

use crate::core::Sample;

/// Moving average over the last `size` raw samples.
///
/// Slots that have not been written yet count as zero, so the first
/// `size - 1` outputs are biased toward zero. That warm-up transient is part
/// of the filter's observable behavior.
#[derive(Debug, Clone)]
pub struct MovingAverageFilter {
    slots: Box<[Sample]>,
    index: usize,
    /// Sum of every slot, wide enough for any window of `u16` samples
    sum: u64,
    output: Sample,
}

impl MovingAverageFilter {
    /// Create a filter with the given window size (at least 1).
    pub fn new(size: usize) -> Self {
        Self {
            slots: vec![0; size.max(1)].into_boxed_slice(),
            index: 0,
            sum: 0,
            output: 0,
        }
    }

    /// Insert a value over the oldest slot and return the truncated mean.
    pub fn apply(&mut self, value: Sample) -> Sample {
        let oldest = std::mem::replace(&mut self.slots[self.index], value);
        self.sum = self.sum - u64::from(oldest) + u64::from(value);
        self.index = (self.index + 1) % self.slots.len();

        self.output = (self.sum / self.slots.len() as u64) as Sample;
        self.output
    }

    /// Most recent filter output.
    pub fn output(&self) -> Sample {
        self.output
    }

    pub fn reset(&mut self) {
        self.slots.fill(0);
        self.index = 0;
        self.sum = 0;
        self.output = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_input_converges() {
        let mut filter = MovingAverageFilter::new(5);
        let outputs: Vec<Sample> = (0..10).map(|_| filter.apply(1000)).collect();

        assert_eq!(outputs[..5], [200, 400, 600, 800, 1000]);
        assert!(outputs[4..].iter().all(|&v| v == 1000));
    }

    #[test]
    fn test_truncating_mean() {
        let mut filter = MovingAverageFilter::new(3);
        filter.apply(1);
        filter.apply(1);
        // (1 + 1 + 0) / 3 truncates to 0
        assert_eq!(filter.output(), 0);
        assert_eq!(filter.apply(2), 1);
    }

    #[test]
    fn test_full_scale_input_does_not_overflow() {
        let mut filter = MovingAverageFilter::new(9);
        for _ in 0..20 {
            filter.apply(Sample::MAX);
        }
        assert_eq!(filter.output(), Sample::MAX);
    }

    #[test]
    fn test_wide_window_at_full_scale() {
        // Sum exceeds u32::MAX once the window is full
        let mut filter = MovingAverageFilter::new(70_000);
        for _ in 0..70_000 {
            filter.apply(Sample::MAX);
        }
        assert_eq!(filter.output(), Sample::MAX);
        assert_eq!(filter.apply(0), ((u64::from(Sample::MAX) * 69_999) / 70_000) as Sample);
    }

    #[test]
    fn test_reset_restores_warm_up() {
        let mut filter = MovingAverageFilter::new(2);
        filter.apply(500);
        filter.apply(500);
        filter.reset();
        assert_eq!(filter.output(), 0);
        assert_eq!(filter.apply(500), 250);
    }
}
