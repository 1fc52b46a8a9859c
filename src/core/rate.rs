//! Sliding-window heart rate estimation from beat-to-beat intervals.

/// Lowest heart rate ever reported once a beat has been recorded.
pub const MIN_BPM: u16 = 30;

/// Highest heart rate ever reported.
pub const MAX_BPM: u16 = 200;

const MS_PER_MINUTE: u64 = 60_000;

/// Heart rate estimator over the last `capacity` accepted intervals.
///
/// A zero slot means "never written", not a zero-length interval, and is left
/// out of the average.
#[derive(Debug, Clone)]
pub struct HeartRateEstimator {
    intervals: Box<[u32]>,
    index: usize,
    bpm: u16,
}

impl HeartRateEstimator {
    pub fn new(capacity: usize) -> Self {
        Self {
            intervals: vec![0; capacity.max(1)].into_boxed_slice(),
            index: 0,
            bpm: 0,
        }
    }

    /// Record an accepted interval and return the updated estimate.
    pub fn record(&mut self, interval_ms: u32) -> u16 {
        self.intervals[self.index] = interval_ms;
        self.index = (self.index + 1) % self.intervals.len();
        self.recalculate();
        self.bpm
    }

    /// Recompute BPM from the non-zero slots.
    ///
    /// With no usable interval the previous estimate is kept. The clamp is
    /// applied to the final value, after averaging.
    fn recalculate(&mut self) {
        let (total, count) = self
            .intervals
            .iter()
            .filter(|&&i| i > 0)
            .fold((0u64, 0u64), |(sum, n), &i| (sum + u64::from(i), n + 1));

        if count == 0 {
            return;
        }

        let average = (total / count).max(1);
        let bpm = (MS_PER_MINUTE / average).min(u64::from(u16::MAX)) as u16;
        self.bpm = bpm.clamp(MIN_BPM, MAX_BPM);
    }

    /// Current estimate; 0 until the first interval is recorded.
    pub fn bpm(&self) -> u16 {
        self.bpm
    }

    /// Number of filled interval slots.
    pub fn valid_intervals(&self) -> usize {
        self.intervals.iter().filter(|&&i| i > 0).count()
    }

    pub fn reset(&mut self) {
        self.intervals.fill(0);
        self.index = 0;
        self.bpm = 0;
    }
}

/// Whether a BPM value lies within the reportable physiological range.
pub fn is_plausible_bpm(bpm: u16) -> bool {
    (MIN_BPM..=MAX_BPM).contains(&bpm)
}
