//! Fixed-capacity ring of recent raw samples.
//!
//! The window is allocated once at construction and never grows. Statistics
//! are only reported once the ring has wrapped at least once; before that both
//! `mean` and `variance` report 0 ("no data").

use crate::core::Sample;

/// Circular store of the most recent `capacity` raw samples.
#[derive(Debug, Clone)]
pub struct SampleRingBuffer {
    /// Sample slots, oldest entry overwritten when full
    slots: Box<[Sample]>,
    /// Next slot to write, always in `[0, capacity)`
    write_index: usize,
    /// Set once the write cursor has wrapped since construction or reset
    filled: bool,
}

impl SampleRingBuffer {
    /// Create an empty ring with the given capacity (at least 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![0; capacity.max(1)].into_boxed_slice(),
            write_index: 0,
            filled: false,
        }
    }

    /// Store a sample at the write cursor and advance the cursor.
    pub fn push(&mut self, sample: Sample) {
        self.slots[self.write_index] = sample;
        self.write_index = (self.write_index + 1) % self.slots.len();
        if self.write_index == 0 {
            self.filled = true;
        }
    }

    /// Whether every slot has been written at least once.
    pub fn is_filled(&self) -> bool {
        self.filled
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn write_index(&self) -> usize {
        self.write_index
    }

    /// Truncated arithmetic mean of the window, or 0 while not filled.
    pub fn mean(&self) -> Sample {
        if !self.filled {
            return 0;
        }
        self.truncated_mean()
    }

    /// Population variance around the truncated mean, or 0 while not filled.
    pub fn variance(&self) -> u32 {
        if !self.filled {
            return 0;
        }

        let mean = i64::from(self.truncated_mean());
        let sum_sq: i64 = self
            .slots
            .iter()
            .map(|&s| {
                let d = i64::from(s) - mean;
                d * d
            })
            .sum();

        (sum_sq / self.slots.len() as i64) as u32
    }

    /// Zero every slot and rewind the cursor.
    pub fn reset(&mut self) {
        self.slots.fill(0);
        self.write_index = 0;
        self.filled = false;
    }

    fn truncated_mean(&self) -> Sample {
        let sum: u64 = self.slots.iter().map(|&s| u64::from(s)).sum();
        (sum / self.slots.len() as u64) as Sample
    }
}
