//! Bounded rolling history of recent samples.
//!
//! A fixed-size ring with predictable memory usage: once full, each push
//! overwrites the oldest sample.

/// Default number of retained samples (two minutes at 1 Hz).
pub const DEFAULT_HISTORY_LEN: usize = 120;

/// A circular buffer of samples with fixed capacity.
#[derive(Debug, Clone)]
pub struct HistoryBuffer<T = f64> {
    entries: Vec<T>,
    capacity: usize,
    write_index: usize,
    count: usize,
}

impl<T: Copy + Default> Default for HistoryBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }
}

impl<T: Copy + Default> HistoryBuffer<T> {
    /// Creates an empty buffer. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: vec![T::default(); capacity],
            capacity,
            write_index: 0,
            count: 0,
        }
    }

    /// Appends a sample, evicting the oldest one when full.
    pub fn push(&mut self, value: T) {
        self.entries[self.write_index] = value;
        self.write_index = (self.write_index + 1) % self.capacity;

        if self.count < self.capacity {
            self.count += 1;
        }
    }

    /// Returns all samples in chronological order (oldest to newest).
    pub fn snapshot(&self) -> Vec<T> {
        let mut result = Vec::with_capacity(self.count);

        if self.count < self.capacity {
            result.extend_from_slice(&self.entries[..self.count]);
        } else {
            // full: oldest sample sits at write_index
            result.extend_from_slice(&self.entries[self.write_index..]);
            result.extend_from_slice(&self.entries[..self.write_index]);
        }

        result
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}
