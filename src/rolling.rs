//! Bounded-history buffers for (time, value) samples.
//!
//! A [`RollingBuffer`] is a fixed-capacity ring: once full, every push evicts the oldest sample.
//! Storage is allocated once at construction, so pushing is O(1) and never reallocates.
//!
//! # Example
//!
//! ```rust
//! use rusty_synapse::rolling::RollingBuffer;
//!
//! let mut buffer = RollingBuffer::new(3);
//! for (t, v) in [(1.0, 10.0), (2.0, 20.0), (3.0, 30.0), (4.0, 40.0)] {
//!     buffer.push(t, v);
//! }
//! assert_eq!(buffer.to_vec(), vec![(2.0, 20.0), (3.0, 30.0), (4.0, 40.0)]);
//! ```

use serde::{Deserialize, Serialize};

/// A fixed-capacity FIFO history of (time, value) samples.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct RollingBuffer {
    /// Ring storage, its length is the capacity.
    samples: Vec<(f64, f64)>,
    /// Position of the oldest sample.
    head: usize,
    /// Number of samples currently held.
    len: usize,
}

impl RollingBuffer {
    /// Create an empty buffer holding at most `capacity` samples.
    /// A zero capacity buffer silently discards every push.
    pub fn new(capacity: usize) -> Self {
        RollingBuffer {
            samples: vec![(f64::NEG_INFINITY, 0.0); capacity],
            head: 0,
            len: 0,
        }
    }

    /// Returns the maximum number of samples held.
    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Returns the number of samples currently held.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Insert a sample at its time position, evicting the oldest one if the buffer is full.
    /// Samples sharing a time keep their insertion order. Pushing in time order is O(1); a late sample
    /// costs a shift of the newer ones, and a sample older than a full history is discarded.
    pub fn push(&mut self, time: f64, value: f64) {
        let capacity = self.capacity();
        if capacity == 0 {
            return;
        }

        let mut pos = self.insertion_point(time);
        if self.len == capacity {
            if pos == 0 {
                log::debug!("Sample at {} older than a full history, discarded", time);
                return;
            }
            self.head = (self.head + 1) % capacity;
            self.len -= 1;
            pos -= 1;
        }

        if pos < self.len {
            log::debug!("Out of order sample at {} inserted at position {}", time, pos);
        }
        for i in (pos..self.len).rev() {
            let (from, to) = (self.slot(i), self.slot(i + 1));
            self.samples[to] = self.samples[from];
        }
        let slot = self.slot(pos);
        self.samples[slot] = (time, value);
        self.len += 1;
    }

    /// Position after every sample not later than `time`, scanning from the most recent one.
    fn insertion_point(&self, time: f64) -> usize {
        let mut pos = self.len;
        while pos > 0 && self.samples[self.slot(pos - 1)].0 > time {
            pos -= 1;
        }
        pos
    }

    /// Storage slot of the `i`-th sample, counted from the oldest.
    fn slot(&self, i: usize) -> usize {
        (self.head + i) % self.samples.len()
    }

    /// Returns the oldest sample, if any.
    pub fn first(&self) -> Option<(f64, f64)> {
        self.get(0)
    }

    /// Returns the most recent sample, if any.
    pub fn last(&self) -> Option<(f64, f64)> {
        match self.len {
            0 => None,
            n => self.get(n - 1),
        }
    }

    /// Returns the `i`-th sample, counted from the oldest.
    pub fn get(&self, i: usize) -> Option<(f64, f64)> {
        if i >= self.len {
            return None;
        }
        Some(self.samples[self.slot(i)])
    }

    /// An iterator over the samples, from the oldest to the most recent.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (f64, f64)> + '_ {
        (0..self.len).map(move |i| self.samples[self.slot(i)])
    }

    /// Returns the samples as a vector, from the oldest to the most recent.
    pub fn to_vec(&self) -> Vec<(f64, f64)> {
        self.iter().collect()
    }

    /// Returns the sum of `value * exp(-(now - time) / tau)` over the samples.
    ///
    /// Every term is computed from its own elapsed time, so the result does not accumulate
    /// rounding errors from repeated decay steps. Samples in the future of `now` contribute nothing.
    pub fn decayed_sum(&self, now: f64, tau: f64) -> f64 {
        self.iter()
            .filter(|(time, _)| *time <= now)
            .map(|(time, value)| value * (-(now - time) / tau).exp())
            .sum()
    }

    /// Remove every sample, keeping the capacity.
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Remove every sample and change the capacity.
    pub fn reset(&mut self, capacity: usize) {
        self.samples = vec![(f64::NEG_INFINITY, 0.0); capacity];
        self.clear();
    }
}
