//! Fixed-capacity history rings used by the detectors and the monitor

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

/// Ring buffer that evicts its oldest entry once `capacity` is reached.
#[derive(Debug, Clone)]
pub struct History<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T> History<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    pub fn push(&mut self, item: T) {
        if self.items.len() >= self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl DoubleEndedIterator<Item = &mut T> {
        self.items.iter_mut()
    }
}

/// One timestamped metric value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub at: DateTime<Utc>,
    pub value: f64,
}

impl History<Sample> {
    pub fn record(&mut self, value: f64, at: DateTime<Utc>) {
        self.push(Sample { at, value });
    }

    pub fn latest_value(&self) -> Option<f64> {
        self.latest().map(|s| s.value)
    }

    /// The `n` most recent values, oldest first.
    pub fn last_values(&self, n: usize) -> Vec<f64> {
        let skip = self.len().saturating_sub(n);
        self.iter().skip(skip).map(|s| s.value).collect()
    }

    /// Mean of the entries from `lookback` back up to (not including)
    /// `exclude_recent` back. `None` when that span is empty.
    pub fn window_mean(&self, lookback: usize, exclude_recent: usize) -> Option<f64> {
        let start = self.len().saturating_sub(lookback);
        let end = self.len().saturating_sub(exclude_recent);
        if start >= end {
            return None;
        }
        let sum: f64 = self.iter().skip(start).take(end - start).map(|s| s.value).sum();
        Some(sum / (end - start) as f64)
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
