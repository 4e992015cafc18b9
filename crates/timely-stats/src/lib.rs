#![no_std]
#![forbid(unsafe_code)]

extern crate alloc;

mod histogram;
pub use histogram::{Histogram, HistogramReport};

/// Count, extremes and mean of a sample set.
/// Non-finite samples are skipped and tallied in `rejected`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleSummary {
    pub count: usize,
    pub rejected: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl SampleSummary {
    /// Returns `None` when no finite sample is present.
    pub fn from_samples(data: &[f64]) -> Option<Self> {
        let mut count = 0usize;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;

        for &x in data.iter().filter(|x| x.is_finite()) {
            count += 1;
            sum += x;
            min = min.min(x);
            max = max.max(x);
        }

        if count == 0 { return None; }

        Some(Self {
            count,
            rejected: data.len() - count,
            min,
            max,
            mean: sum / count as f64,
        })
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}
