#![forbid(unsafe_code)]

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use crate::SampleSummary;

/// Fixed-width histogram over `[min, max]` of a sample set.
/// The top edge is closed: the max sample lands in the last bin.
#[derive(Debug, Clone)]
pub struct Histogram {
    summary: SampleSummary,
    bin_width: f64,
    counts: Vec<u64>,
}

impl Histogram {
    /// Sturges-style bin count: `floor(log2(n)) + 1`.
    pub fn new(data: &[f64]) -> Option<Self> {
        let summary = SampleSummary::from_samples(data)?;
        let nbin = (usize::BITS - summary.count.leading_zeros()) as usize;
        Self::build(data, summary, nbin)
    }

    pub fn with_bins(data: &[f64], nbin: usize) -> Option<Self> {
        let summary = SampleSummary::from_samples(data)?;
        Self::build(data, summary, nbin)
    }

    fn build(data: &[f64], summary: SampleSummary, nbin: usize) -> Option<Self> {
        if nbin == 0 { return None; }

        let span = summary.span();
        let mut counts = vec![0u64; nbin];
        for &x in data.iter().filter(|x| x.is_finite()) {
            let ibin = if span > 0.0 {
                ((x - summary.min) * nbin as f64 / span) as usize
            } else {
                0
            };
            counts[ibin.min(nbin - 1)] += 1;
        }

        Some(Self {
            summary,
            bin_width: span / nbin as f64,
            counts,
        })
    }

    pub fn summary(&self) -> &SampleSummary {
        &self.summary
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Lower and upper edge of bin `i`.
    pub fn bin_range(&self, i: usize) -> (f64, f64) {
        let lo = self.summary.min + i as f64 * self.bin_width;
        (lo, lo + self.bin_width)
    }

    /// Samples represented by one dot when no row may exceed `max_dots`.
    pub fn dot_count(&self, max_dots: u64) -> u64 {
        let bin_max = self.counts.iter().copied().max().unwrap_or(0);
        if max_dots > 0 && bin_max > max_dots { bin_max / max_dots } else { 1 }
    }

    pub fn report(&self, max_dots: u64, symbol: char) -> HistogramReport<'_> {
        HistogramReport { hist: self, max_dots, symbol }
    }
}

/// ASCII rendering of a `Histogram`.
pub struct HistogramReport<'a> {
    hist: &'a Histogram,
    max_dots: u64,
    symbol: char,
}

impl fmt::Display for HistogramReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.hist.summary;
        let dot_count = self.hist.dot_count(self.max_dots);

        writeln!(f, "# NumSamples = {}", s.count)?;
        if s.rejected > 0 {
            writeln!(f, "# Rejected   = {}", s.rejected)?;
        }
        writeln!(f, "# Min        = {}", s.min)?;
        writeln!(f, "# Max        = {}", s.max)?;
        writeln!(f, "# Mean       = {}", s.mean)?;
        writeln!(f, "# each {} represents a count of {}", self.symbol, dot_count)?;
        writeln!(f, "# --------------------------------------")?;
        for (i, &count) in self.hist.counts.iter().enumerate() {
            let (lo, hi) = self.hist.bin_range(i);
            write!(f, "{:>14.4} {:>14.4} {:>8} ", lo, hi, count)?;
            for _ in 0..count / dot_count {
                write!(f, "{}", self.symbol)?;
            }
            writeln!(f)?;
        }
        writeln!(f, "# --------------------------------------")
    }
}
