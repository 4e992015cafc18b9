use std::fs::File;
use std::io::Write;
use std::path::Path;

use log::error;
use timely_core::{bytes_to_gbps, Regime, RttSample, TimelyError, TimelyResult};
use timely_hal::RateSink;

const CSV_HEADER: [&str; 5] = ["now_us", "rtt_us", "rate_bps", "raw_rate_bps", "regime"];

/// One CSV row per sample fed to the estimator.
pub struct CsvSink<W: Write> {
    wtr: csv::Writer<W>,
}

impl CsvSink<File> {
    pub fn create(path: &Path) -> anyhow::Result<Self> {
        let wtr = csv::Writer::from_path(path)?;
        Ok(Self::with_writer(wtr)?)
    }
}

impl<W: Write> CsvSink<W> {
    pub fn from_writer(w: W) -> TimelyResult<Self> {
        Self::with_writer(csv::Writer::from_writer(w))
    }

    fn with_writer(mut wtr: csv::Writer<W>) -> TimelyResult<Self> {
        wtr.write_record(CSV_HEADER).map_err(hal_error)?;
        Ok(Self { wtr })
    }

    pub fn into_inner(self) -> TimelyResult<W> {
        self.wtr.into_inner().map_err(|e| {
            error!("CSV flush failed: {}", e);
            TimelyError::HalError
        })
    }
}

fn hal_error(e: csv::Error) -> TimelyError {
    error!("CSV write failed: {}", e);
    TimelyError::HalError
}

impl<W: Write> RateSink for CsvSink<W> {
    fn record(
        &mut self,
        sample: &RttSample,
        rate_bps: f64,
        raw_rate_bps: f64,
        regime: Regime,
    ) -> TimelyResult<()> {
        self.wtr
            .write_record([
                sample.now_us.to_string(),
                sample.rtt_us.to_string(),
                rate_bps.to_string(),
                raw_rate_bps.to_string(),
                regime.as_str().to_string(),
            ])
            .map_err(hal_error)
    }

    fn flush(&mut self) -> TimelyResult<()> {
        self.wtr.flush().map_err(|e| {
            error!("CSV flush failed: {}", e);
            TimelyError::HalError
        })
    }
}

/// In-memory trace: bounded rate per accepted sample plus a regime tally.
#[derive(Debug, Default)]
pub struct RateLog {
    pub rates_gbps: Vec<f64>,
    tally: [u64; Regime::COUNT],
}

impl RateLog {
    pub fn count(&self, regime: Regime) -> u64 {
        self.tally[slot(regime)]
    }

    pub fn total(&self) -> u64 {
        self.tally.iter().sum()
    }
}

fn slot(regime: Regime) -> usize {
    Regime::ALL.iter().position(|r| *r == regime).unwrap_or(0)
}

impl RateSink for RateLog {
    fn record(&mut self, _: &RttSample, rate_bps: f64, _: f64, regime: Regime) -> TimelyResult<()> {
        self.tally[slot(regime)] += 1;
        if regime.is_accepted() {
            self.rates_gbps.push(bytes_to_gbps(rate_bps));
        }
        Ok(())
    }
}
