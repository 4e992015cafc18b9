use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use timely_core::{RttSample, TimelyError, TimelyResult};
use timely_hal::RttSource;

/// Shared timestamp stepping for synthetic sources.
#[derive(Debug, Clone, Copy)]
struct Ticker {
    now_us: f64,
    interval_us: f64,
}

impl Ticker {
    fn new(interval_us: f64) -> TimelyResult<Self> {
        if !interval_us.is_finite() || interval_us <= 0.0 {
            return Err(TimelyError::InvalidArgument("sample interval must be positive"));
        }
        Ok(Self { now_us: 0.0, interval_us })
    }

    fn advance(&mut self, scale: f64) -> f64 {
        self.now_us += self.interval_us * scale;
        self.now_us
    }
}

fn check_band(lo: f64, hi: f64) -> TimelyResult<()> {
    if !(lo.is_finite() && hi.is_finite()) || lo <= 0.0 || lo >= hi {
        return Err(TimelyError::InvalidArgument("RTT band must satisfy 0 < lo < hi"));
    }
    Ok(())
}

/// Uniform random RTTs in `[lo, hi)`, arrivals jittered around the interval.
pub struct UniformRtt {
    rng: StdRng,
    lo: f64,
    hi: f64,
    ticker: Ticker,
}

impl UniformRtt {
    pub fn new(seed: u64, lo: f64, hi: f64, interval_us: f64) -> TimelyResult<Self> {
        check_band(lo, hi)?;
        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            lo,
            hi,
            ticker: Ticker::new(interval_us)?,
        })
    }
}

impl RttSource for UniformRtt {
    fn next_sample(&mut self) -> nb::Result<RttSample, TimelyError> {
        let jitter = self.rng.gen_range(0.5..1.5);
        let now = self.ticker.advance(jitter);
        Ok(RttSample::new(self.rng.gen_range(self.lo..self.hi), now))
    }
}

/// Triangle wave: `lo` up to `hi` and back over `2 * period` samples.
pub struct RampRtt {
    lo: f64,
    hi: f64,
    period: u64,
    idx: u64,
    ticker: Ticker,
}

impl RampRtt {
    pub fn new(lo: f64, hi: f64, period: u64, interval_us: f64) -> TimelyResult<Self> {
        check_band(lo, hi)?;
        if period == 0 {
            return Err(TimelyError::InvalidArgument("ramp period must be non-zero"));
        }
        Ok(Self { lo, hi, period, idx: 0, ticker: Ticker::new(interval_us)? })
    }
}

impl RttSource for RampRtt {
    fn next_sample(&mut self) -> nb::Result<RttSample, TimelyError> {
        let phase = self.idx % (2 * self.period);
        let pos = if phase < self.period { phase } else { 2 * self.period - phase };
        self.idx += 1;

        let rtt = self.lo + (self.hi - self.lo) * pos as f64 / self.period as f64;
        Ok(RttSample::new(rtt, self.ticker.advance(1.0)))
    }
}

/// Square wave: `period` samples at `lo`, then `period` at `hi`.
pub struct StepRtt {
    lo: f64,
    hi: f64,
    period: u64,
    idx: u64,
    ticker: Ticker,
}

impl StepRtt {
    pub fn new(lo: f64, hi: f64, period: u64, interval_us: f64) -> TimelyResult<Self> {
        check_band(lo, hi)?;
        if period == 0 {
            return Err(TimelyError::InvalidArgument("step period must be non-zero"));
        }
        Ok(Self { lo, hi, period, idx: 0, ticker: Ticker::new(interval_us)? })
    }
}

impl RttSource for StepRtt {
    fn next_sample(&mut self) -> nb::Result<RttSample, TimelyError> {
        let high = (self.idx / self.period) % 2 == 1;
        self.idx += 1;
        let rtt = if high { self.hi } else { self.lo };
        Ok(RttSample::new(rtt, self.ticker.advance(1.0)))
    }
}
