#![no_std]
#![forbid(unsafe_code)]

use timely_core::{Regime, RttSample, TimelyError, TimelyResult};

/// Where RTT samples come from.
/// INVARIANT: Must be Non-Blocking. Return `WouldBlock` when no completion is ready.
pub trait RttSource {
    fn next_sample(&mut self) -> nb::Result<RttSample, TimelyError>;

    /// Drain up to `out.len()` ready samples.
    /// Default implementation falls back to a scalar loop.
    fn next_batch(&mut self, out: &mut [RttSample]) -> nb::Result<usize, TimelyError> {
        let mut count = 0;
        for slot in out.iter_mut() {
            match self.next_sample() {
                Ok(sample) => {
                    *slot = sample;
                    count += 1;
                }
                Err(nb::Error::WouldBlock) => break,
                Err(e) => return Err(e),
            }
        }
        if count > 0 { Ok(count) } else { Err(nb::Error::WouldBlock) }
    }
}

/// Consumer of estimator output (pacer, report writer, test probe).
pub trait RateSink {
    fn record(
        &mut self,
        sample: &RttSample,
        rate_bps: f64,
        raw_rate_bps: f64,
        regime: Regime,
    ) -> TimelyResult<()>;

    fn flush(&mut self) -> TimelyResult<()> {
        Ok(())
    }
}

/// Monotonic microsecond clock.
pub trait PlatformClock: Send + Sync {
    fn now_us(&self) -> u64;
}
