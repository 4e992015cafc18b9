use timely_core::{Regime, RttSample, TimelyError, TimelyResult};
use timely_hal::{PlatformClock, RateSink, RttSource};

struct Scripted {
    samples: Vec<RttSample>,
    idx: usize,
}

impl RttSource for Scripted {
    fn next_sample(&mut self) -> nb::Result<RttSample, TimelyError> {
        let s = self.samples.get(self.idx).copied().ok_or(nb::Error::WouldBlock)?;
        self.idx += 1;
        Ok(s)
    }
}

#[derive(Default)]
struct Probe {
    seen: Vec<(f64, Regime)>,
}

impl RateSink for Probe {
    fn record(&mut self, _s: &RttSample, rate: f64, _raw: f64, regime: Regime) -> TimelyResult<()> {
        self.seen.push((rate, regime));
        Ok(())
    }
}

struct Frozen(u64);
impl PlatformClock for Frozen {
    fn now_us(&self) -> u64 { self.0 }
}

#[test]
fn test_source_object_safety() {
    let mut src = Scripted {
        samples: vec![RttSample::new(30.0, 1.0), RttSample::new(40.0, 2.0)],
        idx: 0,
    };
    let obj: &mut dyn RttSource = &mut src;

    assert_eq!(obj.next_sample().unwrap().rtt_us, 30.0);
    assert_eq!(obj.next_sample().unwrap().now_us, 2.0);
    assert!(matches!(obj.next_sample(), Err(nb::Error::WouldBlock)));
}

#[test]
fn test_batch_fallback() {
    let mut src = Scripted {
        samples: (1..=3).map(|i| RttSample::new(25.0, i as f64)).collect(),
        idx: 0,
    };
    let mut out = [RttSample::new(0.0, 0.0); 8];

    assert_eq!(src.next_batch(&mut out).unwrap(), 3);
    assert_eq!(out[2].now_us, 3.0);
    // Drained source reports WouldBlock, not an empty batch
    assert!(matches!(src.next_batch(&mut out), Err(nb::Error::WouldBlock)));
}

#[test]
fn test_sink_and_clock_contract() {
    let mut probe = Probe::default();
    let sink: &mut dyn RateSink = &mut probe;
    sink.record(&RttSample::new(30.0, 1.0), 2.5e9, 2.5e9, Regime::Additive).unwrap();
    sink.flush().unwrap();
    assert_eq!(probe.seen, vec![(2.5e9, Regime::Additive)]);

    let clock: &dyn PlatformClock = &Frozen(42);
    assert_eq!(clock.now_us(), 42);
}
