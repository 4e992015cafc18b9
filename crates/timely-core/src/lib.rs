#![no_std]
#[cfg(feature = "std")]
extern crate std;

/// Bytes/sec to Gbit/sec.
pub const BYTES_TO_GBITS: f64 = 8.0 / (1000.0 * 1000.0 * 1000.0);

/// Smallest link capacity an estimator accepts (bytes/sec).
pub const MIN_BANDWIDTH_BPS: f64 = 1_000_000.0;

/// One RTT observation and the absolute time it completed.
/// Both values are microseconds; `rtt_us` excludes serialization delay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RttSample {
    pub rtt_us: f64,
    pub now_us: f64,
}

impl RttSample {
    pub fn new(rtt_us: f64, now_us: f64) -> Self {
        Self { rtt_us, now_us }
    }
}

/// Which rule an `update` call applied to a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Regime {
    /// RTT at or below the ignore floor; state untouched.
    Ignored,
    /// Already at line rate with an uncongested RTT; state untouched.
    Bypassed,
    /// RTT below the lower model bound: additive increase.
    Additive,
    /// RTT inside the model bounds: gradient-weighted blend.
    Gradient,
    /// RTT above the upper model bound: multiplicative decrease.
    Multiplicative,
}

impl Regime {
    pub const COUNT: usize = 5;
    pub const ALL: [Regime; Self::COUNT] = [
        Regime::Ignored,
        Regime::Bypassed,
        Regime::Additive,
        Regime::Gradient,
        Regime::Multiplicative,
    ];

    /// True when the sample changed estimator state.
    pub fn is_accepted(self) -> bool {
        !matches!(self, Regime::Ignored | Regime::Bypassed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Regime::Ignored => "ignored",
            Regime::Bypassed => "bypassed",
            Regime::Additive => "additive",
            Regime::Gradient => "gradient",
            Regime::Multiplicative => "multiplicative",
        }
    }
}

#[inline]
pub fn bytes_to_gbps(bytes_per_sec: f64) -> f64 {
    bytes_per_sec * BYTES_TO_GBITS
}

pub type TimelyResult<T> = Result<T, TimelyError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelyError {
    /// A constant failed validation at construction.
    InvalidConfiguration(&'static str),
    /// Caller broke the `update` contract (non-positive RTT, stale timestamp).
    InvalidArgument(&'static str),
    /// A collaborator (sample source, report sink) failed.
    HalError,
}

impl core::fmt::Display for TimelyError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TimelyError::InvalidConfiguration(why) => write!(f, "invalid configuration: {}", why),
            TimelyError::InvalidArgument(why) => write!(f, "invalid argument: {}", why),
            TimelyError::HalError => write!(f, "{:?}", self),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TimelyError {}
