#![forbid(unsafe_code)]

use timely_core::{Regime, TimelyError, TimelyResult, MIN_BANDWIDTH_BPS};

/// Starting rate policy for a fresh estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedPolicy {
    /// `max_bandwidth / (sessions + 1)`.
    FairShare,
    /// Start at full link capacity.
    LineRate,
}

/// Denominator of the middle-regime error term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceRtt {
    MinRtt,
    MinModelRtt,
}

/// Tuning constants for one estimator. Immutable once the estimator is built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorConfig {
    /// EWMA weight for successive RTT deltas.
    pub alpha: f64,
    /// Multiplicative decrease factor.
    pub beta: f64,
    /// Additive increase step (bytes/sec).
    pub delta: f64,

    /// RTTs at or below this are ignored.
    pub min_rtt_us: f64,
    pub min_model_rtt_us: f64,
    pub max_model_rtt_us: f64,

    pub min_rate_bps: f64,
    /// `None` caps at the link capacity.
    pub max_rate_bps: Option<f64>,

    pub seed: SeedPolicy,
    pub reference_rtt: ReferenceRtt,
    pub time_scaled: bool,
    pub bypass_at_line_rate: bool,
    pub floor_at_half_previous: bool,
}

impl EstimatorConfig {
    /// Timely as published (patched, section 4.3). Fair-share seed, no time scaling.
    pub const fn basic() -> Self {
        Self {
            alpha: 0.875,
            beta: 0.8,
            delta: 10_000_000.0,
            min_rtt_us: 20.0,
            min_model_rtt_us: 50.0,
            max_model_rtt_us: 500.0,
            min_rate_bps: 500_000.0,
            max_rate_bps: None,
            seed: SeedPolicy::FairShare,
            reference_rtt: ReferenceRtt::MinRtt,
            time_scaled: false,
            bypass_at_line_rate: false,
            floor_at_half_previous: false,
        }
    }

    /// eRPC's Timely (`kPatched`): line-rate seed, time-scaled steps,
    /// bypass when saturated, floor at half the previous rate.
    pub const fn erpc() -> Self {
        Self {
            alpha: 0.46,
            beta: 0.26,
            delta: 5_000_000.0,
            min_rtt_us: 2.0,
            min_model_rtt_us: 50.0,
            max_model_rtt_us: 1000.0,
            min_rate_bps: 15_000_000.0,
            max_rate_bps: None,
            seed: SeedPolicy::LineRate,
            reference_rtt: ReferenceRtt::MinModelRtt,
            time_scaled: true,
            bypass_at_line_rate: true,
            floor_at_half_previous: true,
        }
    }

    /// Upper rate bound once the link capacity is known.
    pub fn max_rate_for(&self, max_bandwidth_bps: f64) -> f64 {
        self.max_rate_bps.unwrap_or(max_bandwidth_bps)
    }

    pub fn reference_rtt_us(&self) -> f64 {
        match self.reference_rtt {
            ReferenceRtt::MinRtt => self.min_rtt_us,
            ReferenceRtt::MinModelRtt => self.min_model_rtt_us,
        }
    }

    /// Rule a sample of `rtt_us` falls under, ignoring the line-rate bypass.
    /// Model bounds are strict: samples exactly on a bound take the gradient rule.
    pub fn regime(&self, rtt_us: f64) -> Regime {
        if rtt_us <= self.min_rtt_us {
            Regime::Ignored
        } else if rtt_us < self.min_model_rtt_us {
            Regime::Additive
        } else if rtt_us > self.max_model_rtt_us {
            Regime::Multiplicative
        } else {
            Regime::Gradient
        }
    }

    pub fn validate(&self, max_bandwidth_bps: f64) -> TimelyResult<()> {
        let max_rate = self.max_rate_for(max_bandwidth_bps);

        let finite = [
            max_bandwidth_bps,
            self.alpha,
            self.beta,
            self.delta,
            self.min_rtt_us,
            self.min_model_rtt_us,
            self.max_model_rtt_us,
            self.min_rate_bps,
            max_rate,
        ];
        if finite.iter().any(|v| !v.is_finite()) {
            return Err(TimelyError::InvalidConfiguration("constants must be finite"));
        }

        let checks: [(bool, &'static str); 10] = [
            (max_bandwidth_bps >= MIN_BANDWIDTH_BPS, "max bandwidth below 1e6 bytes/sec"),
            (self.alpha > 0.0 && self.alpha <= 1.0, "alpha outside (0, 1]"),
            (self.beta > 0.0 && self.beta <= 1.0, "beta outside (0, 1]"),
            (self.delta >= 1_000_000.0, "delta below 1e6 bytes/sec"),
            (self.min_rate_bps > 0.0, "min rate must be positive"),
            (self.min_rate_bps < max_rate, "min rate must be below max rate"),
            (max_rate <= max_bandwidth_bps, "max rate exceeds link capacity"),
            // min_rtt_us divides the RTT gradient, so zero is rejected too
            (self.min_rtt_us > 0.0, "min RTT must be positive"),
            (self.min_rtt_us < self.min_model_rtt_us, "min RTT must be below min model RTT"),
            (self.min_model_rtt_us < self.max_model_rtt_us, "min model RTT must be below max model RTT"),
        ];

        match checks.iter().find(|(ok, _)| !*ok) {
            Some(&(_, why)) => Err(TimelyError::InvalidConfiguration(why)),
            None => Ok(()),
        }
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self::basic()
    }
}
