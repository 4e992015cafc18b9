#![forbid(unsafe_code)]

use core::fmt;

use log::{debug, trace, warn};
use timely_core::{bytes_to_gbps, Regime, TimelyError, TimelyResult};

use crate::config::{EstimatorConfig, SeedPolicy};

/// Gradient at or beyond which the blend weight saturates.
const GRADIENT_LIMIT: f64 = 0.25;

/// Per-session Timely rate estimator.
///
/// Consumes `(rtt_us, now_us)` samples and produces a transmit rate in bytes/sec
/// bounded to `[min_rate_bps, max_rate_bps]`. One instance per session, driven
/// by a single writer. Not `Clone`.
#[derive(Debug)]
pub struct RateEstimator {
    config: EstimatorConfig,
    max_bandwidth_bps: f64,
    max_rate_bps: f64,

    line_rate_bps: f64,
    raw_rate_bps: f64,
    prev_time_us: f64,
    prev_rtt_us: f64,
    weighted_rtt_diff_us: f64,
}

impl RateEstimator {
    /// `session_count` is the number of sessions already running, not counting this one.
    /// It only matters for the fair-share seed.
    pub fn new(
        max_bandwidth_bps: f64,
        session_count: u32,
        config: EstimatorConfig,
    ) -> TimelyResult<Self> {
        if let Err(e) = config.validate(max_bandwidth_bps) {
            warn!("Rejected estimator config ({}): {:?}", e, config);
            return Err(e);
        }
        let max_rate_bps = config.max_rate_for(max_bandwidth_bps);

        let seed = match config.seed {
            SeedPolicy::FairShare => max_bandwidth_bps / (session_count as f64 + 1.0),
            SeedPolicy::LineRate => max_bandwidth_bps,
        };
        let line_rate_bps = seed.clamp(config.min_rate_bps, max_rate_bps);

        debug!(
            "Estimator up: link {} B/s, {} peer sessions, seed {} B/s ({:?})",
            max_bandwidth_bps, session_count, line_rate_bps, config.seed
        );

        Ok(Self {
            config,
            max_bandwidth_bps,
            max_rate_bps,
            line_rate_bps,
            raw_rate_bps: seed,
            prev_time_us: 0.0,
            prev_rtt_us: config.min_rtt_us,
            weighted_rtt_diff_us: 0.0,
        })
    }

    pub fn rate(&self) -> f64 {
        self.line_rate_bps
    }

    pub fn rate_gbps(&self) -> f64 {
        bytes_to_gbps(self.line_rate_bps)
    }

    /// Last computed rate before bounding. Diagnostics only; may sit outside the bounds.
    pub fn raw_rate(&self) -> f64 {
        self.raw_rate_bps
    }

    pub fn raw_rate_gbps(&self) -> f64 {
        bytes_to_gbps(self.raw_rate_bps)
    }

    pub fn prev_time_us(&self) -> f64 {
        self.prev_time_us
    }

    pub fn prev_rtt_us(&self) -> f64 {
        self.prev_rtt_us
    }

    pub fn weighted_rtt_diff_us(&self) -> f64 {
        self.weighted_rtt_diff_us
    }

    pub fn max_bandwidth_bps(&self) -> f64 {
        self.max_bandwidth_bps
    }

    pub fn max_rate_bps(&self) -> f64 {
        self.max_rate_bps
    }

    pub fn min_rate_bps(&self) -> f64 {
        self.config.min_rate_bps
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Feed one RTT sample completed at absolute time `now_us` and return the new rate.
    ///
    /// Requires `rtt_us > 0` and `now_us` strictly after the last accepted sample.
    /// Violations return `InvalidArgument` and leave the estimator untouched.
    /// Samples at or below `min_rtt_us` are not errors: they are skipped.
    pub fn update(&mut self, rtt_us: f64, now_us: f64) -> TimelyResult<f64> {
        self.observe(rtt_us, now_us)?;
        Ok(self.line_rate_bps)
    }

    /// Same as `update`, but reports which rule handled the sample.
    /// `Ignored` and `Bypassed` samples leave every field as it was.
    pub fn observe(&mut self, rtt_us: f64, now_us: f64) -> TimelyResult<Regime> {
        if !rtt_us.is_finite() || rtt_us <= 0.0 {
            return Err(TimelyError::InvalidArgument("rtt must be positive and finite"));
        }
        if !now_us.is_finite() || now_us <= self.prev_time_us {
            return Err(TimelyError::InvalidArgument("timestamp must advance"));
        }

        let regime = self.config.regime(rtt_us);
        if regime == Regime::Ignored {
            return Ok(Regime::Ignored);
        }

        // Saturated and uncongested: nothing to learn
        if self.config.bypass_at_line_rate
            && self.line_rate_bps == self.max_bandwidth_bps
            && rtt_us <= self.config.min_model_rtt_us
        {
            return Ok(Regime::Bypassed);
        }

        let rtt_diff = rtt_us - self.prev_rtt_us;
        self.weighted_rtt_diff_us =
            (1.0 - self.config.alpha) * self.weighted_rtt_diff_us + self.config.alpha * rtt_diff;

        let delta_factor = if self.config.time_scaled {
            ((now_us - self.prev_time_us) / self.config.min_rtt_us).min(1.0)
        } else {
            1.0
        };
        let add_step = self.config.delta * delta_factor;
        let mult_step = self.config.beta * delta_factor;

        let calculated = match regime {
            Regime::Additive => self.line_rate_bps + add_step,
            Regime::Multiplicative => {
                let overshoot = 1.0 - self.config.max_model_rtt_us / rtt_us;
                self.line_rate_bps * (1.0 - mult_step * overshoot)
            }
            _ => {
                let weight = self.gradient_weight();
                let reference = self.config.reference_rtt_us();
                let error = (rtt_us - reference) / reference;
                self.line_rate_bps * (1.0 - mult_step * weight * error) + add_step * (1.0 - weight)
            }
        };

        self.raw_rate_bps = calculated;

        let mut bounded = calculated;
        if self.config.floor_at_half_previous {
            bounded = bounded.max(self.line_rate_bps * 0.5);
        }
        self.line_rate_bps = bounded.clamp(self.config.min_rate_bps, self.max_rate_bps);

        self.prev_rtt_us = rtt_us;
        self.prev_time_us = now_us;

        trace!(
            "rtt {}us @ {}us -> {:?}: raw {} B/s, rate {} B/s",
            rtt_us, now_us, regime, self.raw_rate_bps, self.line_rate_bps
        );

        Ok(regime)
    }

    /// Map the smoothed RTT slope onto [0, 1]: 0 when RTT is falling fast,
    /// 1 when rising fast, linear in between.
    fn gradient_weight(&self) -> f64 {
        let gradient = self.weighted_rtt_diff_us / self.config.min_rtt_us;
        if gradient <= -GRADIENT_LIMIT {
            0.0
        } else if gradient >= GRADIENT_LIMIT {
            1.0
        } else {
            2.0 * gradient + 0.5
        }
    }
}

impl fmt::Display for RateEstimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.config;
        writeln!(f, "[")?;
        writeln!(f, "    rate_gbps (last estimated rate)        : {}", self.rate_gbps())?;
        writeln!(f, "    rate_bps (last estimated rate)         : {}", self.line_rate_bps)?;
        writeln!(f, "    raw_rate_gbps (last raw rate)          : {}", self.raw_rate_gbps())?;
        writeln!(f, "    raw_rate_bps (last raw rate)           : {}", self.raw_rate_bps)?;
        writeln!(f, "    prev_time_us (last accepted abs time)  : {}", self.prev_time_us)?;
        writeln!(f, "    prev_rtt_us (last accepted RTT)        : {}", self.prev_rtt_us)?;
        writeln!(f, "    weighted_rtt_diff_us (RTT trend)       : {}", self.weighted_rtt_diff_us)?;
        writeln!(f, "    alpha (EWMA smoothing factor)          : {}", c.alpha)?;
        writeln!(f, "    beta (multiplicative decrease factor)  : {}", c.beta)?;
        writeln!(f, "    delta (additive increase, bytes/sec)   : {}", c.delta)?;
        writeln!(f, "    min_rtt_us (RTTs <= ignored)           : {}", c.min_rtt_us)?;
        writeln!(f, "    min_model_rtt_us (lower model bound)   : {}", c.min_model_rtt_us)?;
        writeln!(f, "    max_model_rtt_us (upper model bound)   : {}", c.max_model_rtt_us)?;
        writeln!(f, "    reference_rtt (gradient error base)    : {:?}", c.reference_rtt)?;
        writeln!(f, "    seed (initial rate policy)             : {:?}", c.seed)?;
        writeln!(f, "    time_scaled                            : {}", c.time_scaled)?;
        writeln!(f, "    bypass_at_line_rate                    : {}", c.bypass_at_line_rate)?;
        writeln!(f, "    floor_at_half_previous                 : {}", c.floor_at_half_previous)?;
        writeln!(f, "    NIC bandwidth (bytes/sec)              : {}", self.max_bandwidth_bps)?;
        writeln!(f, "    minimum computed rate (bytes/sec)      : {}", c.min_rate_bps)?;
        writeln!(f, "    maximum computed rate (bytes/sec)      : {}", self.max_rate_bps)?;
        writeln!(f, "]")
    }
}
