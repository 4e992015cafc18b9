#![no_std]

mod config;
mod estimator;

pub use config::{EstimatorConfig, ReferenceRtt, SeedPolicy};
pub use estimator::RateEstimator;
pub use timely_core::{Regime, TimelyError, TimelyResult};
