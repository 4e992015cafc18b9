use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use log::{info, warn};

use timely_core::{Regime, TimelyResult};
use timely_flow::{EstimatorConfig, RateEstimator};
use timely_hal::{RateSink, RttSource};
use timely_stats::Histogram;

mod generator;
mod report;

use generator::{RampRtt, StepRtt, UniformRtt};
use report::{CsvSink, RateLog};

#[derive(Parser)]
#[command(name = "timely-sim", about = "Drive the Timely rate estimator from synthetic RTT traces")]
struct Cli {
    /// Pin the process to this CPU core first
    #[arg(long, global = true)]
    core: Option<usize>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the state and constants of a freshly built estimator
    Dump(EstimatorArgs),
    /// Feed a synthetic RTT trace through an estimator
    Run(RunArgs),
    /// Measure the TSC frequency against the monotonic clock
    Calibrate {
        #[arg(long, default_value_t = 1_000_000)]
        iterations: u64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    Basic,
    Erpc,
}

impl Preset {
    fn config(self) -> EstimatorConfig {
        match self {
            Preset::Basic => EstimatorConfig::basic(),
            Preset::Erpc => EstimatorConfig::erpc(),
        }
    }
}

#[derive(Args)]
struct EstimatorArgs {
    #[arg(long, value_enum, default_value_t = Preset::Basic)]
    preset: Preset,
    /// Link capacity, bytes/sec
    #[arg(long, default_value_t = 10_000_000_000.0)]
    nic_bps: f64,
    /// Sessions already sharing the link
    #[arg(long, default_value_t = 0)]
    sessions: u32,

    #[arg(long)] alpha: Option<f64>,
    #[arg(long)] beta: Option<f64>,
    #[arg(long)] delta: Option<f64>,
    #[arg(long)] min_rtt_us: Option<f64>,
    #[arg(long)] min_model_rtt_us: Option<f64>,
    #[arg(long)] max_model_rtt_us: Option<f64>,
    #[arg(long)] min_rate_bps: Option<f64>,
    #[arg(long)] max_rate_bps: Option<f64>,
}

impl EstimatorArgs {
    fn config(&self) -> EstimatorConfig {
        let mut cfg = self.preset.config();
        if let Some(v) = self.alpha { cfg.alpha = v; }
        if let Some(v) = self.beta { cfg.beta = v; }
        if let Some(v) = self.delta { cfg.delta = v; }
        if let Some(v) = self.min_rtt_us { cfg.min_rtt_us = v; }
        if let Some(v) = self.min_model_rtt_us { cfg.min_model_rtt_us = v; }
        if let Some(v) = self.max_model_rtt_us { cfg.max_model_rtt_us = v; }
        if let Some(v) = self.min_rate_bps { cfg.min_rate_bps = v; }
        if self.max_rate_bps.is_some() { cfg.max_rate_bps = self.max_rate_bps; }
        cfg
    }

    fn build(&self) -> anyhow::Result<RateEstimator> {
        Ok(RateEstimator::new(self.nic_bps, self.sessions, self.config())?)
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceKind {
    Uniform,
    Ramp,
    Step,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    est: EstimatorArgs,

    #[arg(long, default_value_t = 10_000)]
    samples: u64,
    #[arg(long, value_enum, default_value_t = SourceKind::Uniform)]
    source: SourceKind,
    /// RNG seed for the uniform source
    #[arg(long, default_value_t = 1)]
    seed: u64,
    /// Mean gap between samples, microseconds
    #[arg(long, default_value_t = 10.0)]
    interval_us: f64,
    #[arg(long, default_value_t = 5.0)]
    rtt_lo: f64,
    #[arg(long, default_value_t = 1200.0)]
    rtt_hi: f64,
    /// Samples per half-cycle for ramp/step sources
    #[arg(long, default_value_t = 100)]
    period: u64,

    /// Write every sample and resulting rate here
    #[arg(long)]
    csv: Option<PathBuf>,
    #[arg(long, default_value_t = 60)]
    max_dots: u64,
}

impl RunArgs {
    fn source(&self) -> TimelyResult<Box<dyn RttSource>> {
        Ok(match self.source {
            SourceKind::Uniform => {
                Box::new(UniformRtt::new(self.seed, self.rtt_lo, self.rtt_hi, self.interval_us)?)
            }
            SourceKind::Ramp => {
                Box::new(RampRtt::new(self.rtt_lo, self.rtt_hi, self.period, self.interval_us)?)
            }
            SourceKind::Step => {
                Box::new(StepRtt::new(self.rtt_lo, self.rtt_hi, self.period, self.interval_us)?)
            }
        })
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if let Some(core) = cli.core {
        timely_linux::pin_to_core(core)?;
        info!("Pinned to core {}", core);
    }

    match cli.cmd {
        Command::Dump(args) => {
            let est = args.build()?;
            print!("{}", est);
        }
        Command::Calibrate { iterations } => {
            let cal = timely_linux::calibrate_tsc(iterations)?;
            println!("measure rdtsc with monotonic clock: {}", cal);
        }
        Command::Run(args) => run(&args)?,
    }
    Ok(())
}

fn run(args: &RunArgs) -> anyhow::Result<()> {
    let mut est = args.est.build()?;
    let mut source = args.source()?;
    let mut tally = RateLog::default();
    let mut csv = match &args.csv {
        Some(path) => Some(CsvSink::create(path)?),
        None => None,
    };

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        warn!("Signal received. Stopping...");
        r.store(false, Ordering::SeqCst);
    })?;

    info!("Feeding {} samples (seed rate {} B/s)", args.samples, est.rate());
    let mut fed = 0u64;

    while fed < args.samples && running.load(Ordering::SeqCst) {
        let sample = match source.next_sample() {
            Ok(s) => s,
            Err(nb::Error::WouldBlock) => {
                std::thread::yield_now();
                continue;
            }
            Err(nb::Error::Other(e)) => return Err(e.into()),
        };

        let regime = est.observe(sample.rtt_us, sample.now_us)?;
        tally.record(&sample, est.rate(), est.raw_rate(), regime)?;
        if let Some(sink) = csv.as_mut() {
            sink.record(&sample, est.rate(), est.raw_rate(), regime)?;
        }
        fed += 1;
    }

    if let Some(sink) = csv.as_mut() {
        sink.flush()?;
    }
    if fed < args.samples {
        warn!("Stopped early after {} of {} samples", fed, args.samples);
    }

    println!("{}", "== Final estimator state ==".bold().cyan());
    print!("{}", est);

    println!("{}", "== Samples per regime ==".bold().cyan());
    for regime in Regime::ALL {
        println!("    {:<16}: {}", regime.as_str(), tally.count(regime));
    }
    println!("    {:<16}: {}", "total", tally.total());

    println!("{}", "== Rate distribution (Gbps) ==".bold().cyan());
    match Histogram::new(&tally.rates_gbps) {
        Some(hist) => print!("{}", hist.report(args.max_dots, '*')),
        None => println!("{}", "# Error: No data!".yellow()),
    }
    Ok(())
}
