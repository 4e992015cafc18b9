use std::fmt;
use std::hint::black_box;

use log::{debug, info};
use timely_hal::PlatformClock;

/// CLOCK_MONOTONIC in microseconds. Never goes backwards, never zero after boot,
/// so it satisfies the estimator's strictly-increasing timestamp contract.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxClock;

impl LinuxClock {
    pub fn new() -> Self { Self }

    pub fn now_us_f64(&self) -> f64 {
        // CLOCK_MONOTONIC always exists; with a valid pointer the call cannot fail
        let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
        unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
        ts.tv_sec as f64 * 1_000_000.0 + ts.tv_nsec as f64 / 1_000.0
    }
}

impl PlatformClock for LinuxClock {
    fn now_us(&self) -> u64 { self.now_us_f64() as u64 }
}

/// Pin the calling thread to `core_id`.
pub fn pin_to_core(core_id: usize) -> anyhow::Result<()> {
    let ids = core_affinity::get_core_ids()
        .ok_or_else(|| anyhow::anyhow!("cannot enumerate CPU cores"))?;
    let core = ids
        .into_iter()
        .find(|c| c.id == core_id)
        .ok_or_else(|| anyhow::anyhow!("core {} not available to this process", core_id))?;

    if !core_affinity::set_for_current(core) {
        anyhow::bail!("failed to pin thread to core {}", core_id);
    }
    debug!("Pinned to core {}", core_id);
    Ok(())
}

/// Ratio between the time-stamp counter and the monotonic clock over one workload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TscCalibration {
    pub clock_ns: u64,
    pub cycles: u64,
    pub freq_ghz: f64,
}

impl TscCalibration {
    /// Convert a TSC delta into microseconds.
    pub fn cycles_to_us(&self, cycles: u64) -> f64 {
        cycles as f64 / (self.freq_ghz * 1_000.0)
    }
}

impl fmt::Display for TscCalibration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "clock diff {} ns, rdtsc cycles {}, rdtsc freq {:.6} GHz",
            self.clock_ns, self.cycles, self.freq_ghz
        )
    }
}

/// Busy loop the optimizer cannot remove.
fn spin_workload(iterations: u64) -> u64 {
    let mut sum: u64 = 5;
    for i in 0..iterations {
        let i = black_box(i);
        sum = sum.wrapping_add(i.wrapping_add(sum.wrapping_add(i).wrapping_mul(i % sum.max(1))));
    }
    black_box(sum)
}

#[cfg(target_arch = "x86_64")]
fn rdtsc() -> u64 {
    // SAFETY: rdtsc has no preconditions on x86_64.
    unsafe { core::arch::x86_64::_rdtsc() }
}

/// Measure TSC frequency against `Instant` across `iterations` of busy work.
#[cfg(target_arch = "x86_64")]
pub fn calibrate_tsc(iterations: u64) -> anyhow::Result<TscCalibration> {
    let clock_start = std::time::Instant::now();
    let tsc_start = rdtsc();

    spin_workload(iterations);

    let tsc_end = rdtsc();
    let clock_ns = clock_start.elapsed().as_nanos() as u64;

    if clock_ns == 0 {
        anyhow::bail!("workload too short to measure ({} iterations)", iterations);
    }
    let cycles = tsc_end.wrapping_sub(tsc_start);
    let cal = TscCalibration {
        clock_ns,
        cycles,
        freq_ghz: cycles as f64 / clock_ns as f64,
    };
    info!("TSC calibration: {}", cal);
    Ok(cal)
}

#[cfg(not(target_arch = "x86_64"))]
pub fn calibrate_tsc(_iterations: u64) -> anyhow::Result<TscCalibration> {
    anyhow::bail!("TSC calibration needs x86_64")
}

/// Microsecond clock driven by the TSC, scaled by a prior calibration.
#[cfg(target_arch = "x86_64")]
#[derive(Debug, Clone, Copy)]
pub struct TscClock {
    cal: TscCalibration,
}

#[cfg(target_arch = "x86_64")]
impl TscClock {
    pub fn new(cal: TscCalibration) -> Self { Self { cal } }
}

#[cfg(target_arch = "x86_64")]
impl PlatformClock for TscClock {
    fn now_us(&self) -> u64 { self.cal.cycles_to_us(rdtsc()) as u64 }
}
