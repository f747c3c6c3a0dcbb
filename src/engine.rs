//! The sampling engine: pinned, real-time-priority loop that interleaves
//! MSR reads across the target cores, writing one delta record per core
//! per iteration. See DESIGN.md for the grounding of each startup step.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::error::SamplerError;
use crate::msr::MsrHandle;
use crate::pmu;
use crate::record::Record;
use crate::sink::SampleSink;
use crate::time::{self, Timestamp};

/// State machine of a single sampling run. No transition from `Sampling`
/// back to `Initializing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Initializing,
    Sampling,
    Draining,
    Terminated,
}

impl EngineState {
    /// Whether `self -> next` is a legal transition. Forward-only: each
    /// variant may only advance to the next one in the sequence above.
    fn can_advance_to(self, next: EngineState) -> bool {
        matches!(
            (self, next),
            (EngineState::Initializing, EngineState::Sampling)
                | (EngineState::Sampling, EngineState::Draining)
                | (EngineState::Draining, EngineState::Terminated)
        )
    }

    /// Advance to `next`, panicking if the transition is illegal.
    fn advance(&mut self, next: EngineState) {
        assert!(
            self.can_advance_to(next),
            "illegal engine state transition: {self:?} -> {next:?}"
        );
        *self = next;
    }
}

/// Configuration for one sampling run.
pub struct EngineConfig {
    pub core_to_pin: u32,
    pub target_cores: Vec<u32>,
    pub duration: Duration,
    pub data_dir: PathBuf,
    pub max_samples_per_core: u64,
}

struct CoreState {
    core_id: u32,
    msr: MsrHandle,
    prev: pmu::CounterValues,
    sink: SampleSink,
    dropped: bool,
}

/// Per-core sample count and observed average rate, emitted at shutdown.
#[derive(Debug, Clone, Copy)]
pub struct CoreSummary {
    pub core_id: u32,
    pub samples: u64,
    pub avg_rate_hz: f64,
}

/// Outcome of one completed sampling run.
pub struct RunReport {
    pub summaries: Vec<CoreSummary>,
}

/// Default file name prefix for a core's binary output file.
pub fn sink_path(data_dir: &Path, core_id: u32) -> PathBuf {
    data_dir.join(format!("profile_data_{core_id}.bin"))
}

/// Register `SIGINT`/`SIGTERM` handlers that flip a shared flag. The
/// handler performs no I/O and acquires no locks, per the async-signal-safety
/// requirement.
fn install_signal_handlers() -> Result<Arc<AtomicBool>, std::io::Error> {
    let should_exit = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&should_exit))?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&should_exit))?;
    Ok(should_exit)
}

/// Request real-time FIFO scheduling at the maximum available priority.
/// Best-effort: failure is a warning, not fatal.
fn request_realtime_priority() {
    // SAFETY: sched_get_priority_max/sched_setscheduler take only plain
    // integers and a pointer to a value we own; no aliasing concerns.
    unsafe {
        let max_prio = libc::sched_get_priority_max(libc::SCHED_FIFO);
        if max_prio < 0 {
            warn!("sched_get_priority_max(SCHED_FIFO) failed: {}", std::io::Error::last_os_error());
            return;
        }
        let param = libc::sched_param {
            sched_priority: max_prio,
        };
        if libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) != 0 {
            warn!(
                "sched_setscheduler(SCHED_FIFO, {}) failed: {} — sampling quality may degrade",
                max_prio,
                std::io::Error::last_os_error()
            );
        }
    }
}

/// Pin the calling thread to `core`.
fn pin_thread_to_core(core: u32) -> Result<(), SamplerError> {
    let mut cpu_set = nix::sched::CpuSet::new();
    cpu_set
        .set(core as usize)
        .map_err(|source| SamplerError::Affinity { core, source })?;
    nix::sched::sched_setaffinity(nix::unistd::Pid::from_raw(0), &cpu_set)
        .map_err(|source| SamplerError::Affinity { core, source })
}

/// Lock all current and future pages into RAM. Best-effort: failure is a
/// warning, not fatal.
fn lock_memory() {
    use nix::sys::mman::MlockAllFlags;
    if let Err(e) = nix::sys::mman::mlockall(MlockAllFlags::MCL_CURRENT | MlockAllFlags::MCL_FUTURE) {
        warn!("mlockall failed: {e} — sampling quality may degrade");
    }
}

/// Run one complete sampling session to completion: startup, hot loop,
/// shutdown. Returns per-core summaries on success.
pub fn run(config: &EngineConfig) -> Result<RunReport, SamplerError> {
    let mut state = EngineState::Initializing;

    if config.target_cores.is_empty() {
        return Err(SamplerError::EmptyTargetCores);
    }

    let should_exit = install_signal_handlers().unwrap_or_else(|e| {
        warn!("failed to install signal handlers: {e}");
        Arc::new(AtomicBool::new(false))
    });

    request_realtime_priority();
    pin_thread_to_core(config.core_to_pin)?;
    lock_memory();

    let mut cores = Vec::with_capacity(config.target_cores.len());
    for &core_id in &config.target_cores {
        let msr = MsrHandle::open(core_id)?;
        let sink = SampleSink::create(
            sink_path(&config.data_dir, core_id),
            config.max_samples_per_core,
        )?;
        pmu::program(&msr)?;
        let prev = pmu::read_counters(&msr)?;
        cores.push(CoreState {
            core_id,
            msr,
            prev,
            sink,
            dropped: false,
        });
    }

    let start = time::now();
    let deadline_ns = start.monotonic_ns + config.duration.as_nanos() as u64;
    info!(
        "sampling started at {} ns, {} target cores, deadline in {:?}",
        start.monotonic_ns,
        cores.len(),
        config.duration
    );

    state.advance(EngineState::Sampling);
    let result = hot_loop(&mut cores, deadline_ns, &should_exit);

    state.advance(EngineState::Draining);
    let summaries = shutdown(cores, start);

    state.advance(EngineState::Terminated);

    result?;
    Ok(RunReport { summaries })
}

fn hot_loop(
    cores: &mut [CoreState],
    deadline_ns: u64,
    should_exit: &AtomicBool,
) -> Result<(), SamplerError> {
    loop {
        if should_exit.load(Ordering::Relaxed) {
            info!("cancellation flag observed, draining");
            break;
        }

        let ts: Timestamp = time::now();
        if ts.monotonic_ns >= deadline_ns {
            break;
        }

        let mut all_full = true;
        for core in cores.iter_mut() {
            if core.dropped {
                continue;
            }
            if core.sink.is_full() {
                warn!(
                    "sink for core {} reached capacity ({} samples), dropping from further iterations",
                    core.core_id,
                    core.sink.capacity()
                );
                core.dropped = true;
                continue;
            }
            all_full = false;

            let curr = pmu::read_counters(&core.msr)?;
            // wrapping_sub: counter wraparound within one interval is treated
            // as impossible, so the modular result is never special-cased.
            let record = Record {
                monotonic_time_ns: ts.monotonic_ns,
                real_time_ns: ts.real_ns,
                llc_loads: curr.llc_loads.wrapping_sub(core.prev.llc_loads),
                llc_misses: curr.llc_misses.wrapping_sub(core.prev.llc_misses),
                instr_retired: curr.instr_retired.wrapping_sub(core.prev.instr_retired),
            };
            core.sink.append(record);
            core.prev = curr;
        }

        if all_full {
            info!("all sinks full, stopping");
            break;
        }
    }
    Ok(())
}

fn shutdown(cores: Vec<CoreState>, start: Timestamp) -> Vec<CoreSummary> {
    let end = time::now();
    let elapsed_s =
        (end.monotonic_ns.saturating_sub(start.monotonic_ns)) as f64 / 1_000_000_000.0;

    let mut summaries = Vec::with_capacity(cores.len());
    for core in cores {
        if let Err(e) = pmu::disarm(&core.msr) {
            warn!("failed to disarm counters on core {}: {e}", core.core_id);
        }
        let samples = core.sink.cursor();
        let core_id = core.core_id;
        if let Err(e) = core.sink.close() {
            warn!("failed to close sink for core {core_id}: {e}");
        }
        let avg_rate_hz = if elapsed_s > 0.0 {
            samples as f64 / elapsed_s
        } else {
            0.0
        };
        info!("core {core_id}: {samples} samples ({avg_rate_hz:.2} samples/sec)");
        summaries.push(CoreSummary {
            core_id,
            samples,
            avg_rate_hz,
        });
    }
    summaries
}
