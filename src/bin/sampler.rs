//! Sampler CLI: pins a thread, programs MSRs on a set of target cores, and
//! records delta samples for a bounded duration. See spec.md §6.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use log::{error, info, warn};

use msr_sampler::engine::{self, EngineConfig};
use msr_sampler::error::SamplerError;

/// Default per-core sample capacity when not overridden.
const DEFAULT_MAX_SAMPLES_PER_CORE: u64 = 50_000_000;

#[derive(Parser, Debug)]
#[command(about = "High-rate MSR performance counter sampler for Intel E5 v3 servers")]
struct Args {
    /// Logical CPU id to pin the sampler thread to.
    #[arg(long = "core-to-pin")]
    core_to_pin: u32,

    /// Comma-separated list of logical CPU ids to sample.
    #[arg(long = "target-cores")]
    target_cores: String,

    /// Duration to sample for, in seconds.
    #[arg(long)]
    duration: i64,

    /// Directory for per-core output files; created with mode 0755 if absent.
    #[arg(long = "data-dir")]
    data_dir: PathBuf,

    /// Maximum samples to collect per core before that core is dropped.
    #[arg(long = "max-samples", default_value_t = DEFAULT_MAX_SAMPLES_PER_CORE)]
    max_samples: u64,
}

fn parse_target_cores(s: &str) -> Result<Vec<u32>, SamplerError> {
    let mut cores = Vec::new();
    for part in s.split(',') {
        let part = part.trim();
        let id = part
            .parse::<u32>()
            .map_err(|_| SamplerError::InvalidCoreId(part.to_string()))?;
        cores.push(id);
    }
    if cores.is_empty() {
        return Err(SamplerError::EmptyTargetCores);
    }
    Ok(cores)
}

fn create_data_dir(path: &PathBuf) -> Result<(), SamplerError> {
    if path.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(path).map_err(|source| SamplerError::DataDirCreate {
        path: path.clone(),
        source,
    })?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o755);
        if let Err(e) = std::fs::set_permissions(path, perms) {
            warn!("failed to set mode 0755 on data dir {path:?}: {e}");
        }
    }
    Ok(())
}

fn run() -> Result<(), SamplerError> {
    let args = Args::parse();

    if args.duration <= 0 {
        return Err(SamplerError::InvalidDuration(args.duration));
    }
    let target_cores = parse_target_cores(&args.target_cores)?;
    create_data_dir(&args.data_dir)?;

    info!(
        "pinned to core {}, sampling cores {:?}, for {} sec, output {:?}",
        args.core_to_pin, target_cores, args.duration, args.data_dir
    );

    let config = EngineConfig {
        core_to_pin: args.core_to_pin,
        target_cores,
        duration: Duration::from_secs(args.duration as u64),
        data_dir: args.data_dir,
        max_samples_per_core: args.max_samples,
    };

    let report = engine::run(&config)?;
    for summary in &report.summaries {
        info!(
            "core {}: {} samples ({:.2} samples/sec)",
            summary.core_id, summary.samples, summary.avg_rate_hz
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
