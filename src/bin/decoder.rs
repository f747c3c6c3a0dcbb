//! Decoder CLI: converts per-core `profile_data_<id>.bin` files in a
//! directory to sibling `profiling_results_<id>.csv` files. See spec.md §6.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use msr_sampler::decode;

#[derive(Parser, Debug)]
#[command(about = "Decode sampler binary output to CSV")]
struct Args {
    /// Directory containing profile_data_<id>.bin files.
    #[arg(long = "data-dir")]
    data_dir: PathBuf,

    /// Samples to process per chunk (default 1000, max 1_000_000).
    #[arg(long = "chunk-size")]
    chunk_size: Option<u64>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let report = match decode::decode_directory(&args.data_dir, args.chunk_size) {
        Ok(report) => report,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mut total = 0u64;
    let mut failed = false;
    for (path, result) in &report.results {
        match result {
            Ok(count) => {
                total += count;
                info!("{path:?}: {count} samples");
            }
            Err(e) => {
                error!("{path:?}: {e}");
                failed = true;
            }
        }
    }
    info!("decoded {total} samples total across {} files", report.results.len());

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
