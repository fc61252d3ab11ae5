//! Writes the full set of generated allocator workload traces.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use workload_traces::driver::{self, Driver};
use workload_traces::{AllocatorKind, Config, RandomChooser, TARGET_LINE_COUNT};

/// Generate allocate/free workload traces for allocator benchmarks.
///
/// With no subcommand, writes `generated_<kind>_<pattern>.alloc` for every
/// pattern (ramp, peak, plateau) and allocator kind (slab, buddy, bitmap),
/// after removing stale generated traces.
#[derive(Debug, Parser)]
#[command(name = "workload-traces")]
struct Cli {
    /// Directory the traces are written to.
    #[arg(long, default_value = driver::DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Seed for reproducible traces. Omit for a different run every time.
    #[arg(long)]
    seed: Option<u64>,

    /// Number of lines, header included, each trace is padded to.
    #[arg(long, default_value_t = TARGET_LINE_COUNT)]
    target_lines: usize,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write the size-class sweep trace to `trace.alloc`.
    Sweep {
        /// Allocator kind named in the trace header.
        #[arg(long, default_value = "bitmap")]
        kind: AllocatorKind,
        /// Total memory budget in bytes.
        #[arg(long, default_value_t = workload_traces::config::SWEEP_BUDGET)]
        budget: usize,
        /// Number of allocator levels; the slot table has `2^levels` slots.
        #[arg(long, default_value_t = workload_traces::config::SWEEP_LEVELS)]
        levels: u32,
    },
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut driver = match cli.seed {
        Some(seed) => Driver::with_chooser(cli.output_dir, RandomChooser::new(seed)),
        None => Driver::new(cli.output_dir),
    }
    .target(cli.target_lines);

    match cli.command {
        None => {
            let written = driver.run()?;
            log::info!(
                "wrote {} traces to {}",
                written.len(),
                driver.output_dir().display()
            );
        }
        Some(Command::Sweep {
            kind,
            budget,
            levels,
        }) => {
            let config = Config::leveled(kind, budget, levels)?;
            let path = driver.run_sweep(config)?;
            log::info!("wrote {}", path.display());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
