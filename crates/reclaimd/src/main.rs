//! reclaimd: per-process memory reclaim
//!
//! Compacts a single process or sweeps every background system process,
//! using `process_madvise` where available and `/proc/<pid>/reclaim`
//! otherwise.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reclaim_memory::{CompactionMode, EngineConfig};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

// Use mimalloc as the global allocator
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Per-process memory reclaim.
#[derive(Parser)]
#[command(name = "reclaimd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Engine configuration (.toml or .json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compact every non-application process except this one
    System {
        /// Print the sweep report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compact a single process
    Process {
        /// Target process id
        pid: u32,

        /// Areas to compact: anon, file or all
        #[arg(short, long, default_value = "all")]
        mode: CompactionMode,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::default(),
    };

    run(cli.command, config)
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

#[cfg(target_os = "linux")]
fn run(command: Commands, config: EngineConfig) -> Result<()> {
    use reclaim_memory::{Engine, Route};

    let engine = Engine::system(config);

    match command {
        Commands::System { json } => {
            let report = engine.compact_system(engine.process_table().as_ref());
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
        Commands::Process { pid, mode } => {
            match engine.compact_or_fallback(pid, mode) {
                Route::Batched(Some(report)) => info!(
                    pid,
                    pageout_bytes = report.pageout.bytes,
                    cold_bytes = report.cold.bytes,
                    skipped = report.skipped,
                    "Compaction done"
                ),
                Route::Batched(None) => info!(pid, "Compaction failed, see log"),
                Route::Legacy => info!(pid, %mode, "Requested legacy reclaim"),
                Route::Noop => {}
            }
        }
    }

    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn run(_command: Commands, _config: EngineConfig) -> Result<()> {
    anyhow::bail!("reclaimd only runs on Linux")
}
