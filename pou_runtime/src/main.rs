//! pou-host: run one of the shipped programs under the scan-cycle scheduler
//! and print its final state as JSON.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use pou_kernel::programs::{BatchCounter, Main, Ratio};
use pou_kernel::Pou;
use pou_runtime::io::NoIo;
use pou_runtime::monitor::InstanceSnapshot;
use pou_runtime::{RuntimeConfig, Scheduler, StartMode};

#[derive(Parser)]
#[command(name = "pou-host")]
#[command(about = "Run a program organization unit for a number of scan cycles")]
struct Cli {
    /// Runtime config (TOML); built-in defaults when omitted
    #[arg(long, short)]
    config: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = Program::Main)]
    program: Program,
    /// Scan cycles to run
    #[arg(long, default_value_t = 10)]
    cycles: u64,
    /// Warm restart: keep retain variables from the configured store
    #[arg(long)]
    warm: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Program {
    Main,
    BatchCounter,
    Ratio,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => RuntimeConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => RuntimeConfig::default(),
    };

    match cli.program {
        Program::Main => run::<Main>(config, &cli),
        Program::BatchCounter => run::<BatchCounter>(config, &cli),
        Program::Ratio => run::<Ratio>(config, &cli),
    }
}

fn run<P: Pou>(config: RuntimeConfig, cli: &Cli) -> Result<()> {
    let store = config.open_retain_store();
    let mut scheduler = Scheduler::<P, NoIo>::with_parts(config, NoIo, store);

    let mode = if cli.warm { StartMode::Warm } else { StartMode::Cold };
    scheduler.start(mode).context("initializing instance")?;

    let stop = AtomicBool::new(false);
    let ran = scheduler.run(Some(cli.cycles), &stop);
    // Persist retained state even when a cycle faulted.
    scheduler.shutdown().context("shutting down")?;
    ran.context("scan loop")?;

    let stats = scheduler.stats();
    tracing::info!(cycles = stats.cycles, overruns = stats.overruns, max = ?stats.max, "done");

    let snapshot = InstanceSnapshot::capture(scheduler.instance(), stats.cycles);
    println!("{}", snapshot.to_json()?);
    Ok(())
}
