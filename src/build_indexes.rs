// Index-builder CLI: the three offline phases over a converted store.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use podcorpus::index::run_phases;

#[derive(Parser, Debug)]
#[command(name = "build-indexes")]
#[command(about = "Build precomputed indexes over a converted corpus")]
#[command(
    long_about = "Phase 1 flattens speaker names from the episode catalog; phase 2 \
computes per-turn and per-episode metrics; phase 3 builds the full-text search \
database with BM25 ranking. All phases run when --phase is omitted."
)]
struct Args {
    /// Root directory of the Parquet layout.
    #[arg(long)]
    data_dir: PathBuf,

    /// Run only a specific phase (1, 2, or 3).
    #[arg(long)]
    phase: Option<u8>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let start = std::time::Instant::now();

    run_phases(&args.data_dir, args.phase)
        .with_context(|| format!("index build failed for {}", args.data_dir.display()))?;

    eprintln!("index build complete in {:.1}s", start.elapsed().as_secs_f64());
    Ok(())
}
