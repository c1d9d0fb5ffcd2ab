// Ingestion CLI: convert the raw JSONL.gz source streams into the
// partitioned Parquet layout.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use podcorpus::ingest::{run_convert, ConvertOptions, EPISODE_FILE, TURN_FILE};

#[derive(Parser, Debug)]
#[command(name = "convert")]
#[command(about = "Convert corpus JSONL.gz streams to a partitioned Parquet layout")]
#[command(
    long_about = "Streams the episode-level and speaker-turn files, normalizes and \
partitions them per podcast, and writes catalogs, indexes, and a manifest. Output is \
staged in <output-dir>.tmp and renamed into place atomically on success."
)]
struct Args {
    /// Directory containing the source files.
    #[arg(long)]
    input_dir: PathBuf,

    /// Output directory for the Parquet layout.
    #[arg(long)]
    output_dir: PathBuf,

    /// Skip the turn pass for faster smoke runs.
    #[arg(long)]
    skip_turns: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let start = std::time::Instant::now();

    let options = ConvertOptions {
        input_dir: args.input_dir.clone(),
        output_dir: args.output_dir,
        skip_turns: args.skip_turns,
    };
    let report = run_convert(&options).with_context(|| {
        format!(
            "conversion failed (expected {EPISODE_FILE} and {TURN_FILE} under {})",
            args.input_dir.display()
        )
    })?;

    eprintln!(
        "conversion complete in {:.1}s: {} podcasts, {} episodes ({} episode records), \
         {} turn records ({} matched, {} unmatched)",
        start.elapsed().as_secs_f64(),
        report.podcasts,
        report.episodes,
        report.episode_records,
        report.turn_records,
        report.matched_turns,
        report.unmatched_turns,
    );
    Ok(())
}
