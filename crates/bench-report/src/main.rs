use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use std::path::{Path, PathBuf};

use benchlog::generate_report;

/// Convert raw network benchmark captures into a per-iteration record table
#[derive(Debug, Parser)]
#[command(name = "bench-report")]
struct Cli {
    /// Throughput/latency capture from the load generator
    iq_log: PathBuf,

    /// CPU and hardware-counter capture from the same run
    counter_log: PathBuf,

    /// Output CSV path (defaults to "<iq log stem>_records.csv" next to the
    /// IQ log)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Verbose debug output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    let output = match cli.output {
        Some(path) => path,
        None => default_output_path(&cli.iq_log)?,
    };

    let summary = generate_report(&cli.iq_log, &cli.counter_log, &output)
        .with_context(|| format!("failed to generate a report from {}", cli.iq_log.display()))?;

    log::info!(
        "wrote {} records to {} ({} incomplete iterations dropped, {} parse faults)",
        summary.written,
        output.display(),
        summary.dropped,
        summary.faults
    );

    Ok(())
}

fn default_output_path(input: &Path) -> Result<PathBuf> {
    let base_name = input
        .file_stem()
        .ok_or_else(|| anyhow::anyhow!("Invalid input filename"))?
        .to_string_lossy();

    let output_filename = format!("{}_records.csv", base_name);

    if let Some(parent) = input.parent() {
        Ok(parent.join(output_filename))
    } else {
        Ok(PathBuf::from(output_filename))
    }
}
