//! msgenrich CLI - Command-line tool for transaction message enrichment
//!
//! This binary provides command-line interfaces for:
//! - enrich: stamp pkg_ids and propagate transaction context through a document
//! - sequence show: print the next pkg_id and where it came from
//! - sequence set: overwrite the persisted next pkg_id

mod config;

use chrono::{DateTime, Utc};
use clap::{ArgAction, Args, Parser, Subcommand};
use config::{sequence_path, EnrichConfig, Overrides, Settings};
use indicatif::{ProgressBar, ProgressStyle};
use msgenrich_io::{
    execute_enrich, EnrichRequest, EnrichSummary, InputSource, OutputSink, SequenceStore,
};
use std::error::Error;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const REPORT_LABEL_WIDTH: usize = 25;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Parser)]
#[command(name = "msgenrich")]
#[command(about = "Stamp package ids and propagate transaction context through JSON message documents")]
#[command(version)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG wins
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enrich every message array of a JSON document
    ///
    /// Examples:
    ///   msgenrich enrich in.json -o out.json
    ///   msgenrich enrich in.json -o out.json --start 100 --pretty
    ///   msgenrich enrich in.json -o out.json --config msgenrich.toml --progress
    Enrich(EnrichArgs),
    /// Inspect or change the persisted pkg_id sequence
    Sequence {
        #[command(subcommand)]
        action: SequenceAction,
    },
}

#[derive(Args)]
struct EnrichArgs {
    /// Input JSON document
    input: PathBuf,
    /// Output file for the enriched document
    #[arg(short, long)]
    output: PathBuf,
    /// Sequence side file (default: __temp__.json in the current directory)
    #[arg(long)]
    sequence_file: Option<PathBuf>,
    /// Start at this pkg_id and do not read or update any sequence file
    #[arg(long, conflicts_with = "sequence_file")]
    start: Option<u64>,
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Indent the output document
    #[arg(long)]
    pretty: bool,
    /// Enrich records that have no transaction instead of failing
    #[arg(long)]
    skip_missing_transaction: bool,
    /// Suffix identifying the transaction container field
    #[arg(long)]
    transaction_suffix: Option<String>,
    /// Suffix identifying the transaction id field
    #[arg(long)]
    transaction_id_suffix: Option<String>,
    /// Show progress spinner while enriching
    #[arg(long)]
    progress: bool,
    /// Do not print the run report
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Subcommand)]
enum SequenceAction {
    /// Print the next pkg_id
    Show {
        #[command(flatten)]
        target: SequenceTarget,
    },
    /// Persist a new next pkg_id
    Set {
        /// Next pkg_id to hand out
        value: u64,
        #[command(flatten)]
        target: SequenceTarget,
    },
}

#[derive(Args)]
struct SequenceTarget {
    /// Sequence side file (default: __temp__.json in the current directory)
    #[arg(long)]
    sequence_file: Option<PathBuf>,
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<(), Box<dyn Error>> {
    match command {
        Commands::Enrich(args) => handle_enrich(args),
        Commands::Sequence { action } => match action {
            SequenceAction::Show { target } => handle_sequence_show(target),
            SequenceAction::Set { value, target } => handle_sequence_set(value, target),
        },
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn handle_enrich(args: EnrichArgs) -> Result<(), Box<dyn Error>> {
    let config = EnrichConfig::load(args.config.as_deref())?;
    let settings = Settings::resolve(
        config,
        Overrides {
            sequence_file: args.sequence_file,
            start: args.start,
            pretty: args.pretty,
            skip_missing_transaction: args.skip_missing_transaction,
            transaction_suffix: args.transaction_suffix,
            transaction_id_suffix: args.transaction_id_suffix,
        },
    );

    let request = EnrichRequest {
        input: InputSource::Path(args.input.clone()),
        output: OutputSink::Path(args.output.clone()),
        sequence: settings.sequence,
        options: settings.options,
        format: settings.format,
    };

    let started_at = Utc::now();
    let mut progress_bar = args.progress.then(|| create_spinner("Enriching records"));
    let result = execute_enrich(request);
    let finished_at = Utc::now();

    let summary = match result {
        Ok(summary) => summary,
        Err(err) => {
            if let Some(pb) = progress_bar.take() {
                pb.abandon_with_message("Enrichment failed");
            }
            return Err(err.into());
        }
    };

    if let Some(pb) = progress_bar.take() {
        pb.finish_with_message(format!(
            "Enriched {} records across {} arrays in {:.2?}",
            summary.metrics.records_enriched,
            summary.metrics.arrays_processed,
            summary.runtime.wall_time
        ));
    }

    if !args.quiet {
        let report = RunReport {
            summary: &summary,
            input: &args.input,
            output: &args.output,
            started_at,
            finished_at,
        };
        write_run_report(&mut std::io::stderr().lock(), &report)?;
    }
    Ok(())
}

fn handle_sequence_show(target: SequenceTarget) -> Result<(), Box<dyn Error>> {
    let store = sequence_store(target)?;
    let load = store.load();
    println!(
        "{}: next pkg_id {} ({})",
        store.path().display(),
        load.value,
        load.origin
    );
    Ok(())
}

fn handle_sequence_set(value: u64, target: SequenceTarget) -> Result<(), Box<dyn Error>> {
    let store = sequence_store(target)?;
    let previous = store.load();
    store.persist(value)?;
    tracing::info!(
        path = %store.path().display(),
        previous = previous.value,
        value,
        "sequence reset"
    );
    eprintln!(
        "Set next pkg_id to {} in {} (was {})",
        value,
        store.path().display(),
        previous.value
    );
    Ok(())
}

fn sequence_store(target: SequenceTarget) -> Result<SequenceStore, Box<dyn Error>> {
    let config = EnrichConfig::load(target.config.as_deref())?;
    let field = config.fields.pkg_id;
    let path = sequence_path(target.sequence_file, config.sequence);
    Ok(match field {
        Some(field) => SequenceStore::with_field(path, field),
        None => SequenceStore::new(path),
    })
}

struct RunReport<'a> {
    summary: &'a EnrichSummary,
    input: &'a Path,
    output: &'a Path,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
}

fn write_run_report<W: Write>(out: &mut W, report: &RunReport<'_>) -> std::io::Result<()> {
    let summary = report.summary;
    let metrics = &summary.metrics;
    let w = REPORT_LABEL_WIDTH;

    writeln!(out, "{:<w$}: {}", "Start Time", timestamp(report.started_at))?;
    writeln!(
        out,
        "{:<w$}: {} ({})",
        "Input File Size (MB)",
        megabytes(summary.input_bytes),
        report.input.display()
    )?;
    writeln!(
        out,
        "{:<w$}: {} ({})",
        "Output File Size (MB)",
        megabytes(summary.output_bytes),
        report.output.display()
    )?;
    writeln!(
        out,
        "{:<w$}: {} in {} arrays",
        "Records Enriched", metrics.records_enriched, metrics.arrays_processed
    )?;
    if metrics.records_skipped > 0 {
        writeln!(
            out,
            "{:<w$}: {}",
            "Without Transaction", metrics.records_skipped
        )?;
    }
    writeln!(
        out,
        "{:<w$}: {}",
        "Package Ids",
        pkg_id_range(metrics.first_pkg_id, metrics.next_pkg_id)
    )?;
    if let Some(origin) = &summary.sequence_origin {
        writeln!(out, "{:<w$}: {}", "Sequence Origin", origin)?;
    }
    writeln!(
        out,
        "{:<w$}: {:.3?} (enrich {:.3?})",
        "Elapsed", summary.runtime.wall_time, summary.runtime.enrich_time
    )?;
    writeln!(out, "{:<w$}: {}", "End Time", timestamp(report.finished_at))?;
    Ok(())
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

fn megabytes(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / BYTES_PER_MB)
}

fn pkg_id_range(first: u64, next: u64) -> String {
    if next <= first {
        format!("none (next {next})")
    } else {
        format!("{first}..={} (next {next})", next - 1)
    }
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
