//! `coresim`: command-line driver for the trace-driven cache-coherence
//! simulator.
//!
//! Reads a JSON configuration file and a JSON-lines trace (spec.md §6's
//! external interfaces), replays the trace through [`coresim_core::Simulator`]
//! one record at a time, and writes the finished [`coresim_core::Report`] to
//! stdout or a file. A record the simulator rejects (malformed line, a
//! thread with no allocated core slot, or an exhausted scheduler pool) is
//! treated as fatal: the core never retries, so neither does this driver.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use coresim_core::{Config, Report, Simulator};
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(
    name = "coresim",
    author,
    version,
    about = "Trace-driven, cycle-approximate many-core cache-coherence simulator",
    long_about = "Runs a JSON-configured cache hierarchy against a JSON-lines memory trace \
                  and prints a textual statistics report.\n\n\
                  Examples:\n  \
                  coresim --config system.json --trace run.jsonl\n  \
                  cat run.jsonl | coresim --config system.json"
)]
struct Cli {
    /// Path to the JSON configuration file (system, network, cache, directory, TLB).
    #[arg(short, long)]
    config: PathBuf,

    /// Path to the JSON-lines trace file. Reads stdin if omitted.
    #[arg(short, long)]
    trace: Option<PathBuf>,

    /// Path to write the rendered report. Writes stdout if omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Failure modes this driver surfaces before handing off to the core's own
/// `CoreError`.
#[derive(Debug, Error)]
enum CliError {
    /// Reading the configuration or trace file failed.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    /// The configuration file wasn't valid JSON or didn't match the schema.
    #[error("malformed configuration: {0}")]
    Config(#[from] serde_json::Error),
    /// Building the simulator from a parsed configuration failed.
    #[error(transparent)]
    Core(#[from] coresim_core::common::error::CoreError),
    /// A trace record was rejected by the simulator.
    #[error("trace line {line}: rejected (malformed record, unregistered thread, or exhausted core pool)")]
    RejectedRecord {
        /// 1-indexed line number of the offending record.
        line: usize,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "coresim aborted");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(&cli.config)?;
    tracing::info!(sys_type = ?config.system.sys_type, num_cores = config.system.num_cores, "configuration loaded");

    let sim = Simulator::new(config)?;
    let trace_reader = open_trace(cli.trace.as_deref())?;

    let mut lines_processed = 0usize;
    for (line_no, line) in trace_reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let delay = sim.submit(&line);
        if delay < 0 {
            return Err(CliError::RejectedRecord { line: line_no + 1 });
        }
        lines_processed += 1;
    }
    tracing::info!(lines_processed, "trace replay complete");

    let report = Report::new(&sim).render();
    write_report(cli.output.as_deref(), &report)
}

fn load_config(path: &PathBuf) -> Result<Config, CliError> {
    let mut text = String::new();
    File::open(path)?.read_to_string(&mut text)?;
    Ok(serde_json::from_str(&text)?)
}

fn open_trace(path: Option<&std::path::Path>) -> Result<Box<dyn BufRead>, CliError> {
    match path {
        Some(path) => Ok(Box::new(BufReader::new(File::open(path)?))),
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

fn write_report(path: Option<&std::path::Path>, report: &str) -> Result<(), CliError> {
    match path {
        Some(path) => {
            File::create(path)?.write_all(report.as_bytes())?;
        }
        None => {
            io::stdout().write_all(report.as_bytes())?;
        }
    }
    Ok(())
}
