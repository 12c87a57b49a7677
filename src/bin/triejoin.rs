//! Binary entry point for the triejoin query CLI.
#![forbid(unsafe_code)]

use std::error::Error;
use std::io;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use triejoin::cli::query::{run_query, QueryConfig, RowFormat};

#[derive(Parser, Debug)]
#[command(
    name = "triejoin",
    version,
    about = "Run leapfrog triejoin plans over CSV triples",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for result rows"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load triples and evaluate a JSON plan against them
    Query(QueryCmd),
}

#[derive(Args, Debug)]
struct QueryCmd {
    #[arg(long, help = "CSV file with subject,predicate,object columns")]
    triples: PathBuf,

    #[arg(long, help = "JSON plan file")]
    plan: PathBuf,

    #[arg(long, help = "TOML file with [join] and [store] settings")]
    config: Option<PathBuf>,

    #[arg(long, help = "Stop after this many rows")]
    limit: Option<usize>,

    #[arg(long, help = "Print a load and row count summary to stderr")]
    summary: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

impl From<OutputFormat> for RowFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => RowFormat::Text,
            OutputFormat::Json => RowFormat::Json,
        }
    }
}

#[derive(Serialize)]
struct SummaryReport {
    triples_loaded: u64,
    rows: u64,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .try_init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Query(cmd) => {
            let cfg = QueryConfig {
                triples: cmd.triples,
                plan: cmd.plan,
                config: cmd.config,
                format: cli.format.into(),
                limit: cmd.limit,
            };
            let stdout = io::stdout();
            let mut out = stdout.lock();
            let summary = run_query(&cfg, &mut out)?;
            if cmd.summary {
                let report = SummaryReport {
                    triples_loaded: summary.triples_loaded,
                    rows: summary.rows,
                };
                emit(&cli.format, &report, |_| {
                    eprintln!(
                        "loaded {} triples, {} rows",
                        report.triples_loaded, report.rows
                    );
                })?;
            }
        }
    }
    Ok(())
}

fn emit<T, F>(format: &OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: Fn(OutputFormat),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string(value)?;
            eprintln!("{json}");
        }
        OutputFormat::Text => printer(OutputFormat::Text),
    }
    Ok(())
}
