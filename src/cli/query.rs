use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use csv::{ReaderBuilder, StringRecord, Trim};
use thiserror::Error;

use super::config::{CliConfig, ConfigError};
use crate::query::{Executor, PlanOp};
use crate::storage::{Dictionary, StoreOptions, TripleStore, TripleStoreBuilder};
use crate::types::TrieJoinError;

/// How result rows are printed.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum RowFormat {
    /// `?var=term` pairs separated by tabs, one row per line.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Inputs of one `query` invocation.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// CSV file with `subject,predicate,object` columns.
    pub triples: PathBuf,
    /// JSON plan file.
    pub plan: PathBuf,
    /// Optional TOML settings file.
    pub config: Option<PathBuf>,
    /// Output format.
    pub format: RowFormat,
    /// Stop after this many rows.
    pub limit: Option<usize>,
}

/// What a query run produced.
#[derive(Debug, Clone, Default)]
pub struct QuerySummary {
    /// Triples loaded from the CSV file.
    pub triples_loaded: u64,
    /// Rows written to the output.
    pub rows: u64,
}

/// Error type for CLI operations.
#[derive(Error, Debug)]
pub enum CliError {
    /// Generic error message.
    #[error("{0}")]
    Message(String),
    /// IO error from file operations.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// CSV parsing error.
    #[error(transparent)]
    Csv(#[from] csv::Error),
    /// Plan file or output serialization error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Settings file error.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Storage or join error.
    #[error(transparent)]
    Core(#[from] TrieJoinError),
}

impl From<&str> for CliError {
    fn from(value: &str) -> Self {
        CliError::Message(value.to_string())
    }
}

impl From<String> for CliError {
    fn from(value: String) -> Self {
        CliError::Message(value)
    }
}

/// Loads triples from `path` into a fresh store, interning every term.
pub fn load_triples(
    path: &Path,
    options: &StoreOptions,
) -> Result<(TripleStore, Dictionary, u64), CliError> {
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_path(path)?;
    let headers = reader.headers()?.clone();
    let subject = find_column(&headers, "subject")?;
    let predicate = find_column(&headers, "predicate")?;
    let object = find_column(&headers, "object")?;

    let mut dict = Dictionary::new();
    let mut builder = TripleStoreBuilder::new(options.clone());
    let mut loaded = 0u64;
    for record in reader.records() {
        let record = record?;
        let s = dict.intern(get_required(&record, subject, "subject")?);
        let p = dict.intern(get_required(&record, predicate, "predicate")?);
        let o = dict.intern(get_required(&record, object, "object")?);
        builder.insert(s, p, o);
        loaded += 1;
    }
    let store = builder.build()?;
    tracing::info!(path = %path.display(), rows = loaded, terms = dict.len(), "cli.load_triples.done");
    Ok((store, dict, loaded))
}

/// Reads a JSON plan and resolves its terms through `dict`.
pub fn load_plan(path: &Path, dict: &Dictionary) -> Result<PlanOp, CliError> {
    let contents = fs::read_to_string(path)?;
    let raw: PlanOp<String> = serde_json::from_str(&contents)?;
    Ok(raw.resolve(dict)?)
}

/// Loads the inputs of `cfg`, runs the plan and writes rows to `out`.
pub fn run_query<W: Write>(cfg: &QueryConfig, out: &mut W) -> Result<QuerySummary, CliError> {
    let settings = CliConfig::load(cfg.config.as_deref())?;
    let (store, dict, triples_loaded) = load_triples(&cfg.triples, &settings.store)?;
    let plan = load_plan(&cfg.plan, &dict)?;
    let executor = Executor::new(Arc::new(store), settings.join);
    let stream = executor.stream(&plan)?;

    let mut summary = QuerySummary {
        triples_loaded,
        rows: 0,
    };
    let limit = cfg.limit.unwrap_or(usize::MAX);
    for row in stream.with_terms(&dict).take(limit) {
        let row = row?;
        write_row(out, cfg.format, &row)?;
        summary.rows += 1;
    }
    out.flush()?;
    executor.store().emit_tracing();
    Ok(summary)
}

fn write_row<W: Write>(
    out: &mut W,
    format: RowFormat,
    row: &BTreeMap<String, String>,
) -> Result<(), CliError> {
    match format {
        RowFormat::Json => {
            serde_json::to_writer(&mut *out, row)?;
            writeln!(out)?;
        }
        RowFormat::Text => {
            let line = row
                .iter()
                .map(|(var, term)| format!("?{var}={term}"))
                .collect::<Vec<_>>()
                .join("\t");
            writeln!(out, "{line}")?;
        }
    }
    Ok(())
}

fn find_column(headers: &StringRecord, name: &str) -> Result<usize, CliError> {
    headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(name))
        .ok_or_else(|| CliError::Message(format!("column '{}' not found", name)))
}

fn get_required<'a>(record: &'a StringRecord, idx: usize, name: &str) -> Result<&'a str, CliError> {
    record
        .get(idx)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CliError::Message(format!("missing value for column '{}'", name)))
}
