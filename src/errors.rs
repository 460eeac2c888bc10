use std::fmt;
use std::fmt::Formatter;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort a pipeline run before any output is produced, plus the
/// two range conditions the caller must react to explicitly.
#[derive(Debug, Error)]
pub enum FiscalError {
    #[error("source not found: {}", .path.display())]
    SourceNotFound { path: PathBuf },

    #[error("failed to decode {} as {encoding}", .path.display())]
    DecodeError { path: PathBuf, encoding: String },

    #[error("unknown text encoding label: {0}")]
    UnknownEncoding(String),

    #[error("schema mismatch in {source_name}: missing columns [{}]", .missing.join(", "))]
    SchemaMismatch {
        source_name: String,
        missing: Vec<String>,
    },

    #[error("invalid fiscal year {raw:?} in {source_name} at line {line}")]
    InvalidYear {
        source_name: String,
        line: u64,
        raw: String,
    },

    #[error("fiscal year {year} appears more than once in {source_name}")]
    DuplicateYear { source_name: String, year: i32 },

    #[error("invalid year interval: start {start} is after end {end}")]
    InvalidRange { start: i32, end: i32 },

    #[error("no data available for the interval {start}-{end}")]
    EmptyRange { start: i32, end: i32 },

    #[error("failed to read csv data: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode csv report: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

impl FiscalError {
    /// Whether the error must stop the run. `EmptyRange` is the only kind the
    /// caller is expected to render as a "no data" state instead.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, FiscalError::EmptyRange { .. })
    }

    /// The process exit code for a run that ended with this error: 2 for a
    /// "no data" interval, 1 for everything else.
    pub fn exit_code(&self) -> i32 {
        if self.is_fatal() {
            1
        } else {
            2
        }
    }
}

/// A single cell that failed numeric coercion. The cell's value becomes null
/// and ingestion continues.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseWarning {
    pub source_name: String,
    pub line: u64,
    pub column: String,
    pub raw: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.raw.is_empty() {
            write!(
                f,
                "{} line {}: column {:?} is empty, treated as not available",
                self.source_name, self.line, self.column
            )
        } else {
            write!(
                f,
                "{} line {}: column {:?} value {:?} is not a number, treated as not available",
                self.source_name, self.line, self.column, self.raw
            )
        }
    }
}
