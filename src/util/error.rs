// logtally - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// Every stage error is wrapped into `AnalysisError`, which names the
// pipeline stage that failed and keeps the root cause reachable via
// `std::error::Error::source`.

use std::fmt;
use std::io;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Pipeline stages
// ---------------------------------------------------------------------------

/// The stage of the analysis pipeline an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Reading,
    Filtering,
    Processing,
    Reporting,
    Persisting,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Reading => "reading",
            Stage::Filtering => "filtering",
            Stage::Processing => "processing",
            Stage::Reporting => "reporting",
            Stage::Persisting => "persisting",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Top-level analysis error
// ---------------------------------------------------------------------------

/// The single wrapped error reported for a failed analysis run.
#[derive(Debug)]
pub struct AnalysisError {
    /// Stage that was active when the failure occurred.
    pub stage: Stage,
    /// Underlying cause.
    pub cause: StageFailure,
}

impl AnalysisError {
    pub fn new(stage: Stage, cause: impl Into<StageFailure>) -> Self {
        Self {
            stage,
            cause: cause.into(),
        }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Analysis failed during {} stage: {}", self.stage, self.cause)
    }
}

impl std::error::Error for AnalysisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

/// Root causes, categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum StageFailure {
    /// Configuration validation failed.
    Config(ConfigError),

    /// The log source could not be read.
    Source(SourceError),

    /// Filter compilation or threshold evaluation failed.
    Filter(FilterError),

    /// One or more processing units failed.
    Process(ProcessError),

    /// The report could not be written.
    Sink(SinkError),

    /// The record export could not be produced.
    Export(ExportError),
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::Source(e) => write!(f, "Source error: {e}"),
            Self::Filter(e) => write!(f, "Filter error: {e}"),
            Self::Process(e) => write!(f, "Processing error: {e}"),
            Self::Sink(e) => write!(f, "Sink error: {e}"),
            Self::Export(e) => write!(f, "Export error: {e}"),
        }
    }
}

impl std::error::Error for StageFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Source(e) => Some(e),
            Self::Filter(e) => Some(e),
            Self::Process(e) => Some(e),
            Self::Sink(e) => Some(e),
            Self::Export(e) => Some(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors related to configuration loading and validation.
#[derive(Debug)]
pub enum ConfigError {
    /// A required key is absent from the configuration map.
    MissingKey { key: &'static str },

    /// A key is present but its value is malformed.
    InvalidValue {
        key: String,
        value: String,
        expected: String,
    },

    /// TOML parsing failed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// I/O error reading config file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingKey { key } => {
                write!(f, "Invalid or missing '{key}' in configuration")
            }
            Self::InvalidValue {
                key,
                value,
                expected,
            } => write!(
                f,
                "Config '{key}' = '{value}' is not valid. Expected: {expected}"
            ),
            Self::TomlParse { path, source } => {
                write!(f, "Config parse error '{}': {source}", path.display())
            }
            Self::Io { path, source } => {
                write!(f, "Config I/O error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for StageFailure {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Source errors
// ---------------------------------------------------------------------------

/// Errors raised while reading the log source.
#[derive(Debug)]
pub enum SourceError {
    /// The source path is empty.
    MissingPath,

    /// I/O error reading the source.
    Io { path: PathBuf, source: io::Error },

    /// The run was cancelled while reading.
    Cancelled,
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingPath => f.write_str("Log source path cannot be empty"),
            Self::Io { path, source } => {
                write!(f, "Error reading log file '{}': {source}", path.display())
            }
            Self::Cancelled => f.write_str("Reading was cancelled"),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<SourceError> for StageFailure {
    fn from(e: SourceError) -> Self {
        Self::Source(e)
    }
}

// ---------------------------------------------------------------------------
// Filter errors
// ---------------------------------------------------------------------------

/// Errors related to filter compilation and evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// A criterion does not have the `field=value` shape.
    InvalidCriterion { criterion: String },

    /// The field does not name a record attribute.
    UnsupportedField { field: String, criterion: String },

    /// The attribute exists but its type cannot be filtered on.
    UnsupportedType {
        field: &'static str,
        type_name: &'static str,
        criterion: String,
    },

    /// The value could not be coerced to the attribute's type.
    Coercion {
        criterion: String,
        value: String,
        expected: &'static str,
    },

    /// Strict level policy: a record's level is not a known severity.
    UnknownLevel { level: String, record_id: u64 },
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCriterion { criterion } => {
                write!(f, "Invalid filter criterion '{criterion}': expected FIELD=VALUE")
            }
            Self::UnsupportedField { field, criterion } => {
                write!(f, "Filtering by '{field}' is not supported (in '{criterion}')")
            }
            Self::UnsupportedType {
                field,
                type_name,
                criterion,
            } => write!(
                f,
                "Filtering by property type {type_name} is not supported \
                 ('{field}' in '{criterion}')"
            ),
            Self::Coercion {
                criterion,
                value,
                expected,
            } => write!(
                f,
                "Failed to parse '{value}' as {expected} (in '{criterion}')"
            ),
            Self::UnknownLevel { level, record_id } => write!(
                f,
                "Record #{record_id} has unrecognised level '{level}'"
            ),
        }
    }
}

impl std::error::Error for FilterError {}

impl From<FilterError> for StageFailure {
    fn from(e: FilterError) -> Self {
        Self::Filter(e)
    }
}

// ---------------------------------------------------------------------------
// Processing errors
// ---------------------------------------------------------------------------

/// A single failed processing unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFailure {
    /// Identity of the record the unit was processing.
    pub record_id: u64,
    /// Failure description (error message or panic payload).
    pub reason: String,
}

impl fmt::Display for UnitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record #{}: {}", self.record_id, self.reason)
    }
}

/// Errors related to the concurrent processing stage.
#[derive(Debug)]
pub enum ProcessError {
    /// At least one unit failed. Every failure is listed.
    UnitFailures { failures: Vec<UnitFailure> },

    /// The run was cancelled before every unit completed.
    Cancelled { completed: usize, total: usize },

    /// The worker pool could not be created.
    ThreadPool {
        threads: usize,
        source: rayon::ThreadPoolBuildError,
    },
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnitFailures { failures } => {
                write!(f, "{} processing unit(s) failed", failures.len())?;
                for failure in failures {
                    write!(f, "; {failure}")?;
                }
                Ok(())
            }
            Self::Cancelled { completed, total } => {
                write!(f, "Processing cancelled after {completed} of {total} records")
            }
            Self::ThreadPool { threads, source } => {
                write!(f, "Failed to build a pool of {threads} worker threads: {source}")
            }
        }
    }
}

impl std::error::Error for ProcessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ThreadPool { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ProcessError> for StageFailure {
    fn from(e: ProcessError) -> Self {
        Self::Process(e)
    }
}

// ---------------------------------------------------------------------------
// Sink errors
// ---------------------------------------------------------------------------

/// Errors raised while persisting output.
#[derive(Debug)]
pub enum SinkError {
    /// I/O error writing to the sink.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "Failed to save report to '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
        }
    }
}

impl From<SinkError> for StageFailure {
    fn from(e: SinkError) -> Self {
        Self::Sink(e)
    }
}

// ---------------------------------------------------------------------------
// Export errors
// ---------------------------------------------------------------------------

/// Errors related to record export.
#[derive(Debug)]
pub enum ExportError {
    /// The export path has no recognised extension.
    UnsupportedFormat { path: PathBuf },

    /// I/O error flushing the export buffer.
    Io { path: PathBuf, source: io::Error },

    /// CSV serialisation error.
    Csv { path: PathBuf, source: csv::Error },

    /// JSON serialisation error.
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedFormat { path } => write!(
                f,
                "Cannot export to '{}': expected a .json or .csv extension",
                path.display()
            ),
            Self::Io { path, source } => {
                write!(f, "Export I/O error '{}': {source}", path.display())
            }
            Self::Csv { path, source } => {
                write!(f, "CSV export error '{}': {source}", path.display())
            }
            Self::Json { path, source } => {
                write!(f, "JSON export error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Csv { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::UnsupportedFormat { .. } => None,
        }
    }
}

impl From<ExportError> for StageFailure {
    fn from(e: ExportError) -> Self {
        Self::Export(e)
    }
}

/// Convenience type alias for analysis results.
pub type Result<T> = std::result::Result<T, AnalysisError>;
