// logtally - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "logtally";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "logtally";

/// Current application version (updated by release script).
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Parsing
// =============================================================================

/// Minimum token count for a plain `date time level message...` line.
pub const PLAIN_MIN_TOKENS: usize = 4;

/// Minimum token count for a positional access line:
/// `date time level [thread] ip request - status [message...]`.
pub const ACCESS_MIN_TOKENS: usize = 8;

/// Status code recorded when the source line carries none, or an unparsable one.
pub const STATUS_UNKNOWN: i32 = -1;

/// Maximum length of a log line included in debug output.
/// Prevents accidental exposure of sensitive data in long lines.
pub const DEBUG_MAX_LINE_PREVIEW: usize = 200;

// =============================================================================
// Aggregation / reporting
// =============================================================================

/// Level token counted as "Total Errors" in the report (exact match).
pub const ERROR_LEVEL_TOKEN: &str = "Error";

/// Level token counted as "Total Warnings" in the report (exact match).
pub const WARNING_LEVEL_TOKEN: &str = "Warning";

/// Date format used for every timestamp printed in a report.
pub const REPORT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp format used by `Record::formatted_timestamp` and `Display`.
pub const RECORD_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

// =============================================================================
// Processing
// =============================================================================

/// Default number of worker threads for the processing stage.
/// 0 means auto-detect (rayon's default: available CPU cores).
pub const DEFAULT_WORKER_THREADS: usize = 0;

/// Hard upper bound on configured worker threads.
pub const MAX_WORKER_THREADS: usize = 256;

// =============================================================================
// Configuration map keys
// =============================================================================

/// Required: minimum severity threshold.
pub const KEY_LOG_LEVEL: &str = "logLevel";

/// Required: report output path.
pub const KEY_OUTPUT_PATH: &str = "outputPath";

/// Optional: filter criteria string.
pub const KEY_FILTER: &str = "filter";

/// Optional: line parser selection.
pub const KEY_PARSE_MODE: &str = "parseMode";

/// Optional: handling of unrecognised level tokens in the threshold stage.
pub const KEY_LEVEL_POLICY: &str = "levelPolicy";

/// Optional: meaning of `AND` / `OR` connectors in filter criteria.
pub const KEY_CONNECTIVES: &str = "connectives";

/// Optional: processing-stage worker thread count.
pub const KEY_WORKER_THREADS: &str = "workerThreads";

/// Optional: path to export the filtered records to (.json or .csv).
pub const KEY_EXPORT_PATH: &str = "exportPath";

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";
