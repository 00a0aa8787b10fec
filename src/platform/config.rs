// logtally - platform/config.rs
//
// Configuration: platform directory resolution, config.toml loading with
// startup validation, and the per-run `PipelineContext` key/value map that
// validates into `AnalysisSettings`.
//
// Uses the `directories` crate for XDG (Linux), AppData (Windows),
// Library (macOS) compliance.

use crate::core::export::ExportFormat;
use crate::core::filter::{Connectives, FilterSettings, LevelPolicy, SeverityThreshold};
use crate::core::model::Severity;
use crate::core::parser::ParseMode;
use crate::util::constants;
use crate::util::error::ConfigError;
use directories::ProjectDirs;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Resolved platform paths for logtally configuration and data.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (e.g. ~/.config/logtally/ or %APPDATA%\logtally\config\)
    pub config_dir: PathBuf,

    /// Data directory for log files written by `[logging] file`.
    pub data_dir: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to current directory if platform dirs cannot be determined.
    pub fn resolve() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("", "", constants::APP_ID) {
            let config_dir = proj_dirs.config_dir().to_path_buf();
            let data_dir = proj_dirs.data_dir().to_path_buf();

            tracing::debug!(
                config = %config_dir.display(),
                data = %data_dir.display(),
                "Platform paths resolved"
            );

            Self {
                config_dir,
                data_dir,
            }
        } else {
            tracing::warn!("Could not determine platform directories, using current directory");
            let fallback = PathBuf::from(".");
            Self {
                config_dir: fallback.clone(),
                data_dir: fallback,
            }
        }
    }

    /// Default location of `config.toml`.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(constants::CONFIG_FILE_NAME)
    }
}

// =============================================================================
// Per-key validation
// =============================================================================

fn invalid(key: &str, value: &str, expected: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected: expected.into(),
    }
}

fn parse_severity(value: &str) -> Result<Severity, ConfigError> {
    Severity::parse(value).ok_or_else(|| {
        invalid(
            constants::KEY_LOG_LEVEL,
            value,
            "one of Debug, Info, Warning, Error",
        )
    })
}

fn parse_path(key: &str, value: &str) -> Result<PathBuf, ConfigError> {
    if value.trim().is_empty() {
        return Err(invalid(key, value, "a non-empty path"));
    }
    Ok(PathBuf::from(value.trim()))
}

fn parse_export_path(value: &str) -> Result<PathBuf, ConfigError> {
    let path = parse_path(constants::KEY_EXPORT_PATH, value)?;
    ExportFormat::from_path(&path)
        .map_err(|_| invalid(constants::KEY_EXPORT_PATH, value, "a .json or .csv path"))?;
    Ok(path)
}

fn parse_workers(value: &str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|n| *n <= constants::MAX_WORKER_THREADS)
        .ok_or_else(|| {
            invalid(
                constants::KEY_WORKER_THREADS,
                value,
                format!("an integer 0-{} (0 = auto)", constants::MAX_WORKER_THREADS),
            )
        })
}

fn parse_parse_mode(value: &str) -> Result<ParseMode, ConfigError> {
    value
        .parse()
        .map_err(|_| invalid(constants::KEY_PARSE_MODE, value, "plain, access, combined or auto"))
}

fn parse_policy(value: &str) -> Result<LevelPolicy, ConfigError> {
    value
        .parse()
        .map_err(|_| invalid(constants::KEY_LEVEL_POLICY, value, "tolerant or strict"))
}

fn parse_connectives(value: &str) -> Result<Connectives, ConfigError> {
    value
        .parse()
        .map_err(|_| invalid(constants::KEY_CONNECTIVES, value, "legacy or or-of-ands"))
}

/// Check a single key's value. Unknown keys are accepted and ignored.
fn check_entry(key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        constants::KEY_LOG_LEVEL => parse_severity(value).map(drop),
        constants::KEY_OUTPUT_PATH => parse_path(key, value).map(drop),
        constants::KEY_EXPORT_PATH => parse_export_path(value).map(drop),
        constants::KEY_WORKER_THREADS => parse_workers(value).map(drop),
        constants::KEY_PARSE_MODE => parse_parse_mode(value).map(drop),
        constants::KEY_LEVEL_POLICY => parse_policy(value).map(drop),
        constants::KEY_CONNECTIVES => parse_connectives(value).map(drop),
        _ => Ok(()),
    }
}

// =============================================================================
// PipelineContext
// =============================================================================

/// Settings for one run after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisSettings {
    pub output_path: PathBuf,
    pub filter: FilterSettings,
    pub parse_mode: ParseMode,
    /// 0 = rayon default.
    pub worker_threads: usize,
    pub export_path: Option<PathBuf>,
}

/// Source path plus the key/value configuration map for a run.
///
/// Keys: `logLevel` and `outputPath` are required; `filter`, `parseMode`,
/// `levelPolicy`, `connectives`, `workerThreads` and `exportPath` are
/// optional. Nothing is checked until `validate`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineContext {
    source: PathBuf,
    values: BTreeMap<String, String>,
}

impl PipelineContext {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            values: BTreeMap::new(),
        }
    }

    /// Builder-style `set`.
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Fill keys that are not set yet from `defaults` (e.g. config.toml).
    pub fn merge_missing(&mut self, defaults: &BTreeMap<String, String>) {
        for (key, value) in defaults {
            self.values
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }

    /// Validate the map into typed settings.
    pub fn validate(&self) -> Result<AnalysisSettings, ConfigError> {
        let required = |key: &'static str| {
            self.get(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingKey { key })
        };

        let minimum = parse_severity(required(constants::KEY_LOG_LEVEL)?)?;
        let output_path = parse_path(
            constants::KEY_OUTPUT_PATH,
            required(constants::KEY_OUTPUT_PATH)?,
        )?;

        let parse_mode = self
            .get(constants::KEY_PARSE_MODE)
            .map(parse_parse_mode)
            .transpose()?
            .unwrap_or_default();
        let policy = self
            .get(constants::KEY_LEVEL_POLICY)
            .map(parse_policy)
            .transpose()?
            .unwrap_or_default();
        let connectives = self
            .get(constants::KEY_CONNECTIVES)
            .map(parse_connectives)
            .transpose()?
            .unwrap_or_default();
        let worker_threads = self
            .get(constants::KEY_WORKER_THREADS)
            .map(parse_workers)
            .transpose()?
            .unwrap_or(constants::DEFAULT_WORKER_THREADS);
        let export_path = self
            .get(constants::KEY_EXPORT_PATH)
            .map(parse_export_path)
            .transpose()?;

        let settings = AnalysisSettings {
            output_path,
            filter: FilterSettings {
                threshold: SeverityThreshold::new(minimum, policy),
                criteria: self
                    .get(constants::KEY_FILTER)
                    .unwrap_or_default()
                    .to_string(),
                connectives,
            },
            parse_mode,
            worker_threads,
            export_path,
        };

        tracing::debug!(
            source = %self.source.display(),
            output = %settings.output_path.display(),
            minimum = %minimum,
            parse_mode = %settings.parse_mode,
            "Configuration validated"
        );
        Ok(settings)
    }
}

// =============================================================================
// config.toml loading and validation
// =============================================================================

/// Raw deserialisable shape of config.toml.
///
/// Unknown keys are silently ignored for forward compatibility -- a newer
/// config file can be used with an older binary without crashing.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// `[analysis]` section.
    pub analysis: AnalysisSection,
    /// `[logging]` section.
    pub logging: LoggingSection,
}

/// `[analysis]` config section. Same meaning as the context keys.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct AnalysisSection {
    pub log_level: Option<String>,
    pub output_path: Option<String>,
    pub filter: Option<String>,
    pub parse_mode: Option<String>,
    pub level_policy: Option<String>,
    pub connectives: Option<String>,
    /// Number of worker threads (0 = auto).
    pub worker_threads: Option<usize>,
    pub export_path: Option<String>,
}

/// `[logging]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: Option<String>,
    /// Log file path (empty = stderr only).
    pub file: Option<String>,
}

/// Validated application configuration derived from `config.toml`.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Valid `[analysis]` entries, keyed like `PipelineContext`.
    pub analysis: BTreeMap<String, String>,
    /// Logging level string (for init before tracing is available).
    pub log_level: Option<String>,
    /// Log file path.
    pub log_file: Option<String>,
}

/// Read and parse `config.toml` at `path` without validating values.
pub fn read_config(path: &Path) -> Result<RawConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Load and validate `config.toml` at `path`.
///
/// Returns `AppConfig` with validated values and a list of non-fatal warnings.
/// If the file does not exist, returns defaults with no warnings (first run).
/// If the file is unreadable or unparseable, returns defaults with a warning.
/// Invalid individual values are dropped with a warning.
pub fn load_config(path: &Path) -> (AppConfig, Vec<String>) {
    let mut warnings: Vec<String> = Vec::new();

    if !path.exists() {
        tracing::debug!(path = %path.display(), "No config.toml found; using defaults");
        return (AppConfig::default(), warnings);
    }

    let raw = match read_config(path) {
        Ok(raw) => raw,
        Err(e) => {
            let msg = format!("{e}. Using defaults.");
            tracing::warn!("{}", msg);
            warnings.push(msg);
            return (AppConfig::default(), warnings);
        }
    };

    tracing::info!(path = %path.display(), "Loaded config.toml");

    let mut config = AppConfig::default();

    // -- Analysis: each entry checked on its own, accumulating all problems --
    let a = raw.analysis;
    let entries = [
        (constants::KEY_LOG_LEVEL, a.log_level),
        (constants::KEY_OUTPUT_PATH, a.output_path),
        (constants::KEY_FILTER, a.filter),
        (constants::KEY_PARSE_MODE, a.parse_mode),
        (constants::KEY_LEVEL_POLICY, a.level_policy),
        (constants::KEY_CONNECTIVES, a.connectives),
        (constants::KEY_WORKER_THREADS, a.worker_threads.map(|n| n.to_string())),
        (constants::KEY_EXPORT_PATH, a.export_path),
    ];
    for (key, value) in entries {
        let Some(value) = value else { continue };
        match check_entry(key, &value) {
            Ok(()) => {
                config.analysis.insert(key.to_string(), value);
            }
            Err(e) => warnings.push(format!("[analysis] {e}. Ignoring this setting.")),
        }
    }

    // -- Logging: level --
    if let Some(ref level) = raw.logging.level {
        let valid = ["error", "warn", "info", "debug", "trace"];
        if valid.contains(&level.to_lowercase().as_str()) {
            config.log_level = Some(level.clone());
        } else {
            warnings.push(format!(
                "[logging] level = \"{level}\" is not recognised. \
                 Valid values: error, warn, info, debug, trace. Using default (info).",
            ));
        }
    }

    // -- Logging: file --
    if let Some(ref file) = raw.logging.file {
        if !file.is_empty() {
            config.log_file = Some(file.clone());
        }
    }

    if !warnings.is_empty() {
        tracing::warn!(
            count = warnings.len(),
            "Config validation produced warnings"
        );
    }

    (config, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_context() -> PipelineContext {
        PipelineContext::new("app.log")
            .with(constants::KEY_LOG_LEVEL, "info")
            .with(constants::KEY_OUTPUT_PATH, "report.txt")
    }

    #[test]
    fn test_minimal_context_validates_with_defaults() {
        let settings = valid_context().validate().unwrap();
        assert_eq!(settings.output_path, PathBuf::from("report.txt"));
        assert_eq!(settings.filter.threshold.minimum, Severity::Info);
        assert_eq!(settings.filter.threshold.policy, LevelPolicy::Tolerant);
        assert_eq!(settings.filter.connectives, Connectives::AllAnd);
        assert_eq!(settings.filter.criteria, "");
        assert_eq!(settings.parse_mode, ParseMode::Auto);
        assert_eq!(settings.worker_threads, 0);
        assert!(settings.export_path.is_none());
    }

    #[test]
    fn test_missing_required_keys() {
        let err = PipelineContext::new("app.log")
            .with(constants::KEY_OUTPUT_PATH, "r.txt")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey { key: "logLevel" }));

        let err = PipelineContext::new("app.log")
            .with(constants::KEY_LOG_LEVEL, "Error")
            .with(constants::KEY_OUTPUT_PATH, "   ")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey { key: "outputPath" }));
    }

    #[test]
    fn test_unrecognised_level_is_invalid() {
        let err = valid_context()
            .with(constants::KEY_LOG_LEVEL, "Verbose")
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("'logLevel' = 'Verbose'"), "{err}");
    }

    #[test]
    fn test_optional_keys_are_parsed() {
        let settings = valid_context()
            .with(constants::KEY_FILTER, "Level=Error")
            .with(constants::KEY_PARSE_MODE, "combined")
            .with(constants::KEY_LEVEL_POLICY, "strict")
            .with(constants::KEY_CONNECTIVES, "or-of-ands")
            .with(constants::KEY_WORKER_THREADS, "3")
            .with(constants::KEY_EXPORT_PATH, "out.csv")
            .validate()
            .unwrap();
        assert_eq!(settings.filter.criteria, "Level=Error");
        assert_eq!(settings.parse_mode, ParseMode::Combined);
        assert_eq!(settings.filter.threshold.policy, LevelPolicy::Strict);
        assert_eq!(settings.filter.connectives, Connectives::OrOfAnds);
        assert_eq!(settings.worker_threads, 3);
        assert_eq!(settings.export_path, Some(PathBuf::from("out.csv")));
    }

    #[test]
    fn test_malformed_optional_values_fail() {
        for (key, value) in [
            (constants::KEY_PARSE_MODE, "xml"),
            (constants::KEY_LEVEL_POLICY, "lenient"),
            (constants::KEY_CONNECTIVES, "xor"),
            (constants::KEY_WORKER_THREADS, "-1"),
            (constants::KEY_WORKER_THREADS, "100000"),
            (constants::KEY_EXPORT_PATH, "out.txt"),
        ] {
            let result = valid_context().with(key, value).validate();
            assert!(
                matches!(result, Err(ConfigError::InvalidValue { .. })),
                "{key}={value} should be rejected"
            );
        }
    }

    #[test]
    fn test_merge_missing_keeps_existing_values() {
        let mut ctx = valid_context();
        let mut defaults = BTreeMap::new();
        defaults.insert(constants::KEY_LOG_LEVEL.to_string(), "Error".to_string());
        defaults.insert(constants::KEY_FILTER.to_string(), "StatusCode=500".to_string());
        ctx.merge_missing(&defaults);
        assert_eq!(ctx.get(constants::KEY_LOG_LEVEL), Some("info"));
        assert_eq!(ctx.get(constants::KEY_FILTER), Some("StatusCode=500"));
    }

    #[test]
    fn test_load_config_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let (config, warnings) = load_config(&dir.path().join("config.toml"));
        assert!(warnings.is_empty());
        assert!(config.analysis.is_empty());
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_load_config_validates_each_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[analysis]
log_level = "warning"
parse_mode = "yaml"
worker_threads = 4

[logging]
level = "loud"
file = "logtally.log"
"#,
        )
        .unwrap();

        let (config, warnings) = load_config(&path);
        assert_eq!(
            config.analysis.get(constants::KEY_LOG_LEVEL).map(String::as_str),
            Some("warning")
        );
        assert_eq!(
            config.analysis.get(constants::KEY_WORKER_THREADS).map(String::as_str),
            Some("4")
        );
        assert!(!config.analysis.contains_key(constants::KEY_PARSE_MODE));
        assert!(config.log_level.is_none());
        assert_eq!(config.log_file.as_deref(), Some("logtally.log"));
        assert_eq!(warnings.len(), 2, "{warnings:?}");
    }

    #[test]
    fn test_load_config_unparseable_file_warns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[analysis\nlog_level = ").unwrap();
        let (config, warnings) = load_config(&path);
        assert!(config.analysis.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(matches!(read_config(&path), Err(ConfigError::TomlParse { .. })));
    }
}
