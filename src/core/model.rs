// logtally - core/model.rs
//
// Core data model types. Pure data definitions with no I/O and no
// platform dependencies.
//
// These types are the shared vocabulary across all layers.

use crate::util::constants;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// Record identity
// =============================================================================

/// Source of fresh identities. Starts at 1 so 0 never names a record.
static NEXT_RECORD_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity assigned to every record at construction.
///
/// Identities are unique within the process and never reused. The only way
/// to obtain an existing identity for a new record is
/// `Record::from_json_with_identity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(u64);

impl RecordId {
    fn fresh() -> Self {
        Self(NEXT_RECORD_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Take over an identity minted elsewhere. The counter moves past it so
    /// no later `fresh` identity collides with it.
    fn adopt(raw: u64) -> Self {
        NEXT_RECORD_ID.fetch_max(raw.saturating_add(1), Ordering::Relaxed);
        Self(raw)
    }

    /// Raw numeric value, for logging and error reporting.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// Record
// =============================================================================

/// A single parsed log event.
///
/// Built once by a line parser (via `RecordBuilder`) and never mutated
/// afterwards; every stage downstream only reads it.
///
/// Equality is nominal: `==` compares every field *including* the identity,
/// so two records parsed from the same line are different records. Use
/// `same_content` / `ContentKey` for structural comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    id: RecordId,
    timestamp: NaiveDateTime,
    level: String,
    message: String,
    source_ip: Option<String>,
    request: Option<String>,
    status_code: i32,
    thread_id: Option<i64>,
    source: Option<String>,
    user: Option<String>,
    size: Option<u64>,
}

impl Record {
    /// Start building a record. Identity is assigned by `RecordBuilder::build`.
    pub fn builder(timestamp: NaiveDateTime, level: impl Into<String>) -> RecordBuilder {
        RecordBuilder::new(timestamp, level)
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    /// Raw level token exactly as it appeared in the source line.
    pub fn level(&self) -> &str {
        &self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_ip(&self) -> Option<&str> {
        self.source_ip.as_deref()
    }

    pub fn request(&self) -> Option<&str> {
        self.request.as_deref()
    }

    /// HTTP status, or `STATUS_UNKNOWN` (-1) when the line carried none.
    pub fn status_code(&self) -> i32 {
        self.status_code
    }

    pub fn thread_id(&self) -> Option<i64> {
        self.thread_id
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Response size in bytes (combined-log lines only).
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// The level parsed as one of the four known severities, if it is one.
    pub fn severity(&self) -> Option<Severity> {
        Severity::parse(&self.level)
    }

    /// True when the level token is `error` in any casing.
    pub fn is_error(&self) -> bool {
        self.level.eq_ignore_ascii_case("error")
    }

    /// Triage priority derived from the level token.
    pub fn priority(&self) -> Priority {
        Priority::for_level(&self.level)
    }

    /// Timestamp as `yyyy-mm-dd HH:MM:SS.fff`.
    pub fn formatted_timestamp(&self) -> String {
        self.timestamp
            .format(constants::RECORD_DATE_FORMAT)
            .to_string()
    }

    /// Absolute time between this record and `other`.
    pub fn time_between(&self, other: &Record) -> Duration {
        let delta = self.timestamp - other.timestamp;
        if delta < Duration::zero() {
            -delta
        } else {
            delta
        }
    }

    /// Evaluate a compiled filter against this record.
    pub fn matches(&self, filter: &crate::core::filter::CompiledFilter) -> bool {
        filter.matches(self)
    }

    /// Structural equality: every field except the identity.
    pub fn same_content(&self, other: &Record) -> bool {
        ContentKey(self) == ContentKey(other)
    }

    // -------------------------------------------------------------------------
    // Interchange
    // -------------------------------------------------------------------------

    /// Serialise to indented camelCase JSON. The identity is included.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a record from JSON, assigning a fresh identity.
    ///
    /// Field names match `to_json` (case-sensitive camelCase). Missing
    /// optional fields default to absent; a missing `statusCode` is -1.
    pub fn from_json(json: &str) -> serde_json::Result<Record> {
        let doc: RecordDocument = serde_json::from_str(json)?;
        Ok(doc.into_record(false))
    }

    /// Parse a record from JSON, carrying over its `id` when present.
    ///
    /// The resulting record is `==` to the one that produced the JSON, so
    /// callers take responsibility for not holding both as distinct records.
    pub fn from_json_with_identity(json: &str) -> serde_json::Result<Record> {
        let doc: RecordDocument = serde_json::from_str(json)?;
        Ok(doc.into_record(true))
    }
}

/// Renders the structured access-line shape understood by `AccessLineParser`:
/// `{ts} {level} [Thread-{tid}] {ip} {request} - {status} {message}`.
impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let thread = self
            .thread_id
            .map(|t| t.to_string())
            .unwrap_or_else(|| "?".to_string());
        let line = format!(
            "{} {} [Thread-{}] {} {} - {} {}",
            self.formatted_timestamp(),
            self.level,
            thread,
            self.source_ip.as_deref().unwrap_or("-"),
            self.request.as_deref().unwrap_or("-"),
            self.status_code,
            self.message,
        );
        f.write_str(line.trim_end())
    }
}

/// Wire shape for deserialisation. `id` is optional so hand-written
/// documents without one are accepted.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordDocument {
    #[serde(default)]
    id: Option<u64>,
    timestamp: NaiveDateTime,
    level: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    source_ip: Option<String>,
    #[serde(default)]
    request: Option<String>,
    #[serde(default = "unknown_status")]
    status_code: i32,
    #[serde(default)]
    thread_id: Option<i64>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    size: Option<u64>,
}

fn unknown_status() -> i32 {
    constants::STATUS_UNKNOWN
}

impl RecordDocument {
    fn into_record(self, keep_identity: bool) -> Record {
        let id = match self.id {
            Some(raw) if keep_identity => RecordId::adopt(raw),
            _ => RecordId::fresh(),
        };
        Record {
            id,
            timestamp: self.timestamp,
            level: self.level,
            message: self.message,
            source_ip: self.source_ip,
            request: self.request,
            status_code: self.status_code,
            thread_id: self.thread_id,
            source: self.source,
            user: self.user,
            size: self.size,
        }
    }
}

// =============================================================================
// Record builder
// =============================================================================

/// Builder for `Record`. Fields not set stay absent (status: -1).
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    timestamp: NaiveDateTime,
    level: String,
    message: String,
    source_ip: Option<String>,
    request: Option<String>,
    status_code: i32,
    thread_id: Option<i64>,
    source: Option<String>,
    user: Option<String>,
    size: Option<u64>,
}

impl RecordBuilder {
    pub fn new(timestamp: NaiveDateTime, level: impl Into<String>) -> Self {
        Self {
            timestamp,
            level: level.into(),
            message: String::new(),
            source_ip: None,
            request: None,
            status_code: constants::STATUS_UNKNOWN,
            thread_id: None,
            source: None,
            user: None,
            size: None,
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn source_ip(mut self, ip: impl Into<String>) -> Self {
        self.source_ip = Some(ip.into());
        self
    }

    pub fn request(mut self, request: impl Into<String>) -> Self {
        self.request = Some(request.into());
        self
    }

    pub fn status_code(mut self, status: i32) -> Self {
        self.status_code = status;
        self
    }

    pub fn thread_id(mut self, thread_id: Option<i64>) -> Self {
        self.thread_id = thread_id;
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn size(mut self, size: Option<u64>) -> Self {
        self.size = size;
        self
    }

    /// Finish the record, assigning a fresh identity.
    pub fn build(self) -> Record {
        Record {
            id: RecordId::fresh(),
            timestamp: self.timestamp,
            level: self.level,
            message: self.message,
            source_ip: self.source_ip,
            request: self.request,
            status_code: self.status_code,
            thread_id: self.thread_id,
            source: self.source,
            user: self.user,
            size: self.size,
        }
    }
}

// =============================================================================
// Structural (content) equality
// =============================================================================

/// Borrowed view of a record that compares and hashes every field except
/// the identity.
#[derive(Debug, Clone, Copy)]
pub struct ContentKey<'a>(pub &'a Record);

impl ContentKey<'_> {
    #[allow(clippy::type_complexity)]
    fn fields(
        &self,
    ) -> (
        &NaiveDateTime,
        &str,
        &str,
        &Option<String>,
        &Option<String>,
        i32,
        Option<i64>,
        &Option<String>,
        &Option<String>,
        Option<u64>,
    ) {
        let r = self.0;
        (
            &r.timestamp,
            r.level.as_str(),
            r.message.as_str(),
            &r.source_ip,
            &r.request,
            r.status_code,
            r.thread_id,
            &r.source,
            &r.user,
            r.size,
        )
    }
}

impl PartialEq for ContentKey<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.fields() == other.fields()
    }
}

impl Eq for ContentKey<'_> {}

impl Hash for ContentKey<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fields().hash(state);
    }
}

/// Remove records whose content duplicates an earlier record, keeping the
/// first occurrence of each.
pub fn dedup_by_content(records: Vec<Record>) -> Vec<Record> {
    let keep: Vec<bool> = {
        let mut seen = HashSet::with_capacity(records.len());
        records.iter().map(|r| seen.insert(ContentKey(r))).collect()
    };
    records
        .into_iter()
        .zip(keep)
        .filter_map(|(record, keep)| keep.then_some(record))
        .collect()
}

// =============================================================================
// Severity
// =============================================================================

/// The four known severities, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub enum Severity {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Returns all variants, least severe first.
    pub fn all() -> &'static [Severity] {
        &[
            Severity::Debug,
            Severity::Info,
            Severity::Warning,
            Severity::Error,
        ]
    }

    /// Human-readable label, also the canonical level token.
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Debug => "Debug",
            Severity::Info => "Info",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        }
    }

    /// Case-insensitive match against the variant names.
    pub fn parse(raw: &str) -> Option<Severity> {
        Severity::all()
            .iter()
            .copied()
            .find(|s| s.label().eq_ignore_ascii_case(raw.trim()))
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::parse(s).ok_or_else(|| format!("unrecognised severity '{s}'"))
    }
}

// =============================================================================
// Priority
// =============================================================================

/// Triage bucket assigned by the processing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// `ERROR` -> High, `WARNING` -> Medium, anything else -> Low
    /// (case-insensitive).
    pub fn for_level(level: &str) -> Priority {
        if level.eq_ignore_ascii_case("error") {
            Priority::High
        } else if level.eq_ignore_ascii_case("warning") {
            Priority::Medium
        } else {
            Priority::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }
}
