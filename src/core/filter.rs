// logtally - core/filter.rs
//
// Filter stage: a severity threshold followed by textual criteria compiled
// into an interpreted predicate.
// Core layer: pure logic, no I/O.
//
// Criteria syntax: `FIELD=VALUE [AND|OR FIELD=VALUE ...]`.
// Under the legacy connectives every connector means AND; `OrOfAnds` gives
// OR lower precedence than AND.

use crate::core::model::{Record, Severity};
use crate::core::timestamp::parse_datetime;
use crate::util::error::FilterError;
use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Field table
// =============================================================================

/// Record attributes addressable from a criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Timestamp,
    Level,
    Message,
    SourceIp,
    Request,
    StatusCode,
    ThreadId,
    Source,
    User,
    Size,
    Id,
}

/// Declared type of a field, which decides how criterion values coerce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Integer,
    DateTime,
    Identity,
}

impl FieldType {
    pub fn label(&self) -> &'static str {
        match self {
            FieldType::Text => "string",
            FieldType::Integer => "integer",
            FieldType::DateTime => "date-time",
            FieldType::Identity => "RecordId",
        }
    }
}

impl Field {
    /// Canonical name and accepted aliases, matched case-insensitively.
    const TABLE: &'static [(Field, &'static [&'static str])] = &[
        (Field::Timestamp, &["Timestamp"]),
        (Field::Level, &["Level"]),
        (Field::Message, &["Message"]),
        (Field::SourceIp, &["IPAddress", "SourceIp"]),
        (Field::Request, &["Request"]),
        (Field::StatusCode, &["StatusCode"]),
        (Field::ThreadId, &["ThreadId"]),
        (Field::Source, &["Source"]),
        (Field::User, &["User"]),
        (Field::Size, &["Size"]),
        (Field::Id, &["Id"]),
    ];

    pub fn lookup(name: &str) -> Option<Field> {
        let name = name.trim();
        Self::TABLE
            .iter()
            .find(|(_, aliases)| aliases.iter().any(|a| a.eq_ignore_ascii_case(name)))
            .map(|(field, _)| *field)
    }

    pub fn name(&self) -> &'static str {
        Self::TABLE
            .iter()
            .find(|(field, _)| field == self)
            .map(|(_, aliases)| aliases[0])
            .unwrap_or("?")
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            Field::Timestamp => FieldType::DateTime,
            Field::StatusCode | Field::ThreadId | Field::Size => FieldType::Integer,
            Field::Id => FieldType::Identity,
            Field::Level
            | Field::Message
            | Field::SourceIp
            | Field::Request
            | Field::Source
            | Field::User => FieldType::Text,
        }
    }
}

// =============================================================================
// Criteria
// =============================================================================

/// A criterion constant after coercion to the field's type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Integer(i64),
    DateTime(NaiveDateTime),
}

/// Comparison operator. Only equality exists today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operator {
    #[default]
    Eq,
}

/// One compiled `field=value` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCriterion {
    field: Field,
    operator: Operator,
    value: Value,
}

impl FilterCriterion {
    /// Compile a single `field=value` clause.
    pub fn parse(text: &str) -> Result<Self, FilterError> {
        let invalid = || FilterError::InvalidCriterion {
            criterion: text.to_string(),
        };

        if text.matches('=').count() != 1 {
            return Err(invalid());
        }
        let (raw_field, raw_value) = text.split_once('=').ok_or_else(invalid)?;
        let raw_field = raw_field.trim();
        let raw_value = raw_value.trim();
        if raw_field.is_empty() {
            return Err(invalid());
        }

        let field = Field::lookup(raw_field).ok_or_else(|| FilterError::UnsupportedField {
            field: raw_field.to_string(),
            criterion: text.to_string(),
        })?;

        let coercion = |expected: FieldType| FilterError::Coercion {
            criterion: text.to_string(),
            value: raw_value.to_string(),
            expected: expected.label(),
        };

        let value = match field.field_type() {
            FieldType::Text => Value::Text(raw_value.to_string()),
            FieldType::Integer => Value::Integer(
                raw_value
                    .parse()
                    .map_err(|_| coercion(FieldType::Integer))?,
            ),
            FieldType::DateTime => Value::DateTime(
                parse_datetime(raw_value).ok_or_else(|| coercion(FieldType::DateTime))?,
            ),
            FieldType::Identity => {
                return Err(FilterError::UnsupportedType {
                    field: field.name(),
                    type_name: FieldType::Identity.label(),
                    criterion: text.to_string(),
                })
            }
        };

        Ok(Self {
            field,
            operator: Operator::Eq,
            value,
        })
    }

    pub fn field(&self) -> Field {
        self.field
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Exact equality between the record attribute and the constant.
    /// An absent optional attribute never matches.
    pub fn matches(&self, record: &Record) -> bool {
        match self.operator {
            Operator::Eq => self.equals(record),
        }
    }

    fn equals(&self, record: &Record) -> bool {
        match (&self.value, self.field) {
            (Value::DateTime(want), Field::Timestamp) => record.timestamp() == *want,
            (Value::Integer(want), Field::StatusCode) => i64::from(record.status_code()) == *want,
            (Value::Integer(want), Field::ThreadId) => record.thread_id() == Some(*want),
            (Value::Integer(want), Field::Size) => record
                .size()
                .and_then(|s| i64::try_from(s).ok())
                .is_some_and(|s| s == *want),
            (Value::Text(want), field) => text_attribute(record, field) == Some(want.as_str()),
            _ => false,
        }
    }
}

fn text_attribute(record: &Record, field: Field) -> Option<&str> {
    match field {
        Field::Level => Some(record.level()),
        Field::Message => Some(record.message()),
        Field::SourceIp => record.source_ip(),
        Field::Request => record.request(),
        Field::Source => record.source(),
        Field::User => record.user(),
        _ => None,
    }
}

impl fmt::Display for FilterCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=", self.field.name())?;
        match &self.value {
            Value::Text(s) => f.write_str(s),
            Value::Integer(n) => write!(f, "{n}"),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

// =============================================================================
// Compiled filter
// =============================================================================

/// How `AND` / `OR` connectors combine criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectives {
    /// Every connector is treated as AND.
    #[default]
    AllAnd,
    /// OR of AND-groups: `a AND b OR c` means `(a && b) || c`.
    OrOfAnds,
}

impl Connectives {
    pub fn label(&self) -> &'static str {
        match self {
            Connectives::AllAnd => "legacy",
            Connectives::OrOfAnds => "or-of-ands",
        }
    }
}

impl FromStr for Connectives {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" | "all-and" => Ok(Connectives::AllAnd),
            "or-of-ands" => Ok(Connectives::OrOfAnds),
            other => Err(format!("unknown connectives '{other}'")),
        }
    }
}

/// Executable predicate: a disjunction of conjunctive groups.
///
/// No groups means no filtering; legacy compilation always produces at most
/// one group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledFilter {
    groups: Vec<Vec<FilterCriterion>>,
}

impl CompiledFilter {
    /// The always-true filter.
    pub fn always() -> Self {
        Self::default()
    }

    pub fn is_always(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> &[Vec<FilterCriterion>] {
        &self.groups
    }

    pub fn criteria(&self) -> impl Iterator<Item = &FilterCriterion> {
        self.groups.iter().flatten()
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.is_always()
            || self
                .groups
                .iter()
                .any(|group| group.iter().all(|c| c.matches(record)))
    }
}

/// Compile criteria with the legacy connectives (everything AND-ed).
pub fn compile(criteria: &str) -> Result<CompiledFilter, FilterError> {
    compile_with(criteria, Connectives::AllAnd)
}

/// Compile criteria with explicit connective semantics.
pub fn compile_with(criteria: &str, connectives: Connectives) -> Result<CompiledFilter, FilterError> {
    let mut groups = Vec::new();
    for group in lex(criteria, connectives) {
        let compiled = group
            .iter()
            .map(|text| FilterCriterion::parse(text))
            .collect::<Result<Vec<_>, _>>()?;
        groups.push(compiled);
    }

    tracing::debug!(
        criteria,
        connectives = connectives.label(),
        groups = groups.len(),
        "Compiled filter"
    );
    Ok(CompiledFilter { groups })
}

/// Split criteria text into groups of atomic criterion strings.
fn lex(criteria: &str, connectives: Connectives) -> Vec<Vec<String>> {
    let mut groups: Vec<Vec<String>> = Vec::new();
    let mut group: Vec<String> = Vec::new();
    let mut words: Vec<&str> = Vec::new();

    fn flush_criterion(words: &mut Vec<&str>, group: &mut Vec<String>) {
        if !words.is_empty() {
            group.push(words.join(" "));
            words.clear();
        }
    }

    for token in criteria.split_whitespace() {
        match token {
            "OR" if connectives == Connectives::OrOfAnds => {
                flush_criterion(&mut words, &mut group);
                if !group.is_empty() {
                    groups.push(std::mem::take(&mut group));
                }
            }
            "AND" | "OR" => flush_criterion(&mut words, &mut group),
            word => words.push(word),
        }
    }
    flush_criterion(&mut words, &mut group);
    if !group.is_empty() {
        groups.push(group);
    }
    groups
}

// =============================================================================
// Severity threshold
// =============================================================================

/// Treatment of level tokens that are not one of the four severities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LevelPolicy {
    /// Unknown levels rank below `Debug`, so every threshold drops them.
    #[default]
    Tolerant,
    /// An unknown level fails the filter stage.
    Strict,
}

impl LevelPolicy {
    pub fn label(&self) -> &'static str {
        match self {
            LevelPolicy::Tolerant => "tolerant",
            LevelPolicy::Strict => "strict",
        }
    }
}

impl FromStr for LevelPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tolerant" => Ok(LevelPolicy::Tolerant),
            "strict" => Ok(LevelPolicy::Strict),
            other => Err(format!("unknown level policy '{other}'")),
        }
    }
}

/// Minimum severity a record needs to survive the threshold stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeverityThreshold {
    pub minimum: Severity,
    pub policy: LevelPolicy,
}

impl SeverityThreshold {
    pub fn new(minimum: Severity, policy: LevelPolicy) -> Self {
        Self { minimum, policy }
    }

    /// Whether `record` meets the threshold.
    pub fn admits(&self, record: &Record) -> Result<bool, FilterError> {
        match record.severity() {
            Some(severity) => Ok(severity >= self.minimum),
            None => match self.policy {
                LevelPolicy::Tolerant => Ok(false),
                LevelPolicy::Strict => Err(FilterError::UnknownLevel {
                    level: record.level().to_string(),
                    record_id: record.id().get(),
                }),
            },
        }
    }
}

// =============================================================================
// Filter stage
// =============================================================================

/// Everything the filter stage needs from validated configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSettings {
    pub threshold: SeverityThreshold,
    /// Raw criteria text, compiled when the stage runs.
    pub criteria: String,
    pub connectives: Connectives,
}

/// Selects the records that continue through the pipeline.
pub trait RecordFilter: Send + Sync {
    fn apply(
        &self,
        records: Vec<Record>,
        settings: &FilterSettings,
    ) -> Result<Vec<Record>, FilterError>;
}

/// Default filter: severity threshold, then compiled criteria.
#[derive(Debug, Clone, Copy, Default)]
pub struct CriteriaFilter;

impl RecordFilter for CriteriaFilter {
    fn apply(
        &self,
        records: Vec<Record>,
        settings: &FilterSettings,
    ) -> Result<Vec<Record>, FilterError> {
        let compiled = compile_with(&settings.criteria, settings.connectives)?;
        let before = records.len();

        let mut kept = Vec::with_capacity(before);
        for record in records {
            if settings.threshold.admits(&record)? {
                kept.push(record);
            }
        }
        let after_threshold = kept.len();

        if !compiled.is_always() {
            kept.retain(|record| record.matches(&compiled));
        }

        tracing::debug!(
            before,
            after_threshold,
            after_criteria = kept.len(),
            minimum = %settings.threshold.minimum,
            policy = settings.threshold.policy.label(),
            "Filter stage complete"
        );
        Ok(kept)
    }
}
