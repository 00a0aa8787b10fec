// logtally - core/export.rs
//
// CSV and JSON export of the filtered record set.
// Core layer: writes to any Write trait object; the persisting stage hands
// the buffer to the sink.

use crate::core::model::Record;
use crate::util::error::ExportError;
use std::io::Write;
use std::path::Path;

/// Export format, chosen from the target path's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("json") => Ok(ExportFormat::Json),
            Some("csv") => Ok(ExportFormat::Csv),
            _ => Err(ExportError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

const CSV_HEADER: [&str; 11] = [
    "id",
    "timestamp",
    "level",
    "message",
    "sourceIp",
    "request",
    "statusCode",
    "threadId",
    "source",
    "user",
    "size",
];

/// Export records to CSV. Absent optional fields are empty cells.
pub fn export_csv<W: Write>(
    records: &[Record],
    writer: W,
    export_path: &Path,
) -> Result<usize, ExportError> {
    let csv_err = |e: csv::Error| ExportError::Csv {
        path: export_path.to_path_buf(),
        source: e,
    };
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record(CSV_HEADER).map_err(csv_err)?;

    for record in records {
        let id = record.id().get().to_string();
        let timestamp = record.formatted_timestamp();
        let status = record.status_code().to_string();
        let thread = record.thread_id().map(|t| t.to_string()).unwrap_or_default();
        let size = record.size().map(|s| s.to_string()).unwrap_or_default();
        csv_writer
            .write_record([
                id.as_str(),
                timestamp.as_str(),
                record.level(),
                record.message(),
                record.source_ip().unwrap_or(""),
                record.request().unwrap_or(""),
                status.as_str(),
                thread.as_str(),
                record.source().unwrap_or(""),
                record.user().unwrap_or(""),
                size.as_str(),
            ])
            .map_err(csv_err)?;
    }

    csv_writer.flush().map_err(|e| ExportError::Io {
        path: export_path.to_path_buf(),
        source: e,
    })?;

    Ok(records.len())
}

/// Export records as a pretty-printed JSON array (same shape as `Record::to_json`).
pub fn export_json<W: Write>(
    records: &[Record],
    writer: W,
    export_path: &Path,
) -> Result<usize, ExportError> {
    serde_json::to_writer_pretty(writer, records).map_err(|e| ExportError::Json {
        path: export_path.to_path_buf(),
        source: e,
    })?;
    Ok(records.len())
}

/// Render `records` in the format implied by `export_path`.
pub fn export_to_buffer(records: &[Record], export_path: &Path) -> Result<Vec<u8>, ExportError> {
    let mut buf = Vec::new();
    let count = match ExportFormat::from_path(export_path)? {
        ExportFormat::Json => export_json(records, &mut buf, export_path)?,
        ExportFormat::Csv => export_csv(records, &mut buf, export_path)?,
    };
    tracing::debug!(
        path = %export_path.display(),
        records = count,
        bytes = buf.len(),
        "Export rendered"
    );
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use std::path::PathBuf;

    fn make_record(level: &str, message: &str) -> Record {
        let ts = NaiveDateTime::parse_from_str("2024-01-01 10:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        Record::builder(ts, level)
            .message(message)
            .source_ip("10.0.0.1")
            .status_code(500)
            .thread_id(Some(4))
            .build()
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ExportFormat::from_path(Path::new("out.JSON")).unwrap(),
            ExportFormat::Json
        );
        assert_eq!(
            ExportFormat::from_path(Path::new("dir/out.csv")).unwrap(),
            ExportFormat::Csv
        );
        assert!(matches!(
            ExportFormat::from_path(Path::new("out.txt")),
            Err(ExportError::UnsupportedFormat { .. })
        ));
        assert!(ExportFormat::from_path(Path::new("out")).is_err());
    }

    #[test]
    fn test_csv_export() {
        let records = vec![
            make_record("Error", "disk full"),
            make_record("Error", "quoted, with comma"),
        ];
        let mut buf = Vec::new();
        let count = export_csv(&records, &mut buf, &PathBuf::from("out.csv")).unwrap();
        assert_eq!(count, 2);

        let output = String::from_utf8(buf).unwrap();
        let mut lines = output.lines();
        assert_eq!(
            lines.next(),
            Some("id,timestamp,level,message,sourceIp,request,statusCode,threadId,source,user,size")
        );
        let first = lines.next().unwrap();
        assert!(first.ends_with(",2024-01-01 10:00:00.000,Error,disk full,10.0.0.1,,500,4,,,"));
        assert!(output.contains("\"quoted, with comma\""));
    }

    #[test]
    fn test_csv_export_empty_still_has_header() {
        let mut buf = Vec::new();
        export_csv(&[], &mut buf, Path::new("out.csv")).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_json_export_reads_back() {
        let records = vec![make_record("Warning", "slow")];
        let buf = export_to_buffer(&records, Path::new("out.json")).unwrap();

        let parsed: Vec<serde_json::Value> = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0]["level"], "Warning");
        assert_eq!(parsed[0]["statusCode"], 500);

        let restored = Record::from_json(&parsed[0].to_string()).unwrap();
        assert!(restored.same_content(&records[0]));
    }
}
