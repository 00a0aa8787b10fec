// logtally - platform/fs.rs
//
// Byte-stream source and sink abstractions used by the pipeline, with a
// real filesystem implementation and an in-memory one for tests and
// embedding.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Where the reading stage gets its input text.
pub trait LogSource: Send + Sync {
    /// Read the whole input at `path`. Invalid UTF-8 is replaced lossily.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
}

/// Where the persisting stage writes its output. Writes overwrite.
pub trait ReportSink: Send + Sync {
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
}

// =============================================================================
// Filesystem
// =============================================================================

/// Reads from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSource;

impl LogSource for FileSource {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        read_file_lossy(path)
    }
}

/// Writes to the local filesystem, truncating existing files.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSink;

impl ReportSink for FileSink {
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        std::fs::write(path, contents)?;
        tracing::debug!(path = %path.display(), bytes = contents.len(), "File written");
        Ok(())
    }
}

/// Read the full content of a file as a string.
///
/// For files with invalid UTF-8, uses lossy conversion.
pub fn read_file_lossy(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

// =============================================================================
// In-memory
// =============================================================================

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A poisoned map is still a valid map.
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Serves inputs from memory. Unknown paths read as `NotFound`.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        lock(&self.files).insert(path.into(), contents.into());
        self
    }
}

impl LogSource for MemorySource {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let files = lock(&self.files);
        let bytes = files.get(path).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no in-memory input at '{}'", path.display()),
            )
        })?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Captures writes in memory. Clones share the same store, so a test can
/// keep one handle while the pipeline owns another.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    written: Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>,
    failing: Arc<Mutex<HashSet<PathBuf>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write to `path` fail with `PermissionDenied`.
    pub fn fail_on(self, path: impl Into<PathBuf>) -> Self {
        lock(&self.failing).insert(path.into());
        self
    }

    /// Contents last written to `path`, as lossy UTF-8.
    pub fn contents(&self, path: &Path) -> Option<String> {
        lock(&self.written)
            .get(path)
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = lock(&self.written).keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl ReportSink for MemorySink {
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        if lock(&self.failing).contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("writes to '{}' are refused", path.display()),
            ));
        }
        lock(&self.written).insert(path.to_path_buf(), contents.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_file_lossy_replaces_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.log");
        std::fs::write(&path, b"ok \xFF\xFE line\n").unwrap();
        let text = FileSource.read_to_string(&path).unwrap();
        assert!(text.starts_with("ok "));
        assert!(text.contains('\u{FFFD}'));
    }

    #[test]
    fn test_file_sink_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        std::fs::write(&path, "old contents that are longer").unwrap();
        FileSink.write(&path, b"new").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileSource
            .read_to_string(&dir.path().join("absent.log"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        let err = MemorySource::new()
            .read_to_string(Path::new("absent.log"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_memory_sink_shares_store_between_clones() {
        let sink = MemorySink::new().fail_on("locked.txt");
        let handle = sink.clone();
        sink.write(Path::new("out.txt"), b"hello").unwrap();
        assert_eq!(handle.contents(Path::new("out.txt")).as_deref(), Some("hello"));
        assert!(sink.write(Path::new("locked.txt"), b"x").is_err());
        assert_eq!(handle.paths(), vec![PathBuf::from("out.txt")]);
    }
}
