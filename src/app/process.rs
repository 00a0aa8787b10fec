// logtally - app/process.rs
//
// Concurrent per-record processing. One unit of work per record, fanned out
// on a rayon pool and joined before the stage completes.
//
// Units share nothing mutable; each gets read-only access to its record.
// Every unit failure (returned error or panic) is collected. One failure
// never hides another, and siblings keep running.

use crate::core::model::{Priority, Record};
use crate::util::error::{ProcessError, UnitFailure};
use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

// =============================================================================
// Cancellation
// =============================================================================

/// Cooperative cancellation flag shared between the caller and a run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag so the next run starts uncancelled.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// =============================================================================
// Processor trait
// =============================================================================

/// A side-effect-only step applied to each record independently.
pub trait RecordProcessor: Send + Sync {
    fn process(&self, record: &Record) -> Result<(), String>;
}

/// Default processor: classifies each record by priority and emits a
/// structured tracing event for it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeverityClassifier;

impl RecordProcessor for SeverityClassifier {
    fn process(&self, record: &Record) -> Result<(), String> {
        match record.priority() {
            Priority::High | Priority::Medium => tracing::debug!(
                record = record.id().get(),
                priority = record.priority().label(),
                level = record.level(),
                status = record.status_code(),
                "Classified record"
            ),
            Priority::Low => tracing::trace!(
                record = record.id().get(),
                priority = Priority::Low.label(),
                "Classified record"
            ),
        }
        Ok(())
    }
}

// =============================================================================
// Fan-out / fan-in
// =============================================================================

/// Outcome of a completed processing stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSummary {
    pub processed: usize,
    pub threads: usize,
    pub elapsed: Duration,
}

enum UnitOutcome {
    Done,
    Failed(UnitFailure),
    Skipped,
}

/// Run `processor` over every record on a pool of `workers` threads
/// (0 = rayon's default) and wait for all units.
///
/// Returns `Cancelled` if `cancel` was raised before every unit ran, and
/// otherwise `UnitFailures` listing every failed unit sorted by record id.
pub fn process_all(
    records: &[Record],
    processor: &dyn RecordProcessor,
    workers: usize,
    cancel: &CancelToken,
) -> Result<ProcessSummary, ProcessError> {
    let started = Instant::now();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("logtally-worker-{i}"))
        .build()
        .map_err(|e| ProcessError::ThreadPool {
            threads: workers,
            source: e,
        })?;
    let threads = pool.current_num_threads();

    tracing::debug!(records = records.len(), threads, "Processing started");

    let outcomes: Vec<UnitOutcome> = pool.install(|| {
        records
            .par_iter()
            .map(|record| run_unit(record, processor, cancel))
            .collect()
    });

    let total = records.len();
    let mut completed = 0;
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            UnitOutcome::Done => completed += 1,
            UnitOutcome::Failed(failure) => {
                completed += 1;
                failures.push(failure);
            }
            UnitOutcome::Skipped => {}
        }
    }

    if completed < total {
        tracing::warn!(completed, total, "Processing cancelled");
        return Err(ProcessError::Cancelled { completed, total });
    }

    if !failures.is_empty() {
        failures.sort_by_key(|f| f.record_id);
        tracing::warn!(failed = failures.len(), total, "Processing units failed");
        return Err(ProcessError::UnitFailures { failures });
    }

    let summary = ProcessSummary {
        processed: completed,
        threads,
        elapsed: started.elapsed(),
    };
    tracing::debug!(
        processed = summary.processed,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "Processing complete"
    );
    Ok(summary)
}

fn run_unit(record: &Record, processor: &dyn RecordProcessor, cancel: &CancelToken) -> UnitOutcome {
    if cancel.is_cancelled() {
        return UnitOutcome::Skipped;
    }
    let failure = |reason: String| {
        UnitOutcome::Failed(UnitFailure {
            record_id: record.id().get(),
            reason,
        })
    };
    match panic::catch_unwind(AssertUnwindSafe(|| processor.process(record))) {
        Ok(Ok(())) => UnitOutcome::Done,
        Ok(Err(reason)) => failure(reason),
        Err(payload) => failure(format!("panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn make_records(levels: &[&str]) -> Vec<Record> {
        let ts = NaiveDateTime::parse_from_str("2024-01-01 10:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        levels
            .iter()
            .map(|level| Record::builder(ts, *level).message(*level).build())
            .collect()
    }

    /// Counts calls and remembers which records it saw.
    #[derive(Default)]
    struct Recorder {
        calls: AtomicUsize,
        seen: Mutex<Vec<u64>>,
    }

    impl RecordProcessor for Recorder {
        fn process(&self, record: &Record) -> Result<(), String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(record.id().get());
            Ok(())
        }
    }

    /// Fails on `fail`, panics on `panic`.
    struct Faulty;

    impl RecordProcessor for Faulty {
        fn process(&self, record: &Record) -> Result<(), String> {
            match record.message() {
                "fail" => Err("refused".to_string()),
                "panic" => panic!("unit exploded"),
                _ => Ok(()),
            }
        }
    }

    #[test]
    fn test_every_record_processed_once() {
        let records = make_records(&["Info"; 64]);
        let recorder = Recorder::default();
        let summary = process_all(&records, &recorder, 4, &CancelToken::new()).unwrap();

        assert_eq!(summary.processed, 64);
        assert_eq!(summary.threads, 4);
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 64);

        let mut seen = recorder.seen.lock().unwrap().clone();
        seen.sort_unstable();
        let mut expected: Vec<u64> = records.iter().map(|r| r.id().get()).collect();
        expected.sort_unstable();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_empty_input_succeeds() {
        let summary = process_all(&[], &SeverityClassifier, 0, &CancelToken::new()).unwrap();
        assert_eq!(summary.processed, 0);
    }

    #[test]
    fn test_all_failures_are_collected_including_panics() {
        let records = make_records(&["fail", "ok", "panic", "ok", "fail"]);
        let err = process_all(&records, &Faulty, 3, &CancelToken::new()).unwrap_err();

        let failures = match err {
            ProcessError::UnitFailures { failures } => failures,
            other => panic!("expected unit failures, got {other}"),
        };
        let ids: Vec<u64> = failures.iter().map(|f| f.record_id).collect();
        assert_eq!(
            ids,
            vec![records[0].id().get(), records[2].id().get(), records[4].id().get()]
        );
        assert_eq!(failures[0].reason, "refused");
        assert!(failures[1].reason.contains("unit exploded"));
    }

    #[test]
    fn test_cancelled_token_skips_units() {
        let records = make_records(&["Info", "Error", "Warning"]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let recorder = Recorder::default();

        let err = process_all(&records, &recorder, 2, &cancel).unwrap_err();
        assert!(matches!(
            err,
            ProcessError::Cancelled {
                completed: 0,
                total: 3
            }
        ));
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancel_token_reset() {
        let token = CancelToken::new();
        let shared = token.clone();
        shared.cancel();
        assert!(token.is_cancelled());
        token.reset();
        assert!(!shared.is_cancelled());
    }

    #[test]
    fn test_severity_classifier_never_fails() {
        let records = make_records(&["Error", "WARNING", "Info", "whatever"]);
        assert!(process_all(&records, &SeverityClassifier, 2, &CancelToken::new()).is_ok());
    }
}
