// logtally - app/pipeline.rs
//
// The analysis orchestrator. Runs the fixed stage sequence
//
//   Idle -> Reading -> Filtering -> Processing -> Reporting -> Persisting -> Done
//
// with `Failed` reachable from every running stage. Each stage is an
// injected strategy; the orchestrator owns the working record set and hands
// it to one stage at a time.
//
// Finalization (clear the working set, reset the cancel flag, count the
// run) happens exactly once per `analyze` call on every exit path. It lives
// in a drop guard so that a panicking stage is covered too.

use crate::app::process::{self, CancelToken, RecordProcessor, SeverityClassifier};
use crate::core::aggregate::{Aggregator, LevelAggregator};
use crate::core::export;
use crate::core::filter::{CriteriaFilter, RecordFilter};
use crate::core::model::Record;
use crate::core::parser::{self, LineParser, ParseStats};
use crate::core::report::{AnalysisReport, ReportRenderer, TextReportRenderer};
use crate::platform::config::{AnalysisSettings, PipelineContext};
use crate::platform::fs::{FileSink, FileSource, LogSource, ReportSink};
use crate::util::error::{AnalysisError, ExportError, SinkError, SourceError, Stage};
use chrono::NaiveDateTime;
use std::path::Path;

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Reading,
    Filtering,
    Processing,
    Reporting,
    Persisting,
    Done,
    /// Terminal failure, naming the stage that failed.
    Failed(Stage),
}

impl PipelineState {
    /// The stage this state corresponds to, if it is a running stage.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineState::Reading => Some(Stage::Reading),
            PipelineState::Filtering => Some(Stage::Filtering),
            PipelineState::Processing => Some(Stage::Processing),
            PipelineState::Reporting => Some(Stage::Reporting),
            PipelineState::Persisting => Some(Stage::Persisting),
            _ => None,
        }
    }
}

/// Source of the report's generation timestamp.
pub type Clock = fn() -> NaiveDateTime;

fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// Runs analyses. Stages are fixed at construction; each `analyze` call is
/// a fresh run.
pub struct Analyzer {
    /// `None` = pick the parser from the validated parse mode.
    parser: Option<Box<dyn LineParser>>,
    filter: Box<dyn RecordFilter>,
    processor: Box<dyn RecordProcessor>,
    aggregator: Box<dyn Aggregator>,
    renderer: Box<dyn ReportRenderer>,
    source: Box<dyn LogSource>,
    sink: Box<dyn ReportSink>,
    clock: Clock,
    cancel: CancelToken,

    state: PipelineState,
    records: Vec<Record>,
    last_parse: ParseStats,
    finalize_count: u64,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    /// Analyzer with filesystem I/O and the default stages.
    pub fn new() -> Self {
        Self {
            parser: None,
            filter: Box::new(CriteriaFilter),
            processor: Box::new(SeverityClassifier),
            aggregator: Box::new(LevelAggregator),
            renderer: Box::new(TextReportRenderer),
            source: Box::new(FileSource),
            sink: Box::new(FileSink),
            clock: local_now,
            cancel: CancelToken::new(),
            state: PipelineState::Idle,
            records: Vec::new(),
            last_parse: ParseStats::default(),
            finalize_count: 0,
        }
    }

    /// Use this parser regardless of the configured parse mode.
    pub fn with_parser(mut self, parser: impl LineParser + 'static) -> Self {
        self.parser = Some(Box::new(parser));
        self
    }

    pub fn with_filter(mut self, filter: impl RecordFilter + 'static) -> Self {
        self.filter = Box::new(filter);
        self
    }

    pub fn with_processor(mut self, processor: impl RecordProcessor + 'static) -> Self {
        self.processor = Box::new(processor);
        self
    }

    pub fn with_aggregator(mut self, aggregator: impl Aggregator + 'static) -> Self {
        self.aggregator = Box::new(aggregator);
        self
    }

    pub fn with_renderer(mut self, renderer: impl ReportRenderer + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    pub fn with_source(mut self, source: impl LogSource + 'static) -> Self {
        self.source = Box::new(source);
        self
    }

    pub fn with_sink(mut self, sink: impl ReportSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Handle for cancelling the current or next run from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Number of completed finalizations (one per `analyze` call).
    pub fn finalize_count(&self) -> u64 {
        self.finalize_count
    }

    /// Size of the working record set; zero between runs.
    pub fn working_set_len(&self) -> usize {
        self.records.len()
    }

    /// Line counts from the most recent reading stage.
    pub fn last_parse_stats(&self) -> ParseStats {
        self.last_parse
    }

    // -------------------------------------------------------------------------
    // Run
    // -------------------------------------------------------------------------

    /// Run one analysis of `ctx` from `Idle` to `Done` or `Failed`.
    pub fn analyze(&mut self, ctx: &PipelineContext) -> Result<AnalysisReport, AnalysisError> {
        self.state = PipelineState::Idle;
        self.last_parse = ParseStats::default();
        tracing::info!(source = %ctx.source().display(), "Analysis started");

        let mut run = RunGuard { analyzer: self };
        let outcome = run.analyzer.run_stages(ctx);
        match &outcome {
            Ok(report) => {
                run.analyzer.state = PipelineState::Done;
                tracing::info!(records = report.total(), "Analysis complete");
            }
            Err(e) => {
                run.analyzer.state = PipelineState::Failed(e.stage);
                tracing::error!(stage = %e.stage, error = %e.cause, "Analysis failed");
            }
        }
        drop(run);
        outcome
    }

    fn enter(&mut self, state: PipelineState) {
        tracing::debug!(from = ?self.state, to = ?state, "Pipeline transition");
        self.state = state;
    }

    fn run_stages(&mut self, ctx: &PipelineContext) -> Result<AnalysisReport, AnalysisError> {
        // -- Reading ----------------------------------------------------------
        self.enter(PipelineState::Reading);
        let settings = ctx
            .validate()
            .map_err(|e| AnalysisError::new(Stage::Reading, e))?;
        self.read(ctx.source(), &settings)
            .map_err(|e| AnalysisError::new(Stage::Reading, e))?;

        // -- Filtering --------------------------------------------------------
        self.enter(PipelineState::Filtering);
        let parsed = std::mem::take(&mut self.records);
        self.records = self
            .filter
            .apply(parsed, &settings.filter)
            .map_err(|e| AnalysisError::new(Stage::Filtering, e))?;

        // -- Processing -------------------------------------------------------
        self.enter(PipelineState::Processing);
        process::process_all(
            &self.records,
            self.processor.as_ref(),
            settings.worker_threads,
            &self.cancel,
        )
        .map_err(|e| AnalysisError::new(Stage::Processing, e))?;

        // -- Reporting --------------------------------------------------------
        self.enter(PipelineState::Reporting);
        let summary = self.aggregator.aggregate(&self.records);
        let generated_at = (self.clock)();
        let body = self.renderer.render(&summary, generated_at);
        let report = AnalysisReport::new(summary, generated_at, body);

        // -- Persisting -------------------------------------------------------
        self.enter(PipelineState::Persisting);
        self.persist(&report, &settings)?;

        Ok(report)
    }

    fn read(&mut self, path: &Path, settings: &AnalysisSettings) -> Result<(), SourceError> {
        if path.as_os_str().is_empty() {
            return Err(SourceError::MissingPath);
        }
        if self.cancel.is_cancelled() {
            return Err(SourceError::Cancelled);
        }

        let content = self
            .source
            .read_to_string(path)
            .map_err(|e| SourceError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        if self.cancel.is_cancelled() {
            return Err(SourceError::Cancelled);
        }

        let default_parser;
        let parser: &dyn LineParser = match &self.parser {
            Some(p) => p.as_ref(),
            None => {
                default_parser = settings.parse_mode.parser();
                default_parser.as_ref()
            }
        };

        let (records, stats) = parser::parse_lines(parser, &content);
        tracing::info!(
            file = %path.display(),
            parser = parser.name(),
            parsed = stats.parsed,
            discarded = stats.discarded,
            "Log read"
        );
        self.records = records;
        self.last_parse = stats;
        Ok(())
    }

    /// Write the report, then the export if one is configured.
    ///
    /// The export is rendered before anything is written, so a record set
    /// that cannot be exported leaves the previous report untouched. A sink
    /// failure on the export write itself still leaves the new report on
    /// disk; the run is `Failed(Persisting)` either way.
    fn persist(
        &self,
        report: &AnalysisReport,
        settings: &AnalysisSettings,
    ) -> Result<(), AnalysisError> {
        let export = settings
            .export_path
            .as_ref()
            .map(|path| {
                export::export_to_buffer(&self.records, path).map(|bytes| (path, bytes))
            })
            .transpose()
            .map_err(|e| AnalysisError::new(Stage::Persisting, e))?;

        let output = &settings.output_path;
        self.sink
            .write(output, report.body().as_bytes())
            .map_err(|e| {
                AnalysisError::new(
                    Stage::Persisting,
                    SinkError::Io {
                        path: output.clone(),
                        source: e,
                    },
                )
            })?;
        tracing::debug!(path = %output.display(), "Report written");

        if let Some((export_path, bytes)) = export {
            self.sink.write(export_path, &bytes).map_err(|e| {
                AnalysisError::new(
                    Stage::Persisting,
                    ExportError::Io {
                        path: export_path.clone(),
                        source: e,
                    },
                )
            })?;
            tracing::info!(
                path = %export_path.display(),
                records = self.records.len(),
                "Records exported"
            );
        }
        Ok(())
    }

    fn finalize(&mut self) {
        if let Some(stage) = self.state.stage() {
            // Still mid-stage: the stage unwound.
            self.state = PipelineState::Failed(stage);
        }
        self.records = Vec::new();
        self.cancel.reset();
        self.finalize_count += 1;
        tracing::debug!(
            state = ?self.state,
            finalizations = self.finalize_count,
            "Run finalized"
        );
    }
}

/// Finalizes the run when dropped, including during unwinding.
struct RunGuard<'a> {
    analyzer: &'a mut Analyzer,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.analyzer.finalize();
    }
}
