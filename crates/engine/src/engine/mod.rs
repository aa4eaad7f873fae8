//! Sequential refresh engine.
//!
//! Split into focused submodules:
//! - `document`: the per-document workflow and its cleanup guard
//! - `wait`: the fixed post-refresh wait with progress and cancellation

mod document;
mod wait;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use refresher_core::{LogSink, SinkLogger};
use tracing::{debug, info};

use crate::automation::SessionFactory;
use crate::cancel::CancellationSource;
use crate::observer::RefreshObserver;
use crate::types::{EngineConfig, JobReason, RefreshJob, RefreshRunResult};

pub use self::wait::format_remaining;

/// Refreshes documents one at a time through open → refresh → wait →
/// verify → save → close.
///
/// Documents are never parallelised: the automation layer is not safe to
/// drive from several sessions writing at once. One document's failure
/// never aborts the batch.
pub struct RefreshEngine {
    pub(crate) factory: Arc<dyn SessionFactory>,
    pub(crate) config: EngineConfig,
    pub(crate) observer: Arc<dyn RefreshObserver>,
    pub(crate) log: SinkLogger,
}

impl RefreshEngine {
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        config: EngineConfig,
        observer: Arc<dyn RefreshObserver>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            factory,
            config,
            observer,
            log: SinkLogger::new(sink, "ENGINE"),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn factory(&self) -> &dyn SessionFactory {
        self.factory.as_ref()
    }

    /// Refresh every path in order. Never fails: each document's outcome is
    /// recorded in the returned result.
    ///
    /// `cancel` is polled before each document and during the wait; once it
    /// trips the batch ends and the remaining documents are not started.
    pub fn refresh_all(&self, paths: &[PathBuf], cancel: &dyn CancellationSource) -> RefreshRunResult {
        let total = paths.len();
        let mut result = RefreshRunResult::new(total);
        let started = Instant::now();

        info!(run_id = %result.run_id, total, "refresh batch started");
        self.log.info(format!("Starting refresh of {} file(s)", total));

        for (i, path) in paths.iter().enumerate() {
            let index = i + 1;
            if cancel.is_cancelled() {
                self.log.warning(format!(
                    "Refresh stopped by user: {} file(s) not started",
                    total - i
                ));
                result.cancelled = true;
                break;
            }

            self.observer.document_started(index, total, path);
            let job = self.refresh_guarded(path, cancel);
            self.observer.document_finished(index, total, path, job.status);
            debug!(run_id = %result.run_id, index, path = %path.display(), status = ?job.status, "document finished");

            let stopped = job.reason == Some(JobReason::Cancelled);
            result.push(job);
            if stopped {
                result.cancelled = true;
                let remaining = total - index;
                if remaining > 0 {
                    self.log.warning(format!(
                        "Refresh stopped by user: {} file(s) not started",
                        remaining
                    ));
                }
                break;
            }
        }

        result.elapsed_seconds = started.elapsed().as_secs_f64();
        self.log_summary(&result);
        self.observer.run_finished(&result);
        result
    }

    /// Refresh one document, turning a panic anywhere in the workflow into
    /// an error job. The session guard has already cleaned up by the time
    /// the panic is caught.
    fn refresh_guarded(&self, path: &Path, cancel: &dyn CancellationSource) -> RefreshJob {
        let started = Instant::now();
        match catch_unwind(AssertUnwindSafe(|| self.refresh_document(path, cancel))) {
            Ok(job) => job,
            Err(panic) => {
                let detail = panic_message(panic.as_ref());
                let message = format!("Unexpected error: {}", detail);
                self.log.error(format!(
                    "Critical error refreshing {}: {}",
                    display_name(path),
                    message
                ));
                RefreshJob::failed(
                    path,
                    JobReason::Automation,
                    message,
                    Some(detail),
                    started.elapsed(),
                )
            }
        }
    }

    fn log_summary(&self, result: &RefreshRunResult) {
        let elapsed = result.elapsed_seconds;
        let message = if result.skipped > 0 {
            format!(
                "Refresh completed: {} succeeded, {} failed, {} skipped ({:.1}s)",
                result.succeeded, result.failed, result.skipped, elapsed
            )
        } else {
            format!(
                "Refresh completed: {} succeeded, {} failed ({:.1}s)",
                result.succeeded, result.failed, elapsed
            )
        };
        self.log.info(message);
        info!(
            run_id = %result.run_id,
            succeeded = result.succeeded,
            failed = result.failed,
            skipped = result.skipped,
            cancelled = result.cancelled,
            "refresh batch finished"
        );
    }
}

/// File name for log messages, falling back to the full path.
pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
