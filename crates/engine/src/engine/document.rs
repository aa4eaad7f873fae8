//! Per-document workflow.

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use refresher_core::SinkLogger;
use tracing::{debug, warn};

use super::{display_name, RefreshEngine};
use crate::automation::{Document, Session, SessionFactory};
use crate::cancel::CancellationSource;
use crate::types::{JobReason, RefreshError, RefreshJob};

/// Owns the session and document for one workflow and releases them on
/// every exit path, panics included.
///
/// Drop order: close the document discarding changes, terminate the
/// session, drop both handles, then ask the factory to reclaim leftovers.
/// Each step is best-effort; failures are logged as warnings.
struct SessionGuard<'a> {
    factory: &'a dyn SessionFactory,
    log: &'a SinkLogger,
    session: Option<Box<dyn Session>>,
    document: Option<Box<dyn Document>>,
}

impl<'a> SessionGuard<'a> {
    fn new(factory: &'a dyn SessionFactory, log: &'a SinkLogger) -> Self {
        Self {
            factory,
            log,
            session: None,
            document: None,
        }
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        if let Some(mut document) = self.document.take() {
            if let Err(e) = document.close(true) {
                self.log.warning(format!("Warning during automation cleanup: {}", e));
            }
        }
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.terminate() {
                self.log.warning(format!("Warning during automation cleanup: {}", e));
            }
        }
        self.factory.reclaim();
    }
}

impl RefreshEngine {
    /// Run the full workflow for one document. Never fails: errors become
    /// `Error` jobs, read-only files and stop requests become `Skipped`.
    pub(crate) fn refresh_document(&self, path: &Path, cancel: &dyn CancellationSource) -> RefreshJob {
        let name = display_name(path);
        let started = Instant::now();

        if path.as_os_str().is_empty() || !path.exists() {
            let err = RefreshError::NotFound(path.to_path_buf());
            self.log.error(err.to_string());
            return RefreshJob::failed(path, err.reason(), err.to_string(), None, Duration::ZERO);
        }

        if self.is_read_only(path) {
            self.log.warning(format!(
                "Skipped: File is read-only and cannot be refreshed: {}",
                path.display()
            ));
            return RefreshJob::skipped(
                path,
                JobReason::ReadOnly,
                format!("Skipped: {} (read-only)", name),
                started.elapsed(),
            );
        }

        self.log.info(format!("Refreshing: {}", name));

        let mut guard = SessionGuard::new(self.factory.as_ref(), &self.log);
        match self.run_workflow(&mut guard, path, &name, started, cancel) {
            Ok((before, after)) => {
                drop(guard);
                let duration = started.elapsed();
                let message = format!(
                    "Successfully refreshed: {} ({:.1}s)",
                    name,
                    duration.as_secs_f64()
                );
                self.log.success(&message);
                RefreshJob::success(path, message, duration, before, after)
            }
            Err(err) => {
                drop(guard);
                self.job_from_error(path, &name, err, started)
            }
        }
    }

    fn run_workflow(
        &self,
        guard: &mut SessionGuard<'_>,
        path: &Path,
        name: &str,
        started: Instant,
        cancel: &dyn CancellationSource,
    ) -> Result<(u64, u64), RefreshError> {
        let session = guard.session.insert(
            self.factory
                .create_session()
                .map_err(RefreshError::automation("Failed to start automation session"))?,
        );
        session
            .set_silent(true)
            .map_err(RefreshError::automation("Failed to configure automation session"))?;

        self.log.debug(format!("Opening workbook: {}", name));
        let document = session.open_document(path).map_err(|source| {
            if source.looks_locked() {
                RefreshError::Locked {
                    name: name.to_string(),
                    source,
                }
            } else {
                RefreshError::Automation {
                    context: "Failed to open workbook",
                    source,
                }
            }
        })?;
        let document = guard.document.insert(document);

        let before = self.count_rows(&**document);
        self.log.debug(format!("Rows before refresh: {}", before));

        self.log.debug(format!("Executing RefreshAll: {}", name));
        document
            .refresh_all_connections()
            .map_err(RefreshError::automation("Failed to execute RefreshAll"))?;

        self.log.debug(format!("Waiting for refresh to complete: {}", name));
        self.wait_for_refresh(started, name, cancel)?;

        match document.is_calculating() {
            Ok(true) => self
                .log
                .warning(format!("Warning: {} still reports a calculation in progress", name)),
            Ok(false) => {}
            Err(e) => self
                .log
                .warning(format!("Warning during completion check: {}", e)),
        }

        let after = self.count_rows(&**document);
        self.log.debug(format!("Rows after refresh: {}", after));
        self.log
            .debug(format!("Added rows: {}", after as i64 - before as i64));

        // Some refreshes re-enable alerts; a prompt here would block the save.
        if let Err(e) = session.set_silent(true) {
            self.log.warning(format!("Warning: could not re-apply silent mode: {}", e));
        }

        self.log.debug(format!("Saving workbook: {}", name));
        document
            .save()
            .map_err(RefreshError::automation("Failed to save workbook"))?;

        self.log.debug(format!("Closing workbook: {}", name));
        if let Some(mut document) = guard.document.take() {
            if let Err(e) = document.close(true) {
                self.log.warning(format!("Warning closing workbook: {}", e));
            }
        }

        Ok((before, after))
    }

    /// Sum of used rows over every sheet. Sheets that cannot be read are
    /// skipped; if the sheet list itself is unavailable the count is 0.
    fn count_rows(&self, document: &dyn Document) -> u64 {
        match document.sheet_names() {
            Ok(sheets) => sheets
                .iter()
                .filter_map(|sheet| match document.used_row_count(sheet) {
                    Ok(rows) => Some(rows),
                    Err(e) => {
                        debug!(sheet = %sheet, error = %e, "skipping unreadable sheet");
                        None
                    }
                })
                .sum(),
            Err(e) => {
                self.log.warning(format!("Warning: Could not count rows: {}", e));
                0
            }
        }
    }

    /// Read-only attribute check. An unreadable attribute is treated as
    /// writable so the open step reports the real problem.
    fn is_read_only(&self, path: &Path) -> bool {
        match fs::metadata(path) {
            Ok(meta) => meta.permissions().readonly(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "read-only check failed");
                self.log.warning(format!(
                    "Warning: Could not check read-only status for {}: {}",
                    path.display(),
                    e
                ));
                false
            }
        }
    }

    fn job_from_error(&self, path: &Path, name: &str, err: RefreshError, started: Instant) -> RefreshJob {
        let duration = started.elapsed();
        let reason = err.reason();
        match &err {
            RefreshError::Cancelled(_) => {
                self.log.warning(format!("Refresh cancelled before saving: {}", name));
                RefreshJob::skipped(path, reason, err.to_string(), duration)
            }
            RefreshError::Locked { source, .. } => {
                self.log.error(err.to_string());
                RefreshJob::failed(path, reason, err.to_string(), Some(source.to_string()), duration)
            }
            RefreshError::Timeout { limit, .. } => {
                self.log.error(err.to_string());
                let detail = format!("Refresh timeout after {} seconds", limit.as_secs());
                RefreshJob::failed(path, reason, err.to_string(), Some(detail), duration)
            }
            RefreshError::NotFound(_) => {
                self.log.error(err.to_string());
                RefreshJob::failed(path, reason, err.to_string(), None, duration)
            }
            RefreshError::Automation { .. } => {
                let message = format!("Error refreshing {}: {}", name, err);
                self.log.error(&message);
                RefreshJob::failed(path, reason, message, Some(err.to_string()), duration)
            }
        }
    }
}
