use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use refresher_core::RefreshConfig;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::automation::AutomationError;

/// Engine timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fixed wait after triggering the refresh. Background queries do not
    /// report completion reliably, so the engine waits this long instead of
    /// polling for "ready".
    pub wait_duration: Duration,
    /// Hard ceiling for one document, measured from the start of its
    /// workflow.
    pub run_timeout: Duration,
    /// Progress and cancellation granularity during the wait.
    pub tick: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wait_duration: Duration::from_secs(120),
            run_timeout: Duration::from_secs(600),
            tick: Duration::from_secs(1),
        }
    }
}

impl From<&RefreshConfig> for EngineConfig {
    fn from(c: &RefreshConfig) -> Self {
        Self {
            wait_duration: c.wait_duration(),
            run_timeout: c.timeout(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Success,
    Skipped,
    Error,
}

/// Why a job did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobReason {
    FileNotFound,
    /// Deliberate skip: a read-only file cannot be saved.
    ReadOnly,
    FileLocked,
    Timeout,
    Automation,
    /// Stop requested while this document was waiting.
    Cancelled,
}

/// Failure of one document's workflow.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("File is locked or open in another program: {name}")]
    Locked {
        name: String,
        #[source]
        source: AutomationError,
    },

    #[error("Refresh timeout exceeded ({}s): {name}", .limit.as_secs())]
    Timeout { name: String, limit: Duration },

    #[error("Refresh cancelled: {0}")]
    Cancelled(String),

    #[error("{context}: {source}")]
    Automation {
        context: &'static str,
        #[source]
        source: AutomationError,
    },
}

impl RefreshError {
    pub(crate) fn automation(context: &'static str) -> impl FnOnce(AutomationError) -> Self {
        move |source| RefreshError::Automation { context, source }
    }

    pub fn reason(&self) -> JobReason {
        match self {
            RefreshError::NotFound(_) => JobReason::FileNotFound,
            RefreshError::Locked { .. } => JobReason::FileLocked,
            RefreshError::Timeout { .. } => JobReason::Timeout,
            RefreshError::Cancelled(_) => JobReason::Cancelled,
            RefreshError::Automation { .. } => JobReason::Automation,
        }
    }
}

/// Outcome of refreshing one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshJob {
    pub path: PathBuf,
    pub status: JobStatus,
    pub reason: Option<JobReason>,
    /// Human-readable outcome.
    pub message: String,
    /// Raw underlying error text, when there was one.
    pub error: Option<String>,
    pub duration_seconds: f64,
    pub rows_before: Option<u64>,
    pub rows_after: Option<u64>,
    pub rows_added: Option<i64>,
}

impl RefreshJob {
    pub fn success(path: &Path, message: String, duration: Duration, before: u64, after: u64) -> Self {
        Self {
            path: path.to_path_buf(),
            status: JobStatus::Success,
            reason: None,
            message,
            error: None,
            duration_seconds: duration.as_secs_f64(),
            rows_before: Some(before),
            rows_after: Some(after),
            rows_added: Some(after as i64 - before as i64),
        }
    }

    pub fn skipped(path: &Path, reason: JobReason, message: String, duration: Duration) -> Self {
        Self {
            path: path.to_path_buf(),
            status: JobStatus::Skipped,
            reason: Some(reason),
            message,
            error: None,
            duration_seconds: duration.as_secs_f64(),
            rows_before: None,
            rows_after: None,
            rows_added: None,
        }
    }

    pub fn failed(
        path: &Path,
        reason: JobReason,
        message: String,
        error: Option<String>,
        duration: Duration,
    ) -> Self {
        Self {
            path: path.to_path_buf(),
            status: JobStatus::Error,
            reason: Some(reason),
            message,
            error,
            duration_seconds: duration.as_secs_f64(),
            rows_before: None,
            rows_after: None,
            rows_added: None,
        }
    }
}

/// Aggregate outcome of one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRunResult {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub elapsed_seconds: f64,
    /// The batch was truncated by a stop request.
    pub cancelled: bool,
    /// One entry per started document, in input order.
    pub jobs: Vec<RefreshJob>,
}

impl RefreshRunResult {
    pub fn new(total: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            total,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            elapsed_seconds: 0.0,
            cancelled: false,
            jobs: Vec::with_capacity(total),
        }
    }

    /// Append a finished job and update the counters.
    pub fn push(&mut self, job: RefreshJob) {
        match job.status {
            JobStatus::Success => self.succeeded += 1,
            JobStatus::Skipped => self.skipped += 1,
            JobStatus::Error => self.failed += 1,
        }
        self.jobs.push(job);
    }

    /// Counters agree with the job list and never exceed the total.
    pub fn is_consistent(&self) -> bool {
        self.succeeded + self.failed + self.skipped == self.jobs.len() && self.jobs.len() <= self.total
    }

    /// Documents that were never started because the batch stopped early.
    pub fn not_started(&self) -> usize {
        self.total - self.jobs.len()
    }
}
