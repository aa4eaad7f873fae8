//! Single run slot shared by manual and scheduled triggers.
//!
//! `Idle → Running → {Completed | Stopped | Failed} → Idle`. At most one
//! batch runs at a time; its worker thread owns the automation session.

#[cfg(test)]
mod tests;

use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use refresher_core::{DocumentListProvider, LogSink, SinkLogger};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::automation::RuntimeGuard;
use crate::cancel::CancellationSource;
use crate::engine::{panic_message, RefreshEngine};
use crate::types::RefreshRunResult;

/// Snapshot of the run slot. Both flags reset together when a run ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub is_running: bool,
    pub stop_requested: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Manual,
    Scheduled,
}

impl std::fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerSource::Manual => f.write_str("manual"),
            TriggerSource::Scheduled => f.write_str("scheduled"),
        }
    }
}

/// How the last run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "error", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    /// A stop request truncated the batch.
    Stopped,
    /// The worker could not run the batch at all.
    Failed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("A refresh is already in progress")]
    AlreadyRunning,

    #[error("failed to spawn refresh worker: {0}")]
    Spawn(#[source] io::Error),

    #[error("refresh worker failed: {0}")]
    Failed(String),
}

#[derive(Debug, Default)]
struct CoordState {
    run: RunState,
    last_outcome: Option<RunOutcome>,
    last_result: Option<RefreshRunResult>,
}

struct Inner {
    engine: RefreshEngine,
    documents: Arc<dyn DocumentListProvider>,
    state: Mutex<CoordState>,
    idle: Condvar,
    log: SinkLogger,
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, CoordState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the run slot. Returns `false` if a run already holds it.
    fn try_claim(&self) -> bool {
        let mut state = self.lock_state();
        if state.run.is_running {
            return false;
        }
        state.run = RunState {
            is_running: true,
            stop_requested: false,
        };
        true
    }

    /// Release the run slot and record how the run ended.
    fn release(&self, outcome: RunOutcome, result: Option<RefreshRunResult>) {
        let mut state = self.lock_state();
        state.run = RunState::default();
        state.last_outcome = Some(outcome);
        if result.is_some() {
            state.last_result = result;
        }
        drop(state);
        self.idle.notify_all();
    }

    fn run_batch(&self) -> Result<RefreshRunResult, String> {
        let _runtime = RuntimeGuard::enter(self.engine.factory())
            .map_err(|e| format!("Failed to initialise automation runtime: {}", e))?;
        let paths = self.documents.enabled_document_paths();
        if paths.is_empty() {
            self.log.warning("No files configured for refresh");
        }
        Ok(self.engine.refresh_all(&paths, self))
    }

    fn work(&self, source: TriggerSource) -> Option<RefreshRunResult> {
        info!(%source, "refresh worker started");
        let (outcome, result) = match catch_unwind(AssertUnwindSafe(|| self.run_batch())) {
            Ok(Ok(result)) => {
                let outcome = if result.cancelled {
                    RunOutcome::Stopped
                } else {
                    RunOutcome::Completed
                };
                (outcome, Some(result))
            }
            Ok(Err(message)) => {
                self.log.error(&message);
                (RunOutcome::Failed(message), None)
            }
            Err(panic) => {
                let message = format!("Unexpected error: {}", panic_message(panic.as_ref()));
                self.log.error(format!("Refresh worker crashed: {}", message));
                (RunOutcome::Failed(message), None)
            }
        };
        info!(%source, outcome = ?outcome, "refresh worker finished");
        self.release(outcome, result.clone());
        result
    }
}

/// The engine polls the run state for stop requests.
impl CancellationSource for Inner {
    fn is_cancelled(&self) -> bool {
        self.lock_state().run.stop_requested
    }
}

/// Handle to a running batch.
pub struct RunHandle {
    thread: JoinHandle<Option<RefreshRunResult>>,
    inner: Arc<Inner>,
}

impl RunHandle {
    /// Block until the batch ends.
    pub fn join(self) -> Result<RefreshRunResult, CoordinatorError> {
        match self.thread.join() {
            Ok(Some(result)) => Ok(result),
            Ok(None) => {
                let message = match self.inner.lock_state().last_outcome.clone() {
                    Some(RunOutcome::Failed(message)) => message,
                    _ => "refresh did not produce a result".to_string(),
                };
                Err(CoordinatorError::Failed(message))
            }
            Err(panic) => Err(CoordinatorError::Failed(panic_message(panic.as_ref()))),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}

/// Owns the run slot. Cheap to clone; clones share the slot.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub fn new(
        engine: RefreshEngine,
        documents: Arc<dyn DocumentListProvider>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                engine,
                documents,
                state: Mutex::new(CoordState::default()),
                idle: Condvar::new(),
                log: SinkLogger::new(sink, "COORDINATOR"),
            }),
        }
    }

    /// Start a batch now. Rejected while another batch is running.
    pub fn trigger_manual(&self) -> Result<RunHandle, CoordinatorError> {
        if !self.inner.try_claim() {
            self.inner
                .log
                .warning("Refresh already in progress, manual request rejected");
            return Err(CoordinatorError::AlreadyRunning);
        }
        self.spawn(TriggerSource::Manual)
    }

    /// Start a batch from the scheduler without waiting for it. Returns
    /// `Ok(false)` when a batch is already running; the request is dropped,
    /// not queued.
    pub fn trigger_scheduled(&self) -> Result<bool, CoordinatorError> {
        if !self.inner.try_claim() {
            self.inner
                .log
                .info("Refresh already in progress, skipping scheduled refresh");
            return Ok(false);
        }
        self.spawn(TriggerSource::Scheduled)?;
        Ok(true)
    }

    fn spawn(&self, source: TriggerSource) -> Result<RunHandle, CoordinatorError> {
        self.inner
            .log
            .info(format!("Starting {} refresh", source));
        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new()
            .name("refresh-worker".into())
            .spawn(move || inner.work(source));

        match spawned {
            Ok(thread) => Ok(RunHandle {
                thread,
                inner: Arc::clone(&self.inner),
            }),
            Err(e) => {
                warn!(error = %e, "failed to spawn refresh worker");
                let message = format!("Failed to start refresh worker: {}", e);
                self.inner.log.error(&message);
                self.inner.release(RunOutcome::Failed(message), None);
                Err(CoordinatorError::Spawn(e))
            }
        }
    }

    /// Ask the running batch to stop after the current wait tick. Returns
    /// `false` if nothing is running.
    pub fn request_stop(&self) -> bool {
        let mut state = self.inner.lock_state();
        if !state.run.is_running {
            return false;
        }
        if !state.run.stop_requested {
            state.run.stop_requested = true;
            drop(state);
            self.inner.log.warning("Stop requested, finishing current step");
        }
        true
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock_state().run.is_running
    }

    pub fn state(&self) -> RunState {
        self.inner.lock_state().run
    }

    pub fn last_outcome(&self) -> Option<RunOutcome> {
        self.inner.lock_state().last_outcome.clone()
    }

    /// Result of the most recent batch that produced one.
    pub fn last_result(&self) -> Option<RefreshRunResult> {
        self.inner.lock_state().last_result.clone()
    }

    /// Block until no batch is running or `timeout` elapses. Returns
    /// whether the slot is idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.lock_state();
        while state.run.is_running {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = match self.inner.idle.wait_timeout(state, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }
}
