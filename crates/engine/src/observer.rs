//! Typed progress events.
//!
//! The engine reports progress through a [`RefreshObserver`]. Observers run
//! on the worker thread and should return quickly; [`ChannelObserver`]
//! forwards everything to another thread instead.

use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::sync::Mutex;

use serde::Serialize;

use crate::types::{JobStatus, RefreshRunResult};

pub trait RefreshObserver: Send + Sync {
    /// A document is about to be processed (`index` is 1-based).
    fn document_started(&self, _index: usize, _total: usize, _path: &Path) {}

    /// A document finished with the given status.
    fn document_finished(&self, _index: usize, _total: usize, _path: &Path, _status: JobStatus) {}

    /// One tick of the post-refresh wait.
    fn wait_tick(&self, _percent: u8, _remaining: &str) {}

    /// The batch ended (completed, stopped or truncated).
    fn run_finished(&self, _result: &RefreshRunResult) {}
}

/// Ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RefreshObserver for NoopObserver {}

/// Owned form of an observer callback.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RefreshEvent {
    DocumentStarted {
        index: usize,
        total: usize,
        path: PathBuf,
    },
    DocumentFinished {
        index: usize,
        total: usize,
        path: PathBuf,
        status: JobStatus,
    },
    WaitTick {
        percent: u8,
        remaining: String,
    },
    RunFinished {
        result: RefreshRunResult,
    },
}

/// Sends every callback as a [`RefreshEvent`] over a channel. A closed
/// receiver is ignored.
#[derive(Debug)]
pub struct ChannelObserver {
    tx: Mutex<Sender<RefreshEvent>>,
}

impl ChannelObserver {
    pub fn new(tx: Sender<RefreshEvent>) -> Self {
        Self { tx: Mutex::new(tx) }
    }

    fn send(&self, event: RefreshEvent) {
        if let Ok(tx) = self.tx.lock() {
            let _ = tx.send(event);
        }
    }
}

impl RefreshObserver for ChannelObserver {
    fn document_started(&self, index: usize, total: usize, path: &Path) {
        self.send(RefreshEvent::DocumentStarted {
            index,
            total,
            path: path.to_path_buf(),
        });
    }

    fn document_finished(&self, index: usize, total: usize, path: &Path, status: JobStatus) {
        self.send(RefreshEvent::DocumentFinished {
            index,
            total,
            path: path.to_path_buf(),
            status,
        });
    }

    fn wait_tick(&self, percent: u8, remaining: &str) {
        self.send(RefreshEvent::WaitTick {
            percent,
            remaining: remaining.to_string(),
        });
    }

    fn run_finished(&self, result: &RefreshRunResult) {
        self.send(RefreshEvent::RunFinished {
            result: result.clone(),
        });
    }
}
