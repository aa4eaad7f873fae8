//! In-memory automation backend and helpers shared by the engine and
//! coordinator tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use refresher_core::{LogLevel, LogSink, LogSinkError};

use crate::automation::{AutomationError, Document, Session, SessionFactory};
use crate::cancel::CancelToken;
use crate::engine::RefreshEngine;
use crate::observer::RefreshObserver;
use crate::types::EngineConfig;

/// Call counters for every automation operation.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub sessions_created: AtomicUsize,
    pub opens: AtomicUsize,
    pub refreshes: AtomicUsize,
    pub saves: AtomicUsize,
    pub closes: AtomicUsize,
    /// Closes that asked to discard unsaved changes.
    pub discarding_closes: AtomicUsize,
    pub silenced: AtomicUsize,
    /// Value of `silenced` when the last save went through.
    pub silenced_at_save: AtomicUsize,
    pub terminates: AtomicUsize,
    pub reclaims: AtomicUsize,
    pub thread_inits: AtomicUsize,
    pub thread_deinits: AtomicUsize,
}

pub(crate) fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

/// Configurable failures.
#[derive(Debug, Clone, Default)]
pub(crate) struct Behavior {
    pub fail_init: bool,
    pub fail_create: bool,
    pub open_error: Option<String>,
    pub fail_save: bool,
    pub fail_close: bool,
    /// Every `set_silent` after the first fails.
    pub fail_silent_again: bool,
    pub fail_sheet_list: bool,
    /// Sheet whose row count cannot be read.
    pub unreadable_sheet: Option<String>,
    pub panic_on_refresh: bool,
}

pub(crate) struct MockFactory {
    pub counters: Arc<Counters>,
    pub behavior: Behavior,
    /// (sheet, rows before refresh, rows after refresh)
    pub sheets: Vec<(String, u64, u64)>,
    pub opened: Arc<Mutex<Vec<PathBuf>>>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::with_behavior(Behavior::default())
    }

    pub fn with_behavior(behavior: Behavior) -> Self {
        Self {
            counters: Arc::new(Counters::default()),
            behavior,
            sheets: vec![("Data".to_string(), 10, 14), ("Summary".to_string(), 3, 3)],
            opened: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn opened(&self) -> Vec<PathBuf> {
        self.opened.lock().unwrap().clone()
    }
}

impl SessionFactory for MockFactory {
    fn init_thread(&self) -> Result<(), AutomationError> {
        if self.behavior.fail_init {
            return Err(AutomationError::Unavailable("runtime not installed".into()));
        }
        self.counters.thread_inits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn deinit_thread(&self) {
        self.counters.thread_deinits.fetch_add(1, Ordering::SeqCst);
    }

    fn create_session(&self) -> Result<Box<dyn Session>, AutomationError> {
        if self.behavior.fail_create {
            return Err(AutomationError::Unavailable("no spreadsheet application".into()));
        }
        self.counters.sessions_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            counters: Arc::clone(&self.counters),
            behavior: self.behavior.clone(),
            sheets: self.sheets.clone(),
            opened: Arc::clone(&self.opened),
        }))
    }

    fn reclaim(&self) {
        self.counters.reclaims.fetch_add(1, Ordering::SeqCst);
    }
}

struct MockSession {
    counters: Arc<Counters>,
    behavior: Behavior,
    sheets: Vec<(String, u64, u64)>,
    opened: Arc<Mutex<Vec<PathBuf>>>,
}

impl Session for MockSession {
    fn set_silent(&mut self, silent: bool) -> Result<(), AutomationError> {
        if !silent {
            return Ok(());
        }
        let earlier = self.counters.silenced.fetch_add(1, Ordering::SeqCst);
        if earlier > 0 && self.behavior.fail_silent_again {
            return Err(AutomationError::failed("property is read-only"));
        }
        Ok(())
    }

    fn open_document(&mut self, path: &Path) -> Result<Box<dyn Document>, AutomationError> {
        self.opened.lock().unwrap().push(path.to_path_buf());
        if let Some(err) = &self.behavior.open_error {
            return Err(AutomationError::failed(err.clone()));
        }
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockDocument {
            counters: Arc::clone(&self.counters),
            behavior: self.behavior.clone(),
            sheets: self.sheets.clone(),
            refreshed: false,
        }))
    }

    fn terminate(&mut self) -> Result<(), AutomationError> {
        self.counters.terminates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MockDocument {
    counters: Arc<Counters>,
    behavior: Behavior,
    sheets: Vec<(String, u64, u64)>,
    refreshed: bool,
}

impl Document for MockDocument {
    fn sheet_names(&self) -> Result<Vec<String>, AutomationError> {
        if self.behavior.fail_sheet_list {
            return Err(AutomationError::failed("worksheets unavailable"));
        }
        Ok(self.sheets.iter().map(|(name, _, _)| name.clone()).collect())
    }

    fn used_row_count(&self, sheet: &str) -> Result<u64, AutomationError> {
        if self.behavior.unreadable_sheet.as_deref() == Some(sheet) {
            return Err(AutomationError::failed("used range unavailable"));
        }
        self.sheets
            .iter()
            .find(|(name, _, _)| name == sheet)
            .map(|(_, before, after)| if self.refreshed { *after } else { *before })
            .ok_or_else(|| AutomationError::failed(format!("no sheet {}", sheet)))
    }

    fn refresh_all_connections(&mut self) -> Result<(), AutomationError> {
        if self.behavior.panic_on_refresh {
            panic!("connection provider crashed");
        }
        self.counters.refreshes.fetch_add(1, Ordering::SeqCst);
        self.refreshed = true;
        Ok(())
    }

    fn save(&mut self) -> Result<(), AutomationError> {
        if self.behavior.fail_save {
            return Err(AutomationError::failed("disk full"));
        }
        self.counters.saves.fetch_add(1, Ordering::SeqCst);
        let silenced = self.counters.silenced.load(Ordering::SeqCst);
        self.counters.silenced_at_save.store(silenced, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self, discard_unsaved: bool) -> Result<(), AutomationError> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        if discard_unsaved {
            self.counters.discarding_closes.fetch_add(1, Ordering::SeqCst);
        }
        if self.behavior.fail_close {
            return Err(AutomationError::failed("close rejected"));
        }
        Ok(())
    }
}

/// Trips a cancel token when the given document (1-based) starts, so the
/// stop is observed during that document's wait.
pub(crate) struct CancelOnDocument {
    pub token: CancelToken,
    pub index: usize,
}

impl RefreshObserver for CancelOnDocument {
    fn document_started(&self, index: usize, _total: usize, _path: &Path) {
        if index == self.index {
            self.token.cancel();
        }
    }
}

#[derive(Default)]
pub(crate) struct RecordingSink(pub Mutex<Vec<(LogLevel, String)>>);

impl RecordingSink {
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.0
            .lock()
            .unwrap()
            .iter()
            .any(|(l, m)| *l == level && m.contains(needle))
    }
}

impl LogSink for RecordingSink {
    fn log(&self, level: LogLevel, message: &str) -> Result<(), LogSinkError> {
        self.0.lock().unwrap().push((level, message.to_string()));
        Ok(())
    }
}

/// Millisecond-scale timing so tests finish quickly.
pub(crate) fn fast_config() -> EngineConfig {
    EngineConfig {
        wait_duration: Duration::from_millis(30),
        run_timeout: Duration::from_secs(5),
        tick: Duration::from_millis(5),
    }
}

pub(crate) fn engine_with(
    factory: Arc<MockFactory>,
    config: EngineConfig,
    observer: Arc<dyn RefreshObserver>,
) -> (RefreshEngine, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let engine = RefreshEngine::new(factory, config, observer, sink.clone());
    (engine, sink)
}
