//! Spreadsheet automation collaborator contract.
//!
//! A [`Session`] is one spreadsheet application instance. Sessions are
//! expensive to create and leave orphaned processes behind unless they are
//! explicitly terminated, so the engine creates one per document and tears it
//! down unconditionally.
//!
//! Platform automation runtimes are usually thread-affine: every thread that
//! creates sessions must call [`SessionFactory::init_thread`] before and
//! [`SessionFactory::deinit_thread`] after. [`RuntimeGuard`] brackets a
//! thread's lifetime with that pair.

use std::path::Path;

/// Errors reported by the automation layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AutomationError {
    #[error("automation runtime unavailable: {0}")]
    Unavailable(String),
    #[error("{0}")]
    Failed(String),
}

impl AutomationError {
    pub fn failed(message: impl Into<String>) -> Self {
        AutomationError::Failed(message.into())
    }

    /// Whether the error text indicates the file is held by another
    /// program.
    pub fn looks_locked(&self) -> bool {
        let text = self.to_string().to_lowercase();
        ["permission denied", "locked", "in use"]
            .iter()
            .any(|needle| text.contains(needle))
    }
}

/// An open workbook.
pub trait Document: Send {
    /// Names of all sheets, in workbook order.
    fn sheet_names(&self) -> Result<Vec<String>, AutomationError>;

    /// Number of rows in the sheet's used range.
    fn used_row_count(&self, sheet: &str) -> Result<u64, AutomationError>;

    /// Start refreshing every external connection, query and pivot table.
    fn refresh_all_connections(&mut self) -> Result<(), AutomationError>;

    /// Whether the application still reports a calculation in progress.
    fn is_calculating(&self) -> Result<bool, AutomationError> {
        Ok(false)
    }

    fn save(&mut self) -> Result<(), AutomationError>;

    /// Close the workbook. With `discard_unsaved` the application must not
    /// write the file again.
    fn close(&mut self, discard_unsaved: bool) -> Result<(), AutomationError>;
}

/// One spreadsheet application instance.
pub trait Session: Send {
    /// Toggle headless operation: no visible window, no alerts, no screen
    /// updates, no event handlers.
    fn set_silent(&mut self, silent: bool) -> Result<(), AutomationError>;

    fn open_document(&mut self, path: &Path) -> Result<Box<dyn Document>, AutomationError>;

    /// Quit the application instance.
    fn terminate(&mut self) -> Result<(), AutomationError>;
}

/// Creates sessions and owns the per-thread runtime lifecycle.
pub trait SessionFactory: Send + Sync {
    /// Prepare the automation runtime on the calling thread.
    fn init_thread(&self) -> Result<(), AutomationError> {
        Ok(())
    }

    /// Release the automation runtime on the calling thread.
    fn deinit_thread(&self) {}

    fn create_session(&self) -> Result<Box<dyn Session>, AutomationError>;

    /// Reclaim anything a terminated session may have left behind.
    fn reclaim(&self) {}
}

/// Keeps the calling thread's automation runtime initialised for its
/// lifetime.
pub struct RuntimeGuard<'a> {
    factory: &'a dyn SessionFactory,
}

impl<'a> RuntimeGuard<'a> {
    pub fn enter(factory: &'a dyn SessionFactory) -> Result<Self, AutomationError> {
        factory.init_thread()?;
        Ok(Self { factory })
    }
}

impl Drop for RuntimeGuard<'_> {
    fn drop(&mut self) {
        self.factory.deinit_thread();
    }
}
