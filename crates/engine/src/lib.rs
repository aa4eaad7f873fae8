//! Workbook refresh engine and run coordinator.
//!
//! - `automation`: the spreadsheet automation collaborator contract
//! - `engine`: [`RefreshEngine`], the sequential per-document workflow
//! - `coordinator`: [`RefreshCoordinator`], the single run slot shared by
//!   manual and scheduled triggers
//! - `observer`: typed progress events
//! - `cancel`: cooperative cancellation

pub mod automation;
pub mod cancel;
pub mod coordinator;
pub mod engine;
pub mod observer;
pub mod types;

#[cfg(test)]
pub(crate) mod mock;

pub use automation::{AutomationError, Document, RuntimeGuard, Session, SessionFactory};
pub use cancel::{CancelToken, CancellationSource};
pub use coordinator::{CoordinatorError, RefreshCoordinator, RunHandle, RunOutcome, RunState, TriggerSource};
pub use engine::{format_remaining, RefreshEngine};
pub use observer::{ChannelObserver, NoopObserver, RefreshEvent, RefreshObserver};
pub use types::{EngineConfig, JobReason, JobStatus, RefreshError, RefreshJob, RefreshRunResult};
