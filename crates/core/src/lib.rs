//! Shared building blocks for the workbook refresher.
//!
//! This crate provides:
//! - The [`CoreError`] type used by the configuration layer
//! - Environment-driven [`Config`] (with `.env` and profile support)
//! - The JSON document list ([`DocumentList`]) and its provider trait
//! - The injected [`LogSink`] contract used by the scheduler and engine

pub mod config;
pub mod documents;
pub mod error;
pub mod log;

pub use config::{Config, RefreshConfig, SchedulerSettings};
pub use documents::{DocumentEntry, DocumentList, DocumentListProvider, JsonDocumentList};
pub use error::*;
pub use log::{LogLevel, LogSink, LogSinkError, SinkLogger, TracingLogSink};
