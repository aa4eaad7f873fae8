//! Injected log sink.
//!
//! The scheduler and the refresh engine report every phase transition and
//! every caught error through a [`LogSink`] handed to them at construction.
//! A sink must never take the caller down: [`SinkLogger`] swallows sink
//! errors and panics and falls back to stdout.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Debug,
    Warning,
    Error,
    Success,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Success => "SUCCESS",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
#[error("log sink failed: {0}")]
pub struct LogSinkError(pub String);

/// Destination for human-readable progress and error messages.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str) -> Result<(), LogSinkError>;
}

/// Forwards to `tracing`. `Success` is emitted at info level with an
/// `outcome = "success"` field.
#[derive(Debug, Clone, Default)]
pub struct TracingLogSink {
    component: &'static str,
}

impl TracingLogSink {
    pub fn new(component: &'static str) -> Self {
        Self { component }
    }
}

impl LogSink for TracingLogSink {
    fn log(&self, level: LogLevel, message: &str) -> Result<(), LogSinkError> {
        let component = self.component;
        match level {
            LogLevel::Debug => tracing::debug!(component, "{}", message),
            LogLevel::Info => tracing::info!(component, "{}", message),
            LogLevel::Success => tracing::info!(component, outcome = "success", "{}", message),
            LogLevel::Warning => tracing::warn!(component, "{}", message),
            LogLevel::Error => tracing::error!(component, "{}", message),
        }
        Ok(())
    }
}

/// Infallible front-end over a shared [`LogSink`].
#[derive(Clone)]
pub struct SinkLogger {
    sink: Arc<dyn LogSink>,
    tag: &'static str,
}

impl SinkLogger {
    pub fn new(sink: Arc<dyn LogSink>, tag: &'static str) -> Self {
        Self { sink, tag }
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        let delivered = catch_unwind(AssertUnwindSafe(|| self.sink.log(level, message)));
        match delivered {
            Ok(Ok(())) => {}
            Ok(Err(_)) | Err(_) => println!("[{}] [{}] {}", self.tag, level, message),
        }
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Debug, message.as_ref());
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message.as_ref());
    }

    pub fn success(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Success, message.as_ref());
    }

    pub fn warning(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Warning, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, message.as_ref());
    }
}

impl fmt::Debug for SinkLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkLogger").field("tag", &self.tag).finish()
    }
}
