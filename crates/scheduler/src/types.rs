use std::time::Duration;

use refresher_core::SchedulerSettings;
use serde::{Deserialize, Serialize};

use crate::slot::ScheduleTime;

/// Error type for schedule validation.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Invalid time format: {0} (expected HH:MM, 00-23:00-59)")]
    InvalidTime(String),
    #[error("No valid times provided")]
    NoValidTimes,
}

/// Invoked from the scheduler thread when a slot comes due.
///
/// Errors (and panics) are caught by the poll loop; they are logged and the
/// loop backs off before polling again.
pub trait ScheduleTrigger: Send + Sync {
    fn fire(&self, slot: ScheduleTime) -> anyhow::Result<()>;
}

impl<F> ScheduleTrigger for F
where
    F: Fn(ScheduleTime) -> anyhow::Result<()> + Send + Sync,
{
    fn fire(&self, slot: ScheduleTime) -> anyhow::Result<()> {
        self(slot)
    }
}

/// Poll-loop timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerTiming {
    /// Normal wait between polls.
    pub poll_interval: Duration,
    /// How long after a slot it may still fire (catch-up window).
    pub grace_period: Duration,
    /// Wait used instead of `poll_interval` after a caught error.
    pub error_backoff: Duration,
    /// How long `stop()` waits for the loop to exit.
    pub stop_timeout: Duration,
}

impl Default for SchedulerTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            grace_period: Duration::from_secs(10 * 60),
            error_backoff: Duration::from_secs(60),
            stop_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&SchedulerSettings> for SchedulerTiming {
    fn from(s: &SchedulerSettings) -> Self {
        Self {
            poll_interval: Duration::from_secs(s.poll_secs.max(1)),
            grace_period: Duration::from_secs(s.grace_minutes * 60),
            error_backoff: Duration::from_secs(s.error_backoff_secs),
            stop_timeout: Duration::from_secs(s.stop_timeout_secs),
        }
    }
}

/// What a single poll iteration did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Slots whose trigger returned successfully.
    pub fired: Vec<ScheduleTime>,
    /// Slots whose trigger failed or panicked.
    pub failed: Vec<ScheduleTime>,
}

impl TickReport {
    pub fn had_errors(&self) -> bool {
        !self.failed.is_empty()
    }
}
