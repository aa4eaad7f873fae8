//! Fixed post-refresh wait.

use std::thread;
use std::time::{Duration, Instant};

use super::RefreshEngine;
use crate::cancel::CancellationSource;
use crate::types::RefreshError;

impl RefreshEngine {
    /// Wait `wait_duration` after the refresh was started, one tick at a
    /// time. Each tick checks the document's timeout ceiling (measured from
    /// `doc_started`), then the cancellation source, then reports progress.
    pub(super) fn wait_for_refresh(
        &self,
        doc_started: Instant,
        name: &str,
        cancel: &dyn CancellationSource,
    ) -> Result<(), RefreshError> {
        let wait = self.config.wait_duration;
        let wait_started = Instant::now();

        loop {
            if doc_started.elapsed() > self.config.run_timeout {
                return Err(RefreshError::Timeout {
                    name: name.to_string(),
                    limit: self.config.run_timeout,
                });
            }
            if cancel.is_cancelled() {
                return Err(RefreshError::Cancelled(name.to_string()));
            }

            let waited = wait_started.elapsed();
            let remaining = wait.saturating_sub(waited);
            self.observer
                .wait_tick(progress_percent(waited, wait), &format_remaining(remaining));

            if remaining.is_zero() {
                return Ok(());
            }
            let tick = if self.config.tick.is_zero() {
                remaining
            } else {
                self.config.tick.min(remaining)
            };
            thread::sleep(tick);
        }
    }
}

fn progress_percent(waited: Duration, total: Duration) -> u8 {
    if total.is_zero() {
        return 100;
    }
    let ratio = waited.as_secs_f64() / total.as_secs_f64();
    (ratio * 100.0).clamp(0.0, 100.0) as u8
}

/// Remaining wait as `MM:SS`, rounding partial seconds up.
pub fn format_remaining(remaining: Duration) -> String {
    let mut secs = remaining.as_secs();
    if remaining.subsec_nanos() > 0 {
        secs += 1;
    }
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
