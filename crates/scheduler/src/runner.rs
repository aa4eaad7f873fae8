//! The poll loop.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::mpsc::{Receiver, RecvTimeoutError};

use chrono::{Local, NaiveDateTime};
use tracing::debug;

use super::core::Shared;
use crate::types::TickReport;

/// Body of the scheduler thread. Returns when a stop is signalled (or the
/// sender is dropped) or when an unexpected panic escapes a tick.
///
/// `generation` identifies this loop; only the current one may clear the
/// running flag on exit.
pub(crate) fn run_loop(shared: &Shared, stop_rx: &Receiver<()>, generation: u64) {
    shared.log.debug("Scheduler thread started");
    debug!(generation, "scheduler loop started");

    let outcome = catch_unwind(AssertUnwindSafe(|| loop {
        let report = tick(shared, Local::now().naive_local());
        let wait = if report.had_errors() {
            shared.log.debug(format!(
                "Backing off for {}ms after scheduled refresh errors",
                shared.timing.error_backoff.as_millis()
            ));
            debug!(
                failed = report.failed.len(),
                backoff_ms = shared.timing.error_backoff.as_millis() as u64,
                "scheduled refresh failed, backing off"
            );
            shared.timing.error_backoff
        } else {
            shared.timing.poll_interval
        };

        match stop_rx.recv_timeout(wait) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }));

    if let Err(panic) = outcome {
        shared.log.error(format!(
            "Critical error in scheduler thread: {}",
            panic_message(panic.as_ref())
        ));
    }

    // A loop detached by a timed-out stop must not clear a newer loop's flag.
    if shared.generation.load(Ordering::SeqCst) == generation {
        shared.running.store(false, Ordering::SeqCst);
    }
    shared.log.debug("Scheduler thread stopped");
    debug!(generation, "scheduler loop exited");
}

/// One poll: roll the date, collect due slots under the lock, then fire
/// them in configured order with the lock released.
pub(crate) fn tick(shared: &Shared, now: NaiveDateTime) -> TickReport {
    let due = {
        let mut config = shared.lock_config();
        if config.roll_date(now.date()) {
            shared.log.debug("New day: clearing executed schedule times");
        }
        config.due(now, shared.timing.grace_period)
    };
    if !due.is_empty() {
        debug!(due = due.len(), now = %now.format("%H:%M:%S"), "schedule slots due");
    }

    let mut report = TickReport::default();
    for slot in due {
        if slot.catch_up {
            shared.log.info(format!(
                "Catching up missed schedule: {} (Current: {})",
                slot.time,
                now.format("%H:%M")
            ));
        }
        shared
            .log
            .info(format!("Scheduled time reached: {}", slot.time));
        shared.log.info("Triggering scheduled refresh");

        let result = catch_unwind(AssertUnwindSafe(|| shared.trigger.fire(slot.time)));
        match result {
            Ok(Ok(())) => {
                debug!(slot = %slot.time, catch_up = slot.catch_up, "scheduled refresh handed off");
                shared
                    .log
                    .success(format!("Scheduled refresh for {} handed off", slot.time));
                report.fired.push(slot.time);
            }
            Ok(Err(e)) => {
                debug!(slot = %slot.time, error = %e, "scheduled refresh trigger failed");
                shared
                    .log
                    .error(format!("Error during scheduled refresh: {:#}", e));
                report.failed.push(slot.time);
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                debug!(slot = %slot.time, panic = %message, "scheduled refresh trigger panicked");
                shared
                    .log
                    .error(format!("Error during scheduled refresh: {}", message));
                report.failed.push(slot.time);
            }
        }

        // Failed slots count as executed too; they are not retried today.
        shared.lock_config().mark_executed(slot.time);
    }
    report
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
