use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use chrono::{Local, NaiveDateTime};
use refresher_core::{LogSink, SinkLogger};
use tracing::{debug, warn};

use crate::slot::{parse_times, ScheduleTime};
use crate::state::ScheduleConfig;
use crate::types::{ScheduleTrigger, SchedulerTiming, TickReport};

/// State shared between the public handle and the poll thread.
pub(crate) struct Shared {
    pub(crate) config: Mutex<ScheduleConfig>,
    pub(crate) timing: SchedulerTiming,
    pub(crate) trigger: Arc<dyn ScheduleTrigger>,
    pub(crate) log: SinkLogger,
    pub(crate) running: AtomicBool,
    /// Bumped on every start; identifies the current poll loop.
    pub(crate) generation: AtomicU64,
}

impl Shared {
    pub(crate) fn lock_config(&self) -> MutexGuard<'_, ScheduleConfig> {
        self.config.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct LoopHandle {
    stop_tx: mpsc::Sender<()>,
    done_rx: mpsc::Receiver<()>,
    thread: JoinHandle<()>,
}

/// Fires a trigger at up to three daily `HH:MM` slots from a background
/// thread.
///
/// All methods take `&self`; the handle can be shared behind an `Arc`
/// between the UI/CLI thread and whoever edits the schedule.
pub struct DailyScheduler {
    shared: Arc<Shared>,
    handle: Mutex<Option<LoopHandle>>,
}

impl DailyScheduler {
    /// Create a stopped scheduler. Invalid candidates are logged and
    /// skipped; if none are valid the schedule falls back to `06:00`.
    pub fn new<S: AsRef<str>>(
        times: &[S],
        trigger: Arc<dyn ScheduleTrigger>,
        sink: Arc<dyn LogSink>,
        timing: SchedulerTiming,
    ) -> Self {
        let log = SinkLogger::new(sink, "SCHEDULER");
        let parsed = parse_times(times);
        for bad in &parsed.invalid {
            log.warning(format!("Invalid time format: {}. Skipping.", bad));
        }
        if parsed.accepted.is_empty() {
            log.warning(format!(
                "No valid schedule times supplied, using default {}",
                ScheduleTime::default()
            ));
        }

        Self {
            shared: Arc::new(Shared {
                config: Mutex::new(ScheduleConfig::new(parsed.accepted)),
                timing,
                trigger,
                log,
                running: AtomicBool::new(false),
                generation: AtomicU64::new(0),
            }),
            handle: Mutex::new(None),
        }
    }

    /// Start the background poll thread. Returns `false` if it is already
    /// running or the thread could not be spawned.
    pub fn start(&self) -> bool {
        let mut handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = handle.as_ref() {
            if !existing.thread.is_finished() {
                self.shared.log.warning("Scheduler is already running");
                return false;
            }
            // The previous loop exited on its own; reap it and start fresh.
            if let Some(stale) = handle.take() {
                let _ = stale.thread.join();
            }
        }

        let (stop_tx, stop_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();
        let shared = Arc::clone(&self.shared);

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.running.store(true, Ordering::SeqCst);
        let spawned = std::thread::Builder::new()
            .name("refresh-scheduler".to_string())
            .spawn(move || {
                crate::runner::run_loop(&shared, &stop_rx, generation);
                let _ = done_tx.send(());
            });

        match spawned {
            Ok(thread) => {
                *handle = Some(LoopHandle {
                    stop_tx,
                    done_rx,
                    thread,
                });
                let times = self.times_label();
                debug!(generation, times = %times, "scheduler started");
                self.shared
                    .log
                    .info(format!("Scheduler started: Daily refresh at [{}]", times));
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to spawn scheduler thread");
                self.shared.running.store(false, Ordering::SeqCst);
                self.shared
                    .log
                    .error(format!("Failed to start scheduler thread: {}", e));
                false
            }
        }
    }

    /// Signal the loop to exit and wait up to `stop_timeout` for it.
    ///
    /// Returns `false` if the scheduler was not running. A loop that does
    /// not exit in time is detached with a warning, never killed.
    pub fn stop(&self) -> bool {
        let taken = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(handle) = taken else {
            self.shared.log.warning("Scheduler is not running");
            return false;
        };

        let _ = handle.stop_tx.send(());
        match handle.done_rx.recv_timeout(self.shared.timing.stop_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = handle.thread.join();
            }
            Err(RecvTimeoutError::Timeout) => {
                debug!(
                    timeout_ms = self.shared.timing.stop_timeout.as_millis() as u64,
                    "scheduler thread did not stop in time, detaching it"
                );
                self.shared
                    .log
                    .warning("Warning: Scheduler thread did not stop cleanly");
            }
        }

        self.shared.running.store(false, Ordering::SeqCst);
        debug!("scheduler stopped");
        self.shared.log.info("Scheduler stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Replace the configured slots without restarting the loop.
    ///
    /// Candidates are trimmed and validated; at most three distinct valid
    /// slots are kept. Returns `false` and keeps the current schedule when
    /// none validate. On success the fired-today record is cleared.
    pub fn set_times<S: AsRef<str>>(&self, candidates: &[S]) -> bool {
        let parsed = parse_times(candidates);
        for bad in &parsed.invalid {
            self.shared
                .log
                .error(format!("Invalid time format: {}. Skipping.", bad));
        }
        for extra in &parsed.overflow {
            self.shared.log.warning(format!(
                "Ignoring {}: at most {} times are supported",
                extra,
                crate::slot::MAX_TIMES
            ));
        }
        if parsed.accepted.is_empty() {
            self.shared
                .log
                .error("No valid times provided. Keeping current schedule.");
            return false;
        }

        let (old, new) = {
            let mut config = self.shared.lock_config();
            let old = join_times(config.times());
            config.replace_times(parsed.accepted);
            (old, join_times(config.times()))
        };
        self.shared
            .log
            .info(format!("Scheduled times updated: [{}] → [{}]", old, new));
        true
    }

    /// Replace the whole schedule with a single slot.
    pub fn set_time(&self, time: &str) -> bool {
        self.set_times(&[time])
    }

    pub fn scheduled_times(&self) -> Vec<String> {
        self.shared
            .lock_config()
            .times()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    /// Next local instant a slot will fire, or `None` while stopped.
    pub fn next_run_time(&self) -> Option<NaiveDateTime> {
        if !self.is_running() {
            return None;
        }
        self.shared
            .lock_config()
            .next_run_after(Local::now().naive_local())
    }

    /// Run one poll iteration against an explicit local time.
    pub fn tick_at(&self, now: NaiveDateTime) -> TickReport {
        crate::runner::tick(&self.shared, now)
    }

    fn times_label(&self) -> String {
        join_times(self.shared.lock_config().times())
    }
}

impl Drop for DailyScheduler {
    fn drop(&mut self) {
        let running = self
            .handle
            .get_mut()
            .map(|h| h.is_some())
            .unwrap_or(false);
        if running {
            self.stop();
        }
    }
}

fn join_times(times: &[ScheduleTime]) -> String {
    times
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
