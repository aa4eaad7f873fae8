//! Daily time-slot scheduler.
//!
//! Holds up to three `HH:MM` slots and fires a trigger at most once per slot
//! per local calendar day. A single background thread polls the wall clock
//! at a fixed interval instead of sleeping until the exact instant, so a
//! machine that was suspended at the target minute still fires within the
//! grace window afterwards.
//!
//! - `slot`: `HH:MM` parsing and validation
//! - `state`: the mutable schedule (configured slots, slots fired today)
//! - `core`: [`DailyScheduler`], the thread-safe public handle
//! - `runner`: the poll loop

mod core;
mod runner;
pub mod slot;
pub mod state;
pub mod types;


pub use self::core::DailyScheduler;
pub use slot::{parse_times, ScheduleTime, MAX_TIMES};
pub use state::{DueSlot, ScheduleConfig};
pub use types::{ScheduleTrigger, SchedulerError, SchedulerTiming, TickReport};
