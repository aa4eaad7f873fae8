//! Mutable schedule state: configured slots and slots already fired today.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};

use crate::slot::ScheduleTime;

/// A slot that is due on the current poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueSlot {
    pub time: ScheduleTime,
    /// `true` when the poll landed after the slot's exact minute (e.g. the
    /// machine was asleep or the previous poll was delayed).
    pub catch_up: bool,
}

/// Configured daily slots plus the per-day execution record.
///
/// Never empty: construction falls back to the default slot and
/// [`replace_times`](ScheduleConfig::replace_times) refuses an empty list.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    times: Vec<ScheduleTime>,
    executed_today: HashSet<ScheduleTime>,
    /// Local date of the last poll, used to detect midnight rollover.
    last_seen: Option<NaiveDate>,
}

impl ScheduleConfig {
    pub fn new(times: Vec<ScheduleTime>) -> Self {
        let times = if times.is_empty() {
            vec![ScheduleTime::default()]
        } else {
            times
        };
        Self {
            times,
            executed_today: HashSet::new(),
            last_seen: None,
        }
    }

    pub fn times(&self) -> &[ScheduleTime] {
        &self.times
    }

    pub fn executed_today(&self) -> &HashSet<ScheduleTime> {
        &self.executed_today
    }

    /// Swap in a new slot list and forget what fired today, so a slot still
    /// ahead of us can fire again under the new configuration.
    /// Returns `false` (keeping the old list) when `times` is empty.
    pub fn replace_times(&mut self, times: Vec<ScheduleTime>) -> bool {
        if times.is_empty() {
            return false;
        }
        self.times = times;
        self.executed_today.clear();
        true
    }

    /// Record the date of the current poll. Returns `true` when the date
    /// changed since the previous poll, in which case `executed_today` has
    /// been cleared.
    pub fn roll_date(&mut self, today: NaiveDate) -> bool {
        let rolled = matches!(self.last_seen, Some(prev) if prev != today);
        if rolled {
            self.executed_today.clear();
        }
        self.last_seen = Some(today);
        rolled
    }

    /// Slots (in configured order) whose window `[slot, slot + grace]`
    /// contains `now` and which have not fired today.
    pub fn due(&self, now: NaiveDateTime, grace: Duration) -> Vec<DueSlot> {
        let grace = chrono::Duration::from_std(grace).unwrap_or(chrono::Duration::zero());
        self.times
            .iter()
            .filter(|t| !self.executed_today.contains(t))
            .filter_map(|t| {
                let scheduled = t.on(now.date());
                if scheduled <= now && now <= scheduled + grace {
                    Some(DueSlot {
                        time: *t,
                        catch_up: now - scheduled >= chrono::Duration::minutes(1),
                    })
                } else {
                    None
                }
            })
            .collect()
    }

    /// Mark a slot as fired today. Ignored if the slot is no longer
    /// configured (the list may have changed while the trigger ran).
    pub fn mark_executed(&mut self, time: ScheduleTime) {
        if self.times.contains(&time) {
            self.executed_today.insert(time);
        }
    }

    /// Earliest upcoming slot: today if it is still ahead and has not
    /// fired, otherwise the same slot tomorrow.
    pub fn next_run_after(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        self.times
            .iter()
            .map(|t| {
                let today = t.on(now.date());
                if now >= today || self.executed_today.contains(t) {
                    today + chrono::Duration::days(1)
                } else {
                    today
                }
            })
            .min()
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
