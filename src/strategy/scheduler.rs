//! Calendar-boundary detection over the bar stream.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// When a rebalance fires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalanceSchedule {
    /// Only on a bar dated the 1st of a month. A month whose 1st has no
    /// bars (weekend, holiday) is not rebalanced.
    #[default]
    FirstCalendarDay,
    /// On the first observed date of each new calendar month.
    FirstTradingDayOfMonth,
}

/// Scheduler state: no day seen yet, or the last processed calendar day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SchedulerState {
    #[default]
    Unset,
    HasDay(NaiveDate),
}

/// Emitted at most once per calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebalanceTrigger {
    pub date: NaiveDate,
}

/// Pure transition function for the scheduler.
///
/// A date equal to or earlier than the current day leaves the state untouched
/// and never fires. Feeds run out of step, so a late bar for the previous day
/// must not rewind the state and reopen a date that already fired.
pub fn transition(
    state: SchedulerState,
    date: NaiveDate,
    schedule: RebalanceSchedule,
) -> (SchedulerState, Option<RebalanceTrigger>) {
    let previous = match state {
        SchedulerState::HasDay(day) if date <= day => return (state, None),
        SchedulerState::HasDay(day) => Some(day),
        SchedulerState::Unset => None,
    };

    let fire = match schedule {
        RebalanceSchedule::FirstCalendarDay => date.day() == 1,
        RebalanceSchedule::FirstTradingDayOfMonth => match previous {
            Some(prev) => (prev.year(), prev.month()) != (date.year(), date.month()),
            None => date.day() == 1,
        },
    };

    let trigger = fire.then_some(RebalanceTrigger { date });
    (SchedulerState::HasDay(date), trigger)
}

/// Turns per-security bar dates into a single rebalance signal per date.
///
/// Which security's bar opens a new day does not matter; only the date does.
#[derive(Debug, Clone, Default)]
pub struct RebalanceScheduler {
    state: SchedulerState,
    schedule: RebalanceSchedule,
}

impl RebalanceScheduler {
    pub fn new(schedule: RebalanceSchedule) -> Self {
        Self {
            state: SchedulerState::Unset,
            schedule,
        }
    }

    /// Observe a finished bar's date.
    pub fn observe(&mut self, date: NaiveDate) -> Option<RebalanceTrigger> {
        let (next, trigger) = transition(self.state, date, self.schedule);
        if next != self.state {
            debug!(%date, "New trading day");
        }
        self.state = next;
        trigger
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn last_processed_day(&self) -> Option<NaiveDate> {
        match self.state {
            SchedulerState::Unset => None,
            SchedulerState::HasDay(day) => Some(day),
        }
    }

    /// Forget the last processed day.
    pub fn reset(&mut self) {
        self.state = SchedulerState::Unset;
    }
}
