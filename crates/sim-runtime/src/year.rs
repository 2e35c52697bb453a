//! The year/month state machine driving the game's cadence.
//!
//! A year is twelve months. Real time advances the current month's progress
//! by `delta / real_month_time`; when progress reaches 1 the tracker moves to
//! the next month. Reaching month 12 ends the year and freezes the tracker
//! until [`YearTracker::start_new_year`] is called.
//!
//! At most one month transition happens per `update` call and any progress
//! beyond 1 is discarded, so a single very large delta cannot skip several
//! months.

use serde::{Deserialize, Serialize};
use sim_core::{Observable, Signal, SubscriptionId};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::feature::{Feature, TickContext};

/// Months in a year; reaching this month ends the year.
pub const MONTHS_PER_YEAR: u32 = 12;

/// Mapping between real seconds and in-game months.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MonthClock {
    real_month_time: f64,
}

impl MonthClock {
    /// `real_month_time` is the number of real seconds in one in-game month.
    pub fn new(real_month_time: f64) -> Self {
        Self { real_month_time }
    }

    pub fn real_month_time(&self) -> f64 {
        self.real_month_time
    }

    /// Fraction of a month equivalent to `seconds` of real time.
    pub fn seconds_to_month_percentage(&self, seconds: f64) -> f64 {
        seconds / self.real_month_time
    }
}

/// Where the tracker is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum YearPhase {
    NotStarted,
    InProgress,
    YearEnded,
}

#[derive(Debug, Error, PartialEq)]
pub enum YearError {
    #[error("cannot go to the next month: the year ended at month {0}")]
    YearEnded(u32),
    #[error("the year has not been started")]
    NotStarted,
    #[error("a new year can only start once the current one has ended (month {0})")]
    YearInProgress(u32),
}

/// Persisted tracker state. Absent fields default to 0.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct YearTrackerSaveData {
    pub month: u32,
    pub month_progress: f64,
}

pub struct YearTracker {
    clock: MonthClock,
    phase: YearPhase,
    month: Observable<u32>,
    month_progress: Observable<f64>,
    on_month_start: Signal<u32>,
    on_month_end: Signal<u32>,
    on_year_start: Signal<()>,
    on_year_end: Signal<()>,
}

impl YearTracker {
    pub fn new(real_month_time: f64) -> Self {
        Self {
            clock: MonthClock::new(real_month_time),
            phase: YearPhase::NotStarted,
            month: Observable::new(0),
            month_progress: Observable::new(0.0),
            on_month_start: Signal::new(),
            on_month_end: Signal::new(),
            on_year_start: Signal::new(),
            on_year_end: Signal::new(),
        }
    }

    pub fn clock(&self) -> MonthClock {
        self.clock
    }

    pub fn phase(&self) -> YearPhase {
        self.phase
    }

    pub fn month(&self) -> u32 {
        self.month.value()
    }

    pub fn month_progress(&self) -> f64 {
        self.month_progress.value()
    }

    pub fn year_has_ended(&self) -> bool {
        self.phase == YearPhase::YearEnded
    }

    pub fn seconds_to_month_percentage(&self, seconds: f64) -> f64 {
        self.clock.seconds_to_month_percentage(seconds)
    }

    /// Reset to month 0 and announce the year and its first month.
    pub fn start_new_year(&mut self) {
        self.reset_state();
        info!("year started");
        self.on_year_start.dispatch(&());
        self.on_month_start.dispatch(&0);
    }

    /// Advance to the next month, firing month-end before month-start.
    pub fn next_month(&mut self) -> Result<(), YearError> {
        match self.phase {
            YearPhase::YearEnded => {
                let e = YearError::YearEnded(self.month());
                error!(error = %e, "month transition rejected");
                return Err(e);
            }
            YearPhase::NotStarted => {
                let e = YearError::NotStarted;
                error!(error = %e, "month transition rejected");
                return Err(e);
            }
            YearPhase::InProgress => {}
        }

        let ending = self.month();
        self.on_month_end.dispatch(&ending);
        let month = ending + 1;
        self.month.set(month);
        self.month_progress.set(0.0);
        debug!(month, "month started");
        self.on_month_start.dispatch(&month);

        if month == MONTHS_PER_YEAR {
            self.phase = YearPhase::YearEnded;
            info!("year ended");
            self.on_year_end.dispatch(&());
        }
        Ok(())
    }

    fn reset_state(&mut self) {
        self.month.set(0);
        self.month_progress.set(0.0);
        self.phase = YearPhase::InProgress;
    }

    pub fn on_month_start(&mut self) -> &mut Signal<u32> {
        &mut self.on_month_start
    }

    pub fn on_month_end(&mut self) -> &mut Signal<u32> {
        &mut self.on_month_end
    }

    pub fn on_year_start(&mut self) -> &mut Signal<()> {
        &mut self.on_year_start
    }

    pub fn on_year_end(&mut self) -> &mut Signal<()> {
        &mut self.on_year_end
    }

    /// Notified whenever the month value changes.
    pub fn observe_month<F: FnMut(&u32) + 'static>(&mut self, handler: F) -> SubscriptionId {
        self.month.subscribe(handler)
    }

    /// Notified whenever the month progress changes.
    pub fn observe_month_progress<F: FnMut(&f64) + 'static>(
        &mut self,
        handler: F,
    ) -> SubscriptionId {
        self.month_progress.subscribe(handler)
    }
}

impl Feature for YearTracker {
    type SaveData = YearTrackerSaveData;

    fn name(&self) -> &'static str {
        "Year Tracker"
    }

    fn save_key(&self) -> &'static str {
        "year-tracker"
    }

    fn initialize(&mut self) {
        self.start_new_year();
    }

    fn update(&mut self, delta: f64, _ctx: &TickContext<'_>) {
        if self.phase != YearPhase::InProgress {
            return;
        }
        if !delta.is_finite() || delta < 0.0 {
            warn!(delta, "ignoring invalid tick delta");
            return;
        }
        let progress = self.month_progress() + self.clock.seconds_to_month_percentage(delta);
        if progress < 1.0 {
            self.month_progress.set(progress);
        } else {
            // Cannot fail: the phase is InProgress. Resets progress to 0.
            let _ = self.next_month();
        }
    }

    /// Restores month and progress without firing calendar events.
    /// Out-of-range values are reported and replaced by 0.
    fn load(&mut self, data: YearTrackerSaveData) {
        self.reset_state();
        if data.month <= MONTHS_PER_YEAR {
            self.month.set(data.month);
        } else {
            warn!(month = data.month, "saved month out of range, using 0");
        }
        if data.month_progress.is_finite() && (0.0..1.0).contains(&data.month_progress) {
            self.month_progress.set(data.month_progress);
        } else {
            warn!(progress = data.month_progress, "saved month progress out of range, using 0");
        }
        if self.month() == MONTHS_PER_YEAR {
            self.phase = YearPhase::YearEnded;
        }
    }

    fn save(&self) -> YearTrackerSaveData {
        YearTrackerSaveData {
            month: self.month(),
            month_progress: self.month_progress(),
        }
    }

    /// Back to month 0 of a running year, without events.
    fn reset(&mut self) {
        self.reset_state();
    }
}
