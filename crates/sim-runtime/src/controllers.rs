//! Cross-cutting observers wired into features after construction.

use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info};

use crate::game::Game;

/// Something that subscribes to feature events during the wiring phase,
/// before the game is initialized.
pub trait Controller {
    fn name(&self) -> &'static str;
    fn attach(&mut self, game: &mut Game);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalendarEvent {
    YearStart,
    MonthStart(u32),
    MonthEnd(u32),
    YearEnd,
}

/// Shared, append-only record of calendar events.
#[derive(Clone, Debug, Default)]
pub struct CalendarLog(Rc<RefCell<Vec<CalendarEvent>>>);

impl CalendarLog {
    fn push(&self, event: CalendarEvent) {
        self.0.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<CalendarEvent> {
        self.0.borrow().clone()
    }

    pub fn years_completed(&self) -> usize {
        self.0
            .borrow()
            .iter()
            .filter(|e| **e == CalendarEvent::YearEnd)
            .count()
    }

    pub fn months_completed(&self) -> usize {
        self.0
            .borrow()
            .iter()
            .filter(|e| matches!(e, CalendarEvent::MonthEnd(_)))
            .count()
    }
}

/// Logs every calendar event and records it in a [`CalendarLog`].
#[derive(Debug, Default)]
pub struct YearTrackerController {
    log: CalendarLog,
}

impl YearTrackerController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the log; stays valid after the controller is handed to the game.
    pub fn log(&self) -> CalendarLog {
        self.log.clone()
    }
}

impl Controller for YearTrackerController {
    fn name(&self) -> &'static str {
        "Year Tracker Controller"
    }

    fn attach(&mut self, game: &mut Game) {
        let tracker = game.year_tracker_mut();

        let log = self.log.clone();
        tracker.on_year_start().subscribe(move |_| {
            info!("new year");
            log.push(CalendarEvent::YearStart);
        });
        let log = self.log.clone();
        tracker.on_month_start().subscribe(move |month| {
            debug!(month, "month start");
            log.push(CalendarEvent::MonthStart(*month));
        });
        let log = self.log.clone();
        tracker.on_month_end().subscribe(move |month| {
            debug!(month, "month end");
            log.push(CalendarEvent::MonthEnd(*month));
        });
        let log = self.log.clone();
        tracker.on_year_end().subscribe(move |_| {
            info!("year complete");
            log.push(CalendarEvent::YearEnd);
        });
    }
}
