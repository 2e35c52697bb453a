#![deny(warnings)]

//! Game runtime: the feature lifecycle, the year tracker, minigames, prestige
//! and the orchestrator that ticks them in a fixed order.

pub mod bug_fixing;
pub mod config;
pub mod controllers;
pub mod feature;
pub mod game;
pub mod mini_games;
pub mod minigame;
pub mod prestige;
pub mod settings;
pub mod wallet;
pub mod year;

pub use bug_fixing::{Bug, BugFixingMiniGame};
pub use config::{load_config, parse_config, ConfigError};
pub use controllers::{CalendarEvent, CalendarLog, Controller, YearTrackerController};
pub use feature::{Feature, TickContext};
pub use game::{Game, GameError, GamePhase};
pub use mini_games::MiniGames;
pub use minigame::{MiniGame, MiniGameBase};
pub use prestige::{Prestige, SkillTree};
pub use settings::{OptionValue, Setting, Settings};
pub use wallet::WalletFeature;
pub use year::{MonthClock, YearError, YearPhase, YearTracker, MONTHS_PER_YEAR};

use sim_core::GameConfig;
use tracing::warn;

/// Build a validated game with the standard controllers attached and every
/// feature initialized. Callers still `load` and `start` it.
pub fn init_game(cfg: &GameConfig) -> anyhow::Result<(Game, CalendarLog)> {
    let mut game = Game::from_config(cfg)?;
    let calendar = YearTrackerController::new();
    let log = calendar.log();
    game.add_controller(calendar)?;
    game.initialize()?;
    Ok((game, log))
}

/// Tick a running game for `months` in-game months at `step` seconds per tick,
/// starting new years as they end. Returns the number of ticks taken; a
/// non-positive or non-finite `step` runs nothing.
pub fn run_months(game: &mut Game, months: u32, step: f64) -> u64 {
    if !step.is_finite() || step <= 0.0 {
        warn!(step, "refusing to run with an invalid step");
        return 0;
    }
    let ticks_per_month = (game.year_tracker().clock().real_month_time() / step).ceil() as u64;
    let ticks = ticks_per_month * u64::from(months);
    for _ in 0..ticks {
        game.update(step);
        if game.year_ended() {
            let _ = game.start_new_year();
        }
    }
    ticks
}
