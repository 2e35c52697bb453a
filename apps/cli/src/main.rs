#![deny(warnings)]

//! Headless driver: runs the game loop with a simple autopilot and saves to a
//! slot.

use anyhow::Result;
use persistence::{default_save_dir, JsonFileStore, SaveEnvelope, SaveStore};
use sim_core::GameConfig;
use sim_runtime::{init_game, load_config, Game, MiniGame, MONTHS_PER_YEAR};
use std::path::PathBuf;
use tracing::{debug, info, Level};
use tracing_subscriber::EnvFilter;

struct Args {
    config: Option<PathBuf>,
    months: u32,
    save_dir: PathBuf,
    slot: String,
    step: f64,
}

fn parse_args() -> Args {
    let mut args = Args {
        config: None,
        months: MONTHS_PER_YEAR,
        save_dir: default_save_dir(),
        slot: "main".to_string(),
        step: 0.1,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => args.config = it.next().map(PathBuf::from),
            "--months" => {
                if let Some(n) = it.next().and_then(|s| s.parse().ok()) {
                    args.months = n;
                }
            }
            "--save-dir" => {
                if let Some(dir) = it.next() {
                    args.save_dir = PathBuf::from(dir);
                }
            }
            "--slot" => {
                if let Some(slot) = it.next() {
                    args.slot = slot;
                }
            }
            "--step" => {
                if let Some(step) = it.next().and_then(|s| s.parse::<f64>().ok()) {
                    if step.is_finite() && step > 0.0 {
                        args.step = step;
                    }
                }
            }
            _ => {}
        }
    }
    args
}

/// Buy whatever is affordable, then steer the cursor toward the bug closest
/// to the end of its lane.
fn autopilot(game: &mut Game) {
    let affordable: Vec<String> = game
        .mini_games()
        .bug_fixing
        .upgrades()
        .available()
        .filter(|u| u.cost.amount <= game.wallet().balance(u.cost.kind))
        .map(|u| u.id.clone())
        .collect();
    for id in affordable {
        let _ = game.purchase_upgrade(&id);
    }

    let target = game
        .mini_games()
        .bug_fixing
        .bugs()
        .iter()
        .min_by(|a, b| a.position.total_cmp(&b.position))
        .map(|bug| bug.lane);
    if let Some(lane) = target {
        let cursor = game.mini_games().bug_fixing.cursor();
        if lane < cursor {
            game.move_bug_cursor_up();
        } else if lane > cursor {
            game.move_bug_cursor_down();
        }
    }
}

fn save(store: &mut JsonFileStore, slot: &str, game: &Game) -> Result<()> {
    let envelope = SaveEnvelope::new(game.save()?);
    store.write(slot, &envelope)
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::DEBUG)
        .init();

    let args = parse_args();
    info!(config = ?args.config, months = args.months, slot = %args.slot, "starting CLI");

    let cfg = match &args.config {
        Some(path) => load_config(path)?,
        None => GameConfig::default(),
    };
    let (mut game, calendar) = init_game(&cfg)?;

    let mut store = JsonFileStore::new(&args.save_dir);
    match store.read(&args.slot)? {
        Some(envelope) => game.load(&envelope.game)?,
        None => {
            info!(slot = %args.slot, "no save found, starting fresh");
            game.load(&serde_json::Value::Null)?;
        }
    }
    game.start()?;

    let mut since_save = 0.0;
    let mut years = 0u32;
    while calendar.months_completed() < args.months as usize {
        autopilot(&mut game);
        game.update(args.step);
        if game.year_ended() {
            game.start_new_year()?;
            years += 1;
        }
        since_save += args.step;
        if game.settings().autosave_enabled() && since_save >= game.settings().autosave_interval() {
            debug!(elapsed = game.elapsed(), "autosave");
            save(&mut store, &args.slot, &game)?;
            since_save = 0.0;
        }
    }
    save(&mut store, &args.slot, &game)?;

    let bugs = &game.mini_games().bug_fixing;
    println!(
        "Dev Year {} | months: {} | years: {} | month: {} | squashed: {} | money: {} | prestige: {} | ticks: {}",
        env!("GIT_SHA"),
        calendar.months_completed(),
        years,
        game.year_tracker().month(),
        bugs.squashed(),
        game.money(),
        game.prestige_points(),
        game.ticks()
    );

    Ok(())
}
