//! The game orchestrator.
//!
//! Every feature lives in a `bevy_ecs` [`World`] as a non-send resource,
//! since observers hold plain `FnMut` handlers. Each lifecycle step
//! (initialize, load, update, reset) is a [`Schedule`] of chained systems,
//! one per feature, run in a fixed order: settings, year tracker, prestige,
//! minigames, wallet. Calendar events are dispatched synchronously from
//! inside those systems, not through ECS events.

use bevy_ecs::prelude::*;
use bevy_ecs::schedule::ExecutorKind;
use bevy_ecs::system::SystemState;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use sim_core::{validate_config, CurrencyType, GameConfig, ValidationError};
use sim_econ::{CurrencyWallet, MultiplierTable, UpgradeError};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::bug_fixing::BugFixingMiniGame;
use crate::controllers::Controller;
use crate::feature::{Feature, TickContext};
use crate::mini_games::MiniGames;
use crate::prestige::Prestige;
use crate::settings::Settings;
use crate::wallet::WalletFeature;
use crate::year::{MonthClock, YearError, YearTracker};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GamePhase {
    Constructed,
    Initialized,
    Loaded,
    Running,
}

#[derive(Debug, Error, PartialEq)]
pub enum GameError {
    #[error("cannot {action} while the game is {phase:?}")]
    OutOfOrder {
        action: &'static str,
        phase: GamePhase,
    },
}

/// Real seconds covered by the tick being run.
#[derive(Resource, Clone, Copy, Default)]
struct TickDelta(f64);

#[derive(Resource, Clone, Copy)]
struct TickClock(MonthClock);

/// Skill tree multipliers, frozen at the start of each tick.
#[derive(Resource, Default)]
struct Boosts(MultiplierTable);

/// Save tree being restored; present only while the load schedule runs.
#[derive(Resource)]
struct PendingSave(Value);

fn initialize_feature<F: Feature + 'static>(mut feature: NonSendMut<F>) {
    feature.initialize();
    debug!(feature = feature.name(), "initialized");
}

/// A missing subtree leaves the feature on its defaults.
fn load_feature<F: Feature + 'static>(mut feature: NonSendMut<F>, save: Res<PendingSave>) {
    let sub = save.0.get(feature.save_key()).unwrap_or(&Value::Null);
    let data = feature.parse_save_data(sub);
    feature.load(data);
}

fn capture_boosts(prestige: NonSend<Prestige>, mut boosts: ResMut<Boosts>) {
    boosts.0 = MultiplierTable::capture(&prestige.skill_tree);
}

fn update_feature<F: Feature + 'static>(
    mut feature: NonSendMut<F>,
    delta: Res<TickDelta>,
    clock: Res<TickClock>,
    boosts: Res<Boosts>,
) {
    let ctx = TickContext {
        clock: clock.0,
        boosts: &boosts.0,
    };
    feature.update(delta.0, &ctx);
}

fn reset_feature<F: Feature + 'static>(mut feature: NonSendMut<F>) {
    feature.reset();
}

fn clamp_lanes(mut games: NonSendMut<MiniGames>, prestige: NonSend<Prestige>) {
    games.clamp_to_lanes(&prestige.skill_tree);
}

fn chained<M>(systems: impl IntoSystemConfigs<M>) -> Schedule {
    let mut schedule = Schedule::default();
    schedule.set_executor_kind(ExecutorKind::SingleThreaded);
    schedule.add_systems(systems);
    schedule
}

struct Schedules {
    initialize: Schedule,
    load: Schedule,
    update: Schedule,
    reset: Schedule,
}

impl Schedules {
    fn new() -> Self {
        Self {
            initialize: chained(
                (
                    initialize_feature::<Settings>,
                    initialize_feature::<YearTracker>,
                    initialize_feature::<Prestige>,
                    initialize_feature::<MiniGames>,
                    initialize_feature::<WalletFeature>,
                )
                    .chain(),
            ),
            load: chained(
                (
                    load_feature::<Settings>,
                    load_feature::<YearTracker>,
                    load_feature::<Prestige>,
                    load_feature::<MiniGames>,
                    load_feature::<WalletFeature>,
                    clamp_lanes,
                )
                    .chain(),
            ),
            update: chained(
                (
                    capture_boosts,
                    update_feature::<Settings>,
                    update_feature::<YearTracker>,
                    update_feature::<Prestige>,
                    update_feature::<MiniGames>,
                    update_feature::<WalletFeature>,
                )
                    .chain(),
            ),
            reset: chained(
                (
                    reset_feature::<Settings>,
                    reset_feature::<YearTracker>,
                    reset_feature::<Prestige>,
                    reset_feature::<MiniGames>,
                    reset_feature::<WalletFeature>,
                )
                    .chain(),
            ),
        }
    }
}

/// The features a player action touches at once.
type Desk = (
    NonSendMut<'static, MiniGames>,
    NonSendMut<'static, Prestige>,
    NonSendMut<'static, WalletFeature>,
);

pub struct Game {
    world: World,
    schedules: Schedules,
    desk: SystemState<Desk>,
    controllers: Vec<&'static str>,
    phase: GamePhase,
    ticks: u64,
    elapsed: f64,
}

impl Game {
    /// Construct every feature from `cfg`. The config is trusted; use
    /// [`Game::from_config`] to validate it first.
    pub fn new(cfg: &GameConfig) -> Self {
        let year_tracker = YearTracker::new(cfg.real_month_time);
        let mut world = World::new();
        world.insert_resource(TickClock(year_tracker.clock()));
        world.insert_resource(TickDelta::default());
        world.insert_resource(Boosts::default());
        world.insert_non_send_resource(Settings::new());
        world.insert_non_send_resource(year_tracker);
        world.insert_non_send_resource(Prestige::new());
        world.insert_non_send_resource(MiniGames::new(BugFixingMiniGame::new(
            cfg.bug_fixing_budget,
            cfg.rng_seed,
        )));
        world.insert_non_send_resource(WalletFeature::new(cfg.starting_money));
        let desk = SystemState::new(&mut world);
        Self {
            world,
            schedules: Schedules::new(),
            desk,
            controllers: Vec::new(),
            phase: GamePhase::Constructed,
            ticks: 0,
            elapsed: 0.0,
        }
    }

    pub fn from_config(cfg: &GameConfig) -> Result<Self, ValidationError> {
        validate_config(cfg)?;
        Ok(Self::new(cfg))
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// Number of completed ticks.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Real seconds simulated since `start`.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Names of the attached controllers, in attach order.
    pub fn controllers(&self) -> &[&'static str] {
        &self.controllers
    }

    pub fn settings(&self) -> &Settings {
        self.world.non_send_resource::<Settings>()
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        self.world.non_send_resource_mut::<Settings>().into_inner()
    }

    pub fn year_tracker(&self) -> &YearTracker {
        self.world.non_send_resource::<YearTracker>()
    }

    pub fn year_tracker_mut(&mut self) -> &mut YearTracker {
        self.world.non_send_resource_mut::<YearTracker>().into_inner()
    }

    pub fn prestige(&self) -> &Prestige {
        self.world.non_send_resource::<Prestige>()
    }

    pub fn mini_games(&self) -> &MiniGames {
        self.world.non_send_resource::<MiniGames>()
    }

    pub fn mini_games_mut(&mut self) -> &mut MiniGames {
        self.world.non_send_resource_mut::<MiniGames>().into_inner()
    }

    pub fn wallet(&self) -> &WalletFeature {
        self.world.non_send_resource::<WalletFeature>()
    }

    pub fn wallet_mut(&mut self) -> &mut WalletFeature {
        self.world.non_send_resource_mut::<WalletFeature>().into_inner()
    }

    fn expect_phase(&self, action: &'static str, allowed: &[GamePhase]) -> Result<(), GameError> {
        if allowed.contains(&self.phase) {
            return Ok(());
        }
        let e = GameError::OutOfOrder {
            action,
            phase: self.phase,
        };
        error!(error = %e, "lifecycle violation");
        Err(e)
    }

    /// Wire a controller's subscriptions. Only allowed before `initialize`.
    pub fn add_controller<C: Controller>(&mut self, mut controller: C) -> Result<(), GameError> {
        self.expect_phase("attach a controller", &[GamePhase::Constructed])?;
        controller.attach(self);
        debug!(controller = controller.name(), "controller attached");
        self.controllers.push(controller.name());
        Ok(())
    }

    pub fn initialize(&mut self) -> Result<(), GameError> {
        self.expect_phase("initialize", &[GamePhase::Constructed])?;
        self.schedules.initialize.run(&mut self.world);
        self.phase = GamePhase::Initialized;
        Ok(())
    }

    /// Restore every feature from a save tree produced by [`Game::save`].
    /// A missing subtree leaves that feature on its defaults.
    pub fn load(&mut self, json: &Value) -> Result<(), GameError> {
        self.expect_phase("load", &[GamePhase::Initialized])?;
        self.world.insert_resource(PendingSave(json.clone()));
        self.schedules.load.run(&mut self.world);
        self.world.remove_resource::<PendingSave>();
        self.phase = GamePhase::Loaded;
        info!(
            month = self.year_tracker().month(),
            money = %self.money(),
            "game loaded"
        );
        Ok(())
    }

    /// Begin accepting ticks. Loading first is optional.
    pub fn start(&mut self) -> Result<(), GameError> {
        self.expect_phase("start", &[GamePhase::Initialized, GamePhase::Loaded])?;
        self.phase = GamePhase::Running;
        info!("game started");
        Ok(())
    }

    /// Advance every feature by `delta` real seconds.
    pub fn update(&mut self, delta: f64) {
        if self.phase != GamePhase::Running {
            warn!(phase = ?self.phase, "tick ignored, game not running");
            return;
        }
        self.world.insert_resource(TickDelta(delta));
        self.schedules.update.run(&mut self.world);
        self.ticks += 1;
        self.elapsed += delta;
    }

    pub fn save(&self) -> serde_json::Result<Value> {
        let mut out = Map::new();
        save_feature(self.settings(), &mut out)?;
        save_feature(self.year_tracker(), &mut out)?;
        save_feature(self.prestige(), &mut out)?;
        save_feature(self.mini_games(), &mut out)?;
        save_feature(self.wallet(), &mut out)?;
        Ok(Value::Object(out))
    }

    /// Wipe every feature back to its post-initialize state, skills included.
    pub fn reset(&mut self) {
        self.schedules.reset.run(&mut self.world);
        self.ticks = 0;
        self.elapsed = 0.0;
        info!("game reset");
    }

    pub fn money(&self) -> Decimal {
        self.wallet().balance(CurrencyType::Money)
    }

    pub fn prestige_points(&self) -> Decimal {
        self.wallet().balance(CurrencyType::PrestigePoints)
    }

    pub fn year_ended(&self) -> bool {
        self.year_tracker().year_has_ended()
    }

    pub fn purchase_upgrade(&mut self, id: &str) -> Result<(), UpgradeError> {
        let (mut games, prestige, mut wallet) = self.desk.get_mut(&mut self.world);
        games.purchase_upgrade(id, &mut *wallet)?;
        games.clamp_to_lanes(&prestige.skill_tree);
        Ok(())
    }

    pub fn purchase_skill(&mut self, id: &str) -> Result<(), UpgradeError> {
        let (mut games, mut prestige, mut wallet) = self.desk.get_mut(&mut self.world);
        prestige.skill_tree.purchase(id, &mut *wallet)?;
        games.clamp_to_lanes(&prestige.skill_tree);
        Ok(())
    }

    pub fn move_bug_cursor_up(&mut self) -> bool {
        let (mut games, prestige, mut wallet) = self.desk.get_mut(&mut self.world);
        games.bug_fixing.move_up(&mut *wallet, &prestige.skill_tree)
    }

    pub fn move_bug_cursor_down(&mut self) -> bool {
        let (mut games, prestige, mut wallet) = self.desk.get_mut(&mut self.world);
        games.bug_fixing.move_down(&mut *wallet, &prestige.skill_tree)
    }

    /// Pay out completed year requirements, reset every minigame's run and
    /// restart the calendar. Skills are kept.
    pub fn start_new_year(&mut self) -> Result<(), YearError> {
        if !self.year_ended() {
            let e = YearError::YearInProgress(self.year_tracker().month());
            error!(error = %e, "new year refused");
            return Err(e);
        }
        {
            let (mut games, prestige, mut wallet) = self.desk.get_mut(&mut self.world);
            for reward in games.completed_rewards() {
                info!(%reward, "year requirement reward");
                wallet.gain_currency(&reward);
            }
            games.reset();
            games.clamp_to_lanes(&prestige.skill_tree);
        }
        self.year_tracker_mut().start_new_year();
        Ok(())
    }
}

fn save_feature<F: Feature>(feature: &F, out: &mut Map<String, Value>) -> serde_json::Result<()> {
    out.insert(feature.save_key().to_string(), serde_json::to_value(feature.save())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::{CalendarEvent, YearTrackerController};
    use crate::minigame::MiniGame;
    use crate::settings::{OptionValue, AUTOSAVE};
    use crate::year::YearPhase;
    use serde_json::json;
    use sim_core::{Currency, UpgradeType};
    use sim_econ::MultiplierSource;

    fn config() -> GameConfig {
        GameConfig {
            real_month_time: 10.0,
            starting_money: Decimal::new(1_000, 0),
            ..GameConfig::default()
        }
    }

    fn running(cfg: &GameConfig) -> Game {
        let mut game = Game::new(cfg);
        game.initialize().unwrap();
        game.load(&Value::Null).unwrap();
        game.start().unwrap();
        game
    }

    fn finish_year(game: &mut Game) {
        for _ in 0..12 {
            game.update(10.0);
        }
        assert!(game.year_ended());
    }

    #[test]
    fn lifecycle_is_strictly_ordered() {
        let mut game = Game::new(&config());
        assert!(game.load(&Value::Null).is_err());
        assert!(game.start().is_err());
        game.add_controller(YearTrackerController::new()).unwrap();
        game.initialize().unwrap();
        assert_eq!(
            game.add_controller(YearTrackerController::new()),
            Err(GameError::OutOfOrder {
                action: "attach a controller",
                phase: GamePhase::Initialized
            })
        );
        assert!(game.initialize().is_err());
        game.start().unwrap();
        assert!(game.load(&Value::Null).is_err());
        assert_eq!(game.controllers(), ["Year Tracker Controller"]);
    }

    #[test]
    fn ticks_before_start_are_ignored() {
        let mut game = Game::new(&config());
        game.initialize().unwrap();
        game.update(5.0);
        assert_eq!(game.ticks(), 0);
        assert_eq!(game.year_tracker().month_progress(), 0.0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = GameConfig {
            real_month_time: 0.0,
            ..GameConfig::default()
        };
        assert!(Game::from_config(&cfg).is_err());
    }

    #[test]
    fn controller_sees_calendar_in_order() {
        let mut game = Game::new(&config());
        let controller = YearTrackerController::new();
        let log = controller.log();
        game.add_controller(controller).unwrap();
        game.initialize().unwrap();
        game.start().unwrap();
        game.update(10.0);
        assert_eq!(
            log.events(),
            vec![
                CalendarEvent::YearStart,
                CalendarEvent::MonthStart(0),
                CalendarEvent::MonthEnd(0),
                CalendarEvent::MonthStart(1),
            ]
        );
    }

    #[test]
    fn save_load_roundtrip() {
        let cfg = config();
        let mut game = running(&cfg);
        game.purchase_upgrade("bug-fixing-value-1").unwrap();
        game.wallet_mut().gain_currency(&Currency::prestige(Decimal::new(500, 0)));
        game.purchase_skill("skill-bug-fixing-spawn").unwrap();
        game.update(13.0);
        let saved = game.save().unwrap();
        for key in ["settings", "wallet", "year-tracker", "prestige", "mini-games"] {
            assert!(saved.get(key).is_some(), "missing {key}");
        }

        let mut restored = Game::new(&cfg);
        restored.initialize().unwrap();
        restored.load(&saved).unwrap();
        assert_eq!(restored.save().unwrap(), saved);
        assert_eq!(restored.year_tracker().month(), 1);
        assert_eq!(restored.money(), game.money());
        assert_eq!(
            restored.prestige().skill_tree.bought_count_of_type(UpgradeType::BugFixingSpawn),
            1
        );
    }

    #[test]
    fn empty_save_gives_defaults() {
        let cfg = config();
        let mut game = Game::new(&cfg);
        game.initialize().unwrap();
        game.load(&json!({})).unwrap();
        assert_eq!(game.money(), Decimal::new(1_000, 0));
        assert_eq!(game.year_tracker().month(), 0);
        assert_eq!(game.year_tracker().phase(), YearPhase::InProgress);
    }

    #[test]
    fn identical_runs_are_deterministic() {
        let cfg = config();
        let mut a = running(&cfg);
        let mut b = running(&cfg);
        for i in 0..200 {
            let delta = 0.25 + (i % 3) as f64 * 0.1;
            a.update(delta);
            b.update(delta);
        }
        assert_eq!(a.save().unwrap(), b.save().unwrap());
        assert_eq!(a.mini_games().bug_fixing.bugs(), b.mini_games().bug_fixing.bugs());
    }

    #[test]
    fn cursor_moves_are_paid_from_the_wallet() {
        let mut game = running(&config());
        let before = game.money();
        assert!(game.move_bug_cursor_down());
        assert_eq!(game.mini_games().bug_fixing.cursor(), 2);
        assert_eq!(game.money(), before - Decimal::new(10, 0));
        assert!(game.move_bug_cursor_up());
        assert_eq!(game.mini_games().bug_fixing.cursor(), 1);
    }

    #[test]
    fn new_year_requires_year_end() {
        let mut game = running(&config());
        assert_eq!(game.start_new_year(), Err(YearError::YearInProgress(0)));
        finish_year(&mut game);
        game.start_new_year().unwrap();
        assert_eq!(game.year_tracker().month(), 0);
        assert!(!game.year_ended());
    }

    #[test]
    fn new_year_pays_rewards_and_keeps_skills() {
        let mut game = running(&config());
        game.wallet_mut().gain_currency(&Currency::prestige(Decimal::new(50, 0)));
        game.purchase_skill("skill-bug-fixing-value").unwrap();
        game.purchase_upgrade("bug-fixing-value-1").unwrap();
        finish_year(&mut game);
        game.mini_games_mut().bug_fixing.base_mut().record_progress(1_000.0);

        game.start_new_year().unwrap();
        assert_eq!(game.prestige_points(), Decimal::new(100, 0));
        assert!(game.mini_games().bug_fixing.upgrades().bought_ids().is_empty());
        assert_eq!(game.mini_games().bug_fixing.squashed(), 0.0);
        assert_eq!(
            game.prestige().skill_tree.bought_count_of_type(UpgradeType::BugFixingValue),
            1
        );
    }

    #[test]
    fn reset_wipes_skills_and_counters() {
        let mut game = running(&config());
        game.wallet_mut().gain_currency(&Currency::prestige(Decimal::new(50, 0)));
        game.purchase_skill("skill-bug-fixing-value").unwrap();
        game.update(1.0);
        game.reset();
        assert_eq!(game.ticks(), 0);
        assert!(game.prestige().skill_tree.book().bought_ids().is_empty());
        assert_eq!(game.money(), Decimal::new(1_000, 0));
    }

    #[test]
    fn settings_are_reachable_through_the_game() {
        let mut game = running(&config());
        assert!(game.settings().autosave_enabled());
        game.settings_mut().set(AUTOSAVE, OptionValue::Bool(false)).unwrap();
        assert!(!game.settings().autosave_enabled());
    }

    #[test]
    fn lane_removal_keeps_cursor_on_a_lane() {
        let mut game = running(&config());
        assert!(game.move_bug_cursor_down());
        assert!(game.move_bug_cursor_down());
        assert_eq!(game.mini_games().bug_fixing.cursor(), 3);
        game.purchase_upgrade("bug-fixing-remove-lane").unwrap();
        let bugs = &game.mini_games().bug_fixing;
        assert_eq!(bugs.lane_count(&game.prestige().skill_tree), 3);
        assert_eq!(bugs.cursor(), 2);
    }

    #[test]
    fn new_year_with_one_lane_left_still_scores() {
        let mut game = running(&config());
        game.wallet_mut().gain_currency(&Currency::prestige(Decimal::new(600, 0)));
        for i in 1..=3 {
            game.purchase_skill(&format!("skill-bug-fixing-remove-lane-{i}")).unwrap();
        }
        assert_eq!(game.mini_games().bug_fixing.cursor(), 0);
        finish_year(&mut game);
        game.start_new_year().unwrap();
        assert_eq!(game.mini_games().bug_fixing.cursor(), 0);
        for _ in 0..100 {
            game.update(1.0);
        }
        assert!(game.mini_games().bug_fixing.squashed() > 0.0);
    }

    #[test]
    fn load_fits_cursor_to_saved_skills() {
        let mut game = Game::new(&config());
        game.initialize().unwrap();
        game.load(&json!({"prestige": {"boughtSkills": [
            "skill-bug-fixing-remove-lane-1",
            "skill-bug-fixing-remove-lane-2",
            "skill-bug-fixing-remove-lane-3",
        ]}}))
        .unwrap();
        let bugs = &game.mini_games().bug_fixing;
        assert_eq!(bugs.lane_count(&game.prestige().skill_tree), 1);
        assert_eq!(bugs.cursor(), 0);
        assert!(bugs.bugs().is_empty());
    }
}
