//! Bug fixing: bugs crawl down lanes toward the player, who moves a cursor
//! between lanes to catch them. A bug reaching the end of its lane is
//! squashed if the cursor is on that lane and silently lost otherwise.
//!
//! The cursor always sits on an existing lane. Removing lanes pulls it back
//! and drops any bug left on a lane that is gone.
//!
//! Only the squashed score is persisted. Loading clears upgrade purchases,
//! live bugs and the cursor before restoring it.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::{Currency, MiniGameUpgrade, Observable, SubscriptionId, UpgradeType, YearRequirement};
use sim_econ::{scale_currency, try_spend, CurrencyWallet, MultiplierSource, MultiplierTable};
use tracing::{debug, warn};

use crate::feature::{Feature, TickContext};
use crate::minigame::{MiniGame, MiniGameBase};

/// Lanes available before any lane-removal upgrade.
pub const BASE_LANE_COUNT: usize = 4;
/// Spawn interval in months before spawn upgrades.
pub const BASE_SPAWN_TIME: f64 = 0.1;
/// Score per squashed bug before value upgrades.
pub const BASE_SQUASH_VALUE: f64 = 1.0;
/// Lane lengths travelled per month.
pub const BUG_SPEED: f64 = 2.0;
/// Chance that a new bug reuses the previous spawn lane.
pub const REPEAT_LANE_CHANCE: f64 = 0.25;

const START_LANE: usize = 1;

fn base_switch_cost() -> Currency {
    Currency::money(Decimal::new(10, 0))
}

/// A bug crawling toward position 0 on `lane`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bug {
    /// Remaining distance; 1 is a full lane.
    pub position: f64,
    pub lane: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BugFixingSaveData {
    pub squashed: f64,
}

pub struct BugFixingMiniGame {
    base: MiniGameBase,
    squashed: Observable<f64>,
    cursor: Observable<usize>,
    bugs: Vec<Bug>,
    current_month_time: f64,
    last_lane_spawned: usize,
    rng: ChaCha8Rng,
}

impl BugFixingMiniGame {
    pub fn new(budget_requirement: Decimal, seed: u64) -> Self {
        Self {
            base: MiniGameBase::new(budget_requirement),
            squashed: Observable::new(0.0),
            cursor: Observable::new(START_LANE),
            bugs: Vec::new(),
            current_month_time: 0.0,
            last_lane_spawned: START_LANE,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn catalog() -> Vec<MiniGameUpgrade> {
        let money = |n: i64| Currency::money(Decimal::new(n, 0));
        vec![
            MiniGameUpgrade::new(
                "bug-fixing-movement-cost",
                "Reduce the cost of switching lanes by 30%",
                money(100),
                0.70,
                UpgradeType::BugFixingMoveCost,
            ),
            MiniGameUpgrade::new(
                "bug-fixing-value-1",
                "Improve bug value by 50%",
                money(100),
                1.50,
                UpgradeType::BugFixingValue,
            ),
            MiniGameUpgrade::new(
                "bug-fixing-value-2",
                "Improve bug value by 50%",
                money(150),
                1.50,
                UpgradeType::BugFixingValue,
            ),
            MiniGameUpgrade::new(
                "bug-fixing-remove-lane",
                "Remove a lane",
                money(150),
                1.00,
                UpgradeType::BugFixingReduceLane,
            ),
            MiniGameUpgrade::new(
                "bug-fixing-spawn-1",
                "Bugs spawn 25% more often",
                money(100),
                1.25,
                UpgradeType::BugFixingSpawn,
            ),
            MiniGameUpgrade::new(
                "bug-fixing-spawn-2",
                "Bugs spawn 25% more often",
                money(150),
                1.25,
                UpgradeType::BugFixingSpawn,
            ),
        ]
    }

    pub fn squashed(&self) -> f64 {
        self.squashed.value()
    }

    pub fn cursor(&self) -> usize {
        self.cursor.value()
    }

    pub fn bugs(&self) -> &[Bug] {
        &self.bugs
    }

    pub fn bugs_on_lane(&self, lane: usize) -> impl Iterator<Item = &Bug> + '_ {
        self.bugs.iter().filter(move |b| b.lane == lane)
    }

    pub fn observe_squashed<F: FnMut(&f64) + 'static>(&mut self, handler: F) -> SubscriptionId {
        self.squashed.subscribe(handler)
    }

    pub fn observe_cursor<F: FnMut(&usize) + 'static>(&mut self, handler: F) -> SubscriptionId {
        self.cursor.subscribe(handler)
    }

    /// Lanes left after removals from both sources, never below 0.
    pub fn lane_count(&self, boosts: &dyn MultiplierSource) -> usize {
        let removed = self.stacked(boosts).count(UpgradeType::BugFixingReduceLane);
        BASE_LANE_COUNT.saturating_sub(removed)
    }

    /// Price of one cursor move.
    pub fn switch_cost(&self, boosts: &dyn MultiplierSource) -> Currency {
        let factor = self.stacked(boosts).multiplier(UpgradeType::BugFixingMoveCost);
        scale_currency(base_switch_cost(), factor)
    }

    /// Months between spawns; spawn upgrades shorten it.
    pub fn spawn_time(&self, boosts: &dyn MultiplierSource) -> f64 {
        BASE_SPAWN_TIME / self.stacked(boosts).multiplier(UpgradeType::BugFixingSpawn)
    }

    pub fn squash_value(&self, boosts: &dyn MultiplierSource) -> f64 {
        BASE_SQUASH_VALUE * self.stacked(boosts).multiplier(UpgradeType::BugFixingValue)
    }

    /// Move the cursor one lane up if the wallet can pay for it.
    /// The move is charged even when the cursor is already at the top.
    pub fn move_up(&mut self, wallet: &mut dyn CurrencyWallet, boosts: &dyn MultiplierSource) -> bool {
        let cost = self.switch_cost(boosts);
        if !try_spend(wallet, &cost) {
            debug!(%cost, "cannot afford lane switch");
            return false;
        }
        let next = self.cursor().saturating_sub(1);
        self.cursor.set(next);
        true
    }

    /// Move the cursor one lane down if the wallet can pay for it.
    pub fn move_down(&mut self, wallet: &mut dyn CurrencyWallet, boosts: &dyn MultiplierSource) -> bool {
        let cost = self.switch_cost(boosts);
        if !try_spend(wallet, &cost) {
            debug!(%cost, "cannot afford lane switch");
            return false;
        }
        let last = self.lane_count(boosts).saturating_sub(1);
        let next = (self.cursor() + 1).min(last);
        self.cursor.set(next);
        true
    }

    /// Pull the cursor back onto an existing lane and drop bugs on lanes
    /// that no longer exist. With no lanes left the cursor rests on 0.
    pub fn clamp_to_lanes(&mut self, boosts: &dyn MultiplierSource) {
        let lanes = self.lane_count(boosts);
        let cursor = self.cursor().min(lanes.saturating_sub(1));
        self.cursor.set(cursor);
        let before = self.bugs.len();
        self.bugs.retain(|bug| bug.lane < lanes);
        let dropped = before - self.bugs.len();
        if dropped > 0 {
            debug!(dropped, lanes, "bugs on removed lanes dropped");
        }
    }

    /// Spawn a bug at the start of a lane. With no lanes left nothing spawns.
    pub fn spawn_bug(&mut self, boosts: &dyn MultiplierSource) -> Option<Bug> {
        let lanes = self.lane_count(boosts);
        if lanes == 0 {
            debug!("no lanes left, bug not spawned");
            return None;
        }
        let repeat = self.rng.gen_bool(REPEAT_LANE_CHANCE);
        let fresh = self.rng.gen_range(0..lanes);
        let lane = if repeat && self.last_lane_spawned < lanes {
            self.last_lane_spawned
        } else {
            fresh
        };
        self.last_lane_spawned = lane;
        let bug = Bug {
            position: 1.0,
            lane,
        };
        self.bugs.push(bug);
        Some(bug)
    }

    fn add_score(&mut self, amount: f64) {
        let total = self.squashed() + amount;
        self.squashed.set(total);
        self.base.record_progress(total);
    }

    fn clear_board(&mut self) {
        self.bugs.clear();
        self.current_month_time = 0.0;
        self.cursor.set(START_LANE);
        self.last_lane_spawned = START_LANE;
    }
}

impl Feature for BugFixingMiniGame {
    type SaveData = BugFixingSaveData;

    fn name(&self) -> &'static str {
        "Bug Fixing"
    }

    fn save_key(&self) -> &'static str {
        "bug-fixing"
    }

    fn initialize(&mut self) {
        if self.base.upgrades().catalog().is_empty() {
            self.base.upgrades_mut().extend(Self::catalog());
        }
        if self.base.year_requirements().is_empty() {
            self.base.add_requirement(YearRequirement::new(
                "Quality Assurance - Fix bugs",
                1000.0,
                Currency::prestige(Decimal::new(100, 0)),
            ));
        }
        // The skill tree is not loaded yet, so spawn against the base lanes.
        self.spawn_bug(&MultiplierTable::default());
    }

    /// Lane removals bought since the last tick, skills included, take
    /// effect before anything moves.
    fn update(&mut self, delta: f64, ctx: &TickContext<'_>) {
        self.clamp_to_lanes(ctx.boosts);
        let month_delta = ctx.clock.seconds_to_month_percentage(delta);
        if !month_delta.is_finite() || month_delta < 0.0 {
            warn!(delta, "ignoring invalid tick delta");
            return;
        }
        self.current_month_time += month_delta;

        let cursor = self.cursor();
        let value = self.squash_value(ctx.boosts);
        let mut gained = 0.0;
        self.bugs.retain_mut(|bug| {
            bug.position -= BUG_SPEED * month_delta;
            if bug.position > 0.0 {
                return true;
            }
            if bug.lane == cursor {
                gained += value;
            }
            false
        });
        if gained > 0.0 {
            self.add_score(gained);
        }

        if self.current_month_time >= self.spawn_time(ctx.boosts) {
            self.current_month_time = 0.0;
            self.spawn_bug(ctx.boosts);
        }
    }

    fn load(&mut self, data: BugFixingSaveData) {
        let squashed = if data.squashed.is_finite() && data.squashed >= 0.0 {
            data.squashed
        } else {
            warn!(squashed = data.squashed, "invalid saved score, using 0");
            0.0
        };
        self.base.reset_run();
        self.clear_board();
        self.squashed.set(squashed);
        self.base.record_progress(squashed);
    }

    fn save(&self) -> BugFixingSaveData {
        BugFixingSaveData {
            squashed: self.squashed(),
        }
    }

    /// Clears the run: score, purchases, requirement progress, live bugs
    /// and the cursor. The catalog is kept.
    /// Skill removals are not visible here; the next tick clamps against them.
    fn reset(&mut self) {
        self.squashed.set(0.0);
        self.base.reset_run();
        self.clear_board();
    }
}

impl MiniGame for BugFixingMiniGame {
    fn base(&self) -> &MiniGameBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut MiniGameBase {
        &mut self.base
    }

    fn upgrade_bought(&mut self, kind: UpgradeType) {
        if kind == UpgradeType::BugFixingReduceLane {
            self.clamp_to_lanes(&MultiplierTable::default());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::year::MonthClock;
    use proptest::prelude::*;
    use serde_json::json;
    use sim_core::CurrencyType;
    use sim_econ::{UpgradeBook, Wallet};

    fn game() -> BugFixingMiniGame {
        let mut g = BugFixingMiniGame::new(Decimal::new(1000, 0), 7);
        g.initialize();
        g.bugs.clear();
        g
    }

    fn skill_lanes(n: usize) -> UpgradeBook {
        let mut b = UpgradeBook::new();
        for i in 0..n {
            let id = format!("skill-lane-{i}");
            b.add(MiniGameUpgrade::new(
                id.as_str(),
                "Remove a lane",
                Currency::prestige(Decimal::ONE),
                1.0,
                UpgradeType::BugFixingReduceLane,
            ))
            .unwrap();
            b.mark_bought(&id).unwrap();
        }
        b
    }

    fn tick(g: &mut BugFixingMiniGame, delta: f64, boosts: &dyn MultiplierSource) {
        let ctx = TickContext {
            clock: MonthClock::new(1.0),
            boosts,
        };
        g.update(delta, &ctx);
    }

    #[test]
    fn initialize_builds_catalog_and_spawns() {
        let mut g = BugFixingMiniGame::new(Decimal::new(1000, 0), 1);
        g.initialize();
        assert_eq!(g.upgrades().catalog().len(), 6);
        assert_eq!(g.year_requirements().len(), 1);
        assert_eq!(g.bugs().len(), 1);
        assert_eq!(g.bugs()[0].position, 1.0);
        g.initialize();
        assert_eq!(g.upgrades().catalog().len(), 6);
        assert_eq!(g.year_requirements().len(), 1);
    }

    #[test]
    fn bug_on_cursor_lane_is_squashed() {
        let mut g = game();
        let boosts = MultiplierTable::default();
        g.bugs.push(Bug {
            position: 1.0,
            lane: g.cursor(),
        });
        tick(&mut g, 0.25, &boosts);
        assert_eq!(g.squashed(), 0.0);
        tick(&mut g, 0.25, &boosts);
        assert_eq!(g.squashed(), g.squash_value(&boosts));
        assert!(g.bugs().iter().all(|b| b.position > 0.0));
    }

    #[test]
    fn bug_on_other_lane_is_lost() {
        let mut g = game();
        let boosts = MultiplierTable::default();
        g.bugs.push(Bug {
            position: 1.0,
            lane: 3,
        });
        tick(&mut g, 0.5, &boosts);
        assert_eq!(g.squashed(), 0.0);
        assert!(g.bugs().iter().all(|b| b.position > 0.0));
    }

    #[test]
    fn spawn_cadence_follows_spawn_time() {
        let mut g = game();
        let boosts = MultiplierTable::default();
        tick(&mut g, 0.05, &boosts);
        assert!(g.bugs().is_empty());
        tick(&mut g, 0.05, &boosts);
        assert_eq!(g.bugs().len(), 1);
        assert_eq!(g.current_month_time, 0.0);
    }

    #[test]
    fn upgrades_from_both_sources_stack() {
        let mut g = game();
        let mut wallet = Wallet::with_money(Decimal::new(1000, 0));
        let mut skills = UpgradeBook::new();
        skills.extend([
            MiniGameUpgrade::new(
                "skill-value",
                "Double bug value",
                Currency::prestige(Decimal::ONE),
                2.0,
                UpgradeType::BugFixingValue,
            ),
            MiniGameUpgrade::new(
                "skill-spawn",
                "Bugs spawn twice as often",
                Currency::prestige(Decimal::ONE),
                2.0,
                UpgradeType::BugFixingSpawn,
            ),
        ]);
        skills.mark_bought("skill-value").unwrap();
        skills.mark_bought("skill-spawn").unwrap();

        g.purchase_upgrade("bug-fixing-value-1", &mut wallet).unwrap();
        g.purchase_upgrade("bug-fixing-value-2", &mut wallet).unwrap();
        g.purchase_upgrade("bug-fixing-spawn-1", &mut wallet).unwrap();
        assert_eq!(g.squash_value(&skills), 4.5);
        assert_eq!(g.spawn_time(&skills), 0.1 / 2.5);
        assert_eq!(wallet.balance(CurrencyType::Money), Decimal::new(650, 0));
    }

    #[test]
    fn lane_count_never_negative() {
        let mut g = game();
        let mut wallet = Wallet::with_money(Decimal::new(1000, 0));
        assert_eq!(g.lane_count(&MultiplierTable::default()), 4);
        g.purchase_upgrade("bug-fixing-remove-lane", &mut wallet).unwrap();
        assert_eq!(g.lane_count(&skill_lanes(2)), 1);
        assert_eq!(g.lane_count(&skill_lanes(3)), 0);
        assert_eq!(g.lane_count(&skill_lanes(4)), 0);
        assert!(g.spawn_bug(&skill_lanes(4)).is_none());
    }

    #[test]
    fn moves_cost_money_and_clamp() {
        let mut g = game();
        let boosts = MultiplierTable::default();
        let mut wallet = Wallet::with_money(Decimal::new(40, 0));
        assert!(g.move_up(&mut wallet, &boosts));
        assert_eq!(g.cursor(), 0);
        assert!(g.move_up(&mut wallet, &boosts));
        assert_eq!(g.cursor(), 0);
        assert!(g.move_down(&mut wallet, &boosts));
        assert_eq!(g.cursor(), 1);
        assert_eq!(wallet.balance(CurrencyType::Money), Decimal::new(10, 0));

        let lanes = skill_lanes(3);
        assert!(g.move_down(&mut wallet, &lanes));
        assert_eq!(g.cursor(), 0);
        assert_eq!(wallet.balance(CurrencyType::Money), Decimal::ZERO);
    }

    #[test]
    fn moves_without_funds_change_nothing() {
        let mut g = game();
        let boosts = MultiplierTable::default();
        let mut wallet = Wallet::with_money(Decimal::new(9, 0));
        assert!(!g.move_up(&mut wallet, &boosts));
        assert!(!g.move_down(&mut wallet, &boosts));
        assert_eq!(g.cursor(), 1);
        assert_eq!(wallet.balance(CurrencyType::Money), Decimal::new(9, 0));
    }

    #[test]
    fn move_cost_discount_applies() {
        let mut g = game();
        let mut wallet = Wallet::with_money(Decimal::new(100, 0));
        g.purchase_upgrade("bug-fixing-movement-cost", &mut wallet).unwrap();
        let cost = g.switch_cost(&MultiplierTable::default());
        assert_eq!(cost, Currency::money(Decimal::new(7, 0)));
    }

    #[test]
    fn spawns_are_seeded() {
        let boosts = MultiplierTable::default();
        let mut a = BugFixingMiniGame::new(Decimal::ZERO, 99);
        let mut b = BugFixingMiniGame::new(Decimal::ZERO, 99);
        let la: Vec<usize> = (0..20).filter_map(|_| a.spawn_bug(&boosts)).map(|x| x.lane).collect();
        let lb: Vec<usize> = (0..20).filter_map(|_| b.spawn_bug(&boosts)).map(|x| x.lane).collect();
        assert_eq!(la, lb);
        assert!(la.iter().all(|&l| l < BASE_LANE_COUNT));
    }

    #[test]
    fn save_load_roundtrip_keeps_only_score() {
        let mut g = game();
        let mut wallet = Wallet::with_money(Decimal::new(1000, 0));
        g.purchase_upgrade("bug-fixing-value-1", &mut wallet).unwrap();
        g.add_score(42.5);
        let json = serde_json::to_value(g.save()).unwrap();
        assert_eq!(json, json!({"squashed": 42.5}));

        let mut fresh = BugFixingMiniGame::new(Decimal::new(1000, 0), 7);
        fresh.initialize();
        let data = fresh.parse_save_data(&json);
        fresh.load(data);
        assert_eq!(fresh.squashed(), 42.5);
        assert!(fresh.bought_upgrades_of_type(UpgradeType::BugFixingValue).is_empty());
        assert_eq!(fresh.year_requirements()[0].progress, 42.5);
        assert!(fresh.bugs().is_empty());
        assert_eq!(fresh.parse_save_data(&json!({})).squashed, 0.0);
    }

    #[test]
    fn load_clears_the_board() {
        let mut g = game();
        let boosts = MultiplierTable::default();
        let mut wallet = Wallet::with_money(Decimal::new(1000, 0));
        g.purchase_upgrade("bug-fixing-spawn-1", &mut wallet).unwrap();
        g.move_down(&mut wallet, &boosts);
        g.spawn_bug(&boosts);
        tick(&mut g, 0.05, &boosts);
        g.load(BugFixingSaveData { squashed: 3.0 });
        assert_eq!(g.squashed(), 3.0);
        assert!(g.bugs().is_empty());
        assert_eq!(g.cursor(), START_LANE);
        assert_eq!(g.current_month_time, 0.0);
        assert!(g.upgrades().bought_ids().is_empty());
    }

    #[test]
    fn lane_removal_purchase_pulls_cursor_back() {
        let mut g = game();
        let boosts = MultiplierTable::default();
        let mut wallet = Wallet::with_money(Decimal::new(1000, 0));
        g.move_down(&mut wallet, &boosts);
        g.move_down(&mut wallet, &boosts);
        assert_eq!(g.cursor(), 3);
        g.bugs.push(Bug {
            position: 0.5,
            lane: 3,
        });
        g.purchase_upgrade("bug-fixing-remove-lane", &mut wallet).unwrap();
        assert_eq!(g.lane_count(&boosts), 3);
        assert_eq!(g.cursor(), 2);
        assert!(g.bugs().is_empty());
    }

    #[test]
    fn tick_applies_skill_lane_removals() {
        let mut g = game();
        for lane in 0..BASE_LANE_COUNT {
            g.bugs.push(Bug {
                position: 1.0,
                lane,
            });
        }
        tick(&mut g, 0.01, &skill_lanes(2));
        assert_eq!(g.cursor(), 1);
        assert_eq!(g.bugs().iter().map(|b| b.lane).collect::<Vec<_>>(), vec![0, 1]);

        tick(&mut g, 0.01, &skill_lanes(3));
        assert_eq!(g.cursor(), 0);
        assert_eq!(g.bugs().iter().map(|b| b.lane).collect::<Vec<_>>(), vec![0]);

        tick(&mut g, 0.01, &skill_lanes(4));
        assert_eq!(g.cursor(), 0);
        assert!(g.bugs().is_empty());
    }

    #[test]
    fn single_lane_run_after_reset_scores() {
        let mut g = game();
        let skills = skill_lanes(3);
        g.reset();
        assert_eq!(g.cursor(), START_LANE);
        for _ in 0..40 {
            tick(&mut g, 0.05, &skills);
        }
        assert_eq!(g.cursor(), 0);
        assert!(g.squashed() > 0.0);
    }

    #[test]
    fn reset_clears_the_run() {
        let mut g = game();
        let mut wallet = Wallet::with_money(Decimal::new(1000, 0));
        g.purchase_upgrade("bug-fixing-spawn-1", &mut wallet).unwrap();
        g.add_score(5.0);
        g.spawn_bug(&MultiplierTable::default());
        g.reset();
        assert_eq!(g.squashed(), 0.0);
        assert!(g.bugs().is_empty());
        assert!(g.upgrades().bought_ids().is_empty());
        assert_eq!(g.upgrades().catalog().len(), 6);
        assert_eq!(g.cursor(), START_LANE);
    }

    proptest! {
        #[test]
        fn lane_count_floor(local in 0usize..2, shared in 0usize..8) {
            let mut g = game();
            let mut wallet = Wallet::with_money(Decimal::new(1000, 0));
            if local == 1 {
                g.purchase_upgrade("bug-fixing-remove-lane", &mut wallet).unwrap();
            }
            let expected = BASE_LANE_COUNT.saturating_sub(local + shared);
            prop_assert_eq!(g.lane_count(&skill_lanes(shared)), expected);
        }
    }
}
