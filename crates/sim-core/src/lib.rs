#![deny(warnings)]

//! Core domain models and invariants for Dev Year.
//!
//! This crate defines the serializable value types shared by every feature
//! of the simulation (currencies, upgrade definitions, yearly milestones and
//! the game configuration) with validation helpers that guarantee basic
//! invariants. Observer primitives live in [`events`].

pub mod events;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use events::{Observable, Signal, SubscriptionId};

/// Kinds of currency tracked by the wallet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CurrencyType {
    /// Regular in-year money, spent on minigame upgrades and lane switches.
    Money,
    /// Cross-year currency, spent on the skill tree.
    PrestigePoints,
}

impl CurrencyType {
    /// Every currency type, in a stable order.
    pub const ALL: [CurrencyType; 2] = [CurrencyType::Money, CurrencyType::PrestigePoints];
}

impl fmt::Display for CurrencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurrencyType::Money => write!(f, "money"),
            CurrencyType::PrestigePoints => write!(f, "prestige"),
        }
    }
}

/// An amount of a single currency. Compared by (amount, kind).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency {
    pub amount: Decimal,
    pub kind: CurrencyType,
}

impl Currency {
    pub fn new(amount: Decimal, kind: CurrencyType) -> Self {
        Self { amount, kind }
    }

    pub fn money(amount: Decimal) -> Self {
        Self::new(amount, CurrencyType::Money)
    }

    pub fn prestige(amount: Decimal) -> Self {
        Self::new(amount, CurrencyType::PrestigePoints)
    }

    pub fn is_negative(&self) -> bool {
        self.amount < Decimal::ZERO
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.kind)
    }
}

/// Closed set of categories an upgrade multiplier can apply to.
///
/// Minigame upgrades and skill tree nodes share these tags, which is what
/// lets the two sources stack on the same base quantity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UpgradeType {
    /// Scales the cost of switching the bug-fixing lane cursor.
    BugFixingMoveCost,
    /// Scales the score awarded per squashed bug.
    BugFixingValue,
    /// Each purchase removes one bug-fixing lane; the multiplier is unused.
    BugFixingReduceLane,
    /// Divides the bug spawn interval.
    BugFixingSpawn,
}

impl UpgradeType {
    /// Every upgrade category, in declaration order.
    pub const ALL: [UpgradeType; 4] = [
        UpgradeType::BugFixingMoveCost,
        UpgradeType::BugFixingValue,
        UpgradeType::BugFixingReduceLane,
        UpgradeType::BugFixingSpawn,
    ];
}

/// Immutable definition of a purchasable upgrade.
///
/// Whether it has been bought is tracked by the owner of the catalog, keyed
/// by `id`. `multiplier_value` is a ratio (1.5 = +50%, 0.7 = -30%) and is
/// always combined multiplicatively.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MiniGameUpgrade {
    /// Unique identifier, e.g. "bug-fixing-value-1".
    pub id: String,
    /// Player-facing description.
    pub description: String,
    /// Price of the upgrade.
    pub cost: Currency,
    /// Ratio applied to the base quantity selected by `kind`.
    pub multiplier_value: f64,
    /// Category this upgrade affects.
    pub kind: UpgradeType,
}

impl MiniGameUpgrade {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        cost: Currency,
        multiplier_value: f64,
        kind: UpgradeType,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            cost,
            multiplier_value,
            kind,
        }
    }
}

/// A per-year milestone owned by a minigame, cleared at every new year.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct YearRequirement {
    pub description: String,
    /// Progress needed to complete the requirement.
    pub target: f64,
    /// Current progress (>= 0).
    pub progress: f64,
    /// Paid out at the end of the year when completed.
    pub reward: Currency,
}

impl YearRequirement {
    pub fn new(description: impl Into<String>, target: f64, reward: Currency) -> Self {
        Self {
            description: description.into(),
            target,
            progress: 0.0,
            reward,
        }
    }

    /// Record progress; non-finite or negative values are ignored.
    pub fn set_progress(&mut self, progress: f64) {
        if progress.is_finite() && progress >= 0.0 {
            self.progress = progress;
        }
    }

    pub fn is_completed(&self) -> bool {
        self.progress >= self.target
    }

    /// Completion ratio clamped to [0, 1].
    pub fn completion(&self) -> f64 {
        if self.target <= 0.0 {
            return 1.0;
        }
        (self.progress / self.target).clamp(0.0, 1.0)
    }

    pub fn reset(&mut self) {
        self.progress = 0.0;
    }
}

fn default_real_month_time() -> f64 {
    15.0
}

fn default_bug_fixing_budget() -> Decimal {
    Decimal::new(1000, 0)
}

fn default_rng_seed() -> u64 {
    42
}

/// Game configuration parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Real-time seconds mapped to one in-game month (default: 15.0).
    #[serde(default = "default_real_month_time")]
    pub real_month_time: f64,
    /// Minimum wallet balance needed to unlock the bug-fixing minigame.
    #[serde(default = "default_bug_fixing_budget")]
    pub bug_fixing_budget: Decimal,
    /// Money credited to a fresh wallet.
    pub starting_money: Decimal,
    /// Seed for deterministic RNG.
    #[serde(default = "default_rng_seed")]
    pub rng_seed: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            real_month_time: default_real_month_time(),
            bug_fixing_budget: default_bug_fixing_budget(),
            starting_money: Decimal::ZERO,
            rng_seed: default_rng_seed(),
        }
    }
}

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Numeric field must be finite.
    #[error("non-finite numeric value encountered")]
    NonFinite,
    /// Month duration must be strictly positive.
    #[error("real month time must be > 0, got {0}")]
    NonPositiveMonthTime(f64),
    /// Price, cost or balance must be non-negative.
    #[error("negative monetary value is invalid")]
    NegativeMoney,
    /// Multipliers are ratios and must be strictly positive.
    #[error("multiplier for {id} must be > 0, got {value}")]
    NonPositiveMultiplier { id: String, value: f64 },
    /// Identifiers must not be blank.
    #[error("identifier must not be empty")]
    EmptyId,
    /// Year requirement target must be positive and finite.
    #[error("requirement target must be > 0")]
    InvalidTarget,
}

/// Validate an upgrade definition.
pub fn validate_upgrade(u: &MiniGameUpgrade) -> Result<(), ValidationError> {
    if u.id.trim().is_empty() {
        return Err(ValidationError::EmptyId);
    }
    if !u.multiplier_value.is_finite() {
        return Err(ValidationError::NonFinite);
    }
    if u.multiplier_value <= 0.0 {
        return Err(ValidationError::NonPositiveMultiplier {
            id: u.id.clone(),
            value: u.multiplier_value,
        });
    }
    if u.cost.is_negative() {
        return Err(ValidationError::NegativeMoney);
    }
    Ok(())
}

/// Validate a year requirement definition.
pub fn validate_requirement(r: &YearRequirement) -> Result<(), ValidationError> {
    if !(r.target.is_finite() && r.target > 0.0) {
        return Err(ValidationError::InvalidTarget);
    }
    if r.reward.is_negative() {
        return Err(ValidationError::NegativeMoney);
    }
    Ok(())
}

/// Validate configuration values before a game is built from them.
pub fn validate_config(cfg: &GameConfig) -> Result<(), ValidationError> {
    if !cfg.real_month_time.is_finite() {
        return Err(ValidationError::NonFinite);
    }
    if cfg.real_month_time <= 0.0 {
        return Err(ValidationError::NonPositiveMonthTime(cfg.real_month_time));
    }
    if cfg.bug_fixing_budget < Decimal::ZERO || cfg.starting_money < Decimal::ZERO {
        return Err(ValidationError::NegativeMoney);
    }
    Ok(())
}
