#![deny(warnings)]

//! Economic models: wallets and upgrade multipliers for Dev Year.
//!
//! This module provides:
//! - The wallet contract consumed by minigames ([`CurrencyWallet`]) and an
//!   in-memory implementation ([`Wallet`])
//! - A purchasable upgrade catalog with purchase-order tracking ([`UpgradeBook`])
//! - Multiplier aggregation across independent upgrade sources
//!   ([`MultiplierSource`], [`MultiplierStack`], [`MultiplierTable`])

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use sim_core::{validate_upgrade, Currency, CurrencyType, MiniGameUpgrade, UpgradeType, ValidationError};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors produced by upgrade catalogs and purchases.
#[derive(Debug, Error, PartialEq)]
pub enum UpgradeError {
    /// The definition failed validation.
    #[error("invalid upgrade definition: {0}")]
    Invalid(#[from] ValidationError),
    /// An upgrade with this id is already in the catalog.
    #[error("duplicate upgrade id: {0}")]
    Duplicate(String),
    /// No upgrade with this id exists in the catalog.
    #[error("unknown upgrade: {0}")]
    Unknown(String),
    /// The upgrade has already been bought.
    #[error("upgrade already purchased: {0}")]
    AlreadyPurchased(String),
    /// The wallet cannot cover the upgrade cost.
    #[error("insufficient funds for {id}: costs {cost}")]
    InsufficientFunds { id: String, cost: Currency },
}

/// Currency bookkeeping consumed by minigames and the skill tree.
///
/// Callers check [`CurrencyWallet::has_currency`] before
/// [`CurrencyWallet::lose_currency`]; use [`try_spend`] to do both under a
/// single mutable borrow.
pub trait CurrencyWallet {
    fn has_currency(&self, amount: &Currency) -> bool;
    fn lose_currency(&mut self, amount: &Currency);
    fn gain_currency(&mut self, amount: &Currency);
}

/// Debit `cost` if the wallet can cover it. Returns whether it was debited.
pub fn try_spend<W: CurrencyWallet + ?Sized>(wallet: &mut W, cost: &Currency) -> bool {
    if !wallet.has_currency(cost) {
        return false;
    }
    wallet.lose_currency(cost);
    true
}

/// Balance per currency type. Balances never go negative.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Wallet {
    balances: BTreeMap<CurrencyType, Decimal>,
}

impl Wallet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wallet pre-funded with `amount` money.
    pub fn with_money(amount: Decimal) -> Self {
        let mut w = Self::new();
        w.gain_currency(&Currency::money(amount));
        w
    }

    pub fn balance(&self, kind: CurrencyType) -> Decimal {
        self.balances.get(&kind).copied().unwrap_or(Decimal::ZERO)
    }

    /// Overwrite a balance. Negative amounts are rejected with a warning.
    pub fn set_balance(&mut self, kind: CurrencyType, amount: Decimal) -> bool {
        if amount < Decimal::ZERO {
            warn!(%kind, %amount, "refusing to set negative balance");
            return false;
        }
        self.balances.insert(kind, amount);
        true
    }

    pub fn balances(&self) -> impl Iterator<Item = (CurrencyType, Decimal)> + '_ {
        self.balances.iter().map(|(k, v)| (*k, *v))
    }

    pub fn clear(&mut self) {
        self.balances.clear();
    }
}

impl CurrencyWallet for Wallet {
    fn has_currency(&self, amount: &Currency) -> bool {
        self.balance(amount.kind) >= amount.amount
    }

    fn lose_currency(&mut self, amount: &Currency) {
        if amount.is_negative() {
            warn!(%amount, "cannot lose a negative amount");
            return;
        }
        let current = self.balance(amount.kind);
        if current < amount.amount {
            warn!(%amount, balance = %current, "insufficient balance, nothing debited");
            return;
        }
        self.balances.insert(amount.kind, current - amount.amount);
    }

    fn gain_currency(&mut self, amount: &Currency) {
        if amount.is_negative() {
            warn!(%amount, "cannot gain a negative amount");
            return;
        }
        let current = self.balance(amount.kind);
        self.balances.insert(amount.kind, current + amount.amount);
    }
}

/// Anything that contributes multipliers per [`UpgradeType`].
pub trait MultiplierSource {
    /// Number of purchased upgrades of `kind`.
    fn bought_count_of_type(&self, kind: UpgradeType) -> usize;
    /// Product of the multipliers of purchased upgrades of `kind`; 1 when none.
    fn total_multiplier_for_type(&self, kind: UpgradeType) -> f64;
}

/// Static catalog of upgrades plus the ids bought so far, in purchase order.
#[derive(Clone, Debug, Default)]
pub struct UpgradeBook {
    catalog: Vec<MiniGameUpgrade>,
    bought: Vec<String>,
}

impl UpgradeBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a definition to the catalog.
    pub fn add(&mut self, upgrade: MiniGameUpgrade) -> Result<(), UpgradeError> {
        validate_upgrade(&upgrade)?;
        if self.get(&upgrade.id).is_some() {
            return Err(UpgradeError::Duplicate(upgrade.id));
        }
        self.catalog.push(upgrade);
        Ok(())
    }

    /// Add several definitions, logging and skipping the ones that fail.
    pub fn extend<I>(&mut self, upgrades: I)
    where
        I: IntoIterator<Item = MiniGameUpgrade>,
    {
        for u in upgrades {
            let id = u.id.clone();
            if let Err(e) = self.add(u) {
                warn!(%id, error = %e, "skipping upgrade definition");
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&MiniGameUpgrade> {
        self.catalog.iter().find(|u| u.id == id)
    }

    pub fn catalog(&self) -> &[MiniGameUpgrade] {
        &self.catalog
    }

    pub fn is_bought(&self, id: &str) -> bool {
        self.bought.iter().any(|b| b == id)
    }

    /// Purchased ids, oldest first.
    pub fn bought_ids(&self) -> &[String] {
        &self.bought
    }

    /// Purchased upgrades of `kind`, in purchase order.
    pub fn bought_upgrades_of_type(&self, kind: UpgradeType) -> Vec<&MiniGameUpgrade> {
        self.bought
            .iter()
            .filter_map(|id| self.get(id))
            .filter(|u| u.kind == kind)
            .collect()
    }

    /// Catalog entries not yet bought.
    pub fn available(&self) -> impl Iterator<Item = &MiniGameUpgrade> + '_ {
        self.catalog.iter().filter(|u| !self.is_bought(&u.id))
    }

    /// Buy `id`, paying from `wallet`. Nothing is debited or marked on failure.
    pub fn purchase<W: CurrencyWallet + ?Sized>(
        &mut self,
        id: &str,
        wallet: &mut W,
    ) -> Result<&MiniGameUpgrade, UpgradeError> {
        let cost = match self.get(id) {
            Some(u) => u.cost,
            None => return Err(UpgradeError::Unknown(id.to_string())),
        };
        if self.is_bought(id) {
            return Err(UpgradeError::AlreadyPurchased(id.to_string()));
        }
        if !try_spend(wallet, &cost) {
            return Err(UpgradeError::InsufficientFunds {
                id: id.to_string(),
                cost,
            });
        }
        debug!(%id, %cost, "upgrade purchased");
        self.bought.push(id.to_string());
        self.get(id).ok_or_else(|| UpgradeError::Unknown(id.to_string()))
    }

    /// Mark `id` as bought without charging, e.g. when restoring a save.
    pub fn mark_bought(&mut self, id: &str) -> Result<(), UpgradeError> {
        if self.get(id).is_none() {
            return Err(UpgradeError::Unknown(id.to_string()));
        }
        if self.is_bought(id) {
            return Err(UpgradeError::AlreadyPurchased(id.to_string()));
        }
        self.bought.push(id.to_string());
        Ok(())
    }

    /// Forget every purchase; the catalog is untouched.
    pub fn clear_purchases(&mut self) {
        self.bought.clear();
    }
}

impl MultiplierSource for UpgradeBook {
    fn bought_count_of_type(&self, kind: UpgradeType) -> usize {
        self.bought_upgrades_of_type(kind).len()
    }

    fn total_multiplier_for_type(&self, kind: UpgradeType) -> f64 {
        self.bought_upgrades_of_type(kind)
            .iter()
            .map(|u| u.multiplier_value)
            .product()
    }
}

/// Two independent sources stacked multiplicatively.
///
/// Example:
/// let stack = MultiplierStack::new(&minigame_upgrades, &skill_tree);
/// let interval = base_interval / stack.multiplier(UpgradeType::BugFixingSpawn);
#[derive(Clone, Copy)]
pub struct MultiplierStack<'a> {
    local: &'a dyn MultiplierSource,
    shared: &'a dyn MultiplierSource,
}

impl<'a> MultiplierStack<'a> {
    pub fn new(local: &'a dyn MultiplierSource, shared: &'a dyn MultiplierSource) -> Self {
        Self { local, shared }
    }

    pub fn multiplier(&self, kind: UpgradeType) -> f64 {
        self.local.total_multiplier_for_type(kind) * self.shared.total_multiplier_for_type(kind)
    }

    pub fn count(&self, kind: UpgradeType) -> usize {
        self.local.bought_count_of_type(kind) + self.shared.bought_count_of_type(kind)
    }
}

impl MultiplierSource for MultiplierStack<'_> {
    fn bought_count_of_type(&self, kind: UpgradeType) -> usize {
        self.count(kind)
    }

    fn total_multiplier_for_type(&self, kind: UpgradeType) -> f64 {
        self.multiplier(kind)
    }
}

/// Frozen per-type totals of a source. The default table is the identity
/// (no purchases, every multiplier 1).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MultiplierTable {
    totals: BTreeMap<UpgradeType, (usize, f64)>,
}

impl MultiplierTable {
    pub fn capture<S: MultiplierSource + ?Sized>(source: &S) -> Self {
        let totals = UpgradeType::ALL
            .iter()
            .map(|&kind| {
                (
                    kind,
                    (
                        source.bought_count_of_type(kind),
                        source.total_multiplier_for_type(kind),
                    ),
                )
            })
            .collect();
        Self { totals }
    }
}

impl MultiplierSource for MultiplierTable {
    fn bought_count_of_type(&self, kind: UpgradeType) -> usize {
        self.totals.get(&kind).map(|t| t.0).unwrap_or(0)
    }

    fn total_multiplier_for_type(&self, kind: UpgradeType) -> f64 {
        self.totals.get(&kind).map(|t| t.1).unwrap_or(1.0)
    }
}

/// Scale a price by a multiplier, rounded to cents.
/// A non-representable factor leaves the price unchanged.
///
/// Example:
/// let c = scale_currency(Currency::money(Decimal::new(10, 0)), 0.7);
/// assert_eq!(c.amount, Decimal::new(700, 2));
pub fn scale_currency(base: Currency, factor: f64) -> Currency {
    match Decimal::from_f64(factor) {
        Some(f) => Currency::new((base.amount * f).round_dp(2), base.kind),
        None => {
            warn!(factor, "non-finite price factor ignored");
            base
        }
    }
}
