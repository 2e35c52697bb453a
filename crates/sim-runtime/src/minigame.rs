//! Shared plumbing for minigames: budget gating, yearly requirements and
//! upgrade purchases.

use rust_decimal::Decimal;
use sim_core::{validate_requirement, Currency, MiniGameUpgrade, UpgradeType, YearRequirement};
use sim_econ::{CurrencyWallet, MultiplierSource, MultiplierStack, UpgradeBook, UpgradeError};
use tracing::{info, warn};

use crate::feature::Feature;

/// State common to every minigame.
#[derive(Clone, Debug)]
pub struct MiniGameBase {
    budget_requirement: Decimal,
    upgrades: UpgradeBook,
    year_requirements: Vec<YearRequirement>,
}

impl MiniGameBase {
    pub fn new(budget_requirement: Decimal) -> Self {
        Self {
            budget_requirement,
            upgrades: UpgradeBook::new(),
            year_requirements: Vec::new(),
        }
    }

    /// Minimum budget needed to unlock the minigame.
    pub fn budget_requirement(&self) -> Decimal {
        self.budget_requirement
    }

    pub fn is_unlocked_by(&self, budget: Decimal) -> bool {
        budget >= self.budget_requirement
    }

    pub fn upgrades(&self) -> &UpgradeBook {
        &self.upgrades
    }

    pub fn upgrades_mut(&mut self) -> &mut UpgradeBook {
        &mut self.upgrades
    }

    pub fn year_requirements(&self) -> &[YearRequirement] {
        &self.year_requirements
    }

    /// Register a requirement; invalid definitions are logged and skipped.
    pub fn add_requirement(&mut self, requirement: YearRequirement) {
        match validate_requirement(&requirement) {
            Ok(()) => self.year_requirements.push(requirement),
            Err(e) => warn!(description = %requirement.description, error = %e, "skipping requirement"),
        }
    }

    /// Set the progress of every requirement.
    pub fn record_progress(&mut self, progress: f64) {
        for r in &mut self.year_requirements {
            r.set_progress(progress);
        }
    }

    /// Clear purchases and requirement progress; the catalog stays.
    pub fn reset_run(&mut self) {
        self.upgrades.clear_purchases();
        for r in &mut self.year_requirements {
            r.reset();
        }
    }
}

/// A minigame is a [`Feature`] built on a [`MiniGameBase`].
///
/// `initialize` fills the upgrade catalog and year requirements; the
/// save/load methods cover only the minigame's own mutable state, never the
/// static catalog.
pub trait MiniGame: Feature {
    fn base(&self) -> &MiniGameBase;

    fn base_mut(&mut self) -> &mut MiniGameBase;

    fn budget_requirement(&self) -> Decimal {
        self.base().budget_requirement()
    }

    fn upgrades(&self) -> &UpgradeBook {
        self.base().upgrades()
    }

    fn year_requirements(&self) -> &[YearRequirement] {
        self.base().year_requirements()
    }

    fn bought_upgrades_of_type(&self, kind: UpgradeType) -> Vec<&MiniGameUpgrade> {
        self.upgrades().bought_upgrades_of_type(kind)
    }

    fn total_multiplier_for_type(&self, kind: UpgradeType) -> f64 {
        self.upgrades().total_multiplier_for_type(kind)
    }

    /// This minigame's upgrades stacked with a persistent source.
    fn stacked<'a>(&'a self, boosts: &'a dyn MultiplierSource) -> MultiplierStack<'a> {
        MultiplierStack::new(self.upgrades(), boosts)
    }

    /// Called after a successful purchase so the minigame can bring its
    /// live state in line with the new upgrade.
    fn upgrade_bought(&mut self, _kind: UpgradeType) {}

    /// Buy one of this minigame's upgrades. Failures are logged and leave
    /// the wallet and purchases unchanged.
    fn purchase_upgrade(
        &mut self,
        id: &str,
        wallet: &mut dyn CurrencyWallet,
    ) -> Result<(), UpgradeError> {
        let name = self.name();
        let kind = match self.base_mut().upgrades_mut().purchase(id, wallet) {
            Ok(upgrade) => {
                info!(minigame = name, id, cost = %upgrade.cost, "upgrade bought");
                upgrade.kind
            }
            Err(e) => {
                warn!(minigame = name, id, error = %e, "upgrade purchase failed");
                return Err(e);
            }
        };
        self.upgrade_bought(kind);
        Ok(())
    }

    /// Rewards of the requirements completed this year.
    fn completed_rewards(&self) -> Vec<Currency> {
        self.year_requirements()
            .iter()
            .filter(|r| r.is_completed())
            .map(|r| r.reward)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::CurrencyType;

    #[test]
    fn budget_gate() {
        let base = MiniGameBase::new(Decimal::new(1000, 0));
        assert!(!base.is_unlocked_by(Decimal::new(999, 0)));
        assert!(base.is_unlocked_by(Decimal::new(1000, 0)));
    }

    #[test]
    fn requirements_track_progress_and_reset() {
        let mut base = MiniGameBase::new(Decimal::ZERO);
        base.add_requirement(YearRequirement::new(
            "Ship it",
            10.0,
            Currency::new(Decimal::new(5, 0), CurrencyType::PrestigePoints),
        ));
        base.add_requirement(YearRequirement::new("Broken", 0.0, Currency::prestige(Decimal::ONE)));
        assert_eq!(base.year_requirements().len(), 1);
        base.record_progress(12.0);
        assert!(base.year_requirements()[0].is_completed());
        base.reset_run();
        assert_eq!(base.year_requirements()[0].progress, 0.0);
    }
}
