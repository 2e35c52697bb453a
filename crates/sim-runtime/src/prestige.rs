//! Prestige and its skill tree: a persistent source of the same multiplier
//! categories minigames use. Skills survive new years; only a full
//! [`Feature::reset`] clears them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::{Currency, MiniGameUpgrade, UpgradeType};
use sim_econ::{CurrencyWallet, MultiplierSource, UpgradeBook, UpgradeError};
use tracing::{info, warn};

use crate::feature::{Feature, TickContext};

#[derive(Clone, Debug, Default)]
pub struct SkillTree {
    book: UpgradeBook,
}

impl SkillTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn catalog() -> Vec<MiniGameUpgrade> {
        let points = |n: i64| Currency::prestige(Decimal::new(n, 0));
        let mut skills = vec![
            MiniGameUpgrade::new(
                "skill-bug-fixing-value",
                "Bugs are worth twice as much",
                points(50),
                2.0,
                UpgradeType::BugFixingValue,
            ),
            MiniGameUpgrade::new(
                "skill-bug-fixing-spawn",
                "Bugs spawn 50% more often",
                points(50),
                1.5,
                UpgradeType::BugFixingSpawn,
            ),
            MiniGameUpgrade::new(
                "skill-bug-fixing-movement-cost",
                "Halve the cost of switching lanes",
                points(75),
                0.5,
                UpgradeType::BugFixingMoveCost,
            ),
        ];
        for i in 1..=4 {
            skills.push(MiniGameUpgrade::new(
                format!("skill-bug-fixing-remove-lane-{i}"),
                "Permanently remove a lane",
                points(100 * i),
                1.0,
                UpgradeType::BugFixingReduceLane,
            ));
        }
        skills
    }

    pub fn book(&self) -> &UpgradeBook {
        &self.book
    }

    pub fn bought_upgrades_of_type(&self, kind: UpgradeType) -> Vec<&MiniGameUpgrade> {
        self.book.bought_upgrades_of_type(kind)
    }

    /// Buy a skill, paying from `wallet`. Failures are logged and change nothing.
    pub fn purchase(&mut self, id: &str, wallet: &mut dyn CurrencyWallet) -> Result<(), UpgradeError> {
        match self.book.purchase(id, wallet) {
            Ok(skill) => {
                info!(id, cost = %skill.cost, "skill bought");
                Ok(())
            }
            Err(e) => {
                warn!(id, error = %e, "skill purchase failed");
                Err(e)
            }
        }
    }
}

impl MultiplierSource for SkillTree {
    fn bought_count_of_type(&self, kind: UpgradeType) -> usize {
        self.book.bought_count_of_type(kind)
    }

    fn total_multiplier_for_type(&self, kind: UpgradeType) -> f64 {
        self.book.total_multiplier_for_type(kind)
    }
}

/// Skills in purchase order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PrestigeSaveData {
    pub bought_skills: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct Prestige {
    pub skill_tree: SkillTree,
}

impl Prestige {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Feature for Prestige {
    type SaveData = PrestigeSaveData;

    fn name(&self) -> &'static str {
        "Prestige"
    }

    fn save_key(&self) -> &'static str {
        "prestige"
    }

    fn initialize(&mut self) {
        if self.skill_tree.book.catalog().is_empty() {
            self.skill_tree.book.extend(SkillTree::catalog());
        }
    }

    fn update(&mut self, _delta: f64, _ctx: &TickContext<'_>) {}

    fn load(&mut self, data: PrestigeSaveData) {
        self.skill_tree.book.clear_purchases();
        for id in &data.bought_skills {
            if let Err(e) = self.skill_tree.book.mark_bought(id) {
                warn!(%id, error = %e, "skipping saved skill");
            }
        }
    }

    fn save(&self) -> PrestigeSaveData {
        PrestigeSaveData {
            bought_skills: self.skill_tree.book.bought_ids().to_vec(),
        }
    }

    fn reset(&mut self) {
        self.skill_tree.book.clear_purchases();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sim_core::CurrencyType;
    use sim_econ::Wallet;

    fn prestige() -> Prestige {
        let mut p = Prestige::new();
        p.initialize();
        p
    }

    #[test]
    fn skills_are_paid_in_prestige_points() {
        let mut p = prestige();
        let mut wallet = Wallet::with_money(Decimal::new(10_000, 0));
        assert!(matches!(
            p.skill_tree.purchase("skill-bug-fixing-value", &mut wallet),
            Err(UpgradeError::InsufficientFunds { .. })
        ));
        wallet.gain_currency(&Currency::prestige(Decimal::new(60, 0)));
        p.skill_tree.purchase("skill-bug-fixing-value", &mut wallet).unwrap();
        assert_eq!(wallet.balance(CurrencyType::PrestigePoints), Decimal::new(10, 0));
        assert_eq!(wallet.balance(CurrencyType::Money), Decimal::new(10_000, 0));
        assert_eq!(p.skill_tree.total_multiplier_for_type(UpgradeType::BugFixingValue), 2.0);
    }

    #[test]
    fn save_load_preserves_purchase_order() {
        let mut p = prestige();
        let mut wallet = Wallet::new();
        wallet.gain_currency(&Currency::prestige(Decimal::new(1_000, 0)));
        p.skill_tree.purchase("skill-bug-fixing-remove-lane-2", &mut wallet).unwrap();
        p.skill_tree.purchase("skill-bug-fixing-remove-lane-1", &mut wallet).unwrap();
        let json = serde_json::to_value(p.save()).unwrap();
        assert_eq!(
            json,
            json!({"boughtSkills": ["skill-bug-fixing-remove-lane-2", "skill-bug-fixing-remove-lane-1"]})
        );

        let mut fresh = prestige();
        let data = fresh.parse_save_data(&json);
        fresh.load(data);
        assert_eq!(fresh.skill_tree.book().bought_ids(), p.skill_tree.book().bought_ids());
        assert_eq!(fresh.skill_tree.bought_count_of_type(UpgradeType::BugFixingReduceLane), 2);
    }

    #[test]
    fn unknown_saved_skills_are_skipped() {
        let mut p = prestige();
        let data = p.parse_save_data(&json!({"boughtSkills": ["ghost", "skill-bug-fixing-spawn", "skill-bug-fixing-spawn"]}));
        p.load(data);
        assert_eq!(p.skill_tree.book().bought_ids(), ["skill-bug-fixing-spawn".to_string()]);
        assert_eq!(p.parse_save_data(&json!({})), PrestigeSaveData::default());
    }

    #[test]
    fn reset_wipes_skills() {
        let mut p = prestige();
        p.load(PrestigeSaveData {
            bought_skills: vec!["skill-bug-fixing-spawn".into()],
        });
        p.reset();
        assert!(p.skill_tree.book().bought_ids().is_empty());
        assert_eq!(p.skill_tree.book().catalog().len(), 7);
    }
}
