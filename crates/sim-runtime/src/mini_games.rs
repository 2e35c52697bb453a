//! Container feature owning every minigame.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sim_core::Currency;
use sim_econ::{CurrencyWallet, MultiplierSource, UpgradeError};

use crate::bug_fixing::{BugFixingMiniGame, BugFixingSaveData};
use crate::feature::{Feature, TickContext};
use crate::minigame::MiniGame;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiniGamesSaveData {
    #[serde(rename = "bug-fixing")]
    pub bug_fixing: BugFixingSaveData,
}

pub struct MiniGames {
    pub bug_fixing: BugFixingMiniGame,
}

impl MiniGames {
    pub fn new(bug_fixing: BugFixingMiniGame) -> Self {
        Self { bug_fixing }
    }

    /// Buy an upgrade from whichever minigame's catalog lists `id`.
    pub fn purchase_upgrade(
        &mut self,
        id: &str,
        wallet: &mut dyn CurrencyWallet,
    ) -> Result<(), UpgradeError> {
        if self.bug_fixing.upgrades().get(id).is_some() {
            return self.bug_fixing.purchase_upgrade(id, wallet);
        }
        Err(UpgradeError::Unknown(id.to_string()))
    }

    /// Fit every minigame's live state to the lanes left after `boosts`.
    pub fn clamp_to_lanes(&mut self, boosts: &dyn MultiplierSource) {
        self.bug_fixing.clamp_to_lanes(boosts);
    }

    /// Rewards of every completed year requirement, across minigames.
    pub fn completed_rewards(&self) -> Vec<Currency> {
        self.bug_fixing.completed_rewards()
    }

    /// Minigames whose budget requirement `budget` satisfies.
    pub fn unlocked(&self, budget: Decimal) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.bug_fixing.base().is_unlocked_by(budget) {
            names.push(self.bug_fixing.name());
        }
        names
    }
}

impl Feature for MiniGames {
    type SaveData = MiniGamesSaveData;

    fn name(&self) -> &'static str {
        "Mini Games"
    }

    fn save_key(&self) -> &'static str {
        "mini-games"
    }

    fn initialize(&mut self) {
        self.bug_fixing.initialize();
    }

    fn update(&mut self, delta: f64, ctx: &TickContext<'_>) {
        self.bug_fixing.update(delta, ctx);
    }

    fn load(&mut self, data: MiniGamesSaveData) {
        self.bug_fixing.load(data.bug_fixing);
    }

    fn save(&self) -> MiniGamesSaveData {
        MiniGamesSaveData {
            bug_fixing: self.bug_fixing.save(),
        }
    }

    /// Each minigame parses its own subtree, so its defaults apply.
    fn parse_save_data(&self, json: &Value) -> MiniGamesSaveData {
        let sub = json.get(self.bug_fixing.save_key()).unwrap_or(&Value::Null);
        MiniGamesSaveData {
            bug_fixing: self.bug_fixing.parse_save_data(sub),
        }
    }

    fn reset(&mut self) {
        self.bug_fixing.reset();
    }
}
