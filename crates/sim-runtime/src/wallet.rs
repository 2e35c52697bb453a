//! The wallet as a game feature.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sim_core::{Currency, CurrencyType};
use sim_econ::{CurrencyWallet, Wallet};
use tracing::warn;

use crate::feature::{Feature, TickContext};

/// Persisted balances. Absent money means the configured starting money;
/// absent prestige points mean 0.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WalletSaveData {
    pub money: Option<Decimal>,
    pub prestige_points: Option<Decimal>,
}

#[derive(Clone, Debug)]
pub struct WalletFeature {
    wallet: Wallet,
    starting_money: Decimal,
}

impl WalletFeature {
    pub fn new(starting_money: Decimal) -> Self {
        Self {
            wallet: Wallet::new(),
            starting_money,
        }
    }

    pub fn balance(&self, kind: CurrencyType) -> Decimal {
        self.wallet.balance(kind)
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    fn restore(&mut self, money: Decimal, prestige_points: Decimal) {
        self.wallet.clear();
        for (kind, amount) in [
            (CurrencyType::Money, money),
            (CurrencyType::PrestigePoints, prestige_points),
        ] {
            if !self.wallet.set_balance(kind, amount) {
                warn!(%kind, "invalid saved balance, using 0");
                self.wallet.set_balance(kind, Decimal::ZERO);
            }
        }
    }
}

impl CurrencyWallet for WalletFeature {
    fn has_currency(&self, amount: &Currency) -> bool {
        self.wallet.has_currency(amount)
    }

    fn lose_currency(&mut self, amount: &Currency) {
        self.wallet.lose_currency(amount)
    }

    fn gain_currency(&mut self, amount: &Currency) {
        self.wallet.gain_currency(amount)
    }
}

impl Feature for WalletFeature {
    type SaveData = WalletSaveData;

    fn name(&self) -> &'static str {
        "Wallet"
    }

    fn save_key(&self) -> &'static str {
        "wallet"
    }

    fn initialize(&mut self) {
        self.restore(self.starting_money, Decimal::ZERO);
    }

    fn update(&mut self, _delta: f64, _ctx: &TickContext<'_>) {}

    fn load(&mut self, data: WalletSaveData) {
        self.restore(
            data.money.unwrap_or(self.starting_money),
            data.prestige_points.unwrap_or(Decimal::ZERO),
        );
    }

    fn save(&self) -> WalletSaveData {
        WalletSaveData {
            money: Some(self.balance(CurrencyType::Money)),
            prestige_points: Some(self.balance(CurrencyType::PrestigePoints)),
        }
    }

    fn reset(&mut self) {
        self.restore(self.starting_money, Decimal::ZERO);
    }
}
