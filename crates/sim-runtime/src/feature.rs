//! The lifecycle contract implemented by every top-level subsystem.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sim_econ::MultiplierSource;
use tracing::warn;

use crate::year::MonthClock;

/// Read-only data handed to every feature during one tick.
pub struct TickContext<'a> {
    /// Converts real seconds into in-game month fractions.
    pub clock: MonthClock,
    /// Persistent skill tree multipliers, frozen for the duration of the tick.
    pub boosts: &'a dyn MultiplierSource,
}

/// A top-level subsystem with a uniform initialize/update/load/save lifecycle.
///
/// The orchestrator calls, in order: `initialize`, then
/// `load(parse_save_data(json))`, then `update` once per tick.
pub trait Feature {
    /// Opaque serializable record produced by `save`.
    type SaveData: Serialize + DeserializeOwned + Default;

    fn name(&self) -> &'static str;

    /// Key of this feature's subtree in the game save.
    fn save_key(&self) -> &'static str;

    fn initialize(&mut self);

    fn update(&mut self, delta: f64, ctx: &TickContext<'_>);

    fn load(&mut self, data: Self::SaveData);

    fn save(&self) -> Self::SaveData;

    /// Missing fields take their documented defaults; unreadable input
    /// yields the default record.
    fn parse_save_data(&self, json: &Value) -> Self::SaveData {
        parse_or_default(self.name(), json)
    }

    fn reset(&mut self);
}

/// Deserialize `json` into `T`, falling back to `T::default()` on null or
/// malformed input.
pub fn parse_or_default<T: DeserializeOwned + Default>(feature: &str, json: &Value) -> T {
    if json.is_null() {
        return T::default();
    }
    match serde_json::from_value(json.clone()) {
        Ok(data) => data,
        Err(e) => {
            warn!(feature, error = %e, "unreadable save data, using defaults");
            T::default()
        }
    }
}
