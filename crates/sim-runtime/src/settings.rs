//! Player settings with validated values.

use serde::{Deserialize, Serialize};
use sim_core::{Observable, SubscriptionId};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::warn;

use crate::feature::{Feature, TickContext};

pub const AUTOSAVE: &str = "autosave";
pub const AUTOSAVE_INTERVAL: &str = "autosave-interval";
pub const NUMBER_NOTATION: &str = "number-notation";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl OptionValue {
    fn same_kind(&self, other: &OptionValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{b}"),
            OptionValue::Number(n) => write!(f, "{n}"),
            OptionValue::Text(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SettingOption {
    pub text: String,
    pub value: OptionValue,
}

impl SettingOption {
    pub fn new(text: impl Into<String>, value: OptionValue) -> Self {
        Self {
            text: text.into(),
            value,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SettingError {
    #[error("{value} is not a valid value for setting {setting}")]
    InvalidValue { setting: String, value: String },
    #[error("unknown setting: {0}")]
    Unknown(String),
}

/// A named value restricted to `options` (any value of the default's kind
/// when `options` is empty).
#[derive(Debug)]
pub struct Setting {
    pub name: String,
    pub display_name: String,
    pub options: Vec<SettingOption>,
    pub default_value: OptionValue,
    value: Observable<OptionValue>,
}

impl Setting {
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        options: Vec<SettingOption>,
        default_value: OptionValue,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            options,
            value: Observable::new(default_value.clone()),
            default_value,
        }
    }

    pub fn value(&self) -> &OptionValue {
        self.value.get()
    }

    pub fn is_valid(&self, value: &OptionValue) -> bool {
        if !value.same_kind(&self.default_value) {
            return false;
        }
        self.options.is_empty() || self.options.iter().any(|o| &o.value == value)
    }

    /// Set the value; an invalid value is reported and the old one kept.
    pub fn set(&mut self, value: OptionValue) -> Result<(), SettingError> {
        if !self.is_valid(&value) {
            let e = SettingError::InvalidValue {
                setting: self.name.clone(),
                value: value.to_string(),
            };
            warn!(error = %e, "setting unchanged");
            return Err(e);
        }
        self.value.set(value);
        Ok(())
    }

    pub fn is_selected(&self, value: &OptionValue) -> bool {
        self.value() == value
    }

    pub fn restore_default(&mut self) {
        self.value.set(self.default_value.clone());
    }

    pub fn observe<F: FnMut(&OptionValue) + 'static>(&mut self, handler: F) -> SubscriptionId {
        self.value.subscribe(handler)
    }
}

/// Saved values by setting name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsSaveData {
    pub values: BTreeMap<String, OptionValue>,
}

#[derive(Debug, Default)]
pub struct Settings {
    settings: Vec<Setting>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    fn defaults() -> Vec<Setting> {
        let seconds = |n: f64| SettingOption::new(format!("{n} seconds"), OptionValue::Number(n));
        vec![
            Setting::new(AUTOSAVE, "Autosave", vec![], OptionValue::Bool(true)),
            Setting::new(
                AUTOSAVE_INTERVAL,
                "Autosave interval",
                vec![seconds(15.0), seconds(30.0), seconds(60.0)],
                OptionValue::Number(30.0),
            ),
            Setting::new(
                NUMBER_NOTATION,
                "Number notation",
                vec![
                    SettingOption::new("Standard", OptionValue::Text("standard".into())),
                    SettingOption::new("Scientific", OptionValue::Text("scientific".into())),
                ],
                OptionValue::Text("standard".into()),
            ),
        ]
    }

    pub fn get(&self, name: &str) -> Option<&Setting> {
        self.settings.iter().find(|s| s.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Setting> {
        self.settings.iter_mut().find(|s| s.name == name)
    }

    pub fn set(&mut self, name: &str, value: OptionValue) -> Result<(), SettingError> {
        match self.get_mut(name) {
            Some(setting) => setting.set(value),
            None => {
                warn!(name, "unknown setting");
                Err(SettingError::Unknown(name.to_string()))
            }
        }
    }

    pub fn all(&self) -> &[Setting] {
        &self.settings
    }

    pub fn autosave_enabled(&self) -> bool {
        matches!(self.get(AUTOSAVE).map(Setting::value), Some(OptionValue::Bool(true)))
    }

    /// Seconds between autosaves; 30 when unset.
    pub fn autosave_interval(&self) -> f64 {
        match self.get(AUTOSAVE_INTERVAL).map(Setting::value) {
            Some(OptionValue::Number(n)) => *n,
            _ => 30.0,
        }
    }
}

impl Feature for Settings {
    type SaveData = SettingsSaveData;

    fn name(&self) -> &'static str {
        "Settings"
    }

    fn save_key(&self) -> &'static str {
        "settings"
    }

    fn initialize(&mut self) {
        if self.settings.is_empty() {
            self.settings = Self::defaults();
        }
    }

    fn update(&mut self, _delta: f64, _ctx: &TickContext<'_>) {}

    /// Saved values are applied on top of the defaults; unknown names and
    /// invalid values are reported and skipped.
    fn load(&mut self, data: SettingsSaveData) {
        for setting in &mut self.settings {
            setting.restore_default();
        }
        for (name, value) in data.values {
            let _ = self.set(&name, value);
        }
    }

    fn save(&self) -> SettingsSaveData {
        SettingsSaveData {
            values: self
                .settings
                .iter()
                .map(|s| (s.name.clone(), s.value().clone()))
                .collect(),
        }
    }

    fn reset(&mut self) {
        for setting in &mut self.settings {
            setting.restore_default();
        }
    }
}
