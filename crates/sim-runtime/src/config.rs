//! YAML game configuration.

use anyhow::Context;
use sim_core::{validate_config, GameConfig, ValidationError};
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(#[from] ValidationError),
}

/// Parse and validate a YAML config. Blank input and missing fields take
/// their defaults.
pub fn parse_config(text: &str) -> Result<GameConfig, ConfigError> {
    let cfg = if text.trim().is_empty() {
        GameConfig::default()
    } else {
        serde_yaml::from_str(text)?
    };
    validate_config(&cfg)?;
    Ok(cfg)
}

pub fn load_config(path: &Path) -> anyhow::Result<GameConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let cfg = parse_config(&text).with_context(|| format!("loading config {}", path.display()))?;
    info!(path = %path.display(), "config loaded");
    Ok(cfg)
}
