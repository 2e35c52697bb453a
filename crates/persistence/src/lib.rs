#![deny(warnings)]

//! Persistence layer: versioned save envelopes and slot stores.
//!
//! The game produces a JSON tree keyed by feature; this crate wraps it in a
//! [`SaveEnvelope`] and stores it under a named slot.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Save format version; bump when the envelope layout changes.
pub const SAVE_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SaveEnvelope {
    pub version: u32,
    /// The game's save tree.
    pub game: Value,
}

impl SaveEnvelope {
    pub fn new(game: Value) -> Self {
        Self {
            version: SAVE_VERSION,
            game,
        }
    }
}

/// Storage for save envelopes by slot name.
pub trait SaveStore {
    fn write(&mut self, slot: &str, envelope: &SaveEnvelope) -> anyhow::Result<()>;

    /// `Ok(None)` when the slot has never been written.
    fn read(&self, slot: &str) -> anyhow::Result<Option<SaveEnvelope>>;
}

/// Default directory for local saves.
pub fn default_save_dir() -> PathBuf {
    PathBuf::from("./saves")
}

fn check_slot(slot: &str) -> anyhow::Result<()> {
    let ok = !slot.is_empty()
        && slot
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !ok {
        bail!("invalid save slot name: {slot:?}");
    }
    Ok(())
}

fn check_version(slot: &str, envelope: &SaveEnvelope) -> anyhow::Result<()> {
    if envelope.version > SAVE_VERSION {
        bail!(
            "save slot {slot} has version {}, newer than supported {SAVE_VERSION}",
            envelope.version
        );
    }
    Ok(())
}

/// One pretty-printed JSON file per slot: `<root>/<slot>.json`.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn slot_path(&self, slot: &str) -> PathBuf {
        self.root.join(format!("{slot}.json"))
    }
}

impl SaveStore for JsonFileStore {
    fn write(&mut self, slot: &str, envelope: &SaveEnvelope) -> anyhow::Result<()> {
        check_slot(slot)?;
        fs::create_dir_all(&self.root)
            .with_context(|| format!("creating save dir {}", self.root.display()))?;
        let path = self.slot_path(slot);
        let tmp = path.with_extension("json.tmp");
        let text = serde_json::to_string_pretty(envelope)?;
        fs::write(&tmp, text).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("replacing {}", path.display()))?;
        info!(slot, path = %path.display(), "game saved");
        Ok(())
    }

    fn read(&self, slot: &str) -> anyhow::Result<Option<SaveEnvelope>> {
        check_slot(slot)?;
        let path = self.slot_path(slot);
        if !path.exists() {
            debug!(slot, "no save in slot");
            return Ok(None);
        }
        let text = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        let envelope: SaveEnvelope =
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        check_version(slot, &envelope)?;
        Ok(Some(envelope))
    }
}

/// In-memory store, for tests and throwaway runs.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    slots: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slots(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }
}

impl SaveStore for MemoryStore {
    fn write(&mut self, slot: &str, envelope: &SaveEnvelope) -> anyhow::Result<()> {
        check_slot(slot)?;
        self.slots
            .insert(slot.to_string(), serde_json::to_string(envelope)?);
        Ok(())
    }

    fn read(&self, slot: &str) -> anyhow::Result<Option<SaveEnvelope>> {
        check_slot(slot)?;
        match self.slots.get(slot) {
            None => Ok(None),
            Some(text) => {
                let envelope: SaveEnvelope = serde_json::from_str(text)?;
                check_version(slot, &envelope)?;
                Ok(Some(envelope))
            }
        }
    }
}
