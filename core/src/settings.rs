//! Engine settings: removal, rollback and serialization policies.
//!
//! Settings are plain serde data so they can be loaded from YAML or JSON.
//! A node tree shares one `Rc<Settings>`; children created through dotted
//! paths and snapshot copies inherit it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};

/// What `apply` does with a patch entry whose new side is absent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    /// Remove the key from the target (no-op when absent).
    #[default]
    Delete,
    /// Keep the key and store `Null`.
    AssignNull,
}

/// Watcher behaviour when a transaction rolls back.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RollbackEvents {
    /// Notifications fired inside the transaction stand; nothing else fires.
    #[default]
    Silent,
    /// Fire `(key, current, restored)` for every root key the rollback changed.
    Compensate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub removal_policy: RemovalPolicy,
    pub rollback_events: RollbackEvents,
    /// Field name of the sentinel emitted for circular references.
    pub circular_marker: String,
}

impl Default for Settings {
    fn default() -> Self {
        default_settings()
    }
}

/// Returns sensible defaults for all settings fields.
pub fn default_settings() -> Settings {
    Settings {
        removal_policy: RemovalPolicy::Delete,
        rollback_events: RollbackEvents::Silent,
        circular_marker: "$circular".into(),
    }
}

/// Load settings from a file. `.yaml`/`.yml` files are read as YAML, anything
/// else as JSON. Missing fields take their defaults.
pub fn load(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| DataError::config(format!("cannot read {}: {}", path.display(), e)))?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => parse_yaml(&content),
        _ => parse_json(&content),
    }
}

pub fn parse_yaml(content: &str) -> Result<Settings> {
    if content.trim().is_empty() {
        return Ok(default_settings());
    }
    serde_yaml::from_str(content).map_err(|e| DataError::config(format!("invalid YAML: {}", e)))
}

pub fn parse_json(content: &str) -> Result<Settings> {
    serde_json::from_str(content).map_err(|e| DataError::config(format!("invalid JSON: {}", e)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
