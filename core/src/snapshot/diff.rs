//! Shallow diff and patch between two nodes.
//!
//! `source.diff(&baseline)` lists, per top-level key, what has to change to
//! turn `baseline` into `source`. Values are compared by equality; nested
//! nodes compare by identity, so the diff is one level deep. Method slots
//! are ignored on both sides.

use std::collections::BTreeMap;

use serde_json::Value as Json;

use crate::error::{DataError, Result};
use crate::node::{is_identifier, Field, Node};
use crate::serialize::PlainTreeWriter;
use crate::settings::{RemovalPolicy, Settings};
use crate::value::Value;

// ---------------------------------------------------------------------------
// Change
// ---------------------------------------------------------------------------

/// One key's transition. `None` means the key is absent on that side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub old: Option<Value>,
    pub new: Option<Value>,
}

impl Change {
    pub fn is_addition(&self) -> bool {
        self.old.is_none() && self.new.is_some()
    }

    pub fn is_removal(&self) -> bool {
        self.old.is_some() && self.new.is_none()
    }

    pub fn is_update(&self) -> bool {
        self.old.is_some() && self.new.is_some()
    }
}

// ---------------------------------------------------------------------------
// Patch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patch {
    changes: BTreeMap<String, Change>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, old: Option<Value>, new: Option<Value>) {
        self.changes.insert(key.into(), Change { old, new });
    }

    pub fn get(&self, key: &str) -> Option<&Change> {
        self.changes.get(key)
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Change)> {
        self.changes.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.changes.keys()
    }

    pub fn additions(&self) -> usize {
        self.changes.values().filter(|c| c.is_addition()).count()
    }

    pub fn removals(&self) -> usize {
        self.changes.values().filter(|c| c.is_removal()).count()
    }

    pub fn updates(&self) -> usize {
        self.changes.values().filter(|c| c.is_update()).count()
    }

    /// Human-readable one-line summary.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if self.additions() > 0 {
            parts.push(format!("{} key(s) added", self.additions()));
        }
        if self.removals() > 0 {
            parts.push(format!("{} key(s) removed", self.removals()));
        }
        if self.updates() > 0 {
            parts.push(format!("{} key(s) changed", self.updates()));
        }
        if parts.is_empty() {
            "no changes".to_string()
        } else {
            parts.join(", ")
        }
    }

    /// `{key: [old, new]}`, with absent sides rendered as `null`.
    pub fn to_plain_tree(&self) -> Result<Json> {
        let mut writer = PlainTreeWriter::new(&Settings::default());
        let mut out = serde_json::Map::new();
        for (key, change) in &self.changes {
            let mut side = |v: &Option<Value>| match v {
                Some(v) => writer.write_value(v, key),
                None => Ok(Json::Null),
            };
            let pair = vec![side(&change.old)?, side(&change.new)?];
            out.insert(key.clone(), Json::Array(pair));
        }
        Ok(Json::Object(out))
    }
}

impl<'a> IntoIterator for &'a Patch {
    type Item = (&'a String, &'a Change);
    type IntoIter = std::collections::btree_map::Iter<'a, String, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

// ---------------------------------------------------------------------------
// Node API
// ---------------------------------------------------------------------------

impl Node {
    /// Changes that turn `baseline` into `self`. Lazy slots on both sides
    /// are resolved.
    pub fn diff(&self, baseline: &Node) -> Result<Patch> {
        let source = self.resolved_data()?;
        let base = baseline.resolved_data()?;
        let mut patch = Patch::new();
        for (key, new) in &source {
            match base.get(key) {
                None => patch.insert(key.clone(), None, Some(new.clone())),
                Some(old) if old != new => patch.insert(key.clone(), Some(old.clone()), Some(new.clone())),
                Some(_) => {}
            }
        }
        for (key, old) in &base {
            if !source.contains_key(key) {
                patch.insert(key.clone(), Some(old.clone()), None);
            }
        }
        Ok(patch)
    }

    /// Write every change of `patch` into this node. Entries whose new side
    /// is absent follow the node's removal policy. On a frozen node every
    /// key is checked before anything is written.
    pub fn apply(&self, patch: &Patch) -> Result<()> {
        let policy = self.settings().removal_policy;
        let frozen = self.is_frozen();
        for (key, change) in patch {
            if !is_identifier(key) {
                return Err(DataError::InvalidKey { key: key.clone() });
            }
            let deletes = change.new.is_none() && policy == RemovalPolicy::Delete;
            if frozen && (!self.is_exempt(key) || deletes) {
                return Err(DataError::Frozen { key: key.clone() });
            }
        }
        for (key, change) in patch {
            match (&change.new, policy) {
                (Some(v), _) => self.set(key, Field::Value(v.clone()))?,
                (None, RemovalPolicy::Delete) => {
                    self.remove(key)?;
                }
                (None, RemovalPolicy::AssignNull) => self.set(key, Value::Null)?,
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
