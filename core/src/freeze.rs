//! Recursive freeze and structural hashing.
//!
//! Freezing runs in two passes over the reachable graph. The check pass
//! resolves every lazy slot and rejects values with no immutable
//! counterpart, so a failing freeze leaves every node untouched. The
//! transform pass swaps mutable containers for their frozen forms and marks
//! each node frozen. Keys declared with `anti_freeze` are left as they are
//! and not descended into.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::error::{DataError, Result};
use crate::node::{Node, Slot, SlotKind};
use crate::serialize::PlainTreeWriter;
use crate::value::{Value, ValueKind};

impl Node {
    /// Make this node and everything reachable from it immutable.
    /// Re-freezing is a no-op.
    pub fn freeze(&self) -> Result<()> {
        if self.is_frozen() {
            return Ok(());
        }
        check_node(self, "", &mut BTreeSet::new())?;
        let mut done = BTreeSet::new();
        freeze_node(self, "", &mut done)?;
        tracing::debug!(node = self.id(), nodes = done.len(), "froze node graph");
        Ok(())
    }

    /// Stable hash of the frozen contents. Values under exempted keys are
    /// masked, so mutating them does not change the hash.
    pub fn structural_hash(&self) -> Result<u64> {
        {
            let inner = self.inner.borrow();
            if !inner.frozen {
                return Err(DataError::serialization("", "unfrozen node is unhashable"));
            }
            if let Some(hash) = inner.hash {
                return Ok(hash);
            }
        }
        let tree = PlainTreeWriter::for_node(self).mask_exempt().write_node(self, "")?;
        let canonical = serde_json::to_string(&tree)
            .map_err(|e| DataError::serialization("", e.to_string()))?;
        let hash = fnv1a_hash(canonical.as_bytes());
        self.inner.borrow_mut().hash = Some(hash);
        Ok(hash)
    }
}

// ---------------------------------------------------------------------------
// Check pass
// ---------------------------------------------------------------------------

fn check_node(node: &Node, path: &str, seen: &mut BTreeSet<usize>) -> Result<()> {
    if node.is_frozen() || !seen.insert(node.addr()) {
        return Ok(());
    }
    for key in node.keys() {
        if node.slot_kind(&key) == Some(SlotKind::Method) || node.is_exempt(&key) {
            continue;
        }
        if let Some(value) = node.get(&key)? {
            check_value(&value, &join(path, &key), seen)?;
        }
    }
    Ok(())
}

fn check_value(value: &Value, path: &str, seen: &mut BTreeSet<usize>) -> Result<()> {
    match value {
        Value::Opaque(o) => Err(DataError::Freeze {
            path: path.to_string(),
            message: format!("{} has no immutable counterpart", o.type_name()),
        }),
        Value::Node(n) => check_node(n, path, seen),
        Value::Map(_) | Value::FrozenMap(_) => {
            for (k, v) in value.as_map().into_iter().flatten() {
                check_value(v, &join(path, k), seen)?;
            }
            Ok(())
        }
        Value::List(_) | Value::FrozenList(_) => {
            for (i, v) in value.as_list().into_iter().flatten().enumerate() {
                check_value(v, &index(path, i), seen)?;
            }
            Ok(())
        }
        Value::Set(_) | Value::FrozenSet(_) => {
            for (i, v) in value.as_set().into_iter().flatten().enumerate() {
                check_value(v, &index(path, i), seen)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Transform pass
// ---------------------------------------------------------------------------

fn freeze_node(node: &Node, path: &str, done: &mut BTreeSet<usize>) -> Result<()> {
    if node.is_frozen() || !done.insert(node.addr()) {
        return Ok(());
    }
    let entries: Vec<(String, Slot)> = node
        .inner
        .borrow()
        .slots
        .iter()
        .map(|(k, s)| (k.clone(), s.clone()))
        .collect();

    let mut staged = BTreeMap::new();
    for (key, slot) in entries {
        match slot {
            Slot::Method(_) => {}
            Slot::AntiFreeze(v) => {
                staged.insert(key, Slot::Static(v));
            }
            _ if node.is_exempt(&key) => {}
            _ => {
                let current = match slot.peek() {
                    Some(v) => v.clone(),
                    None => node.get(&key)?.unwrap_or(Value::Null),
                };
                let frozen = freeze_value(&current, &join(path, &key), done)?;
                staged.insert(key, slot.pinned(frozen));
            }
        }
    }

    let mut inner = node.inner.borrow_mut();
    inner.slots.extend(staged);
    inner.frozen = true;
    inner.hash = None;
    Ok(())
}

fn freeze_value(value: &Value, path: &str, done: &mut BTreeSet<usize>) -> Result<Value> {
    match value.kind() {
        ValueKind::Scalar | ValueKind::Callable => Ok(value.clone()),
        ValueKind::Opaque => Err(DataError::Freeze {
            path: path.to_string(),
            message: format!("{} has no immutable counterpart", value.type_name()),
        }),
        ValueKind::Node => {
            if let Value::Node(n) = value {
                freeze_node(n, path, done)?;
            }
            Ok(value.clone())
        }
        ValueKind::OrderedContainer => {
            let items = value
                .as_list()
                .unwrap_or_default()
                .iter()
                .enumerate()
                .map(|(i, v)| freeze_value(v, &index(path, i), done))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::FrozenList(items.into()))
        }
        ValueKind::UnorderedContainer => {
            let mut items = BTreeSet::new();
            for (i, v) in value.as_set().into_iter().flatten().enumerate() {
                items.insert(freeze_value(v, &index(path, i), done)?);
            }
            Ok(Value::FrozenSet(Rc::new(items)))
        }
        ValueKind::Mapping => {
            let mut entries = BTreeMap::new();
            for (k, v) in value.as_map().into_iter().flatten() {
                entries.insert(k.clone(), freeze_value(v, &join(path, k), done)?);
            }
            Ok(Value::FrozenMap(Rc::new(entries)))
        }
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn index(path: &str, i: usize) -> String {
    format!("{}[{}]", path, i)
}

/// FNV-1a 64-bit hash.
fn fnv1a_hash(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    let mut hash = FNV_OFFSET;
    for &byte in data {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
