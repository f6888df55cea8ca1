//! Captured state of every node reachable from a root.
//!
//! Unlike [`Node::snapshot`], which builds a detached copy, a `TreeState`
//! remembers the slot tables of the live nodes themselves so they can be
//! written back in place. Handles held elsewhere to nested nodes therefore
//! observe the restored state too.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::error::{DataError, Result};
use crate::node::{Node, Slot};
use crate::value::Value;

struct NodeState {
    node: Node,
    slots: BTreeMap<String, Slot>,
    exempt: BTreeSet<String>,
    frozen: bool,
}

pub(crate) struct TreeState {
    nodes: Vec<NodeState>,
}

impl TreeState {
    /// Record every node reachable from `root` through slot values and
    /// containers, root first.
    pub(crate) fn capture(root: &Node) -> Result<TreeState> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([root.clone()]);
        let mut nodes = Vec::new();
        while let Some(node) = queue.pop_front() {
            if !seen.insert(node.addr()) {
                continue;
            }
            let inner = node.inner.try_borrow().map_err(|_| {
                DataError::transaction(format!("node {:#x} is busy and cannot be captured", node.addr()))
            })?;
            for slot in inner.slots.values() {
                if let Some(v) = slot.peek() {
                    collect_nodes(v, &mut queue);
                }
            }
            let state = NodeState {
                node: node.clone(),
                slots: inner.slots.clone(),
                exempt: inner.exempt.clone(),
                frozen: inner.frozen,
            };
            drop(inner);
            nodes.push(state);
        }
        Ok(TreeState { nodes })
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().map(|s| &s.node)
    }

    /// Write the captured slots back. Every restorable node is restored
    /// even when some are not; those are named in the returned error.
    pub(crate) fn restore(&self) -> Result<()> {
        let mut failures = Vec::new();
        for state in &self.nodes {
            let Ok(mut inner) = state.node.inner.try_borrow_mut() else {
                failures.push(format!("node {:#x} is busy", state.node.addr()));
                continue;
            };
            if inner.frozen && !state.frozen {
                failures.push(format!("node {} was frozen during the transaction", inner.id));
                continue;
            }
            inner.slots = state.slots.clone();
            inner.exempt = state.exempt.clone();
            inner.hash = None;
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(DataError::transaction(format!(
                "rollback incomplete: {}",
                failures.join("; ")
            )))
        }
    }
}

fn collect_nodes(value: &Value, out: &mut VecDeque<Node>) {
    match value {
        Value::Node(n) => out.push_back(n.clone()),
        Value::List(_) | Value::FrozenList(_) => {
            for v in value.as_list().unwrap_or_default() {
                collect_nodes(v, out);
            }
        }
        Value::Set(_) | Value::FrozenSet(_) => {
            for v in value.as_set().into_iter().flatten() {
                collect_nodes(v, out);
            }
        }
        Value::Map(_) | Value::FrozenMap(_) => {
            for v in value.as_map().into_iter().flatten().map(|(_, v)| v) {
                collect_nodes(v, out);
            }
        }
        _ => {}
    }
}
