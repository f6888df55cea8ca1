//! Deep structural copies of node graphs.
//!
//! The copy owns fresh nodes and fresh containers. Aliasing and cycles in
//! the source are reproduced in the copy (a node reached twice is copied
//! once). Watchers are not carried over. Callables and opaque handles are
//! shared between source and copy.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::node::{Node, Slot};
use crate::value::Value;

#[derive(Default)]
pub(crate) struct DeepCopy {
    memo: BTreeMap<usize, Node>,
}

impl DeepCopy {
    pub(crate) fn node(&mut self, source: &Node) -> Node {
        if let Some(done) = self.memo.get(&source.addr()) {
            return done.clone();
        }
        let copy = Node::with_settings(source.settings());
        self.memo.insert(source.addr(), copy.clone());

        let (slots, exempt, frozen) = {
            let inner = source.inner.borrow();
            (inner.slots.clone(), inner.exempt.clone(), inner.frozen)
        };
        let slots: BTreeMap<String, Slot> = slots
            .into_iter()
            .map(|(k, slot)| (k, self.slot(slot)))
            .collect();

        let mut inner = copy.inner.borrow_mut();
        inner.slots = slots;
        inner.exempt = exempt;
        inner.frozen = frozen;
        drop(inner);
        copy
    }

    fn slot(&mut self, slot: Slot) -> Slot {
        match slot {
            Slot::Static(v) => Slot::Static(self.value(&v)),
            Slot::Computed { fun, value } => Slot::Computed {
                fun,
                value: value.map(|v| self.value(&v)),
            },
            Slot::Lazy { fun, cached } => Slot::Lazy {
                fun,
                cached: cached.map(|v| self.value(&v)),
            },
            Slot::Method(fun) => Slot::Method(fun),
            Slot::AntiFreeze(v) => Slot::AntiFreeze(self.value(&v)),
        }
    }

    pub(crate) fn value(&mut self, value: &Value) -> Value {
        match value {
            Value::List(items) => Value::List(items.iter().map(|v| self.value(v)).collect()),
            Value::FrozenList(items) => {
                let copied: Vec<Value> = items.iter().map(|v| self.value(v)).collect();
                Value::FrozenList(copied.into())
            }
            Value::Set(items) => Value::Set(self.set(items)),
            Value::FrozenSet(items) => Value::FrozenSet(Rc::new(self.set(items))),
            Value::Map(entries) => Value::Map(self.map(entries)),
            Value::FrozenMap(entries) => Value::FrozenMap(Rc::new(self.map(entries))),
            Value::Node(n) => Value::Node(self.node(n)),
            other => other.clone(),
        }
    }

    fn set(&mut self, items: &BTreeSet<Value>) -> BTreeSet<Value> {
        items.iter().map(|v| self.value(v)).collect()
    }

    fn map(&mut self, entries: &BTreeMap<String, Value>) -> BTreeMap<String, Value> {
        entries
            .iter()
            .map(|(k, v)| (k.clone(), self.value(v)))
            .collect()
    }
}

impl Node {
    /// Independent deep copy of this node and everything reachable from it.
    pub fn snapshot(&self) -> Node {
        DeepCopy::default().node(self)
    }
}
