//! The reactive node: a key-value container whose slots may be plain data,
//! values computed once at construction, lazily cached values, or methods.
//!
//! `Node` is a cheap shared handle (`Rc<RefCell<..>>`): cloning it aliases the
//! same node, which is what lets callers build trees and cycles. All
//! mutation goes through [`Node::set`] / [`Node::remove`] / [`Node::update`],
//! which enforce the frozen flag, invalidate lazy caches and fan out to
//! watchers.
//!
//! No `RefCell` borrow is held while user code (computed functions, methods,
//! watchers) runs, so callbacks may freely read and write the node.

pub mod path;
pub mod slot;
pub mod view;
pub mod watch;

pub use path::{is_identifier, DataPath};
pub use slot::{anti_freeze, computed, lazy, method, ComputeFn, Field, MethodFn, SlotKind};
pub use view::View;
pub use watch::{WatchFn, WatchHandle};

pub(crate) use slot::Slot;

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{DataError, EvalKind, Result};
use crate::settings::{default_settings, Settings};
use crate::value::{Callable, Value};
use watch::WatcherList;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) struct NodeInner {
    pub(crate) id: u64,
    pub(crate) slots: BTreeMap<String, Slot>,
    /// Keys declared with `anti_freeze`; they stay mutable after freezing.
    pub(crate) exempt: BTreeSet<String>,
    pub(crate) watchers: WatcherList,
    pub(crate) frozen: bool,
    pub(crate) in_transaction: bool,
    pub(crate) hash: Option<u64>,
    /// Keys whose computed/lazy function is currently running.
    pub(crate) evaluating: BTreeSet<String>,
    pub(crate) settings: Rc<Settings>,
}

impl NodeInner {
    fn new(settings: Rc<Settings>) -> Self {
        NodeInner {
            id: NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed),
            slots: BTreeMap::new(),
            exempt: BTreeSet::new(),
            watchers: WatcherList::default(),
            frozen: false,
            in_transaction: false,
            hash: None,
            evaluating: BTreeSet::new(),
            settings,
        }
    }

    fn invalidate(&mut self) {
        for slot in self.slots.values_mut() {
            slot.invalidate();
        }
        self.hash = None;
    }
}

/// Shared handle to a node.
#[derive(Clone)]
pub struct Node {
    pub(crate) inner: Rc<RefCell<NodeInner>>,
}

// Work to do after the slot table borrow is released.
enum Resolution {
    Ready(Option<Value>),
    Evaluate(EvalKind, ComputeFn),
    Unmark(Value),
}

impl Node {
    /// An empty, unfrozen node with default settings.
    pub fn new() -> Self {
        Self::with_settings(default_settings())
    }

    pub fn with_settings(settings: impl Into<Rc<Settings>>) -> Self {
        Node {
            inner: Rc::new(RefCell::new(NodeInner::new(settings.into()))),
        }
    }

    pub fn builder() -> NodeBuilder {
        NodeBuilder::default()
    }

    /// Build a node from `(key, field)` pairs. Computed fields are evaluated
    /// in the given order once every field is in place.
    pub fn from_fields<I, K, F>(fields: I) -> Result<Node>
    where
        I: IntoIterator<Item = (K, F)>,
        K: Into<String>,
        F: Into<Field>,
    {
        fields
            .into_iter()
            .fold(Node::builder(), |b, (k, f)| b.field(k, f))
            .build()
    }

    pub(crate) fn from_weak(weak: &Weak<RefCell<NodeInner>>) -> Option<Node> {
        weak.upgrade().map(|inner| Node { inner })
    }

    // -------------------------------------------------------------------
    // Identity & metadata
    // -------------------------------------------------------------------

    pub fn id(&self) -> u64 {
        self.inner.borrow().id
    }

    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }

    pub fn settings(&self) -> Rc<Settings> {
        self.inner.borrow().settings.clone()
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.borrow().frozen
    }

    pub fn is_exempt(&self, key: &str) -> bool {
        self.inner.borrow().exempt.contains(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.borrow().slots.contains_key(key)
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.borrow().slots.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().slots.is_empty()
    }

    pub fn slot_kind(&self, key: &str) -> Option<SlotKind> {
        self.inner.borrow().slots.get(key).map(Slot::kind)
    }

    // -------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------

    /// Resolve `key`. Lazy slots evaluate on first read, method slots yield
    /// a [`Callable`] bound to this node.
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        let resolution = {
            let inner = self.inner.borrow();
            match inner.slots.get(key) {
                None => Resolution::Ready(None),
                Some(Slot::Static(v)) => Resolution::Ready(Some(v.clone())),
                Some(Slot::Computed { value: Some(v), .. }) => Resolution::Ready(Some(v.clone())),
                Some(Slot::Lazy { cached: Some(v), .. }) => Resolution::Ready(Some(v.clone())),
                Some(Slot::Computed { fun, value: None }) => {
                    Resolution::Evaluate(EvalKind::Computed, fun.clone())
                }
                Some(Slot::Lazy { fun, cached: None }) => {
                    Resolution::Evaluate(EvalKind::Lazy, fun.clone())
                }
                Some(Slot::Method(_)) => {
                    Resolution::Ready(Some(Value::Callable(self.bound_method(key))))
                }
                Some(Slot::AntiFreeze(v)) => Resolution::Unmark(v.clone()),
            }
        };

        match resolution {
            Resolution::Ready(v) => Ok(v),
            Resolution::Unmark(v) => {
                self.inner
                    .borrow_mut()
                    .slots
                    .insert(key.to_string(), Slot::Static(v.clone()));
                Ok(Some(v))
            }
            Resolution::Evaluate(kind, fun) => {
                let v = self.evaluate(key, kind, &fun)?;
                let mut inner = self.inner.borrow_mut();
                match inner.slots.get_mut(key) {
                    Some(Slot::Computed { value, .. }) if kind == EvalKind::Computed => {
                        *value = Some(v.clone());
                    }
                    Some(Slot::Lazy { cached, .. }) if kind == EvalKind::Lazy => {
                        *cached = Some(v.clone());
                    }
                    _ => {}
                }
                Ok(Some(v))
            }
        }
    }

    pub fn get_or(&self, key: &str, default: impl Into<Value>) -> Result<Value> {
        Ok(self.get(key)?.unwrap_or_else(|| default.into()))
    }

    /// Like [`get`](Self::get) but a missing key is an error.
    pub fn require(&self, key: &str) -> Result<Value> {
        self.get(key)?.ok_or_else(|| DataError::MissingKey {
            key: key.to_string(),
        })
    }

    pub fn get_i64(&self, key: &str) -> Result<i64> {
        let v = self.require(key)?;
        v.as_i64().ok_or_else(|| mismatch(key, "int", &v))
    }

    pub fn get_f64(&self, key: &str) -> Result<f64> {
        let v = self.require(key)?;
        v.as_f64().ok_or_else(|| mismatch(key, "float", &v))
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        let v = self.require(key)?;
        v.as_bool().ok_or_else(|| mismatch(key, "bool", &v))
    }

    pub fn get_str(&self, key: &str) -> Result<String> {
        match self.require(key)? {
            Value::Str(s) => Ok(s),
            other => Err(mismatch(key, "str", &other)),
        }
    }

    pub fn get_node(&self, key: &str) -> Result<Node> {
        match self.require(key)? {
            Value::Node(n) => Ok(n),
            other => Err(mismatch(key, "node", &other)),
        }
    }

    /// Invoke the method stored at `key` with `args`.
    pub fn call(&self, key: &str, args: &[Value]) -> Result<Value> {
        let fun = {
            let inner = self.inner.borrow();
            match inner.slots.get(key) {
                Some(Slot::Method(fun)) => fun.clone(),
                Some(_) => {
                    return Err(DataError::NotCallable {
                        key: key.to_string(),
                    })
                }
                None => {
                    return Err(DataError::MissingKey {
                        key: key.to_string(),
                    })
                }
            }
        };
        fun(self, args).map_err(|e| {
            tracing::debug!(key, error = %e, "method call failed");
            DataError::computation(key, EvalKind::Method, e)
        })
    }

    // -------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------

    /// Assign `key`. Plain values become static slots; wrappers from
    /// [`computed`], [`lazy`], [`method`] and [`anti_freeze`] keep their
    /// strategy. Every lazy cache on the node is reset and watchers are
    /// notified with `(key, old, new)`.
    pub fn set(&self, key: &str, field: impl Into<Field>) -> Result<()> {
        validate_key(key)?;
        let field = field.into();
        let old = {
            let inner = self.inner.borrow();
            if inner.frozen && !(inner.exempt.contains(key) && field.is_plain()) {
                return Err(DataError::Frozen {
                    key: key.to_string(),
                });
            }
            inner.slots.get(key).and_then(Slot::peek).cloned()
        };

        let (slot, new) = match field {
            Field::Value(v) => (Slot::Static(v.clone()), Some(v)),
            Field::Computed(fun) => {
                let v = self.evaluate(key, EvalKind::Computed, &fun)?;
                (
                    Slot::Computed {
                        fun,
                        value: Some(v.clone()),
                    },
                    Some(v),
                )
            }
            Field::Lazy(fun) => (Slot::Lazy { fun, cached: None }, None),
            Field::Method(fun) => (Slot::Method(fun), None),
            Field::AntiFreeze(v) => (Slot::AntiFreeze(v.clone()), Some(v)),
        };

        {
            let mut inner = self.inner.borrow_mut();
            match slot {
                Slot::AntiFreeze(_) => {
                    inner.exempt.insert(key.to_string());
                }
                Slot::Static(_) => {}
                _ => {
                    inner.exempt.remove(key);
                }
            }
            inner.slots.insert(key.to_string(), slot);
            inner.invalidate();
        }
        self.notify(key, old.as_ref(), new.as_ref());
        Ok(())
    }

    /// Delete `key`. Returns whether it existed. Watchers see `new = None`.
    pub fn remove(&self, key: &str) -> Result<bool> {
        let old = {
            let mut inner = self.inner.borrow_mut();
            if inner.frozen {
                return Err(DataError::Frozen {
                    key: key.to_string(),
                });
            }
            let Some(slot) = inner.slots.remove(key) else {
                return Ok(false);
            };
            inner.exempt.remove(key);
            inner.invalidate();
            slot.peek().cloned()
        };
        self.notify(key, old.as_ref(), None);
        Ok(true)
    }

    /// Read-modify-write of a plain (static or anti-freeze) value. On a
    /// frozen node this is allowed only for exempted keys.
    pub fn update<R>(&self, key: &str, f: impl FnOnce(&mut Value) -> Result<R>) -> Result<R> {
        {
            let inner = self.inner.borrow();
            if inner.frozen && !inner.exempt.contains(key) {
                return Err(DataError::Frozen {
                    key: key.to_string(),
                });
            }
            match inner.slots.get(key).map(Slot::kind) {
                None => {
                    return Err(DataError::MissingKey {
                        key: key.to_string(),
                    })
                }
                Some(SlotKind::Static) | Some(SlotKind::AntiFreeze) => {}
                Some(other) => {
                    return Err(DataError::TypeMismatch {
                        key: key.to_string(),
                        expected: "plain value",
                        found: other.as_str(),
                    })
                }
            }
        }
        let mut value = self.require(key)?;
        let out = f(&mut value)?;
        self.set(key, Field::Value(value))?;
        Ok(out)
    }

    // -------------------------------------------------------------------
    // Internal
    // -------------------------------------------------------------------

    fn evaluate(&self, key: &str, kind: EvalKind, fun: &ComputeFn) -> Result<Value> {
        if !self.inner.borrow_mut().evaluating.insert(key.to_string()) {
            return Err(DataError::computation(
                key,
                kind,
                format!("cyclic dependency on '{}'", key).into(),
            ));
        }
        let result = fun(self);
        self.inner.borrow_mut().evaluating.remove(key);
        result.map_err(|e| {
            tracing::debug!(key, kind = %kind, error = %e, "evaluation failed");
            DataError::computation(key, kind, e)
        })
    }

    fn bound_method(&self, key: &str) -> Callable {
        let weak = Rc::downgrade(&self.inner);
        let key = key.to_string();
        Callable::new(move |args| {
            let node = Node::from_weak(&weak).ok_or("method's node has been dropped")?;
            Ok(node.call(&key, args)?)
        })
    }

    /// Values of every data slot (all but methods), resolving lazies.
    pub(crate) fn resolved_data(&self) -> Result<BTreeMap<String, Value>> {
        let mut out = BTreeMap::new();
        for key in self.keys() {
            if self.slot_kind(&key) == Some(SlotKind::Method) {
                continue;
            }
            if let Some(v) = self.get(&key)? {
                out.insert(key, v);
            }
        }
        Ok(out)
    }

    /// Stored values without forcing evaluation; keys of unevaluated or
    /// method slots map to `None`.
    pub(crate) fn peek_all(&self) -> BTreeMap<String, Option<Value>> {
        self.inner
            .borrow()
            .slots
            .iter()
            .map(|(k, slot)| (k.clone(), slot.peek().cloned()))
            .collect()
    }

    /// Values that can be read without running user code. Method slots and
    /// lazy slots with an empty cache are left out.
    pub(crate) fn observable_values(&self) -> BTreeMap<String, Option<Value>> {
        self.inner
            .borrow()
            .slots
            .iter()
            .map(|(k, slot)| {
                let known = match slot {
                    Slot::Method(_) | Slot::Lazy { cached: None, .. } => None,
                    other => other.peek().cloned(),
                };
                (k.clone(), known)
            })
            .collect()
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("Node")
                .field("id", &inner.id)
                .field("keys", &inner.slots.keys().collect::<Vec<_>>())
                .field("frozen", &inner.frozen)
                .finish(),
            Err(_) => write!(f, "Node(<busy>)"),
        }
    }
}

fn validate_key(key: &str) -> Result<()> {
    if is_identifier(key) {
        Ok(())
    } else {
        Err(DataError::InvalidKey {
            key: key.to_string(),
        })
    }
}

fn mismatch(key: &str, expected: &'static str, found: &Value) -> DataError {
    DataError::TypeMismatch {
        key: key.to_string(),
        expected,
        found: found.type_name(),
    }
}

// ---------------------------------------------------------------------------
// NodeBuilder
// ---------------------------------------------------------------------------

/// Collects fields, then inserts them all before evaluating computed ones.
#[derive(Debug, Default)]
pub struct NodeBuilder {
    settings: Option<Rc<Settings>>,
    fields: Vec<(String, Field)>,
}

impl NodeBuilder {
    pub fn settings(mut self, settings: impl Into<Rc<Settings>>) -> Self {
        self.settings = Some(settings.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, field: impl Into<Field>) -> Self {
        self.fields.push((key.into(), field.into()));
        self
    }

    pub fn build(self) -> Result<Node> {
        let node = match self.settings {
            Some(settings) => Node::with_settings(settings),
            None => Node::new(),
        };
        let mut pending = Vec::new();
        {
            let mut inner = node.inner.borrow_mut();
            for (key, field) in self.fields {
                validate_key(&key)?;
                let slot = match field {
                    Field::Value(v) => Slot::Static(v),
                    Field::Computed(fun) => {
                        pending.push(key.clone());
                        Slot::Computed { fun, value: None }
                    }
                    Field::Lazy(fun) => Slot::Lazy { fun, cached: None },
                    Field::Method(fun) => Slot::Method(fun),
                    Field::AntiFreeze(v) => {
                        inner.exempt.insert(key.clone());
                        Slot::AntiFreeze(v)
                    }
                };
                inner.slots.insert(key, slot);
            }
        }
        // A computed field read by an earlier one is already resolved here.
        for key in pending {
            node.get(&key)?;
        }
        Ok(node)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counting_lazy(counter: Rc<Cell<u32>>) -> Field {
        lazy(move |s| {
            counter.set(counter.get() + 1);
            Ok(Value::Int(s.get_i64("x")? * 2))
        })
    }

    #[test]
    fn set_and_get_static() {
        let node = Node::new();
        node.set("status", "in_progress").unwrap();
        assert_eq!(node.get("status").unwrap(), Some(Value::from("in_progress")));
        assert_eq!(node.slot_kind("status"), Some(SlotKind::Static));
    }

    #[test]
    fn get_missing_returns_none_and_default() {
        let node = Node::new();
        assert_eq!(node.get("nope").unwrap(), None);
        assert_eq!(node.get_or("nope", 7).unwrap(), Value::Int(7));
        assert!(matches!(node.require("nope"), Err(DataError::MissingKey { .. })));
    }

    #[test]
    fn invalid_keys_are_rejected() {
        let node = Node::new();
        for key in ["", "1abc", "has space", "dotted.key", "dash-ed"] {
            let err = node.set(key, 1).unwrap_err();
            assert!(matches!(err, DataError::InvalidKey { .. }), "{}", key);
        }
        let err = Node::from_fields([("not valid", 1)]).unwrap_err();
        assert!(matches!(err, DataError::InvalidKey { .. }));
    }

    #[test]
    fn computed_runs_once_at_construction() {
        let runs = Rc::new(Cell::new(0));
        let counter = runs.clone();
        let node = Node::builder()
            .field("x", 10)
            .field(
                "y",
                computed(move |s| {
                    counter.set(counter.get() + 1);
                    Ok(Value::Int(s.get_i64("x")? + 5))
                }),
            )
            .build()
            .unwrap();
        assert_eq!(runs.get(), 1);
        assert_eq!(node.get_i64("y").unwrap(), 15);
        node.set("x", 7).unwrap();
        assert_eq!(node.get_i64("y").unwrap(), 15);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn computed_may_read_later_computed() {
        let node = Node::builder()
            .field("a", computed(|s| Ok(Value::Int(s.get_i64("b")? + 1))))
            .field("b", computed(|_| Ok(Value::Int(1))))
            .build()
            .unwrap();
        assert_eq!(node.get_i64("a").unwrap(), 2);
    }

    #[test]
    fn computed_cycle_is_an_error() {
        let err = Node::builder()
            .field("a", computed(|s| Ok(Value::Int(s.get_i64("b")?))))
            .field("b", computed(|s| Ok(Value::Int(s.get_i64("a")?))))
            .build()
            .unwrap_err();
        assert!(matches!(err, DataError::Computation { .. }));
        assert!(err.to_string().contains("cyclic"));
    }

    #[test]
    fn computed_failure_surfaces_at_construction() {
        let err = Node::builder()
            .field("bad", computed(|_| Err("boom".into())))
            .build()
            .unwrap_err();
        match err {
            DataError::Computation { key, kind, .. } => {
                assert_eq!(key, "bad");
                assert_eq!(kind, EvalKind::Computed);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn lazy_evaluates_once_per_invalidation_window() {
        let runs = Rc::new(Cell::new(0));
        let node = Node::builder()
            .field("x", 10)
            .field("z", counting_lazy(runs.clone()))
            .build()
            .unwrap();
        assert_eq!(runs.get(), 0);
        assert_eq!(node.get_i64("z").unwrap(), 20);
        assert_eq!(node.get_i64("z").unwrap(), 20);
        assert_eq!(runs.get(), 1);

        node.set("x", 7).unwrap();
        assert_eq!(node.get_i64("z").unwrap(), 14);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn unrelated_mutation_resets_lazy_cache() {
        let runs = Rc::new(Cell::new(0));
        let node = Node::builder()
            .field("x", 1)
            .field("z", counting_lazy(runs.clone()))
            .build()
            .unwrap();
        node.get("z").unwrap();
        node.set("unrelated", true).unwrap();
        assert!(node.peek_all()["z"].is_none());
        node.get("z").unwrap();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn lazy_failure_is_computation_error_each_time() {
        let node = Node::from_fields([("z", lazy(|_| Err("nope".into())))]).unwrap();
        for _ in 0..2 {
            let err = node.get("z").unwrap_err();
            assert!(matches!(err, DataError::Computation { kind: EvalKind::Lazy, .. }));
        }
    }

    #[test]
    fn method_receives_node_and_args() {
        let node = Node::builder()
            .field("a", 2)
            .field(
                "increment",
                method(|s, args| {
                    let by = args.first().and_then(Value::as_i64).unwrap_or(1);
                    Ok(Value::Int(s.get_i64("a")? + by))
                }),
            )
            .build()
            .unwrap();
        assert_eq!(node.call("increment", &[Value::Int(5)]).unwrap(), Value::Int(7));

        let bound = node.get("increment").unwrap().unwrap();
        let callable = bound.as_callable().unwrap();
        assert_eq!(callable.call(&[Value::Int(1)]).unwrap(), Value::Int(3));
    }

    #[test]
    fn method_failure_is_wrapped() {
        let node = Node::from_fields([("fail", method(|_, _| Err("division by zero".into())))])
            .unwrap();
        let err = node.call("fail", &[]).unwrap_err();
        match err {
            DataError::Computation { key, kind, .. } => {
                assert_eq!(key, "fail");
                assert_eq!(kind, EvalKind::Method);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn call_on_data_key_is_not_callable() {
        let node = Node::from_fields([("a", 1)]).unwrap();
        assert!(matches!(node.call("a", &[]), Err(DataError::NotCallable { .. })));
        assert!(matches!(node.call("b", &[]), Err(DataError::MissingKey { .. })));
    }

    #[test]
    fn bound_method_outliving_node_fails_cleanly() {
        let callable = {
            let node = Node::from_fields([("m", method(|_, _| Ok(Value::Null)))]).unwrap();
            let bound = node.get("m").unwrap().unwrap();
            bound.as_callable().unwrap().clone()
        };
        assert!(callable.call(&[]).is_err());
    }

    #[test]
    fn anti_freeze_marker_is_discarded_on_read() {
        let node = Node::from_fields([("cache", anti_freeze(Value::new_map()))]).unwrap();
        assert_eq!(node.slot_kind("cache"), Some(SlotKind::AntiFreeze));
        assert_eq!(node.get("cache").unwrap(), Some(Value::new_map()));
        assert_eq!(node.slot_kind("cache"), Some(SlotKind::Static));
        assert!(node.is_exempt("cache"));
    }

    #[test]
    fn remove_deletes_key() {
        let node = Node::from_fields([("a", 1), ("b", 2)]).unwrap();
        assert!(node.remove("a").unwrap());
        assert!(!node.remove("a").unwrap());
        assert_eq!(node.keys(), vec!["b".to_string()]);
    }

    #[test]
    fn update_rewrites_plain_value() {
        let node = Node::from_fields([("items", Value::new_list())]).unwrap();
        node.update("items", |v| v.push(1)).unwrap();
        node.update("items", |v| v.push(2)).unwrap();
        assert_eq!(node.get("items").unwrap().unwrap().as_list().unwrap().len(), 2);
    }

    #[test]
    fn update_rejects_behaviour_slots() {
        let node = Node::from_fields([("z", lazy(|_| Ok(Value::Null)))]).unwrap();
        let err = node.update("z", |_| Ok(())).unwrap_err();
        assert!(matches!(err, DataError::TypeMismatch { found: "lazy", .. }));
    }

    #[test]
    fn typed_getters_report_mismatch() {
        let node = Node::from_fields([("name", "x")]).unwrap();
        assert_eq!(node.get_str("name").unwrap(), "x");
        let err = node.get_i64("name").unwrap_err();
        assert!(matches!(err, DataError::TypeMismatch { expected: "int", found: "str", .. }));
    }

    #[test]
    fn set_computed_evaluates_against_current_state() {
        let node = Node::from_fields([("x", 3)]).unwrap();
        node.set("double", computed(|s| Ok(Value::Int(s.get_i64("x")? * 2))))
            .unwrap();
        assert_eq!(node.get_i64("double").unwrap(), 6);
    }

    #[test]
    fn failing_computed_assignment_leaves_node_untouched() {
        let node = Node::from_fields([("x", 3)]).unwrap();
        let err = node.set("x", computed(|_| Err("bad".into()))).unwrap_err();
        assert!(matches!(err, DataError::Computation { .. }));
        assert_eq!(node.get_i64("x").unwrap(), 3);
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(Node::new().id(), Node::new().id());
    }
}
