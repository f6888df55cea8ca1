//! The closed value model stored in node slots.
//!
//! Containers come in mutable and frozen flavours. Frozen containers are
//! shared (`Rc`) and expose no mutable access; the freeze engine converts
//! between the two by dispatching on [`ValueKind`].

mod handle;

pub use handle::{Callable, Opaque};

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::error::{DataError, Result};
use crate::node::Node;

/// Coarse tag used by the freeze and serialization engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Scalar,
    OrderedContainer,
    UnorderedContainer,
    Mapping,
    Node,
    Callable,
    Opaque,
}

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Set(BTreeSet<Value>),
    Map(BTreeMap<String, Value>),
    FrozenList(Rc<[Value]>),
    FrozenSet(Rc<BTreeSet<Value>>),
    FrozenMap(Rc<BTreeMap<String, Value>>),
    Node(Node),
    Callable(Callable),
    Opaque(Opaque),
}

impl Value {
    pub fn new_list() -> Self {
        Value::List(Vec::new())
    }

    pub fn new_set() -> Self {
        Value::Set(BTreeSet::new())
    }

    pub fn new_map() -> Self {
        Value::Map(BTreeMap::new())
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_) => {
                ValueKind::Scalar
            }
            Value::List(_) | Value::FrozenList(_) => ValueKind::OrderedContainer,
            Value::Set(_) | Value::FrozenSet(_) => ValueKind::UnorderedContainer,
            Value::Map(_) | Value::FrozenMap(_) => ValueKind::Mapping,
            Value::Node(_) => ValueKind::Node,
            Value::Callable(_) => ValueKind::Callable,
            Value::Opaque(_) => ValueKind::Opaque,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
            Value::FrozenList(_) => "frozen list",
            Value::FrozenSet(_) => "frozen set",
            Value::FrozenMap(_) => "frozen map",
            Value::Node(_) => "node",
            Value::Callable(_) => "callable",
            Value::Opaque(_) => "opaque",
        }
    }

    /// True for containers that were produced by freezing.
    pub fn is_frozen_container(&self) -> bool {
        matches!(
            self,
            Value::FrozenList(_) | Value::FrozenSet(_) | Value::FrozenMap(_)
        )
    }

    // -------------------------------------------------------------------
    // Readers
    // -------------------------------------------------------------------

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Floats, and ints widened to float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            Value::FrozenList(items) => Some(&items[..]),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&BTreeSet<Value>> {
        match self {
            Value::Set(items) => Some(items),
            Value::FrozenSet(items) => Some(items.as_ref()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(entries) => Some(entries),
            Value::FrozenMap(entries) => Some(entries.as_ref()),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_callable(&self) -> Option<&Callable> {
        match self {
            Value::Callable(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_opaque(&self) -> Option<&Opaque> {
        match self {
            Value::Opaque(o) => Some(o),
            _ => None,
        }
    }

    // -------------------------------------------------------------------
    // Mutable access (fails on frozen containers)
    // -------------------------------------------------------------------

    pub fn as_list_mut(&mut self) -> Result<&mut Vec<Value>> {
        match self {
            Value::List(items) => Ok(items),
            other => Err(other.refuse("list")),
        }
    }

    pub fn as_set_mut(&mut self) -> Result<&mut BTreeSet<Value>> {
        match self {
            Value::Set(items) => Ok(items),
            other => Err(other.refuse("set")),
        }
    }

    pub fn as_map_mut(&mut self) -> Result<&mut BTreeMap<String, Value>> {
        match self {
            Value::Map(entries) => Ok(entries),
            other => Err(other.refuse("map")),
        }
    }

    pub fn push(&mut self, item: impl Into<Value>) -> Result<()> {
        self.as_list_mut()?.push(item.into());
        Ok(())
    }

    /// Insert into a mapping, returning the previous value for `key`.
    pub fn insert(&mut self, key: impl Into<String>, item: impl Into<Value>) -> Result<Option<Value>> {
        Ok(self.as_map_mut()?.insert(key.into(), item.into()))
    }

    /// Add a set member. Returns whether it was newly inserted.
    pub fn add(&mut self, item: impl Into<Value>) -> Result<bool> {
        Ok(self.as_set_mut()?.insert(item.into()))
    }

    fn refuse(&self, expected: &'static str) -> DataError {
        if self.is_frozen_container() {
            DataError::ImmutableValue {
                kind: self.type_name(),
            }
        } else {
            DataError::TypeMismatch {
                key: String::new(),
                expected,
                found: self.type_name(),
            }
        }
    }

    // -------------------------------------------------------------------
    // Ordering helpers
    // -------------------------------------------------------------------

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Float(_) => 3,
            Value::Str(_) => 4,
            Value::List(_) | Value::FrozenList(_) => 5,
            Value::Set(_) | Value::FrozenSet(_) => 6,
            Value::Map(_) | Value::FrozenMap(_) => 7,
            Value::Node(_) => 8,
            Value::Callable(_) => 9,
            Value::Opaque(_) => 10,
        }
    }
}

// ---------------------------------------------------------------------------
// Equality & ordering
// ---------------------------------------------------------------------------

// Total and structural: a frozen container equals its mutable counterpart,
// floats use IEEE total order, reference leaves compare by identity.
impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_rank = self.rank().cmp(&other.rank());
        if by_rank != Ordering::Equal {
            return by_rank;
        }
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Node(a), Value::Node(b)) => a.addr().cmp(&b.addr()),
            (Value::Callable(a), Value::Callable(b)) => a.addr().cmp(&b.addr()),
            (Value::Opaque(a), Value::Opaque(b)) => a.addr().cmp(&b.addr()),
            _ => {
                if let (Some(a), Some(b)) = (self.as_list(), other.as_list()) {
                    a.cmp(b)
                } else if let (Some(a), Some(b)) = (self.as_set(), other.as_set()) {
                    a.cmp(b)
                } else if let (Some(a), Some(b)) = (self.as_map(), other.as_map()) {
                    a.cmp(b)
                } else {
                    Ordering::Equal
                }
            }
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<BTreeSet<Value>> for Value {
    fn from(items: BTreeSet<Value>) -> Self {
        Value::Set(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Value::Map(entries)
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        Value::Node(node)
    }
}

impl From<Callable> for Value {
    fn from(c: Callable) -> Self {
        Value::Callable(c)
    }
}

impl From<Opaque> for Value {
    fn from(o: Opaque) -> Self {
        Value::Opaque(o)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> FromIterator<T> for Value {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Value::List(iter.into_iter().map(Into::into).collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
