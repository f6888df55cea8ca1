//! Slot model: the per-key evaluation strategy of a node.
//!
//! Callers describe a key with a [`Field`]; the node turns it into a [`Slot`]
//! when the key is inserted. `Computed` slots are evaluated at insertion,
//! `Lazy` slots on first read, `Method` slots on every call.

use std::fmt;
use std::rc::Rc;

use super::Node;
use crate::error::CallbackError;
use crate::value::{Callable, Opaque, Value};

/// Function evaluated against the owning node (computed, lazy and view fields).
pub type ComputeFn = Rc<dyn Fn(&Node) -> Result<Value, CallbackError>>;

/// Function invoked with the owning node plus caller arguments.
pub type MethodFn = Rc<dyn Fn(&Node, &[Value]) -> Result<Value, CallbackError>>;

// ---------------------------------------------------------------------------
// Field (input side)
// ---------------------------------------------------------------------------

/// What a caller assigns to a key.
#[derive(Clone)]
pub enum Field {
    Value(Value),
    Computed(ComputeFn),
    Lazy(ComputeFn),
    Method(MethodFn),
    AntiFreeze(Value),
}

impl Field {
    /// Plain data, as opposed to a behaviour wrapper.
    pub(crate) fn is_plain(&self) -> bool {
        matches!(self, Field::Value(_) | Field::AntiFreeze(_))
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Field::Computed(_) => f.write_str("Computed(<fn>)"),
            Field::Lazy(_) => f.write_str("Lazy(<fn>)"),
            Field::Method(_) => f.write_str("Method(<fn>)"),
            Field::AntiFreeze(v) => f.debug_tuple("AntiFreeze").field(v).finish(),
        }
    }
}

/// Evaluate `f` once, when the key is inserted.
pub fn computed<F>(f: F) -> Field
where
    F: Fn(&Node) -> Result<Value, CallbackError> + 'static,
{
    Field::Computed(Rc::new(f))
}

/// Evaluate `f` on first read and cache until the node is next mutated.
pub fn lazy<F>(f: F) -> Field
where
    F: Fn(&Node) -> Result<Value, CallbackError> + 'static,
{
    Field::Lazy(Rc::new(f))
}

/// Behaviour bound to the node; invoked with the node and call arguments.
pub fn method<F>(f: F) -> Field
where
    F: Fn(&Node, &[Value]) -> Result<Value, CallbackError> + 'static,
{
    Field::Method(Rc::new(f))
}

/// Exempt `value` from freezing. Mutations of it stay legal after `freeze()`.
pub fn anti_freeze(value: impl Into<Value>) -> Field {
    Field::AntiFreeze(value.into())
}

macro_rules! field_from_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Field {
                fn from(v: $ty) -> Self {
                    Field::Value(Value::from(v))
                }
            }
        )*
    };
}

field_from_value!(
    bool,
    i64,
    i32,
    u32,
    f64,
    &str,
    String,
    Vec<Value>,
    std::collections::BTreeSet<Value>,
    std::collections::BTreeMap<String, Value>,
    Node,
    Callable,
    Opaque,
);

impl From<Value> for Field {
    fn from(v: Value) -> Self {
        Field::Value(v)
    }
}

// ---------------------------------------------------------------------------
// Slot (stored side)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Static,
    Computed,
    Lazy,
    Method,
    AntiFreeze,
}

impl SlotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotKind::Static => "static",
            SlotKind::Computed => "computed",
            SlotKind::Lazy => "lazy",
            SlotKind::Method => "method",
            SlotKind::AntiFreeze => "anti-freeze",
        }
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub(crate) enum Slot {
    Static(Value),
    /// `value` is `None` only while the node is being constructed.
    Computed { fun: ComputeFn, value: Option<Value> },
    Lazy { fun: ComputeFn, cached: Option<Value> },
    Method(MethodFn),
    /// Discarded (becomes `Static`) on first read or on freeze.
    AntiFreeze(Value),
}

impl Slot {
    pub(crate) fn kind(&self) -> SlotKind {
        match self {
            Slot::Static(_) => SlotKind::Static,
            Slot::Computed { .. } => SlotKind::Computed,
            Slot::Lazy { .. } => SlotKind::Lazy,
            Slot::Method(_) => SlotKind::Method,
            Slot::AntiFreeze(_) => SlotKind::AntiFreeze,
        }
    }

    /// The stored value, without forcing any evaluation.
    pub(crate) fn peek(&self) -> Option<&Value> {
        match self {
            Slot::Static(v) | Slot::AntiFreeze(v) => Some(v),
            Slot::Computed { value, .. } => value.as_ref(),
            Slot::Lazy { cached, .. } => cached.as_ref(),
            Slot::Method(_) => None,
        }
    }

    pub(crate) fn invalidate(&mut self) {
        if let Slot::Lazy { cached, .. } = self {
            *cached = None;
        }
    }

    /// Replacement slot holding `frozen` after the freeze transform. Lazy
    /// slots are pinned: their frozen result never recomputes.
    pub(crate) fn pinned(&self, frozen: Value) -> Slot {
        match self {
            Slot::Computed { fun, .. } | Slot::Lazy { fun, .. } => Slot::Computed {
                fun: fun.clone(),
                value: Some(frozen),
            },
            Slot::Method(fun) => Slot::Method(fun.clone()),
            Slot::Static(_) | Slot::AntiFreeze(_) => Slot::Static(frozen),
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.peek() {
            Some(v) => write!(f, "{}({:?})", self.kind(), v),
            None => write!(f, "{}(<unevaluated>)", self.kind()),
        }
    }
}
