//! Reactive data nodes.
//!
//! A [`Node`] is a key-value container whose slots hold plain values,
//! values computed once at construction, lazily cached values, or methods.
//! On top of that it offers change watchers, transactions with rollback,
//! recursive freezing with per-key exemptions, shallow diff/patch, and
//! cycle-safe conversion to and from plain JSON trees.
//!
//! ```
//! use datakit_core::{computed, lazy, Node, Value};
//!
//! let node = Node::builder()
//!     .field("x", 10)
//!     .field("y", computed(|s| Ok(Value::Int(s.get_i64("x")? + 5))))
//!     .field("z", lazy(|s| Ok(Value::Int(s.get_i64("x")? * 2))))
//!     .build()
//!     .unwrap();
//! node.set("x", 7).unwrap();
//! assert_eq!(node.get_i64("y").unwrap(), 15);
//! assert_eq!(node.get_i64("z").unwrap(), 14);
//! ```

pub mod error;
mod freeze;
pub mod node;
mod serialize;
pub mod settings;
pub mod snapshot;
pub mod value;

pub use error::{CallbackError, DataError, EvalKind, Result};
pub use node::{
    anti_freeze, computed, lazy, method, DataPath, Field, Node, NodeBuilder, SlotKind, View,
    WatchHandle,
};
pub use settings::{RemovalPolicy, RollbackEvents, Settings};
pub use snapshot::{Change, Patch, Transaction, TransactionState};
pub use value::{Callable, Opaque, Value, ValueKind};
