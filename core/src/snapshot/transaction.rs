//! Transactions: capture, run, then commit or restore.
//!
//! `begin` records the state of every node reachable from the root. A
//! transaction ends in exactly one of two states: `Committed` (the record is
//! discarded) or `RolledBack` (the record is written back). A guard dropped
//! while still active rolls back.
//!
//! Transactions do not nest: a node already covered by an active
//! transaction cannot start another one.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{DataError, Result};
use crate::node::Node;
use crate::settings::RollbackEvents;
use crate::value::Value;

use super::state::TreeState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

impl TransactionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionState::Active => "active",
            TransactionState::Committed => "committed",
            TransactionState::RolledBack => "rolled_back",
        }
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct Transaction {
    root: Node,
    saved: Option<TreeState>,
    state: TransactionState,
}

impl Node {
    /// Start a transaction rooted at this node.
    pub fn begin(&self) -> Result<Transaction> {
        let saved = TreeState::capture(self)?;
        if let Some(busy) = saved.nodes().find(|n| n.inner.borrow().in_transaction) {
            return Err(DataError::transaction(format!(
                "node {} is already part of an active transaction",
                busy.id()
            )));
        }
        mark(&saved, true);
        tracing::debug!(node = self.id(), nodes = saved.len(), "transaction started");
        Ok(Transaction {
            root: self.clone(),
            saved: Some(saved),
            state: TransactionState::Active,
        })
    }

    /// Run `body` inside a transaction. On `Ok` the changes are kept; on
    /// `Err` the tree is restored and the error is returned unchanged, unless
    /// the restore itself fails, in which case that failure is returned.
    pub fn transaction<T, E, F>(&self, body: F) -> std::result::Result<T, E>
    where
        E: From<DataError>,
        F: FnOnce(&Node) -> std::result::Result<T, E>,
    {
        let tx = self.begin()?;
        let outcome = body(self);
        tx.finish(outcome)
    }
}

impl Transaction {
    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn commit(mut self) {
        self.commit_inner();
    }

    pub fn rollback(mut self) -> Result<()> {
        self.rollback_inner()
    }

    /// Commit on `Ok`, roll back on `Err`.
    pub fn finish<T, E>(mut self, outcome: std::result::Result<T, E>) -> std::result::Result<T, E>
    where
        E: From<DataError>,
    {
        match outcome {
            Ok(v) => {
                self.commit_inner();
                Ok(v)
            }
            Err(e) => match self.rollback_inner() {
                Ok(()) => Err(e),
                Err(restore) => Err(E::from(restore)),
            },
        }
    }

    fn commit_inner(&mut self) {
        if let Some(saved) = self.saved.take() {
            mark(&saved, false);
        }
        self.state = TransactionState::Committed;
        tracing::debug!(node = self.root.id(), "transaction committed");
    }

    fn rollback_inner(&mut self) -> Result<()> {
        let Some(saved) = self.saved.take() else {
            return Ok(());
        };
        self.state = TransactionState::RolledBack;
        let compensate = self.root.settings().rollback_events == RollbackEvents::Compensate;
        let before = compensate.then(|| self.root.observable_values());

        mark(&saved, false);
        let result = saved.restore();
        match &result {
            Ok(()) => tracing::info!(node = self.root.id(), nodes = saved.len(), "transaction rolled back"),
            Err(e) => tracing::error!(node = self.root.id(), error = %e, "transaction rollback failed"),
        }

        if let Some(before) = before {
            let after = self.root.observable_values();
            let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
            for key in keys {
                // Unevaluated lazies and methods have no value to compare.
                let (Some(current), Some(restored)) = (observed(&before, key), observed(&after, key)) else {
                    continue;
                };
                if current != restored {
                    self.root.notify(key, current.as_ref(), restored.as_ref());
                }
            }
        }
        result
    }
}

/// `Some(None)` for an absent key, `None` when the value is not observable.
fn observed(values: &BTreeMap<String, Option<Value>>, key: &str) -> Option<Option<Value>> {
    match values.get(key) {
        None => Some(None),
        Some(None) => None,
        Some(Some(v)) => Some(Some(v.clone())),
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.state == TransactionState::Active {
            tracing::warn!(node = self.root.id(), "active transaction dropped, rolling back");
            let _ = self.rollback_inner();
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("root", &self.root)
            .field("state", &self.state)
            .finish()
    }
}

fn mark(saved: &TreeState, active: bool) {
    for node in saved.nodes() {
        match node.inner.try_borrow_mut() {
            Ok(mut inner) => inner.in_transaction = active,
            Err(_) => tracing::error!(node = node.addr(), "cannot update transaction flag on busy node"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::lazy;
    use crate::settings::Settings;
    use crate::value::Value;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tracing_test::traced_test;

    #[derive(Debug)]
    enum AppError {
        Data(DataError),
        Insufficient,
    }

    impl From<DataError> for AppError {
        fn from(e: DataError) -> Self {
            AppError::Data(e)
        }
    }

    #[test]
    fn commit_keeps_changes() {
        let node = Node::from_fields([("credits", 100)]).unwrap();
        let out: Result<i64> = node.transaction(|n| {
            n.set("credits", 50)?;
            n.get_i64("credits")
        });
        assert_eq!(out.unwrap(), 50);
        assert_eq!(node.get_i64("credits").unwrap(), 50);
    }

    #[test]
    fn failure_restores_and_returns_original_error() {
        let node = Node::from_fields([("credits", 100)]).unwrap();
        let out: std::result::Result<(), AppError> = node.transaction(|n| {
            let credits = n.get_i64("credits")?;
            n.set("credits", credits - 50)?;
            Err(AppError::Insufficient)
        });
        assert!(matches!(out, Err(AppError::Insufficient)));
        assert_eq!(node.get_i64("credits").unwrap(), 100);
    }

    #[test]
    fn nested_nodes_restored_in_place() {
        let child = Node::from_fields([("v", 1)]).unwrap();
        let root = Node::from_fields([("child", child.clone())]).unwrap();
        let out: Result<()> = root.transaction(|_| {
            child.set("v", 99)?;
            Err(DataError::transaction("abort"))
        });
        assert!(out.is_err());
        assert_eq!(child.get_i64("v").unwrap(), 1);
    }

    #[test]
    fn lazy_cache_state_restored() {
        let node = Node::builder()
            .field("x", 1)
            .field("z", lazy(|s| Ok(Value::Int(s.get_i64("x")? + 1))))
            .build()
            .unwrap();
        node.get("z").unwrap();
        let before = node.peek_all();
        let _: Result<()> = node.transaction(|n| {
            n.set("x", 5)?;
            Err(DataError::transaction("abort"))
        });
        assert_eq!(node.peek_all(), before);
        assert_eq!(node.peek_all()["z"], Some(Value::Int(2)));
    }

    #[test]
    fn guard_commit_and_rollback() {
        let node = Node::from_fields([("a", 1)]).unwrap();
        let tx = node.begin().unwrap();
        assert_eq!(tx.state(), TransactionState::Active);
        node.set("a", 2).unwrap();
        tx.rollback().unwrap();
        assert_eq!(node.get_i64("a").unwrap(), 1);

        let tx = node.begin().unwrap();
        node.set("a", 3).unwrap();
        tx.commit();
        assert_eq!(node.get_i64("a").unwrap(), 3);
    }

    #[traced_test]
    #[test]
    fn dropped_guard_rolls_back() {
        let node = Node::from_fields([("a", 1)]).unwrap();
        {
            let _tx = node.begin().unwrap();
            node.set("a", 2).unwrap();
        }
        assert_eq!(node.get_i64("a").unwrap(), 1);
        assert!(logs_contain("active transaction dropped"));
    }

    #[test]
    fn nesting_is_rejected() {
        let child = Node::new();
        let root = Node::from_fields([("child", child.clone())]).unwrap();
        let outer = root.begin().unwrap();
        assert!(matches!(root.begin(), Err(DataError::Transaction { .. })));
        assert!(matches!(child.begin(), Err(DataError::Transaction { .. })));
        outer.commit();
        child.begin().unwrap().commit();
    }

    #[test]
    fn freezing_inside_transaction_makes_rollback_fail() {
        let node = Node::from_fields([("a", 1)]).unwrap();
        let out: Result<()> = node.transaction(|n| {
            n.freeze()?;
            Err(DataError::transaction("abort"))
        });
        let err = out.unwrap_err();
        assert!(err.to_string().contains("rollback incomplete"));
        assert!(node.is_frozen());
    }

    #[test]
    fn silent_rollback_fires_nothing_extra() {
        let node = Node::from_fields([("a", 1)]).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        node.watch(move |k, _, new| {
            sink.borrow_mut().push((k.to_string(), new.cloned()));
            Ok(())
        });
        let _: Result<()> = node.transaction(|n| {
            n.set("a", 2)?;
            Err(DataError::transaction("abort"))
        });
        assert_eq!(*seen.borrow(), vec![("a".to_string(), Some(Value::Int(2)))]);
    }

    #[test]
    fn compensating_rollback_reports_restored_values() {
        let settings = Settings {
            rollback_events: RollbackEvents::Compensate,
            ..Settings::default()
        };
        let node = Node::builder()
            .settings(settings)
            .field("a", 1)
            .build()
            .unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        node.watch(move |k, old, new| {
            sink.borrow_mut().push((k.to_string(), old.cloned(), new.cloned()));
            Ok(())
        });
        let _: Result<()> = node.transaction(|n| {
            n.set("a", 2)?;
            n.set("b", true)?;
            Err(DataError::transaction("abort"))
        });
        let events = seen.borrow();
        assert_eq!(events.len(), 4);
        assert!(events.contains(&("a".to_string(), Some(Value::Int(2)), Some(Value::Int(1)))));
        assert!(events.contains(&("b".to_string(), Some(Value::Bool(true)), None)));
    }

    #[test]
    fn compensating_rollback_skips_unchanged_lazy() {
        let settings = Settings {
            rollback_events: RollbackEvents::Compensate,
            ..Settings::default()
        };
        let node = Node::builder()
            .settings(settings)
            .field("x", 1)
            .field("z", lazy(|s| Ok(Value::Int(s.get_i64("x")? + 1))))
            .build()
            .unwrap();
        assert_eq!(node.get_i64("z").unwrap(), 2);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        node.watch(move |k, old, new| {
            sink.borrow_mut().push((k.to_string(), old.cloned(), new.cloned()));
            Ok(())
        });
        let _: Result<()> = node.transaction(|n| {
            n.set("unrelated", 5)?;
            Err(DataError::transaction("abort"))
        });
        assert_eq!(
            *seen.borrow(),
            vec![
                ("unrelated".to_string(), None, Some(Value::Int(5))),
                ("unrelated".to_string(), Some(Value::Int(5)), None),
            ]
        );
        assert_eq!(node.get_i64("z").unwrap(), 2);
    }
}
