//! Change watchers.
//!
//! A watcher is called after every assignment or removal on its node with
//! `(key, old, new)`. `old` is `None` when the key was absent (or its value
//! had not been evaluated yet); `new` is `None` for removals and for lazy or
//! method assignments, whose value is not known until read.
//!
//! Dispatch snapshots the watcher list and drops the borrow first, so a
//! watcher may mutate the node (re-entrant notifications are delivered) or
//! unsubscribe itself. A failing watcher is logged and skipped.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::{Node, NodeInner};
use crate::error::CallbackError;
use crate::value::Value;

pub type WatchFn = dyn Fn(&str, Option<&Value>, Option<&Value>) -> Result<(), CallbackError>;

#[derive(Default)]
pub(crate) struct WatcherList {
    next_id: u64,
    entries: Vec<(u64, Rc<WatchFn>)>,
}

impl WatcherList {
    fn add(&mut self, f: Rc<WatchFn>) -> u64 {
        self.next_id += 1;
        self.entries.push((self.next_id, f));
        self.next_id
    }

    fn remove(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(i, _)| *i != id);
        self.entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Returned by [`Node::watch`]; pass it back to [`Node::unwatch`] or call
/// [`WatchHandle::unsubscribe`]. Dropping the handle keeps the watcher.
pub struct WatchHandle {
    node: Weak<RefCell<NodeInner>>,
    id: u64,
}

impl WatchHandle {
    /// Detach the watcher. Returns false if it was already gone.
    pub fn unsubscribe(&self) -> bool {
        match Node::from_weak(&self.node) {
            Some(node) => node.unwatch(self),
            None => false,
        }
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle").field("id", &self.id).finish()
    }
}

impl Node {
    pub fn watch<F>(&self, f: F) -> WatchHandle
    where
        F: Fn(&str, Option<&Value>, Option<&Value>) -> Result<(), CallbackError> + 'static,
    {
        let id = self.inner.borrow_mut().watchers.add(Rc::new(f));
        WatchHandle {
            node: Rc::downgrade(&self.inner),
            id,
        }
    }

    pub fn unwatch(&self, handle: &WatchHandle) -> bool {
        let same_node = handle
            .node
            .upgrade()
            .is_some_and(|inner| Rc::ptr_eq(&inner, &self.inner));
        same_node && self.inner.borrow_mut().watchers.remove(handle.id)
    }

    pub fn watcher_count(&self) -> usize {
        self.inner.borrow().watchers.len()
    }

    pub(crate) fn notify(&self, key: &str, old: Option<&Value>, new: Option<&Value>) {
        let watchers: Vec<Rc<WatchFn>> = self
            .inner
            .borrow()
            .watchers
            .entries
            .iter()
            .map(|(_, f)| f.clone())
            .collect();
        for watcher in watchers {
            if let Err(e) = watcher(key, old, new) {
                tracing::warn!(key, error = %e, "watcher failed");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
