//! Read-only projections of a node.
//!
//! A [`View`] holds named functions of its source node. Nothing is cached;
//! every read recomputes against the node's current state.

use std::fmt;
use std::rc::Rc;

use super::{ComputeFn, Node};
use crate::error::{CallbackError, DataError, EvalKind, Result};
use crate::value::Value;

#[derive(Clone)]
pub struct View {
    source: Node,
    fields: Vec<(String, ComputeFn)>,
}

impl View {
    pub fn field<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Node) -> std::result::Result<Value, CallbackError> + 'static,
    {
        let name = name.into();
        let fun: ComputeFn = Rc::new(f);
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = fun,
            None => self.fields.push((name, fun)),
        }
        self
    }

    pub fn source(&self) -> &Node {
        &self.source
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Result<Value> {
        let fun = self
            .fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, f)| f.clone())
            .ok_or_else(|| DataError::UnknownField {
                name: name.to_string(),
            })?;
        fun(&self.source).map_err(|e| DataError::computation(name, EvalKind::View, e))
    }

    /// Every field, in declaration order.
    pub fn evaluate_all(&self) -> Result<Vec<(String, Value)>> {
        self.fields
            .iter()
            .map(|(name, _)| Ok((name.clone(), self.get(name)?)))
            .collect()
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("source", &self.source)
            .field("fields", &self.names())
            .finish()
    }
}

impl Node {
    /// Start a view over this node; add fields with [`View::field`].
    pub fn view(&self) -> View {
        View {
            source: self.clone(),
            fields: Vec::new(),
        }
    }
}
