//! Plain-tree serialization between nodes and `serde_json::Value`.
//!
//! Cycle detection is path-scoped: a node that is already on the current
//! recursion path becomes a `{"$circular": true}` sentinel, while a node
//! shared by two siblings is written out twice. Method slots are skipped
//! and lazy slots are resolved.

use std::rc::Rc;

use serde_json::{Map as JsonMap, Value as Json};

use crate::error::{DataError, Result};
use crate::node::{is_identifier, Node, SlotKind};
use crate::settings::Settings;
use crate::value::Value;

/// Marker written in place of exempt values when hashing.
const EXEMPT_MARKER: &str = "$exempt";

pub(crate) struct PlainTreeWriter {
    ancestors: Vec<usize>,
    circular_marker: String,
    mask_exempt: bool,
}

impl PlainTreeWriter {
    pub(crate) fn new(settings: &Settings) -> Self {
        PlainTreeWriter {
            ancestors: Vec::new(),
            circular_marker: settings.circular_marker.clone(),
            mask_exempt: false,
        }
    }

    pub(crate) fn for_node(node: &Node) -> Self {
        Self::new(&node.settings())
    }

    /// Replace values under exempt keys with a fixed marker.
    pub(crate) fn mask_exempt(mut self) -> Self {
        self.mask_exempt = true;
        self
    }

    pub(crate) fn write_node(&mut self, node: &Node, path: &str) -> Result<Json> {
        let addr = node.addr();
        if self.ancestors.contains(&addr) {
            return Ok(marker(&self.circular_marker));
        }
        self.ancestors.push(addr);
        let result = self.write_fields(node, path);
        self.ancestors.pop();
        result
    }

    fn write_fields(&mut self, node: &Node, path: &str) -> Result<Json> {
        let mut out = JsonMap::new();
        for key in node.keys() {
            if node.slot_kind(&key) == Some(SlotKind::Method) {
                continue;
            }
            if self.mask_exempt && node.is_exempt(&key) {
                out.insert(key, marker(EXEMPT_MARKER));
                continue;
            }
            if let Some(value) = node.get(&key)? {
                let child = self.write_value(&value, &join(path, &key))?;
                out.insert(key, child);
            }
        }
        Ok(Json::Object(out))
    }

    pub(crate) fn write_value(&mut self, value: &Value, path: &str) -> Result<Json> {
        match value {
            Value::Null => Ok(Json::Null),
            Value::Bool(b) => Ok(Json::Bool(*b)),
            Value::Int(i) => Ok(Json::from(*i)),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .ok_or_else(|| DataError::serialization(path, format!("non-finite float {}", f))),
            Value::Str(s) => Ok(Json::String(s.clone())),
            Value::List(_) | Value::FrozenList(_) => {
                let items = value.as_list().unwrap_or_default();
                self.write_seq(items.iter(), path)
            }
            Value::Set(_) | Value::FrozenSet(_) => {
                let items = value.as_set().into_iter().flatten();
                self.write_seq(items, path)
            }
            Value::Map(_) | Value::FrozenMap(_) => {
                let mut out = JsonMap::new();
                for (k, v) in value.as_map().into_iter().flatten() {
                    out.insert(k.clone(), self.write_value(v, &join(path, k))?);
                }
                Ok(Json::Object(out))
            }
            Value::Node(n) => self.write_node(n, path),
            Value::Callable(_) => Err(DataError::serialization(path, "callable has no plain form")),
            Value::Opaque(o) => Err(DataError::serialization(
                path,
                format!("{} has no plain form", o.type_name()),
            )),
        }
    }

    fn write_seq<'a>(&mut self, items: impl Iterator<Item = &'a Value>, path: &str) -> Result<Json> {
        let mut out = Vec::new();
        for (i, v) in items.enumerate() {
            out.push(self.write_value(v, &format!("{}[{}]", path, i))?);
        }
        Ok(Json::Array(out))
    }
}

fn marker(name: &str) -> Json {
    let mut m = JsonMap::new();
    m.insert(name.to_string(), Json::Bool(true));
    Json::Object(m)
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

// ---------------------------------------------------------------------------
// Node API
// ---------------------------------------------------------------------------

impl Node {
    /// Render this node as a JSON-compatible tree.
    pub fn to_plain_tree(&self) -> Result<Json> {
        PlainTreeWriter::for_node(self).write_node(self, "")
    }

    /// Build a node from a JSON object with default settings.
    pub fn from_plain_tree(tree: &Json) -> Result<Node> {
        Self::from_plain_tree_with(tree, Settings::default())
    }

    /// Build a node from a JSON object. Nested objects whose keys are all
    /// identifiers become child nodes; any other object becomes a map.
    pub fn from_plain_tree_with(tree: &Json, settings: impl Into<Rc<Settings>>) -> Result<Node> {
        let settings = settings.into();
        match tree {
            Json::Object(fields) => node_from_object(fields, &settings, ""),
            other => Err(DataError::serialization(
                "",
                format!("expected an object at the root, found {}", json_type(other)),
            )),
        }
    }
}

fn node_from_object(fields: &JsonMap<String, Json>, settings: &Rc<Settings>, path: &str) -> Result<Node> {
    let node = Node::with_settings(settings.clone());
    for (key, json) in fields {
        if !is_identifier(key) {
            return Err(DataError::InvalidKey { key: key.clone() });
        }
        let value = value_from_json(json, settings, &join(path, key))?;
        node.set(key, value)?;
    }
    Ok(node)
}

fn value_from_json(json: &Json, settings: &Rc<Settings>, path: &str) -> Result<Value> {
    Ok(match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::Str(s.clone()),
        Json::Array(items) => Value::List(
            items
                .iter()
                .enumerate()
                .map(|(i, v)| value_from_json(v, settings, &format!("{}[{}]", path, i)))
                .collect::<Result<Vec<_>>>()?,
        ),
        Json::Object(fields) if fields.keys().all(|k| is_identifier(k)) => {
            Value::Node(node_from_object(fields, settings, path)?)
        }
        Json::Object(fields) => {
            let mut map = std::collections::BTreeMap::new();
            for (k, v) in fields {
                map.insert(k.clone(), value_from_json(v, settings, &join(path, k))?);
            }
            Value::Map(map)
        }
    })
}

fn json_type(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
