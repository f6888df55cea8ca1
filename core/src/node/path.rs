//! Dotted path access, as in `node.get_path("config.limits.max")`.
//!
//! Paths are plain identifiers joined by dots. Each segment is resolved with
//! the ordinary node get/set, passing through nested nodes and mappings.

use std::collections::BTreeMap;
use std::fmt;

use super::{Field, Node};
use crate::error::{DataError, Result};
use crate::value::Value;

/// True for `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A parsed dotted path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPath {
    segments: Vec<String>,
}

impl DataPath {
    /// Parse `a.b.c`. Empty paths, empty segments and non-identifier
    /// segments are rejected.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(DataError::path(input, "empty path"));
        }
        let mut segments = Vec::new();
        for part in input.split('.') {
            if part.is_empty() {
                return Err(DataError::path(input, "empty segment"));
            }
            if !is_identifier(part) {
                return Err(DataError::path(
                    input,
                    format!("segment '{}' is not an identifier", part),
                ));
            }
            segments.push(part.to_string());
        }
        Ok(DataPath { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Format back to a dotted string.
    pub fn to_dotted(&self) -> String {
        self.segments.join(".")
    }
}

impl fmt::Display for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_dotted())
    }
}

impl Node {
    /// Resolve a dotted path. A missing (or null) segment yields `default`;
    /// stepping into a scalar, sequence or opaque value is a path error.
    pub fn get_path(&self, path: &str, default: impl Into<Value>) -> Result<Value> {
        let parsed = DataPath::parse(path)?;
        let mut current = Value::Node(self.clone());
        for seg in parsed.segments() {
            let next = match &current {
                Value::Node(node) => node.get(seg)?,
                Value::Map(map) => map.get(seg).cloned(),
                Value::FrozenMap(map) => map.get(seg).cloned(),
                Value::Null => None,
                other => {
                    return Err(DataError::path(
                        path,
                        format!("cannot traverse into {} at '{}'", other.type_name(), seg),
                    ))
                }
            };
            match next {
                Some(v) => current = v,
                None => return Ok(default.into()),
            }
        }
        Ok(current)
    }

    /// Assign through a dotted path. Missing or null intermediate segments
    /// are created as child nodes sharing this node's settings.
    pub fn set_path(&self, path: &str, field: impl Into<Field>) -> Result<()> {
        let parsed = DataPath::parse(path)?;
        set_in_node(self, parsed.segments(), field.into(), path)
    }
}

fn set_in_node(node: &Node, segs: &[String], field: Field, path: &str) -> Result<()> {
    let (head, rest) = match segs.split_first() {
        Some(split) => split,
        None => return Err(DataError::path(path, "empty path")),
    };
    if rest.is_empty() {
        return node.set(head, field);
    }
    match node.get(head)? {
        None | Some(Value::Null) => {
            let child = Node::with_settings(node.settings());
            node.set(head, child.clone())?;
            set_in_node(&child, rest, field, path)
        }
        Some(Value::Node(child)) => set_in_node(&child, rest, field, path),
        Some(Value::Map(_)) | Some(Value::FrozenMap(_)) => node.update(head, |value| {
            let map = value.as_map_mut()?;
            set_in_map(map, rest, field, path, node)
        }),
        Some(other) => Err(DataError::path(
            path,
            format!("cannot traverse into {} at '{}'", other.type_name(), head),
        )),
    }
}

fn set_in_map(
    map: &mut BTreeMap<String, Value>,
    segs: &[String],
    field: Field,
    path: &str,
    owner: &Node,
) -> Result<()> {
    let (head, rest) = match segs.split_first() {
        Some(split) => split,
        None => return Err(DataError::path(path, "empty path")),
    };
    if rest.is_empty() {
        let value = match field {
            Field::Value(v) => v,
            _ => {
                return Err(DataError::path(
                    path,
                    "only plain values can be stored inside a mapping",
                ))
            }
        };
        map.insert(head.clone(), value);
        return Ok(());
    }
    match map.get_mut(head) {
        None | Some(Value::Null) => {
            let child = Node::with_settings(owner.settings());
            set_in_node(&child, rest, field, path)?;
            map.insert(head.clone(), Value::Node(child));
            Ok(())
        }
        Some(Value::Node(child)) => set_in_node(child, rest, field, path),
        Some(inner @ Value::Map(_)) | Some(inner @ Value::FrozenMap(_)) => {
            set_in_map(inner.as_map_mut()?, rest, field, path, owner)
        }
        Some(other) => Err(DataError::path(
            path,
            format!("cannot traverse into {} at '{}'", other.type_name(), head),
        )),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
