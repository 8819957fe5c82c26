// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Syntax tree nodes.
//!
//! A [`Node`] is a kind tag plus named fields. Fields hold either child nodes,
//! ordered lists of child nodes, or plain data (names, literal values,
//! position metadata). Which fields are *children* for traversal purposes is
//! not a property of the node itself: it comes from the kind table (see
//! [`crate::kinds`]), so a node of an unknown kind is walked as a leaf.
//!
//! # JSON Interchange
//!
//! Trees arrive from external parsers as ESTree-style JSON, where every node
//! is an object with a string `type` property:
//!
//! ```
//! use serde_json::json;
//! use tugweave_core::node::Node;
//!
//! let tree = Node::from_json(json!({
//!     "type": "ExpressionStatement",
//!     "expression": { "type": "Identifier", "name": "x", "start": 0, "end": 1 }
//! }))
//! .expect("node");
//!
//! assert_eq!(tree.kind, "ExpressionStatement");
//! assert_eq!(tree.child("expression").map(|n| n.kind.as_str()), Some("Identifier"));
//! assert_eq!(tree.to_json()["expression"]["name"], "x");
//! ```

use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Property that carries a node's kind in JSON form.
pub const KIND_PROPERTY: &str = "type";

// ============================================================================
// Field
// ============================================================================

/// The value held by one named field of a [`Node`].
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// A single child node.
    Node(Box<Node>),
    /// An ordered sequence of child nodes.
    List(Vec<Node>),
    /// Plain data that is never traversed.
    Value(Value),
    /// An empty slot (e.g. an optional child that is absent).
    Null,
}

impl Field {
    /// Convert a JSON value into a field, recognizing node objects and
    /// arrays made only of node objects.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Field::Null,
            Value::Object(map) if is_node_object(&map) => match Node::from_map(map) {
                Some(node) => Field::Node(Box::new(node)),
                None => Field::Null,
            },
            Value::Array(items) if items.iter().all(is_node_value) => Field::List(
                items
                    .into_iter()
                    .filter_map(Node::from_json)
                    .collect(),
            ),
            other => Field::Value(other),
        }
    }

    /// Convert this field back into JSON.
    pub fn to_json(&self) -> Value {
        match self {
            Field::Node(node) => node.to_json(),
            Field::List(nodes) => Value::Array(nodes.iter().map(Node::to_json).collect()),
            Field::Value(value) => value.clone(),
            Field::Null => Value::Null,
        }
    }

    /// Returns the child node if this field holds one.
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Field::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Returns the child list if this field holds one.
    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Field::List(nodes) => Some(nodes),
            _ => None,
        }
    }

    /// Returns the plain value if this field holds one.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Field::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Returns true for [`Field::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Field::Null)
    }
}

impl From<Node> for Field {
    fn from(node: Node) -> Self {
        Field::Node(Box::new(node))
    }
}

impl From<Vec<Node>> for Field {
    fn from(nodes: Vec<Node>) -> Self {
        Field::List(nodes)
    }
}

fn is_node_object(map: &Map<String, Value>) -> bool {
    matches!(map.get(KIND_PROPERTY), Some(Value::String(_)))
}

fn is_node_value(value: &Value) -> bool {
    matches!(value, Value::Object(map) if is_node_object(map))
}

// ============================================================================
// Node
// ============================================================================

/// One element of the syntax tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// The node kind, e.g. `"Identifier"`.
    pub kind: String,
    /// Named fields, children and data alike.
    pub fields: BTreeMap<String, Field>,
}

impl Node {
    /// Create a node with no fields.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder: set a field.
    pub fn with_field(mut self, name: impl Into<String>, field: impl Into<Field>) -> Self {
        self.fields.insert(name.into(), field.into());
        self
    }

    /// Builder: set a single-child field.
    pub fn with_child(self, name: impl Into<String>, child: Node) -> Self {
        self.with_field(name, Field::Node(Box::new(child)))
    }

    /// Builder: set a list field.
    pub fn with_list(self, name: impl Into<String>, children: Vec<Node>) -> Self {
        self.with_field(name, Field::List(children))
    }

    /// Builder: set a plain data field.
    pub fn with_value(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with_field(name, Field::Value(value.into()))
    }

    /// True if this node has the given kind.
    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.get_mut(name)
    }

    /// Replace a field, returning the previous value.
    pub fn set_field(&mut self, name: impl Into<String>, field: impl Into<Field>) -> Option<Field> {
        self.fields.insert(name.into(), field.into())
    }

    pub fn remove_field(&mut self, name: &str) -> Option<Field> {
        self.fields.remove(name)
    }

    /// The child node held by `name`, if any.
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.field(name).and_then(Field::as_node)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Node> {
        match self.fields.get_mut(name) {
            Some(Field::Node(node)) => Some(node),
            _ => None,
        }
    }

    /// The child list held by `name`, if any.
    pub fn list(&self, name: &str) -> Option<&[Node]> {
        self.field(name).and_then(Field::as_list)
    }

    pub fn list_mut(&mut self, name: &str) -> Option<&mut Vec<Node>> {
        match self.fields.get_mut(name) {
            Some(Field::List(nodes)) => Some(nodes),
            _ => None,
        }
    }

    /// The plain value held by `name`, if any.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.field(name).and_then(Field::as_value)
    }

    /// The plain string value held by `name`, if any.
    pub fn str_value(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(Value::as_str)
    }

    /// All nodes of `kind` in this subtree, pre-order, fields in name order.
    ///
    /// This follows every node-valued field regardless of the kind table and
    /// is meant for inspection, not for driving transforms.
    pub fn find_all<'n>(&'n self, kind: &str) -> Vec<&'n Node> {
        let mut found = Vec::new();
        self.collect_kind(kind, &mut found);
        found
    }

    fn collect_kind<'n>(&'n self, kind: &str, found: &mut Vec<&'n Node>) {
        if self.kind == kind {
            found.push(self);
        }
        for field in self.fields.values() {
            match field {
                Field::Node(node) => node.collect_kind(kind, found),
                Field::List(nodes) => {
                    for node in nodes {
                        node.collect_kind(kind, found);
                    }
                }
                Field::Value(_) | Field::Null => {}
            }
        }
    }

    // ------------------------------------------------------------------------
    // JSON conversion
    // ------------------------------------------------------------------------

    /// Build a node from an ESTree-style JSON object.
    ///
    /// Returns `None` when the value is not an object with a string `type`.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Self::from_map(map),
            _ => None,
        }
    }

    fn from_map(mut map: Map<String, Value>) -> Option<Self> {
        let kind = match map.remove(KIND_PROPERTY) {
            Some(Value::String(kind)) => kind,
            _ => return None,
        };
        let fields = map
            .into_iter()
            .map(|(name, value)| (name, Field::from_json(value)))
            .collect();
        Some(Self { kind, fields })
    }

    /// Render this node as an ESTree-style JSON object.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert(KIND_PROPERTY.to_string(), Value::String(self.kind.clone()));
        for (name, field) in &self.fields {
            map.insert(name.clone(), field.to_json());
        }
        Value::Object(map)
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Node::from_json(value)
            .ok_or_else(|| D::Error::custom("expected an object with a string `type` property"))
    }
}

// ============================================================================
// Tests
// ============================================================================
