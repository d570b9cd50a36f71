//! Generic document tree shared by the loader, section resolver, and binder.
//!
//! Scenario documents are free-form: a section may hold scalars, nested maps,
//! or ordered lists interchangeably. [`Node`] models that shape as a tagged
//! union so every traversal pattern-matches explicitly instead of probing
//! runtime types.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

/// Insertion-ordered, string-keyed map used for sections, option bags, and
/// nested values.
pub type Mapping = IndexMap<String, Node>;

/// A single value inside a scenario document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Node {
    /// A leaf value (string, number, boolean, or null).
    Scalar(Scalar),
    /// A nested string-keyed map.
    Map(Mapping),
    /// An ordered list of values.
    List(Vec<Node>),
}

/// Leaf values carried by [`Node::Scalar`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Node {
    /// An empty map, the tree returned for absent or unusable documents.
    pub fn empty_map() -> Self {
        Node::Map(Mapping::new())
    }

    /// Convenience constructor for string scalars.
    pub fn string(value: impl Into<String>) -> Self {
        Node::Scalar(Scalar::String(value.into()))
    }

    pub fn null() -> Self {
        Node::Scalar(Scalar::Null)
    }

    pub fn as_map(&self) -> Option<&Mapping> {
        match self {
            Node::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Node::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the string payload when this node is a string scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Scalar(Scalar::String(value)) => Some(value),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Node::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Scalar(Scalar::Null))
    }

    /// Short human-readable name of the node's shape, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Scalar(scalar) => scalar.kind(),
            Node::Map(_) => "map",
            Node::List(_) => "list",
        }
    }
}

impl Scalar {
    pub fn kind(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Bool(_) => "boolean",
            Scalar::Integer(_) => "integer",
            Scalar::Float(_) => "float",
            Scalar::String(_) => "string",
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(value) => write!(f, "{value}"),
            Scalar::Integer(value) => write!(f, "{value}"),
            Scalar::Float(value) => write!(f, "{value}"),
            Scalar::String(value) => f.write_str(value),
        }
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::string(value)
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::Scalar(Scalar::String(value))
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Self {
        Node::Scalar(Scalar::Bool(value))
    }
}

impl From<i64> for Node {
    fn from(value: i64) -> Self {
        Node::Scalar(Scalar::Integer(value))
    }
}

impl From<f64> for Node {
    fn from(value: f64) -> Self {
        Node::Scalar(Scalar::Float(value))
    }
}

impl From<Mapping> for Node {
    fn from(value: Mapping) -> Self {
        Node::Map(value)
    }
}

impl From<Vec<Node>> for Node {
    fn from(value: Vec<Node>) -> Self {
        Node::List(value)
    }
}
