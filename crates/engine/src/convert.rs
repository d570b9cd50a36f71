//! Conversion from document nodes to the static types of command fields.

use std::path::PathBuf;

use runbook_types::{Mapping, Node, Scalar};

use crate::error::ConversionError;

/// A field type that can be populated from a (macro-substituted) option value.
pub trait FromNode: Sized {
    /// Name used in diagnostics and in catalog listings.
    fn type_name() -> String;

    fn from_node(node: &Node) -> Result<Self, ConversionError>;
}

fn mismatch<T: FromNode>(node: &Node) -> ConversionError {
    ConversionError::new(T::type_name(), describe(node))
}

/// Renders a node for error messages: the kind, plus the value for scalars.
pub fn describe(node: &Node) -> String {
    match node {
        Node::Scalar(Scalar::Null) => "null".to_string(),
        Node::Scalar(scalar) => format!("{} '{}'", scalar.kind(), scalar),
        other => other.kind().to_string(),
    }
}

impl FromNode for String {
    fn type_name() -> String {
        "string".into()
    }

    fn from_node(node: &Node) -> Result<Self, ConversionError> {
        match node {
            Node::Scalar(Scalar::Null) => Err(mismatch::<Self>(node)),
            Node::Scalar(scalar) => Ok(scalar.to_string()),
            _ => Err(mismatch::<Self>(node)),
        }
    }
}

impl FromNode for bool {
    fn type_name() -> String {
        "boolean".into()
    }

    fn from_node(node: &Node) -> Result<Self, ConversionError> {
        match node {
            Node::Scalar(Scalar::Bool(value)) => Ok(*value),
            Node::Scalar(Scalar::String(raw)) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(mismatch::<Self>(node)),
            },
            _ => Err(mismatch::<Self>(node)),
        }
    }
}

macro_rules! impl_from_node_for_integer {
    ($($integer:ty),* $(,)?) => {
        $(
            impl FromNode for $integer {
                fn type_name() -> String {
                    stringify!($integer).into()
                }

                fn from_node(node: &Node) -> Result<Self, ConversionError> {
                    match node {
                        Node::Scalar(Scalar::Integer(value)) => <$integer>::try_from(*value).map_err(|_| mismatch::<Self>(node)),
                        Node::Scalar(Scalar::String(raw)) => raw.trim().parse::<$integer>().map_err(|_| mismatch::<Self>(node)),
                        _ => Err(mismatch::<Self>(node)),
                    }
                }
            }
        )*
    };
}

impl_from_node_for_integer!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl FromNode for f64 {
    fn type_name() -> String {
        "f64".into()
    }

    fn from_node(node: &Node) -> Result<Self, ConversionError> {
        match node {
            Node::Scalar(Scalar::Float(value)) => Ok(*value),
            Node::Scalar(Scalar::Integer(value)) => Ok(*value as f64),
            Node::Scalar(Scalar::String(raw)) => raw.trim().parse().map_err(|_| mismatch::<Self>(node)),
            _ => Err(mismatch::<Self>(node)),
        }
    }
}

impl FromNode for PathBuf {
    fn type_name() -> String {
        "path".into()
    }

    fn from_node(node: &Node) -> Result<Self, ConversionError> {
        match node {
            Node::Scalar(Scalar::String(raw)) => Ok(PathBuf::from(raw)),
            _ => Err(mismatch::<Self>(node)),
        }
    }
}

/// Free-form fields receive the substituted value untouched.
impl FromNode for Node {
    fn type_name() -> String {
        "any".into()
    }

    fn from_node(node: &Node) -> Result<Self, ConversionError> {
        Ok(node.clone())
    }
}

impl FromNode for Mapping {
    fn type_name() -> String {
        "map".into()
    }

    fn from_node(node: &Node) -> Result<Self, ConversionError> {
        match node {
            Node::Map(map) => Ok(map.clone()),
            _ => Err(mismatch::<Self>(node)),
        }
    }
}

/// Lists convert element-wise; a single non-null value becomes a one-element list.
impl<T: FromNode> FromNode for Vec<T> {
    fn type_name() -> String {
        format!("list of {}", T::type_name())
    }

    fn from_node(node: &Node) -> Result<Self, ConversionError> {
        match node {
            Node::List(items) => items.iter().map(T::from_node).collect(),
            Node::Scalar(Scalar::Null) => Err(mismatch::<Self>(node)),
            single => Ok(vec![T::from_node(single)?]),
        }
    }
}

/// Nullable declarations are unwrapped first: `null` binds `None`, anything
/// else converts to the inner type.
impl<T: FromNode> FromNode for Option<T> {
    fn type_name() -> String {
        T::type_name()
    }

    fn from_node(node: &Node) -> Result<Self, ConversionError> {
        if node.is_null() {
            return Ok(None);
        }
        T::from_node(node).map(Some)
    }
}
