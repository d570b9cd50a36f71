//! Document loading.
//!
//! Scenario and values documents are YAML (JSON parses as a YAML subset). A
//! missing or broken document never aborts a run: it contributes an empty map
//! and leaves a diagnostic in the log.

use std::{
    fs,
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};

use dirs_next::home_dir;
use runbook_types::{Mapping, Node, Scalar};
use serde_yaml::Value as YamlValue;
use tracing::{debug, warn};

/// Source of parsed documents.
///
/// The engine only ever asks for a whole document by path; implementations
/// decide where the bytes come from.
pub trait DocumentLoader {
    /// Returns the parsed tree for `path`, or an empty map when the document
    /// is absent or unusable.
    fn load(&self, path: &Path) -> Node;
}

/// Loads documents from the local filesystem. Reads are blocking and uncached.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLoader;

impl DocumentLoader for FsLoader {
    fn load(&self, path: &Path) -> Node {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "document not found; treating as empty");
                return Node::empty_map();
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to read document; treating as empty");
                return Node::empty_map();
            }
        };

        match parse_document(&content) {
            Ok(node @ Node::Map(_)) => node,
            Ok(other) => {
                warn!(path = %path.display(), root = other.kind(), "document root is not a map; treating as empty");
                Node::empty_map()
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to parse document; treating as empty");
                Node::empty_map()
            }
        }
    }
}

/// Parses YAML (or JSON) text into a [`Node`] tree.
///
/// An empty document parses to an empty map.
pub fn parse_document(content: &str) -> Result<Node, serde_yaml::Error> {
    let value: YamlValue = serde_yaml::from_str(content)?;
    Ok(match value {
        YamlValue::Null => Node::empty_map(),
        other => node_from_yaml(other),
    })
}

/// Converts a parsed YAML value into the engine's tagged tree.
///
/// Non-string keys are stringified; YAML tags are dropped in favour of the
/// tagged value.
fn node_from_yaml(value: YamlValue) -> Node {
    match value {
        YamlValue::Null => Node::Scalar(Scalar::Null),
        YamlValue::Bool(value) => Node::Scalar(Scalar::Bool(value)),
        YamlValue::Number(number) => {
            if let Some(integer) = number.as_i64() {
                Node::Scalar(Scalar::Integer(integer))
            } else {
                Node::Scalar(Scalar::Float(number.as_f64().unwrap_or(f64::NAN)))
            }
        }
        YamlValue::String(value) => Node::Scalar(Scalar::String(value)),
        YamlValue::Sequence(items) => Node::List(items.into_iter().map(node_from_yaml).collect()),
        YamlValue::Mapping(mapping) => {
            let mut map = Mapping::with_capacity(mapping.len());
            for (key, value) in mapping {
                map.insert(key_to_string(key), node_from_yaml(value));
            }
            Node::Map(map)
        }
        YamlValue::Tagged(tagged) => node_from_yaml(tagged.value),
    }
}

fn key_to_string(key: YamlValue) -> String {
    match key {
        YamlValue::String(value) => value,
        YamlValue::Bool(value) => value.to_string(),
        YamlValue::Number(number) => number.to_string(),
        YamlValue::Null => "null".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|rendered| rendered.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Resolves a `values` file name relative to the document that references it.
///
/// Absolute paths are used as-is and a leading `~/` expands to the home
/// directory.
pub fn resolve_values_path(origin: &Path, file_name: &str) -> PathBuf {
    let expanded = expand_tilde(file_name);
    if expanded.is_absolute() {
        return expanded;
    }
    match origin.parent() {
        Some(parent) => parent.join(expanded),
        None => expanded,
    }
}

/// Identity of a document for cycle detection.
///
/// Existing files are canonicalized; otherwise `.` and `..` components are
/// folded lexically.
pub fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other),
        }
    }
    normalized
}

/// Expands a leading `~` or `~/` to the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    let trimmed = path.trim();
    if trimmed == "~" {
        return home_dir().unwrap_or_else(|| PathBuf::from("~"));
    }
    if let Some(rest) = trimmed.strip_prefix("~/") {
        return home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }
    PathBuf::from(trimmed)
}
