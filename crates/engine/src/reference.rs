//! # Reference Resolution
//!
//! Resolves `{{settings.<path>}}` and `{{secrets.<path>}}` macros embedded in
//! step options against the merged `settings` and `secrets` sections.
//!
//! ## Dotted lookup
//!
//! A key is first tried verbatim, so keys that themselves contain dots still
//! resolve. Otherwise the key is split at its first `.`; when the first segment
//! names a nested map, the lookup continues in that map with the remainder.
//!
//! ## Macro substitution
//!
//! Only string values are examined, and only the first `{{ ... }}` token
//! counts. A resolved token replaces the *whole* string, so literal text around
//! the braces is discarded:
//!
//! ```rust
//! use runbook_engine::reference::{LookupMap, ReferenceResolver};
//! use runbook_types::{Mapping, Node};
//!
//! let mut settings = Mapping::new();
//! settings.insert("environment".into(), Node::from("prod"));
//! let resolver = ReferenceResolver::new(LookupMap::new(settings), LookupMap::default());
//!
//! assert_eq!(resolver.substitute(&Node::from("{{settings.environment}}")), Node::from("prod"));
//! assert_eq!(resolver.substitute(&Node::from("env-{{settings.environment}}")), Node::from("prod"));
//! assert_eq!(resolver.substitute(&Node::from("{{inputs.other}}")), Node::from("{{inputs.other}}"));
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use runbook_types::{Mapping, Node};
use tracing::debug;

static MACRO_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{(.*?)\}\}").expect("macro pattern compiles"));

const SETTINGS_PREFIX: &str = "settings.";
const SECRETS_PREFIX: &str = "secrets.";

/// Immutable keyed map backing one lookup domain (settings or secrets).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupMap {
    entries: Mapping,
}

impl LookupMap {
    pub fn new(entries: Mapping) -> Self {
        Self { entries }
    }

    /// Dotted-path lookup; see [`lookup`].
    pub fn get(&self, dotted_key: &str) -> Option<&Node> {
        lookup(&self.entries, dotted_key)
    }

    pub fn entries(&self) -> &Mapping {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Looks up `dotted_key` in `map`, descending into nested maps one segment at a time.
///
/// Returns `None` when any segment is missing or names a non-map value
/// before the path is exhausted.
pub fn lookup<'a>(map: &'a Mapping, dotted_key: &str) -> Option<&'a Node> {
    if let Some(value) = map.get(dotted_key) {
        return Some(value);
    }
    let (head, rest) = dotted_key.split_once('.')?;
    match map.get(head)? {
        Node::Map(nested) => lookup(nested, rest),
        _ => None,
    }
}

/// Pair of lookups used to expand macros in step options.
#[derive(Debug, Clone, Default)]
pub struct ReferenceResolver {
    settings: LookupMap,
    secrets: LookupMap,
}

impl ReferenceResolver {
    pub fn new(settings: LookupMap, secrets: LookupMap) -> Self {
        Self { settings, secrets }
    }

    /// Resolves a dotted path against the `settings` section.
    pub fn settings(&self, dotted_key: &str) -> Option<&Node> {
        self.settings.get(dotted_key)
    }

    /// Resolves a dotted path against the `secrets` section.
    pub fn secrets(&self, dotted_key: &str) -> Option<&Node> {
        self.secrets.get(dotted_key)
    }

    /// Expands a macro in `value`, returning the replacement or a clone of the input.
    ///
    /// Unknown prefixes and unresolvable paths keep the raw string, braces
    /// included.
    pub fn substitute(&self, value: &Node) -> Node {
        let Some(raw) = value.as_str() else {
            return value.clone();
        };
        let Some(captures) = MACRO_PATTERN.captures(raw) else {
            return value.clone();
        };
        // Whitespace inside the braces is ignored, so `{{ settings.x }}` resolves too.
        let expression = captures[1].trim();

        let resolved = if let Some(path) = expression.strip_prefix(SECRETS_PREFIX) {
            self.secrets(path)
        } else if let Some(path) = expression.strip_prefix(SETTINGS_PREFIX) {
            self.settings(path)
        } else {
            debug!(expression, "macro does not reference settings or secrets; leaving value unchanged");
            return value.clone();
        };

        match resolved {
            Some(replacement) => replacement.clone(),
            None => {
                debug!(expression, "macro reference not found; leaving value unchanged");
                value.clone()
            }
        }
    }
}
