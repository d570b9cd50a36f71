//! Error types surfaced by scenario resolution and step activation.
//!
//! Only mistakes a scenario author must fix are errors. Anything that reads as
//! "does not apply" (missing files, unparsable referenced documents,
//! unresolvable macros, unknown actions) degrades with a log line instead.

use std::path::PathBuf;

use runbook_types::SectionName;
use thiserror::Error;

/// Fatal failures while resolving a scenario or activating one of its steps.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// Both the local section and a referenced `values` document define the same key.
    #[error("duplicate key '{key}' in section '{section}' while merging values from {}", .origin.display())]
    DuplicateKey {
        section: SectionName,
        key: String,
        origin: PathBuf,
    },

    /// A chain of `values` pointers re-enters a document already being merged.
    #[error("values pointer cycle in section '{section}': {} is already part of the merge chain", .path.display())]
    ValuesCycle { section: SectionName, path: PathBuf },

    /// The `values` key exists but does not name a file.
    #[error("section '{section}' in {} has a 'values' entry that is not a file name", .origin.display())]
    InvalidValuesPointer { section: SectionName, origin: PathBuf },

    /// The resolved steps section holds something other than a list of steps.
    #[error("'steps' in {} must be a list of step records", .origin.display())]
    MalformedSteps { origin: PathBuf },

    /// A single step record is unusable.
    #[error("step #{index} is malformed: {reason}")]
    MalformedStep { index: usize, reason: String },

    /// An option value could not be converted to the bound field's type.
    #[error("step '{action}': option '{key}' cannot be bound to field '{field}': {source}")]
    Conversion {
        action: String,
        field: &'static str,
        key: String,
        #[source]
        source: ConversionError,
    },
}

/// A value that does not fit the static type of the field it is bound to.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("expected {expected}, found {found}")]
pub struct ConversionError {
    /// Name of the target type (for example `integer` or `list of string`).
    pub expected: String,
    /// Rendering of the offending value.
    pub found: String,
}

impl ConversionError {
    pub fn new(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            found: found.into(),
        }
    }
}
