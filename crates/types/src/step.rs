//! Raw step records and reserved section names.

use std::fmt;

use serde::Serialize;

use crate::node::Mapping;

/// The three reserved top-level sections of a scenario document.
///
/// Section keys are exact, case-sensitive matches of [`SectionName::as_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionName {
    Secrets,
    Settings,
    Steps,
}

impl SectionName {
    /// All sections in the order the engine resolves them.
    pub const ALL: [SectionName; 3] = [SectionName::Secrets, SectionName::Settings, SectionName::Steps];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionName::Secrets => "secrets",
            SectionName::Settings => "settings",
            SectionName::Steps => "steps",
        }
    }
}

impl fmt::Display for SectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One planned action entry inside the `steps` section.
///
/// Steps keep document order; that order is the execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct Step {
    /// Lookup key into the command-type catalog (verb or alias).
    pub action: String,
    /// Optional operator-facing description.
    pub description: Option<String>,
    /// Raw, unresolved option bag. Values may contain `{{ ... }}` macros.
    pub options: Mapping,
}

impl Step {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Default::default()
        }
    }

    /// Description to show for this step, falling back to the action name.
    pub fn display_description(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.action)
    }
}
