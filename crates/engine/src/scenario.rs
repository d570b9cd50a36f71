//! Scenario documents: load once, resolve sections, activate steps on demand.

use std::path::{Path, PathBuf};

use runbook_types::{Mapping, Node, Scalar, SectionName, Step};
use tracing::debug;

use crate::{
    activate::{ActivatedStep, activate},
    catalog::CommandCatalog,
    error::ScenarioError,
    loader::{DocumentLoader, FsLoader},
    reference::{LookupMap, ReferenceResolver},
    section::resolve_section,
};

/// A resolved scenario: merged settings and secrets plus the ordered raw steps.
///
/// Built once per run and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Scenario {
    origin: PathBuf,
    resolver: ReferenceResolver,
    steps: Vec<Step>,
}

impl Scenario {
    /// Loads and resolves the scenario at `path` from the filesystem.
    ///
    /// A missing or unparsable scenario file resolves to an empty scenario.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        Self::load_with(path, &FsLoader)
    }

    /// Loads and resolves the scenario at `path` through `loader`.
    pub fn load_with(path: impl AsRef<Path>, loader: &dyn DocumentLoader) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let root = loader.load(path);
        Self::from_document(&root, path, loader)
    }

    /// Resolves an already-parsed document. `origin` anchors relative `values` pointers.
    pub fn from_document(root: &Node, origin: &Path, loader: &dyn DocumentLoader) -> Result<Self, ScenarioError> {
        let secrets = resolve_section(root, SectionName::Secrets, origin, loader)?;
        let settings = resolve_section(root, SectionName::Settings, origin, loader)?;
        let steps_section = resolve_section(root, SectionName::Steps, origin, loader)?;
        let steps = parse_steps(&steps_section, origin)?;

        debug!(
            path = %origin.display(),
            settings = settings.len(),
            secrets = secrets.len(),
            steps = steps.len(),
            "scenario resolved"
        );

        Ok(Self {
            origin: origin.to_path_buf(),
            resolver: ReferenceResolver::new(LookupMap::new(settings), LookupMap::new(secrets)),
            steps,
        })
    }

    pub fn origin(&self) -> &Path {
        &self.origin
    }

    /// Raw steps in document order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn resolver(&self) -> &ReferenceResolver {
        &self.resolver
    }

    /// Lazily activates every step against `catalog`, in document order.
    ///
    /// Steps whose action matches no command type are skipped. The iterator
    /// borrows the scenario, so it can be rebuilt and consumed again; each
    /// pass re-runs activation.
    pub fn activate<'a>(&'a self, catalog: &'a CommandCatalog) -> impl Iterator<Item = Result<ActivatedStep, ScenarioError>> + 'a {
        self.steps
            .iter()
            .filter_map(move |step| activate(step, catalog, &self.resolver).transpose())
    }

    /// Activates every step up front, stopping at the first failure.
    pub fn plan(&self, catalog: &CommandCatalog) -> Result<Vec<ActivatedStep>, ScenarioError> {
        self.activate(catalog).collect()
    }
}

/// Reads step records out of a resolved `steps` section.
///
/// The section's `steps` entry must be a list of maps, each with a string
/// `action` and optional `description` and `options`.
pub fn parse_steps(section: &Mapping, origin: &Path) -> Result<Vec<Step>, ScenarioError> {
    let items = match section.get(SectionName::Steps.as_str()) {
        None | Some(Node::Scalar(Scalar::Null)) => return Ok(Vec::new()),
        Some(Node::List(items)) => items,
        Some(_) => {
            return Err(ScenarioError::MalformedSteps {
                origin: origin.to_path_buf(),
            });
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| parse_step(index + 1, item))
        .collect()
}

fn parse_step(index: usize, item: &Node) -> Result<Step, ScenarioError> {
    let malformed = |reason: String| ScenarioError::MalformedStep { index, reason };

    let Node::Map(record) = item else {
        return Err(malformed(format!("expected a map, found {}", item.kind())));
    };

    let action = match record.get("action") {
        Some(Node::Scalar(Scalar::String(action))) if !action.trim().is_empty() => action.clone(),
        Some(other) => return Err(malformed(format!("'action' must be a non-empty string, found {}", other.kind()))),
        None => return Err(malformed("missing required 'action'".to_string())),
    };

    let description = match record.get("description") {
        None | Some(Node::Scalar(Scalar::Null)) => None,
        Some(Node::Scalar(scalar)) => Some(scalar.to_string()),
        Some(other) => return Err(malformed(format!("'description' must be a string, found {}", other.kind()))),
    };

    let options = match record.get("options") {
        None | Some(Node::Scalar(Scalar::Null)) => Mapping::new(),
        Some(Node::Map(options)) => options.clone(),
        Some(other) => return Err(malformed(format!("'options' must be a map, found {}", other.kind()))),
    };

    Ok(Step {
        action,
        description,
        options,
    })
}
