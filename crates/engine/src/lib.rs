//! # Runbook Engine
//!
//! The Runbook engine resolves declarative scenario documents into an ordered
//! sequence of ready-to-run, strongly typed command instances.
//!
//! ## Key Features
//!
//! - **Document Loading**: YAML (and JSON) scenario and values documents
//! - **Section Merging**: `secrets`, `settings`, and `steps` sections can pull in
//!   the same-named section of another document through a `values` pointer
//! - **Macro Resolution**: `{{settings.path}}` / `{{secrets.path}}` references in
//!   step options, resolved by dotted-path lookup
//! - **Step Activation**: actions are matched against a host-supplied command
//!   catalog and option bags are bound onto typed command fields
//!
//! ## Usage
//!
//! ```rust
//! use runbook_engine::{CommandCatalog, CommandType, FieldSpec, Scenario};
//! use serde::Serialize;
//!
//! #[derive(Debug, Default, Serialize)]
//! struct Restart {
//!     environment: String,
//! }
//!
//! let temp_dir = tempfile::tempdir()?;
//! let scenario_path = temp_dir.path().join("scenario.yaml");
//! std::fs::write(&scenario_path, r#"
//! settings:
//!   environment: prod
//! steps:
//!   - action: restart
//!     options:
//!       environment: "{{settings.environment}}"
//! "#)?;
//!
//! let catalog = CommandCatalog::from_types(vec![
//!     CommandType::builder::<Restart>("restart")
//!         .field(FieldSpec::new("environment").long("environment"), |command: &mut Restart, value: String| {
//!             command.environment = value
//!         })
//!         .build(),
//! ])?;
//!
//! let scenario = Scenario::load(&scenario_path)?;
//! let plan = scenario.plan(&catalog)?;
//! assert_eq!(plan[0].downcast_ref::<Restart>().unwrap().environment, "prod");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - **`loader`**: reads documents into the generic [`runbook_types::Node`] tree
//! - **`section`**: extracts sections and merges referenced values documents
//! - **`reference`**: dotted lookups and macro substitution
//! - **`catalog`** / **`activate`**: command registry and field binder
//! - **`scenario`**: ties the pieces together for one run
//! - **`executor`**: hands activated steps to a dispatcher

pub mod activate;
pub mod catalog;
pub mod convert;
pub mod error;
pub mod executor;
pub mod loader;
pub mod reference;
pub mod scenario;
pub mod section;

// Re-export commonly used types for convenience
pub use activate::{ActivatedStep, activate};
pub use catalog::{BindingKind, CatalogError, Command, CommandCatalog, CommandType, FieldDescriptor, FieldSpec};
pub use convert::FromNode;
pub use error::{ConversionError, ScenarioError};
pub use executor::{CommandDispatcher, DryRunDispatcher, StepResult, StepStatus, execute_plan};
pub use loader::{DocumentLoader, FsLoader};
pub use reference::{LookupMap, ReferenceResolver, lookup};
pub use scenario::Scenario;
