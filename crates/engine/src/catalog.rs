//! Command-type catalog.
//!
//! The host registers every command type it can dispatch at startup. Each
//! entry carries the verb the type is known by, lowercase aliases, a factory
//! for the default instance, and an ordered table of field bindings. The step
//! activator walks this table; nothing is discovered by introspection.
//!
//! ```rust
//! use runbook_engine::catalog::{CommandCatalog, CommandType, FieldSpec};
//! use serde::Serialize;
//!
//! #[derive(Debug, Default, Serialize)]
//! struct Restart {
//!     environment: String,
//!     timeout_seconds: Option<u64>,
//! }
//!
//! let restart = CommandType::builder::<Restart>("restart")
//!     .alias("restart-app")
//!     .summary("Restart every service in an environment")
//!     .field(FieldSpec::new("environment").slot("environment").long("environment").short("e"), |command: &mut Restart, value: String| {
//!         command.environment = value
//!     })
//!     .field(FieldSpec::new("timeout_seconds").long("timeout"), |command: &mut Restart, value: Option<u64>| {
//!         command.timeout_seconds = value
//!     })
//!     .build();
//!
//! let catalog = CommandCatalog::from_types(vec![restart]).expect("unique verbs");
//! assert!(catalog.find("Restart-App").is_some());
//! ```

use std::{any::Any, fmt, marker::PhantomData};

use indexmap::IndexMap;
use runbook_types::{Mapping, Node};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::{
    activate::{BindFailure, bind_fields},
    convert::FromNode,
    error::ConversionError,
    reference::ReferenceResolver,
};

/// A constructed, field-populated command instance.
///
/// Implemented for every serializable, debuggable type; the host's command
/// structs only need `#[derive(Debug, Default, Serialize)]`.
pub trait Command: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    /// JSON rendering used by previews and dry runs.
    fn to_json(&self) -> Value;
}

impl<T> Command for T
where
    T: Any + fmt::Debug + Serialize + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn to_json(&self) -> Value {
        match serde_json::to_value(self) {
            Ok(value) => value,
            Err(error) => {
                warn!(command = ?self, %error, "failed to render command as JSON");
                Value::Null
            }
        }
    }
}

/// How an option key reaches a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingKind {
    /// Positional slot, matched by its declared slot name.
    Positional,
    /// Long-form named option (`--name` on a command line).
    Long,
    /// Short-form named option (`-n` on a command line).
    Short,
}

impl BindingKind {
    /// Precedence order used by the binder; later kinds overwrite earlier ones.
    pub const PRECEDENCE: [BindingKind; 3] = [BindingKind::Positional, BindingKind::Long, BindingKind::Short];
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BindingKind::Positional => "positional",
            BindingKind::Long => "long",
            BindingKind::Short => "short",
        })
    }
}

/// Declares the option keys a field answers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    /// Field name on the command type.
    pub field: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short: Option<String>,
}

impl FieldSpec {
    pub fn new(field: &'static str) -> Self {
        Self {
            field,
            slot: None,
            long: None,
            short: None,
        }
    }

    pub fn slot(mut self, name: impl Into<String>) -> Self {
        self.slot = Some(name.into());
        self
    }

    pub fn long(mut self, name: impl Into<String>) -> Self {
        self.long = Some(name.into());
        self
    }

    pub fn short(mut self, name: impl Into<String>) -> Self {
        self.short = Some(name.into());
        self
    }

    /// External key for the given binding kind, if the field declares one.
    pub fn key(&self, kind: BindingKind) -> Option<&str> {
        match kind {
            BindingKind::Positional => self.slot.as_deref(),
            BindingKind::Long => self.long.as_deref(),
            BindingKind::Short => self.short.as_deref(),
        }
    }
}

/// Public description of one bindable field, for listings.
#[derive(Debug, Clone, Serialize)]
pub struct FieldDescriptor {
    #[serde(flatten)]
    pub spec: FieldSpec,
    /// Static type the option value converts to.
    #[serde(rename = "type")]
    pub type_name: String,
}

type Setter<C> = Box<dyn Fn(&mut C, &Node) -> Result<(), ConversionError> + Send + Sync>;

/// A typed field binding: descriptor plus the setter that converts and assigns.
pub(crate) struct FieldBinding<C> {
    pub(crate) descriptor: FieldDescriptor,
    pub(crate) setter: Setter<C>,
}

type Activator = Box<dyn Fn(&Mapping, &ReferenceResolver) -> Result<Box<dyn Command>, BindFailure> + Send + Sync>;

/// A registered command type with its verb, aliases, and binding table.
pub struct CommandType {
    name: String,
    aliases: Vec<String>,
    summary: Option<String>,
    fields: Vec<FieldDescriptor>,
    activator: Activator,
}

impl CommandType {
    /// Starts a registration for command type `C` under the primary verb `name`.
    pub fn builder<C>(name: impl Into<String>) -> CommandTypeBuilder<C>
    where
        C: Command + Default,
    {
        CommandTypeBuilder {
            name: name.into(),
            aliases: Vec::new(),
            summary: None,
            bindings: Vec::new(),
            _command: PhantomData,
        }
    }

    /// Primary verb.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lowercase alternate verbs.
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Whether `action` names this type: the primary verb compared
    /// case-insensitively, or the lowercased action found among the aliases.
    pub fn matches(&self, action: &str) -> bool {
        let lowered = action.to_lowercase();
        self.name.to_lowercase() == lowered || self.aliases.iter().any(|alias| *alias == lowered)
    }

    /// Builds a default instance and binds `options` onto it.
    pub(crate) fn instantiate(&self, options: &Mapping, resolver: &ReferenceResolver) -> Result<Box<dyn Command>, BindFailure> {
        (self.activator)(options, resolver)
    }
}

impl fmt::Debug for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandType")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// Builder returned by [`CommandType::builder`].
pub struct CommandTypeBuilder<C> {
    name: String,
    aliases: Vec<String>,
    summary: Option<String>,
    bindings: Vec<FieldBinding<C>>,
    _command: PhantomData<fn() -> C>,
}

impl<C> CommandTypeBuilder<C>
where
    C: Command + Default,
{
    /// Adds an alternate verb. Aliases are stored lowercase.
    pub fn alias(mut self, alias: impl AsRef<str>) -> Self {
        self.aliases.push(alias.as_ref().to_lowercase());
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Registers a bindable field. The option value is converted to `T` and
    /// handed to `setter`.
    pub fn field<T, F>(mut self, spec: FieldSpec, setter: F) -> Self
    where
        T: FromNode + 'static,
        F: Fn(&mut C, T) + Send + Sync + 'static,
    {
        let descriptor = FieldDescriptor {
            spec,
            type_name: T::type_name(),
        };
        let setter: Setter<C> = Box::new(move |command: &mut C, node: &Node| {
            let value = T::from_node(node)?;
            setter(command, value);
            Ok(())
        });
        self.bindings.push(FieldBinding { descriptor, setter });
        self
    }

    pub fn build(self) -> CommandType {
        let fields = self.bindings.iter().map(|binding| binding.descriptor.clone()).collect();
        let bindings = self.bindings;
        let activator: Activator = Box::new(move |options: &Mapping, resolver: &ReferenceResolver| {
            let command: C = bind_fields(&bindings, options, resolver)?;
            Ok(Box::new(command) as Box<dyn Command>)
        });

        CommandType {
            name: self.name,
            aliases: self.aliases,
            summary: self.summary,
            fields,
            activator,
        }
    }
}

/// Errors raised while assembling a catalog.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("command verb or alias '{0}' is registered more than once")]
    DuplicateVerb(String),
}

/// The host-supplied table of command types, in registration order.
#[derive(Debug, Default)]
pub struct CommandCatalog {
    types: Vec<CommandType>,
}

impl CommandCatalog {
    /// Builds a catalog, rejecting verbs or aliases claimed by two types.
    pub fn from_types(types: Vec<CommandType>) -> Result<Self, CatalogError> {
        let mut claimed: IndexMap<String, usize> = IndexMap::new();
        for (index, command_type) in types.iter().enumerate() {
            let verbs = std::iter::once(command_type.name.to_lowercase()).chain(command_type.aliases.iter().cloned());
            for verb in verbs {
                if let Some(owner) = claimed.insert(verb.clone(), index)
                    && owner != index
                {
                    return Err(CatalogError::DuplicateVerb(verb));
                }
            }
        }
        Ok(Self { types })
    }

    /// First type whose verb or alias matches `action`.
    pub fn find(&self, action: &str) -> Option<&CommandType> {
        self.types.iter().find(|command_type| command_type.matches(action))
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandType> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
