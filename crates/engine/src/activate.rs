//! Step activation: turning a raw step into a constructed command instance.

use std::fmt;

use runbook_types::{Mapping, Step};
use serde::{Serialize, Serializer, ser::SerializeStruct};
use tracing::debug;

use crate::{
    catalog::{BindingKind, Command, CommandCatalog, FieldBinding},
    error::{ConversionError, ScenarioError},
    reference::ReferenceResolver,
};

/// A field that refused the option value bound to it.
#[derive(Debug)]
pub(crate) struct BindFailure {
    pub(crate) field: &'static str,
    pub(crate) key: String,
    pub(crate) source: ConversionError,
}

/// A command instance ready for dispatch, paired with its resolved description.
pub struct ActivatedStep {
    verb: String,
    description: String,
    command: Box<dyn Command>,
}

impl ActivatedStep {
    /// Primary verb of the matched command type.
    pub fn verb(&self) -> &str {
        &self.verb
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn command(&self) -> &dyn Command {
        self.command.as_ref()
    }

    /// Borrows the command as its concrete type, if it is a `C`.
    pub fn downcast_ref<C: Command>(&self) -> Option<&C> {
        self.command().as_any().downcast_ref::<C>()
    }
}

impl fmt::Debug for ActivatedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivatedStep")
            .field("verb", &self.verb)
            .field("description", &self.description)
            .field("command", &self.command)
            .finish()
    }
}

impl Serialize for ActivatedStep {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ActivatedStep", 3)?;
        state.serialize_field("verb", &self.verb)?;
        state.serialize_field("description", &self.description)?;
        state.serialize_field("command", &self.command().to_json())?;
        state.end()
    }
}

/// Activates `step` against `catalog`.
///
/// Returns `Ok(None)` when no registered type answers to the step's action;
/// such steps are dropped from the plan. A value that does not convert to its
/// field's type fails the activation.
pub fn activate(step: &Step, catalog: &CommandCatalog, resolver: &ReferenceResolver) -> Result<Option<ActivatedStep>, ScenarioError> {
    let Some(command_type) = catalog.find(&step.action) else {
        debug!(action = %step.action, "no command type matches action; skipping step");
        return Ok(None);
    };

    let command = command_type
        .instantiate(&step.options, resolver)
        .map_err(|failure| ScenarioError::Conversion {
            action: step.action.clone(),
            field: failure.field,
            key: failure.key,
            source: failure.source,
        })?;
    debug!(action = %step.action, verb = command_type.name(), "activated step");

    Ok(Some(ActivatedStep {
        verb: command_type.name().to_string(),
        description: step.display_description().to_string(),
        command,
    }))
}

/// Builds a default `C` and applies every binding whose key appears in `options`.
///
/// For each field the binding kinds are checked independently in
/// [`BindingKind::PRECEDENCE`] order, so a short-form key overwrites a
/// long-form one, which overwrites a positional slot. Fields without a
/// matching key keep their default.
pub(crate) fn bind_fields<C: Default>(
    bindings: &[FieldBinding<C>],
    options: &Mapping,
    resolver: &ReferenceResolver,
) -> Result<C, BindFailure> {
    let mut command = C::default();

    for binding in bindings {
        for kind in BindingKind::PRECEDENCE {
            let Some(key) = binding.descriptor.spec.key(kind) else {
                continue;
            };
            let Some(raw) = options.get(key) else {
                continue;
            };
            let value = resolver.substitute(raw);
            (binding.setter)(&mut command, &value).map_err(|source| BindFailure {
                field: binding.descriptor.spec.field,
                key: key.to_string(),
                source,
            })?;
        }
    }

    Ok(command)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serde::Serialize;

    use super::*;
    use crate::{
        catalog::{CommandType, FieldSpec},
        loader::parse_document,
        reference::LookupMap,
    };

    #[derive(Debug, Default, Serialize, PartialEq)]
    struct Restart {
        environment: String,
        instance: Option<String>,
        timeout: u64,
    }

    #[derive(Debug, Default, Serialize, PartialEq)]
    struct Push {
        source: PathBuf,
        feed: String,
        tags: Vec<String>,
    }

    fn catalog() -> CommandCatalog {
        let restart = CommandType::builder::<Restart>("restart")
            .alias("restart-app")
            .field(
                FieldSpec::new("environment").slot("target").long("environment").short("e"),
                |command: &mut Restart, value: String| command.environment = value,
            )
            .field(FieldSpec::new("instance").long("instance"), |command: &mut Restart, value: Option<String>| {
                command.instance = value
            })
            .field(FieldSpec::new("timeout").long("timeout"), |command: &mut Restart, value: u64| command.timeout = value)
            .build();
        let push = CommandType::builder::<Push>("push")
            .field(FieldSpec::new("source").slot("path"), |command: &mut Push, value: PathBuf| command.source = value)
            .field(FieldSpec::new("feed").long("feed"), |command: &mut Push, value: String| command.feed = value)
            .field(FieldSpec::new("tags").long("tags"), |command: &mut Push, value: Vec<String>| command.tags = value)
            .build();
        CommandCatalog::from_types(vec![restart, push]).expect("catalog")
    }

    fn resolver() -> ReferenceResolver {
        let settings = parse_document("environment: prod\nrestart:\n  timeout: 90\n").expect("parse");
        let secrets = parse_document("feed:\n  url: https://feed.internal\n").expect("parse");
        ReferenceResolver::new(
            LookupMap::new(settings.as_map().cloned().unwrap_or_default()),
            LookupMap::new(secrets.as_map().cloned().unwrap_or_default()),
        )
    }

    fn step(action: &str, options: &str) -> Step {
        Step {
            action: action.into(),
            description: None,
            options: parse_document(options).expect("parse").as_map().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn binds_macro_resolved_long_option() {
        let activated = activate(
            &step("restart", "environment: \"{{settings.environment}}\"\ntimeout: \"{{settings.restart.timeout}}\"\n"),
            &catalog(),
            &resolver(),
        )
        .expect("activation")
        .expect("matched");

        let restart = activated.downcast_ref::<Restart>().expect("restart command");
        assert_eq!(restart.environment, "prod");
        assert_eq!(restart.timeout, 90);
        assert_eq!(activated.verb(), "restart");
    }

    #[test]
    fn alias_and_case_insensitive_action_match() {
        let catalog = catalog();
        let resolver = resolver();
        for action in ["Restart", "RESTART-app"] {
            let activated = activate(&step(action, "environment: prod\n"), &catalog, &resolver)
                .expect("activation")
                .expect("matched");
            assert_eq!(activated.verb(), "restart");
        }
    }

    #[test]
    fn unmatched_action_is_none() {
        let activated = activate(&step("unknown-verb", "environment: prod\n"), &catalog(), &resolver()).expect("activation");
        assert!(activated.is_none());
    }

    #[test]
    fn unmatched_options_yield_default_instance_and_action_description() {
        let activated = activate(&step("restart", "colour: blue\n"), &catalog(), &resolver())
            .expect("activation")
            .expect("matched");
        assert_eq!(activated.downcast_ref::<Restart>(), Some(&Restart::default()));
        assert_eq!(activated.description(), "restart");
    }

    #[test]
    fn later_binding_kinds_overwrite_earlier_ones() {
        let resolver = resolver();
        let catalog = catalog();

        let activated = activate(&step("restart", "target: slot\nenvironment: long\n"), &catalog, &resolver)
            .expect("activation")
            .expect("matched");
        assert_eq!(activated.downcast_ref::<Restart>().map(|r| r.environment.as_str()), Some("long"));

        let activated = activate(&step("restart", "e: short\ntarget: slot\nenvironment: long\n"), &catalog, &resolver)
            .expect("activation")
            .expect("matched");
        assert_eq!(activated.downcast_ref::<Restart>().map(|r| r.environment.as_str()), Some("short"));

        let activated = activate(&step("restart", "target: slot\n"), &catalog, &resolver)
            .expect("activation")
            .expect("matched");
        assert_eq!(activated.downcast_ref::<Restart>().map(|r| r.environment.as_str()), Some("slot"));
    }

    #[test]
    fn nullable_fields_unwrap_values() {
        let resolver = resolver();
        let activated = activate(&step("restart", "instance: web-1\n"), &catalog(), &resolver)
            .expect("activation")
            .expect("matched");
        assert_eq!(activated.downcast_ref::<Restart>().and_then(|r| r.instance.as_deref()), Some("web-1"));

        let activated = activate(&step("restart", "instance: null\n"), &catalog(), &resolver)
            .expect("activation")
            .expect("matched");
        assert_eq!(activated.downcast_ref::<Restart>().and_then(|r| r.instance.clone()), None);
    }

    #[test]
    fn conversion_failure_fails_activation() {
        let error = activate(&step("restart", "timeout: soon\n"), &catalog(), &resolver()).expect_err("conversion failure");
        match error {
            ScenarioError::Conversion { action, field, key, source } => {
                assert_eq!(action, "restart");
                assert_eq!(field, "timeout");
                assert_eq!(key, "timeout");
                assert_eq!(source.expected, "u64");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unresolved_macro_is_bound_verbatim() {
        let activated = activate(
            &step("push", "path: ./pkg\nfeed: \"{{secrets.feed.missing}}\"\ntags: [a, b]\n"),
            &catalog(),
            &resolver(),
        )
        .expect("activation")
        .expect("matched");
        let push = activated.downcast_ref::<Push>().expect("push command");
        assert_eq!(push.feed, "{{secrets.feed.missing}}");
        assert_eq!(push.source, PathBuf::from("./pkg"));
        assert_eq!(push.tags, vec!["a", "b"]);
    }

    #[test]
    fn serializes_with_command_payload() {
        let mut raw = step("push", "feed: \"{{secrets.feed.url}}\"\n");
        raw.description = Some("Publish package".into());
        let activated = activate(&raw, &catalog(), &resolver()).expect("activation").expect("matched");

        let json = serde_json::to_value(&activated).expect("serialize");
        assert_eq!(json["verb"], "push");
        assert_eq!(json["description"], "Publish package");
        assert_eq!(json["command"]["feed"], "https://feed.internal");
    }
}
