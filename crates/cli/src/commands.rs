//! Administrative commands the CLI can dispatch from a scenario.
//!
//! Each command is a plain struct; its bindable fields and verbs are declared
//! in [`catalog`]. What a command does once dispatched lives with the command
//! runner, not here.

use std::path::PathBuf;

use runbook_engine::{CatalogError, CommandCatalog, CommandType, FieldSpec};
use runbook_types::Mapping;
use serde::Serialize;

/// Publishes a package to a feed.
#[derive(Debug, Default, Clone, Serialize, PartialEq)]
pub struct PackagePush {
    pub package: PathBuf,
    pub feed: String,
    pub api_key: Option<String>,
    pub force: bool,
}

/// Downloads a package from a feed.
#[derive(Debug, Default, Clone, Serialize, PartialEq)]
pub struct PackagePull {
    pub package: String,
    pub version: Option<String>,
    pub destination: PathBuf,
}

/// Registers a deployment environment with the control plane.
#[derive(Debug, Default, Clone, Serialize, PartialEq)]
pub struct RegisterEnvironment {
    pub name: String,
    pub url: String,
    pub token: Option<String>,
    pub tags: Vec<String>,
}

/// Restarts services in an environment.
#[derive(Debug, Default, Clone, Serialize, PartialEq)]
pub struct Restart {
    pub environment: String,
    pub services: Vec<String>,
    pub timeout_seconds: u64,
}

/// Applies an infrastructure template.
#[derive(Debug, Default, Clone, Serialize, PartialEq)]
pub struct DeployInfrastructure {
    pub template: PathBuf,
    pub parameters: Mapping,
    pub wait: bool,
}

/// Builds the catalog of every command a scenario may reference.
pub fn catalog() -> Result<CommandCatalog, CatalogError> {
    CommandCatalog::from_types(vec![
        package_push(),
        package_pull(),
        register_environment(),
        restart(),
        deploy_infrastructure(),
    ])
}

fn package_push() -> CommandType {
    CommandType::builder::<PackagePush>("package-push")
        .alias("push")
        .alias("publish")
        .summary("Publish a package to a feed")
        .field(
            FieldSpec::new("package").slot("package").long("package").short("p"),
            |command: &mut PackagePush, value: PathBuf| command.package = value,
        )
        .field(FieldSpec::new("feed").long("feed").short("f"), |command: &mut PackagePush, value: String| {
            command.feed = value
        })
        .field(
            FieldSpec::new("api_key").long("api-key").short("k"),
            |command: &mut PackagePush, value: Option<String>| command.api_key = value,
        )
        .field(FieldSpec::new("force").long("force"), |command: &mut PackagePush, value: bool| command.force = value)
        .build()
}

fn package_pull() -> CommandType {
    CommandType::builder::<PackagePull>("package-pull")
        .alias("pull")
        .summary("Download a package from a feed")
        .field(
            FieldSpec::new("package").slot("package").long("package").short("p"),
            |command: &mut PackagePull, value: String| command.package = value,
        )
        .field(
            FieldSpec::new("version").long("version").short("v"),
            |command: &mut PackagePull, value: Option<String>| command.version = value,
        )
        .field(
            FieldSpec::new("destination").long("destination").short("d"),
            |command: &mut PackagePull, value: PathBuf| command.destination = value,
        )
        .build()
}

fn register_environment() -> CommandType {
    CommandType::builder::<RegisterEnvironment>("register-environment")
        .alias("register")
        .alias("env-register")
        .summary("Register a deployment environment")
        .field(
            FieldSpec::new("name").slot("name").long("name").short("n"),
            |command: &mut RegisterEnvironment, value: String| command.name = value,
        )
        .field(FieldSpec::new("url").long("url"), |command: &mut RegisterEnvironment, value: String| {
            command.url = value
        })
        .field(
            FieldSpec::new("token").long("token").short("t"),
            |command: &mut RegisterEnvironment, value: Option<String>| command.token = value,
        )
        .field(FieldSpec::new("tags").long("tags"), |command: &mut RegisterEnvironment, value: Vec<String>| {
            command.tags = value
        })
        .build()
}

fn restart() -> CommandType {
    CommandType::builder::<Restart>("restart")
        .alias("restart-app")
        .summary("Restart services in an environment")
        .field(
            FieldSpec::new("environment").slot("environment").long("environment").short("e"),
            |command: &mut Restart, value: String| command.environment = value,
        )
        .field(FieldSpec::new("services").long("services").short("s"), |command: &mut Restart, value: Vec<String>| {
            command.services = value
        })
        .field(FieldSpec::new("timeout_seconds").long("timeout"), |command: &mut Restart, value: u64| {
            command.timeout_seconds = value
        })
        .build()
}

fn deploy_infrastructure() -> CommandType {
    CommandType::builder::<DeployInfrastructure>("deploy-infrastructure")
        .alias("infra-up")
        .summary("Apply an infrastructure template")
        .field(
            FieldSpec::new("template").slot("template").long("template"),
            |command: &mut DeployInfrastructure, value: PathBuf| command.template = value,
        )
        .field(FieldSpec::new("parameters").long("parameters"), |command: &mut DeployInfrastructure, value: Mapping| {
            command.parameters = value
        })
        .field(FieldSpec::new("wait").long("wait").short("w"), |command: &mut DeployInfrastructure, value: bool| {
            command.wait = value
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_registers_every_command_once() {
        let catalog = catalog().expect("catalog without verb clashes");
        let verbs: Vec<_> = catalog.iter().map(|command_type| command_type.name()).collect();
        assert_eq!(
            verbs,
            vec!["package-push", "package-pull", "register-environment", "restart", "deploy-infrastructure"]
        );
    }

    #[test]
    fn aliases_resolve_to_their_command() {
        let catalog = catalog().expect("catalog");
        assert_eq!(catalog.find("Publish").map(|command_type| command_type.name()), Some("package-push"));
        assert_eq!(catalog.find("infra-up").map(|command_type| command_type.name()), Some("deploy-infrastructure"));
    }
}
