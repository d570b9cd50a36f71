mod commands;
mod config;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command};
use runbook_engine::{
    BindingKind, CommandCatalog, DryRunDispatcher, FieldDescriptor, Scenario, StepStatus, execute_plan,
};
use tracing::{debug, info};

use crate::config::RunbookConfig;

fn main() -> Result<()> {
    let matches = cli().get_matches();
    let config = RunbookConfig::load();
    init_tracing(matches.get_flag("verbose"), config.log_filter.as_deref());

    let catalog = commands::catalog().context("failed to build command catalog")?;

    match matches.subcommand() {
        Some(("plan", sub)) => plan_cmd(&catalog, &scenario_arg(&config, sub)),
        Some(("run", sub)) => run_cmd(&catalog, &scenario_arg(&config, sub)),
        Some(("commands", _)) => commands_cmd(&catalog),
        _ => {
            println!("Available subcommands: plan, run, commands");
            Ok(())
        }
    }
}

fn cli() -> Command {
    let scenario = Arg::new("scenario")
        .action(ArgAction::Set)
        .value_parser(clap::value_parser!(PathBuf))
        .help("Path to the scenario YAML/JSON document");

    Command::new("runbook")
        .about("Resolve and run declarative scenarios")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
        .subcommand(
            Command::new("plan")
                .about("Print the activated steps of a scenario")
                .arg(scenario.clone()),
        )
        .subcommand(
            Command::new("run")
                .about("Activate every step, then dispatch them in order (dry run)")
                .arg(scenario),
        )
        .subcommand(Command::new("commands").about("List the commands a scenario may reference"))
}

/// Filter precedence: `--verbose`, then `RUST_LOG`, then the config file, then `info`.
fn init_tracing(verbose: bool, configured: Option<&str>) {
    let filter = if verbose {
        "debug".to_string()
    } else {
        std::env::var("RUST_LOG")
            .ok()
            .or_else(|| configured.map(str::to_string))
            .unwrap_or_else(|| "info".into())
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn scenario_arg(config: &RunbookConfig, matches: &ArgMatches) -> PathBuf {
    config.scenario_path(matches.get_one::<PathBuf>("scenario").cloned())
}

fn plan_cmd(catalog: &CommandCatalog, path: &Path) -> Result<()> {
    let scenario = load_scenario(path)?;
    let plan = scenario
        .plan(catalog)
        .with_context(|| format!("failed to activate steps of {}", path.display()))?;
    debug!(steps = plan.len(), "activated scenario");
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

fn run_cmd(catalog: &CommandCatalog, path: &Path) -> Result<()> {
    let scenario = load_scenario(path)?;
    let plan = scenario
        .plan(catalog)
        .with_context(|| format!("failed to activate steps of {}", path.display()))?;

    let mut dispatcher = DryRunDispatcher::new();
    let results = execute_plan(&plan, &mut dispatcher);
    println!("{}", serde_json::to_string_pretty(&results)?);

    let failed = results
        .iter()
        .filter(|result| result.status == StepStatus::Failed)
        .count();
    if failed > 0 {
        bail!("{failed} step(s) failed");
    }
    info!(steps = results.len(), "scenario completed");
    Ok(())
}

fn commands_cmd(catalog: &CommandCatalog) -> Result<()> {
    for command_type in catalog.iter() {
        let aliases = command_type.aliases().join(", ");
        match command_type.summary() {
            Some(summary) => println!("{}  {}", command_type.name(), summary),
            None => println!("{}", command_type.name()),
        }
        if !aliases.is_empty() {
            println!("  aliases: {aliases}");
        }
        for field in command_type.fields() {
            println!("  {}", describe_field(field));
        }
    }
    Ok(())
}

fn describe_field(field: &FieldDescriptor) -> String {
    let keys: Vec<String> = BindingKind::PRECEDENCE
        .iter()
        .filter_map(|kind| field.spec.key(*kind).map(|key| format!("{kind}={key}")))
        .collect();
    format!("{} ({}): {}", field.spec.field, field.type_name, keys.join(" "))
}

fn load_scenario(path: &Path) -> Result<Scenario> {
    Scenario::load(path).with_context(|| format!("failed to load scenario {}", path.display()))
}
