//! Dispatch driver: hands activated steps to a dispatcher, one at a time.
//!
//! - `CommandDispatcher` abstracts how a command is carried out
//! - `DryRunDispatcher` records each command as JSON without side effects
//! - `execute_plan` walks a plan in order and stops after the first failure

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::activate::ActivatedStep;

/// Status of a dispatched step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Step did not run because an earlier step failed.
    Skipped,
    /// Dispatcher reported success.
    Succeeded,
    /// Dispatcher reported or raised a failure.
    Failed,
}

/// Result of dispatching one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Verb of the dispatched command.
    pub verb: String,
    /// Resolved step description.
    pub description: String,
    /// Final status.
    pub status: StepStatus,
    /// Error text when the dispatcher raised one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Carries out one activated command.
///
/// Hosts implement this to connect the engine to their command runner.
pub trait CommandDispatcher {
    fn dispatch(&mut self, step: &ActivatedStep) -> Result<StepStatus>;
}

/// Dispatcher that performs nothing and records what would have run.
#[derive(Debug, Default)]
pub struct DryRunDispatcher {
    recorded: Vec<Value>,
}

impl DryRunDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// JSON rendering of every dispatched step, in dispatch order.
    pub fn recorded(&self) -> &[Value] {
        &self.recorded
    }
}

impl CommandDispatcher for DryRunDispatcher {
    fn dispatch(&mut self, step: &ActivatedStep) -> Result<StepStatus> {
        debug!(verb = step.verb(), description = step.description(), "dry run dispatch");
        self.recorded.push(json!({
            "verb": step.verb(),
            "description": step.description(),
            "command": step.command().to_json(),
        }));
        Ok(StepStatus::Succeeded)
    }
}

/// Dispatches `plan` in order.
///
/// After the first failed step the remaining steps are reported as
/// [`StepStatus::Skipped`] without reaching the dispatcher.
pub fn execute_plan(plan: &[ActivatedStep], dispatcher: &mut dyn CommandDispatcher) -> Vec<StepResult> {
    let mut results = Vec::with_capacity(plan.len());
    let mut halted = false;

    for step in plan {
        let (status, error) = if halted {
            (StepStatus::Skipped, None)
        } else {
            match dispatcher.dispatch(step) {
                Ok(status) => (status, None),
                Err(error) => {
                    warn!(verb = step.verb(), %error, "step dispatch failed");
                    (StepStatus::Failed, Some(error.to_string()))
                }
            }
        };
        halted |= status == StepStatus::Failed;

        results.push(StepResult {
            verb: step.verb().to_string(),
            description: step.description().to_string(),
            status,
            error,
        });
    }

    results
}
