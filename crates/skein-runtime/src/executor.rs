//! The action router.
//!
//! Execution follows a current-node pointer: run the node, look up the
//! action it returned among its outgoing edges, move on. There is no
//! topological order and no iteration cap, so self-loops and back-edges
//! express retries directly.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use skein_config::DEFAULT_ACTION;
use skein_store::Context;
use tracing::{error, info, instrument, warn};

use crate::compiler::CompiledWorkflow;
use crate::error::RuntimeError;
use crate::events::{ExecutionEvent, ExecutionNotifier};

/// One node lifecycle in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
  pub node_id: String,
  /// The action taken, with `None` already mapped to `"default"`.
  pub action: String,
  pub duration_ms: u64,
}

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Termination {
  /// The last node has no outgoing edges.
  Completed { node_id: String },
  /// The last node returned an action no edge matches.
  UnmatchedAction { node_id: String, action: String },
}

impl Termination {
  pub fn node_id(&self) -> &str {
    match self {
      Termination::Completed { node_id } | Termination::UnmatchedAction { node_id, .. } => node_id,
    }
  }
}

/// Result of a complete run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
  pub execution_id: String,
  pub workflow: String,
  pub steps: Vec<StepRecord>,
  pub termination: Termination,
}

impl ExecutionResult {
  pub fn last_node(&self) -> &str {
    self.termination.node_id()
  }

  /// Node ids in execution order, repeats included.
  pub fn path(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.node_id.as_str()).collect()
  }
}

enum State {
  Running(String),
  Terminated(Termination),
}

/// Drives a compiled workflow against a context.
pub struct Executor {
  notifier: Arc<dyn ExecutionNotifier>,
}

impl Executor {
  pub fn new(notifier: Arc<dyn ExecutionNotifier>) -> Self {
    Self { notifier }
  }

  #[instrument(
    name = "executor_execute",
    skip(self, compiled, ctx),
    fields(
      workflow = %compiled.name(),
      identity = %compiled.identity(),
    )
  )]
  pub async fn execute(
    &self,
    compiled: &CompiledWorkflow,
    ctx: &mut Context,
  ) -> Result<ExecutionResult, RuntimeError> {
    let execution_id = uuid::Uuid::new_v4().to_string();

    info!(
      execution_id = %execution_id,
      workflow = %compiled.name(),
      entry_node = %compiled.entry(),
      "workflow_started"
    );
    self.notifier.notify(ExecutionEvent::WorkflowStarted {
      execution_id: execution_id.clone(),
      workflow: compiled.name().to_string(),
      identity: compiled.identity().to_string(),
    });

    let result = self.run_loop(compiled, ctx, &execution_id).await;

    match &result {
      Ok(execution) => {
        info!(
          execution_id = %execution_id,
          steps = execution.steps.len(),
          last_node = %execution.last_node(),
          "workflow_completed"
        );
        self.notifier.notify(ExecutionEvent::WorkflowCompleted {
          execution_id: execution_id.clone(),
          last_node: execution.last_node().to_string(),
        });
      }
      Err(e) => {
        error!(execution_id = %execution_id, error = %e, "workflow_failed");
        self.notifier.notify(ExecutionEvent::WorkflowFailed {
          execution_id: execution_id.clone(),
          error: e.to_string(),
        });
      }
    }

    result
  }

  async fn run_loop(
    &self,
    compiled: &CompiledWorkflow,
    ctx: &mut Context,
    execution_id: &str,
  ) -> Result<ExecutionResult, RuntimeError> {
    let mut steps = Vec::new();
    let mut state = State::Running(compiled.entry().to_string());

    loop {
      let node_id = match state {
        State::Running(node_id) => node_id,
        State::Terminated(termination) => {
          return Ok(ExecutionResult {
            execution_id: execution_id.to_string(),
            workflow: compiled.name().to_string(),
            steps,
            termination,
          });
        }
      };

      let node = compiled
        .node(&node_id)
        .ok_or_else(|| RuntimeError::InvalidGraph {
          message: format!("node '{}' not found in compiled workflow", node_id),
        })?;

      info!(execution_id = %execution_id, node_id = %node_id, "node_started");
      self.notifier.notify(ExecutionEvent::NodeStarted {
        execution_id: execution_id.to_string(),
        node_id: node_id.clone(),
      });

      let started = Instant::now();
      let action = match node.node.run(ctx, &node.params).await {
        Ok(action) => action.unwrap_or_else(|| DEFAULT_ACTION.to_string()),
        Err(e) => {
          let err = RuntimeError::node_failed(node_id.clone(), e);
          error!(execution_id = %execution_id, node_id = %node_id, error = %err, "node_failed");
          self.notifier.notify(ExecutionEvent::NodeFailed {
            execution_id: execution_id.to_string(),
            node_id: node_id.clone(),
            error: err.to_string(),
          });
          return Err(err);
        }
      };
      let duration_ms = started.elapsed().as_millis() as u64;

      info!(
        execution_id = %execution_id,
        node_id = %node_id,
        action = %action,
        duration_ms,
        "node_completed"
      );
      self.notifier.notify(ExecutionEvent::NodeCompleted {
        execution_id: execution_id.to_string(),
        node_id: node_id.clone(),
        action: action.clone(),
        duration_ms,
      });

      state = match compiled.route(&node_id, &action) {
        Some(next) => State::Running(next.to_string()),
        None if !node.has_successors => State::Terminated(Termination::Completed {
          node_id: node_id.clone(),
        }),
        None => {
          warn!(
            execution_id = %execution_id,
            node_id = %node_id,
            action = %action,
            "unmatched_action"
          );
          State::Terminated(Termination::UnmatchedAction {
            node_id: node_id.clone(),
            action: action.clone(),
          })
        }
      };

      steps.push(StepRecord {
        node_id,
        action,
        duration_ms,
      });
    }
  }
}
