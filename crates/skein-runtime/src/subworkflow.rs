//! The built-in `workflow` node: runs another workflow as a single step.
//!
//! Targets are named one of three ways:
//! - `workflow_name`: loaded from workflow storage
//! - `workflow_ref`: a description file, relative to the invoking workflow
//! - `workflow_ir`: an inline description
//!
//! `param_mapping` is resolved against the parent before the child starts and
//! becomes the child's invocation params. `output_mapping` maps parent keys to
//! templates evaluated against the child's final context.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use skein_config::{Params, WorkflowDef};
use skein_node::{Node, NodeError};
use skein_store::{
  CALL_STACK_KEY, Context, ReadStore, Store, TEMPLATE_ERRORS_KEY, append, is_reserved_key,
};
use skein_template::{Scope, has_templates, resolve_str};
use tracing::{info, warn};

use crate::call_stack::{check_frames, read_stack};
use crate::error::RuntimeError;
use crate::invocation::Invocation;
use crate::runtime::Runtime;
use crate::storage::{StorageError, load_file};
use crate::wrappers::TemplateError;

/// How much of the parent context a child workflow sees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
  /// Only the mapped params.
  #[default]
  Mapped,
  /// Nothing; mapped params are still available as invocation params.
  Isolated,
  /// Parent keys under a prefix, with the prefix stripped, plus mapped params.
  Scoped,
  /// The parent's visible context; changes are written back on success.
  Shared,
}

impl fmt::Display for StorageMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StorageMode::Mapped => write!(f, "mapped"),
      StorageMode::Isolated => write!(f, "isolated"),
      StorageMode::Scoped => write!(f, "scoped"),
      StorageMode::Shared => write!(f, "shared"),
    }
  }
}

#[derive(Debug, Deserialize)]
struct SubWorkflowParams {
  #[serde(default)]
  workflow_name: Option<String>,
  #[serde(default)]
  workflow_ref: Option<String>,
  #[serde(default)]
  workflow_ir: Option<WorkflowDef>,
  #[serde(default)]
  param_mapping: Params,
  #[serde(default)]
  output_mapping: Params,
  #[serde(default)]
  storage_mode: StorageMode,
  #[serde(default)]
  scope_prefix: Option<String>,
  #[serde(rename = "__parent_identity__", default)]
  parent_identity: Option<String>,
  #[serde(rename = "__parent_dir__", default)]
  parent_dir: Option<PathBuf>,
}

/// Everything execute needs, carried from prepare.
#[derive(Debug, Serialize, Deserialize)]
struct PreparedInvocation {
  identity: String,
  base_dir: Option<PathBuf>,
  def: WorkflowDef,
  mode: StorageMode,
  params: Params,
  context: Params,
  call_stack: Vec<String>,
  output_mapping: Params,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChildOutcome {
  outputs: Params,
  /// Shared mode only: keys the child added or changed.
  changes: Params,
  /// Shared mode only: parent keys the child removed.
  removed: Vec<String>,
  template_errors: Vec<TemplateError>,
}

fn runtime_error(err: impl Into<RuntimeError>) -> NodeError {
  NodeError::other(err.into())
}

/// Node running a child workflow through the full pipeline.
pub struct SubWorkflowNode {
  runtime: Runtime,
  node_id: String,
}

impl SubWorkflowNode {
  pub fn new(runtime: Runtime, node_id: impl Into<String>) -> Self {
    Self {
      runtime,
      node_id: node_id.into(),
    }
  }

  /// Load the target, returning its description, identity and base dir.
  async fn load_target(
    &self,
    params: &mut SubWorkflowParams,
  ) -> Result<(WorkflowDef, String, Option<PathBuf>), NodeError> {
    let targets = [
      params.workflow_name.is_some(),
      params.workflow_ref.is_some(),
      params.workflow_ir.is_some(),
    ];
    if targets.iter().filter(|set| **set).count() != 1 {
      return Err(NodeError::invalid_param(
        "workflow_name",
        "exactly one of workflow_name, workflow_ref or workflow_ir is required",
      ));
    }

    if let Some(name) = &params.workflow_name {
      let stored = self
        .runtime
        .storage()
        .load(name)
        .await
        .map_err(runtime_error)?;
      let identity = stored.identity();
      let base_dir = stored.base_dir();
      return Ok((stored.def, identity, base_dir));
    }

    if let Some(reference) = &params.workflow_ref {
      let path = PathBuf::from(reference);
      let path = match (&params.parent_dir, path.is_relative()) {
        (Some(dir), true) => dir.join(path),
        _ => path,
      };
      let canonical = tokio::fs::canonicalize(&path).await.map_err(|source| {
        runtime_error(StorageError::Io {
          path: path.clone(),
          source,
        })
      })?;
      let def = load_file(&canonical).await.map_err(runtime_error)?;
      let base_dir = canonical.parent().map(Path::to_path_buf);
      return Ok((def, canonical.display().to_string(), base_dir));
    }

    let def = params.workflow_ir.take().unwrap_or_default();
    let parent = params.parent_identity.as_deref().unwrap_or("inline");
    let identity = format!("{}#{}", parent, self.node_id);
    Ok((def, identity, params.parent_dir.clone()))
  }

  fn initial_context(
    &self,
    store: &dyn ReadStore,
    params: &SubWorkflowParams,
  ) -> Params {
    let mut context = match params.storage_mode {
      StorageMode::Mapped | StorageMode::Isolated => Params::new(),
      StorageMode::Scoped => {
        let prefix = params
          .scope_prefix
          .clone()
          .unwrap_or_else(|| format!("{}.", self.node_id));
        store
          .keys()
          .into_iter()
          .filter(|key| !is_reserved_key(key))
          .filter_map(|key| {
            let stripped = key.strip_prefix(prefix.as_str())?;
            if stripped.is_empty() {
              return None;
            }
            Some((stripped.to_string(), store.get(&key)?.clone()))
          })
          .collect()
      }
      StorageMode::Shared => {
        // Child writes reach the parent context.
        warn!(node_id = %self.node_id, "shared_storage_mode");
        let mut snapshot = store.snapshot();
        snapshot.remove(CALL_STACK_KEY);
        return snapshot;
      }
    };

    if params.storage_mode != StorageMode::Isolated {
      context.extend(params.param_mapping.clone());
    }
    context
  }

  /// Evaluate `output_mapping` against the child's final context.
  fn map_outputs(&self, child: &Context, mapping: &Params) -> (Params, Vec<TemplateError>) {
    let scope = Scope::new(child);
    let mut outputs = Params::new();
    let mut errors = Vec::new();

    for (key, expr) in mapping {
      if is_reserved_key(key) {
        warn!(node_id = %self.node_id, key = %key, "output_mapping_reserved_key_skipped");
        continue;
      }

      let template = match expr {
        Value::String(s) if has_templates(expr) => s.clone(),
        Value::String(s) => format!("${{{}}}", s),
        other => {
          outputs.insert(key.clone(), other.clone());
          continue;
        }
      };

      let resolved = resolve_str(&template, &scope);
      if resolved.is_complete() {
        outputs.insert(key.clone(), resolved.value);
        continue;
      }
      for reference in resolved.unresolved {
        warn!(
          node_id = %self.node_id,
          key = %key,
          reference = %reference,
          "output_mapping_unresolved"
        );
        errors.push(TemplateError {
          node_id: self.node_id.clone(),
          param: format!("output_mapping.{}", key),
          template: template.clone(),
          reference,
        });
      }
    }

    (outputs, errors)
  }
}

#[async_trait]
impl Node for SubWorkflowNode {
  async fn prepare(&self, store: &dyn ReadStore, params: &Params) -> Result<Value, NodeError> {
    let mut params: SubWorkflowParams = serde_json::from_value(Value::Object(params.clone()))
      .map_err(|e| NodeError::invalid_param("workflow", e.to_string()))?;

    let (def, identity, base_dir) = self.load_target(&mut params).await?;

    // Fail before anything of the child runs.
    let call_stack = read_stack(store);
    check_frames(&call_stack, &identity, self.runtime.config().max_depth).map_err(runtime_error)?;

    let context = self.initial_context(store, &params);
    let prepared = PreparedInvocation {
      identity,
      base_dir,
      def,
      mode: params.storage_mode,
      params: params.param_mapping,
      context,
      call_stack,
      output_mapping: params.output_mapping,
    };
    Ok(serde_json::to_value(prepared)?)
  }

  async fn execute(&self, prepared: Value) -> Result<Value, NodeError> {
    let prepared: PreparedInvocation = serde_json::from_value(prepared)?;

    let mut child = Context::from_map(prepared.context.clone());
    child.set(CALL_STACK_KEY, Value::from(prepared.call_stack.clone()));

    let mut invocation = Invocation::new(prepared.identity.clone()).with_params(prepared.params);
    invocation.base_dir = prepared.base_dir;

    info!(
      node_id = %self.node_id,
      identity = %invocation.identity,
      storage_mode = %prepared.mode,
      depth = prepared.call_stack.len() + 1,
      "subworkflow_started"
    );

    let execution = self
      .runtime
      .execute_pipeline(&prepared.def, &invocation, &mut child)
      .await
      .map_err(runtime_error)?;

    info!(
      node_id = %self.node_id,
      identity = %invocation.identity,
      steps = execution.steps.len(),
      "subworkflow_completed"
    );

    let (outputs, template_errors) = self.map_outputs(&child, &prepared.output_mapping);

    let (changes, removed) = match prepared.mode {
      StorageMode::Shared => {
        let removed = prepared
          .context
          .keys()
          .filter(|key| !child.contains_key(key))
          .cloned()
          .collect();
        let changes = child
          .into_map()
          .into_iter()
          .filter(|(key, value)| key != CALL_STACK_KEY && prepared.context.get(key) != Some(value))
          .collect();
        (changes, removed)
      }
      _ => (Params::new(), Vec::new()),
    };

    Ok(serde_json::to_value(ChildOutcome {
      outputs,
      changes,
      removed,
      template_errors,
    })?)
  }

  async fn finalize(
    &self,
    store: &mut dyn Store,
    _prepared: Value,
    executed: Value,
  ) -> Result<Option<String>, NodeError> {
    let outcome: ChildOutcome = serde_json::from_value(executed)?;

    for key in &outcome.removed {
      store.remove(key);
    }
    for (key, value) in outcome.changes {
      store.set(&key, value);
    }
    for (key, value) in outcome.outputs {
      store.set(&key, value);
    }
    for error in outcome.template_errors {
      append(store, TEMPLATE_ERRORS_KEY, serde_json::to_value(error)?);
    }

    Ok(None)
  }
}
