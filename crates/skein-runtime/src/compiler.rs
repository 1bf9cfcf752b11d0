use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use skein_config::{NodeDef, Params};
use skein_node::{Node, RegistryError, WORKFLOW_NODE_TYPE, workflow_kind};
use skein_store::{FAMILY_KEY, MEMBER_KEY, NODE_TYPE_KEY, PARENT_DIR_KEY, PARENT_IDENTITY_KEY};
use skein_workflow::Workflow;
use tracing::debug;

use crate::error::RuntimeError;
use crate::invocation::Invocation;
use crate::runtime::Runtime;
use crate::subworkflow::SubWorkflowNode;
use crate::wrappers::{ChainOptions, build_chain};

/// A node ready to run: wrapped instance plus its injected params.
pub struct CompiledNode {
  pub id: String,
  pub node_type: String,
  pub node: Arc<dyn Node>,
  pub params: Params,
  /// Whether any edge leaves this node.
  pub has_successors: bool,
}

/// A workflow compiled for one invocation.
///
/// Wrapper instances are created per compile and never shared between runs.
pub struct CompiledWorkflow {
  name: String,
  identity: String,
  entry: String,
  nodes: HashMap<String, CompiledNode>,
  routes: HashMap<(String, String), String>,
}

impl CompiledWorkflow {
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn identity(&self) -> &str {
    &self.identity
  }

  pub fn entry(&self) -> &str {
    &self.entry
  }

  pub fn node(&self, node_id: &str) -> Option<&CompiledNode> {
    self.nodes.get(node_id)
  }

  /// Target of `action` taken from `node_id`.
  pub fn route(&self, node_id: &str, action: &str) -> Option<&str> {
    self
      .routes
      .get(&(node_id.to_string(), action.to_string()))
      .map(String::as_str)
  }
}

/// Turns validated workflows into compiled ones.
pub struct Compiler {
  runtime: Runtime,
}

impl Compiler {
  pub fn new(runtime: Runtime) -> Self {
    Self { runtime }
  }

  pub fn compile(
    &self,
    workflow: &Workflow,
    invocation: &Invocation,
  ) -> Result<CompiledWorkflow, RuntimeError> {
    let invocation_params = Arc::new(invocation.params.clone());
    let input_defaults = Arc::new(workflow.input_defaults());

    let mut nodes = HashMap::new();
    let mut routes = HashMap::new();
    for def in workflow.nodes() {
      let (node, params, raw_params) = self.instantiate(def, invocation)?;
      let node = build_chain(
        node,
        ChainOptions {
          node_id: def.id.clone(),
          namespaced: workflow.is_namespaced(),
          raw_params,
          invocation_params: invocation_params.clone(),
          input_defaults: input_defaults.clone(),
        },
      );

      let successors = workflow.graph().successors(&def.id);
      for (action, target) in successors {
        routes
          .entry((def.id.clone(), action.clone()))
          .or_insert_with(|| target.clone());
      }

      nodes.insert(
        def.id.clone(),
        CompiledNode {
          id: def.id.clone(),
          node_type: def.node_type.clone(),
          node,
          params,
          has_successors: !successors.is_empty(),
        },
      );
    }

    debug!(
      workflow = %workflow.name(),
      identity = %invocation.identity,
      nodes = nodes.len(),
      routes = routes.len(),
      "workflow_compiled"
    );

    Ok(CompiledWorkflow {
      name: workflow.name().to_string(),
      identity: invocation.identity.clone(),
      entry: workflow.entry_node().to_string(),
      nodes,
      routes,
    })
  }

  /// Instantiate a node, returning it with its injected params and the
  /// params its kind keeps raw. The description's params are never mutated.
  fn instantiate(
    &self,
    def: &NodeDef,
    invocation: &Invocation,
  ) -> Result<(Arc<dyn Node>, Params, Vec<String>), RuntimeError> {
    let mut params = def.params.clone();

    if def.node_type == WORKFLOW_NODE_TYPE {
      params.insert(
        PARENT_IDENTITY_KEY.to_string(),
        Value::String(invocation.identity.clone()),
      );
      if let Some(dir) = &invocation.base_dir {
        params.insert(
          PARENT_DIR_KEY.to_string(),
          Value::String(dir.display().to_string()),
        );
      }
      let node: Arc<dyn Node> = Arc::new(SubWorkflowNode::new(self.runtime.clone(), def.id.clone()));
      return Ok((node, params, workflow_kind().raw_params));
    }

    let registry = self.runtime.registry();
    let resolved = registry
      .lookup(&def.node_type)
      .ok_or_else(|| RuntimeError::Instantiate {
        node_id: def.id.clone(),
        source: RegistryError::UnknownType {
          node_type: def.node_type.clone(),
        },
      })?;
    let node = registry
      .instantiate(&def.node_type)
      .map_err(|source| RuntimeError::Instantiate {
        node_id: def.id.clone(),
        source,
      })?;

    if let Some(family) = resolved.family {
      params.insert(
        NODE_TYPE_KEY.to_string(),
        Value::String(def.node_type.clone()),
      );
      params.insert(FAMILY_KEY.to_string(), Value::String(family.name));
      params.insert(MEMBER_KEY.to_string(), Value::String(family.member));
    }

    Ok((node, params, resolved.kind.raw_params))
  }
}
