use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::edge::Edge;
use crate::input::{InputDef, OutputDef, Params};
use crate::node::NodeDef;

/// A raw workflow graph description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDef {
  /// Display name used in logs.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub ir_version: Option<String>,
  pub nodes: Vec<NodeDef>,
  #[serde(default)]
  pub edges: Vec<Edge>,
  #[serde(default)]
  pub inputs: BTreeMap<String, InputDef>,
  #[serde(default)]
  pub outputs: BTreeMap<String, OutputDef>,
  #[serde(default)]
  pub enable_namespacing: bool,
  /// Explicit entry node. Overrides entry detection.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub start_node: Option<String>,
  /// Accepted for compatibility with older descriptions; never consulted.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub mappings: Option<serde_json::Value>,
}

impl WorkflowDef {
  pub fn new(nodes: Vec<NodeDef>, edges: Vec<Edge>) -> Self {
    Self {
      nodes,
      edges,
      ..Self::default()
    }
  }

  pub fn get_node(&self, node_id: &str) -> Option<&NodeDef> {
    self.nodes.iter().find(|n| n.id == node_id)
  }

  /// Display name, falling back to a generic label.
  pub fn display_name(&self) -> &str {
    self.name.as_deref().unwrap_or("workflow")
  }

  /// Defaults of all declared inputs that carry one.
  pub fn input_defaults(&self) -> Params {
    self
      .inputs
      .iter()
      .filter_map(|(name, input)| input.default.clone().map(|v| (name.clone(), v)))
      .collect()
  }
}
