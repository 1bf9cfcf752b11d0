use serde::{Deserialize, Serialize};

use crate::input::Params;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
  pub id: String,
  /// Selects the implementation from the node-kind registry.
  #[serde(rename = "type")]
  pub node_type: String,
  /// Documentation only.
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub purpose: String,
  #[serde(default)]
  pub params: Params,
}

impl NodeDef {
  pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      node_type: node_type.into(),
      purpose: String::new(),
      params: Params::new(),
    }
  }

  /// Set a single param, replacing any previous value.
  pub fn with_param(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
    self.params.insert(name.into(), value);
    self
  }

  pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
    self.purpose = purpose.into();
    self
  }
}
