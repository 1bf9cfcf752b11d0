use serde::{Deserialize, Serialize};

/// Action used when an edge omits one, and the action a node takes when its
/// finalize phase returns nothing.
pub const DEFAULT_ACTION: &str = "default";

fn default_action() -> String {
  DEFAULT_ACTION.to_string()
}

/// A directed, action-labeled connection between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
  pub from: String,
  pub to: String,
  #[serde(default = "default_action")]
  pub action: String,
}

impl Edge {
  /// Create an edge taken on the default action.
  pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
    Self {
      from: from.into(),
      to: to.into(),
      action: default_action(),
    }
  }

  /// Create an edge taken on a named action.
  pub fn on(from: impl Into<String>, to: impl Into<String>, action: impl Into<String>) -> Self {
    Self {
      from: from.into(),
      to: to.into(),
      action: action.into(),
    }
  }

  pub fn is_default(&self) -> bool {
    self.action == DEFAULT_ACTION
  }
}
