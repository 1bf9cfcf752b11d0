use thiserror::Error;

use crate::node::Phase;

/// Errors raised by a node during one of its phases.
#[derive(Debug, Error)]
pub enum NodeError {
  /// The node's own work failed.
  #[error("{message}")]
  Failed { message: String },

  /// A param was present but unusable.
  #[error("invalid param '{name}': {message}")]
  InvalidParam { name: String, message: String },

  /// A required param was absent.
  #[error("missing required param '{name}'")]
  MissingParam { name: String },

  /// Attribution added by the runtime: which node, which phase.
  #[error("node '{node_id}' failed during {phase}: {source}")]
  Phase {
    node_id: String,
    phase: Phase,
    #[source]
    source: Box<NodeError>,
  },

  /// The node failed after some of its template references did not resolve.
  #[error("{source} (unresolved references: {})", references.join(", "))]
  Unresolved {
    references: Vec<String>,
    #[source]
    source: Box<NodeError>,
  },

  /// Any other error, kept as the source.
  #[error(transparent)]
  Other(Box<dyn std::error::Error + Send + Sync>),
}

impl NodeError {
  pub fn failed(message: impl Into<String>) -> Self {
    Self::Failed {
      message: message.into(),
    }
  }

  pub fn invalid_param(name: impl Into<String>, message: impl Into<String>) -> Self {
    Self::InvalidParam {
      name: name.into(),
      message: message.into(),
    }
  }

  pub fn missing_param(name: impl Into<String>) -> Self {
    Self::MissingParam { name: name.into() }
  }

  pub fn other(err: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Other(Box::new(err))
  }

  /// Strip runtime attribution, returning the error the node raised.
  pub fn innermost(&self) -> &NodeError {
    match self {
      Self::Phase { source, .. } | Self::Unresolved { source, .. } => source.innermost(),
      other => other,
    }
  }
}

impl From<serde_json::Error> for NodeError {
  fn from(err: serde_json::Error) -> Self {
    Self::other(err)
  }
}

/// Errors from the node-kind registry.
#[derive(Debug, Error)]
pub enum RegistryError {
  #[error("unknown node type: {node_type}")]
  UnknownType { node_type: String },
}
