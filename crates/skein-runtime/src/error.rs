//! Runtime error types.

use skein_node::{NodeError, Phase, RegistryError};
use skein_resolver::ValidationError;

use crate::storage::StorageError;

/// Errors that can occur during compilation or execution.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
  /// The description failed validation.
  #[error(transparent)]
  Validation(#[from] ValidationError),

  /// Declared required inputs were not supplied.
  #[error("missing required inputs: {}", names.join(", "))]
  MissingInputs { names: Vec<String> },

  /// A node kind could not be instantiated.
  #[error("failed to instantiate node '{node_id}': {source}")]
  Instantiate {
    node_id: String,
    #[source]
    source: RegistryError,
  },

  /// A node returned an error. Not retried.
  #[error(
    "node '{node_id}' failed{}: {source}",
    phase.map(|p| format!(" during {p}")).unwrap_or_default()
  )]
  NodeFailed {
    node_id: String,
    phase: Option<Phase>,
    #[source]
    source: Box<NodeError>,
  },

  /// A workflow invoked itself, directly or transitively.
  #[error("circular workflow reference: {identity} (call stack: {})", stack.join(" -> "))]
  CircularReference { identity: String, stack: Vec<String> },

  /// Nesting went deeper than the configured maximum.
  #[error("workflow nesting exceeds max depth {max_depth} at {identity}")]
  DepthExceeded { identity: String, max_depth: usize },

  /// Loading or saving a stored workflow failed.
  #[error(transparent)]
  Storage(#[from] StorageError),

  /// The compiled graph is inconsistent.
  #[error("invalid graph: {message}")]
  InvalidGraph { message: String },
}

impl RuntimeError {
  /// Build a node failure, lifting runtime attribution off the error.
  pub fn node_failed(node_id: impl Into<String>, err: NodeError) -> Self {
    match err {
      NodeError::Phase {
        node_id,
        phase,
        source,
      } => Self::NodeFailed {
        node_id,
        phase: Some(phase),
        source,
      },
      other => Self::NodeFailed {
        node_id: node_id.into(),
        phase: None,
        source: Box::new(other),
      },
    }
  }

  /// The innermost runtime error, following failures of nested workflows.
  pub fn root_cause(&self) -> &RuntimeError {
    if let Self::NodeFailed { source, .. } = self
      && let NodeError::Other(inner) = source.innermost()
      && let Some(nested) = inner.downcast_ref::<RuntimeError>()
    {
      return nested.root_cause();
    }
    self
  }
}
