use thiserror::Error;

/// A single structural or referential defect in a workflow description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
  #[error("workflow has no nodes")]
  EmptyWorkflow,

  #[error("duplicate node id: {node_id}")]
  DuplicateNodeId { node_id: String },

  #[error("edge '{from}' -> '{to}' references unknown node '{node_id}'")]
  UnknownEdgeNode {
    from: String,
    to: String,
    node_id: String,
  },

  #[error("start node '{node_id}' does not exist")]
  UnknownStartNode { node_id: String },

  /// Every node has an incoming edge from another node.
  #[error("workflow has no entry node; set start_node when the entry is a loop target")]
  NoEntryNode,

  #[error("workflow has multiple entry nodes: {}", node_ids.join(", "))]
  MultipleEntryNodes { node_ids: Vec<String> },

  /// No path of edges leads from the entry node to this node.
  #[error("node '{node_id}' is not reachable from the entry node")]
  UnreachableNode { node_id: String },

  #[error("node '{node_id}' has more than one edge for action '{action}'")]
  DuplicateAction { node_id: String, action: String },

  #[error("node '{node_id}' param '{param}' references unknown '${{{reference}}}'")]
  UnresolvedReference {
    node_id: String,
    param: String,
    reference: String,
  },

  #[error("output '{output}' references unknown '${{{reference}}}'")]
  UnresolvedOutputReference { output: String, reference: String },

  #[error("node '{node_id}' has unknown type '{node_type}'")]
  UnknownNodeType { node_id: String, node_type: String },
}

/// Validation failed; carries every violation found.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("workflow validation failed: {}", render(violations))]
pub struct ValidationError {
  pub violations: Vec<Violation>,
}

fn render(violations: &[Violation]) -> String {
  violations
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join("; ")
}
