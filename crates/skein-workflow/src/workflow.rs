use skein_config::{NodeDef, Params, WorkflowDef};

use crate::graph::Graph;

/// A validated workflow ready for compilation.
///
/// Only the resolver constructs these after its checks pass; the description
/// is immutable from here on.
#[derive(Debug, Clone)]
pub struct Workflow {
  def: WorkflowDef,
  entry_node: String,
  graph: Graph,
}

impl Workflow {
  /// Wrap a description whose structure has already been checked.
  pub fn new(def: WorkflowDef, entry_node: impl Into<String>) -> Self {
    let graph = Graph::new(&def.nodes, &def.edges);
    Self {
      def,
      entry_node: entry_node.into(),
      graph,
    }
  }

  pub fn def(&self) -> &WorkflowDef {
    &self.def
  }

  pub fn name(&self) -> &str {
    self.def.display_name()
  }

  pub fn entry_node(&self) -> &str {
    &self.entry_node
  }

  pub fn graph(&self) -> &Graph {
    &self.graph
  }

  pub fn nodes(&self) -> &[NodeDef] {
    &self.def.nodes
  }

  /// Get a node by ID.
  pub fn get_node(&self, node_id: &str) -> Option<&NodeDef> {
    self.def.get_node(node_id)
  }

  pub fn is_namespaced(&self) -> bool {
    self.def.enable_namespacing
  }

  pub fn input_defaults(&self) -> Params {
    self.def.input_defaults()
  }
}
