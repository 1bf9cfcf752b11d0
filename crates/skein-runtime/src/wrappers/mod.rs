//! Cross-cutting behavior layered around node implementations.
//!
//! Each wrapper is itself a [`Node`] holding the next one, so a wrapped node is
//! indistinguishable from a plain one to the executor. Order, outermost first:
//!
//! ```text
//! InstrumentedNode -> NamespacedNode (if namespacing) -> TemplateNode -> node
//! ```
//!
//! The template wrapper sits innermost so it resolves against the node's own
//! namespace view; the instrumentation wrapper sits outermost so its timing
//! covers everything and its metrics land in the root context.

mod instrumented;
mod namespaced;
mod template;

use std::sync::Arc;

use skein_config::Params;
use skein_node::Node;

pub use instrumented::InstrumentedNode;
pub use namespaced::NamespacedNode;
pub use template::{TemplateError, TemplateNode};

/// Everything the wrappers of one node need to know.
pub struct ChainOptions {
  pub node_id: String,
  pub namespaced: bool,
  /// Params passed to the node without template resolution.
  pub raw_params: Vec<String>,
  /// Caller-supplied parameters of the run.
  pub invocation_params: Arc<Params>,
  /// Declared input defaults of the workflow.
  pub input_defaults: Arc<Params>,
}

/// Apply the wrapper chain to a node instance.
pub fn build_chain(node: Arc<dyn Node>, options: ChainOptions) -> Arc<dyn Node> {
  let ChainOptions {
    node_id,
    namespaced,
    raw_params,
    invocation_params,
    input_defaults,
  } = options;

  let mut chain: Arc<dyn Node> = Arc::new(TemplateNode::new(
    node,
    node_id.clone(),
    raw_params,
    invocation_params,
    input_defaults,
  ));
  if namespaced {
    chain = Arc::new(NamespacedNode::new(chain, node_id.clone()));
  }
  Arc::new(InstrumentedNode::new(chain, node_id))
}
