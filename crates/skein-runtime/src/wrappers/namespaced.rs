use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use skein_config::Params;
use skein_node::{Node, NodeError};
use skein_store::{NamespacedStore, NamespacedView, ReadStore, Store};

/// Routes a node's context access through its own namespace.
pub struct NamespacedNode {
  inner: Arc<dyn Node>,
  namespace: String,
}

impl NamespacedNode {
  pub fn new(inner: Arc<dyn Node>, namespace: impl Into<String>) -> Self {
    Self {
      inner,
      namespace: namespace.into(),
    }
  }
}

#[async_trait]
impl Node for NamespacedNode {
  async fn prepare(&self, store: &dyn ReadStore, params: &Params) -> Result<Value, NodeError> {
    let view = NamespacedView::new(store, self.namespace.as_str());
    self.inner.prepare(&view, params).await
  }

  async fn execute(&self, prepared: Value) -> Result<Value, NodeError> {
    self.inner.execute(prepared).await
  }

  async fn finalize(
    &self,
    store: &mut dyn Store,
    prepared: Value,
    executed: Value,
  ) -> Result<Option<String>, NodeError> {
    let mut proxy = NamespacedStore::new(store, self.namespace.as_str());
    self.inner.finalize(&mut proxy, prepared, executed).await
  }
}
