//! Node kinds shipped with the binary.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use skein_config::Params;
use skein_node::{InMemoryNodeRegistry, Node, NodeError, NodeKind};
use skein_store::{ReadStore, Store, is_reserved_key};

/// Writes its params to the context and returns its `action` param.
pub struct EchoNode;

#[async_trait]
impl Node for EchoNode {
  async fn prepare(&self, _store: &dyn ReadStore, params: &Params) -> Result<Value, NodeError> {
    Ok(Value::Object(params.clone()))
  }

  async fn finalize(
    &self,
    store: &mut dyn Store,
    prepared: Value,
    _executed: Value,
  ) -> Result<Option<String>, NodeError> {
    let Value::Object(params) = prepared else {
      return Ok(None);
    };

    let mut action = None;
    for (key, value) in params {
      match (key.as_str(), value) {
        ("action", Value::String(name)) => action = Some(name),
        ("action", other) => {
          return Err(NodeError::invalid_param(
            "action",
            format!("expected a string, got {other}"),
          ));
        }
        (key, _) if is_reserved_key(key) => {}
        (key, value) => store.set(key, value),
      }
    }
    Ok(action)
  }
}

/// Registry with every built-in kind.
pub fn registry() -> InMemoryNodeRegistry {
  let mut registry = InMemoryNodeRegistry::new();
  registry.register(
    NodeKind::new("echo").with_description("Writes its params to the context"),
    || -> Arc<dyn Node> { Arc::new(EchoNode) },
  );
  registry
}
