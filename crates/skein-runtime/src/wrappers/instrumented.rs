use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Value, json};
use skein_config::Params;
use skein_node::{Node, NodeError, Phase};
use skein_store::{METRICS_KEY, ReadStore, Store};
use tracing::debug;

/// Times a node and attributes its errors to the node and phase.
pub struct InstrumentedNode {
  inner: Arc<dyn Node>,
  node_id: String,
}

impl InstrumentedNode {
  pub fn new(inner: Arc<dyn Node>, node_id: impl Into<String>) -> Self {
    Self {
      inner,
      node_id: node_id.into(),
    }
  }

  fn attribute(&self, phase: Phase) -> impl FnOnce(NodeError) -> NodeError + '_ {
    move |source| NodeError::Phase {
      node_id: self.node_id.clone(),
      phase,
      source: Box::new(source),
    }
  }

  /// Fold one run into `__metrics__.nodes.<id>`.
  fn record(&self, store: &mut dyn Store, elapsed: Duration) {
    let elapsed_ms = elapsed.as_millis() as u64;

    let mut metrics = store
      .remove(METRICS_KEY)
      .filter(Value::is_object)
      .unwrap_or_else(|| json!({}));
    if !metrics["nodes"].is_object() {
      metrics["nodes"] = json!({});
    }

    let entry = &mut metrics["nodes"][self.node_id.as_str()];
    let runs = entry["runs"].as_u64().unwrap_or(0) + 1;
    let total_ms = entry["total_ms"].as_u64().unwrap_or(0) + elapsed_ms;
    *entry = json!({
      "runs": runs,
      "total_ms": total_ms,
      "last_ms": elapsed_ms,
    });

    store.set(METRICS_KEY, metrics);
  }
}

#[async_trait]
impl Node for InstrumentedNode {
  async fn prepare(&self, store: &dyn ReadStore, params: &Params) -> Result<Value, NodeError> {
    self
      .inner
      .prepare(store, params)
      .await
      .map_err(self.attribute(Phase::Prepare))
  }

  async fn execute(&self, prepared: Value) -> Result<Value, NodeError> {
    self
      .inner
      .execute(prepared)
      .await
      .map_err(self.attribute(Phase::Execute))
  }

  async fn finalize(
    &self,
    store: &mut dyn Store,
    prepared: Value,
    executed: Value,
  ) -> Result<Option<String>, NodeError> {
    self
      .inner
      .finalize(store, prepared, executed)
      .await
      .map_err(self.attribute(Phase::Finalize))
  }

  async fn run(&self, store: &mut dyn Store, params: &Params) -> Result<Option<String>, NodeError> {
    let started = Instant::now();

    let prepared = self.prepare(&*store, params).await?;
    let prepare_ms = started.elapsed().as_millis() as u64;

    let executed = self.execute(prepared.clone()).await?;
    let execute_ms = (started.elapsed().as_millis() as u64).saturating_sub(prepare_ms);

    let action = self.finalize(store, prepared, executed).await?;
    let elapsed = started.elapsed();

    self.record(store, elapsed);
    debug!(
      node_id = %self.node_id,
      prepare_ms,
      execute_ms,
      total_ms = elapsed.as_millis() as u64,
      "node_timed"
    );

    Ok(action)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use skein_store::Context;

  struct FailIn(Phase);

  #[async_trait]
  impl Node for FailIn {
    async fn prepare(&self, _store: &dyn ReadStore, _params: &Params) -> Result<Value, NodeError> {
      match self.0 {
        Phase::Prepare => Err(NodeError::failed("boom")),
        _ => Ok(Value::Null),
      }
    }

    async fn execute(&self, _prepared: Value) -> Result<Value, NodeError> {
      match self.0 {
        Phase::Execute => Err(NodeError::failed("boom")),
        _ => Ok(Value::Null),
      }
    }

    async fn finalize(
      &self,
      _store: &mut dyn Store,
      _prepared: Value,
      _executed: Value,
    ) -> Result<Option<String>, NodeError> {
      match self.0 {
        Phase::Finalize => Err(NodeError::failed("boom")),
        _ => Ok(Some("next".to_string())),
      }
    }
  }

  #[tokio::test]
  async fn test_errors_carry_node_and_phase() {
    for phase in [Phase::Prepare, Phase::Execute, Phase::Finalize] {
      let node = InstrumentedNode::new(Arc::new(FailIn(phase)), "worker");
      let err = node.run(&mut Context::new(), &Params::new()).await.unwrap_err();
      match err {
        NodeError::Phase {
          node_id,
          phase: failed_in,
          source,
        } => {
          assert_eq!(node_id, "worker");
          assert_eq!(failed_in, phase);
          assert_eq!(source.to_string(), "boom");
        }
        other => panic!("expected phase error, got {other:?}"),
      }
    }
  }

  struct Healthy;

  #[async_trait]
  impl Node for Healthy {}

  #[tokio::test]
  async fn test_records_metrics() {
    let node = InstrumentedNode::new(Arc::new(Healthy), "ok");
    let mut ctx = Context::new();

    node.run(&mut ctx, &Params::new()).await.unwrap();
    node.run(&mut ctx, &Params::new()).await.unwrap();

    let metrics = ctx.get(METRICS_KEY).unwrap();
    assert_eq!(metrics["nodes"]["ok"]["runs"], json!(2));
    assert!(metrics["nodes"]["ok"]["last_ms"].is_u64());
    assert!(metrics["nodes"]["ok"]["total_ms"].is_u64());
  }
}
