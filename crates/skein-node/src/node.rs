use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use skein_config::Params;
use skein_store::{ReadStore, Store};

use crate::error::NodeError;

/// The lifecycle phase a node is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Prepare,
  Execute,
  Finalize,
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Phase::Prepare => write!(f, "prepare"),
      Phase::Execute => write!(f, "execute"),
      Phase::Finalize => write!(f, "finalize"),
    }
  }
}

/// A unit of work in a workflow graph.
///
/// Implementations must not assume anything about the store they are handed:
/// it may be the root context or a namespace proxy over it.
#[async_trait]
pub trait Node: Send + Sync {
  /// Read what the node needs from the context and its params.
  async fn prepare(&self, store: &dyn ReadStore, params: &Params) -> Result<Value, NodeError> {
    let _ = (store, params);
    Ok(Value::Null)
  }

  /// Do the work. Has no access to the context.
  async fn execute(&self, prepared: Value) -> Result<Value, NodeError> {
    let _ = prepared;
    Ok(Value::Null)
  }

  /// Write results and choose the next action. `None` means `"default"`.
  async fn finalize(
    &self,
    store: &mut dyn Store,
    prepared: Value,
    executed: Value,
  ) -> Result<Option<String>, NodeError> {
    let _ = (store, prepared, executed);
    Ok(None)
  }

  /// Run all three phases in order.
  async fn run(&self, store: &mut dyn Store, params: &Params) -> Result<Option<String>, NodeError> {
    let prepared = self.prepare(&*store, params).await?;
    let executed = self.execute(prepared.clone()).await?;
    self.finalize(store, prepared, executed).await
  }
}
