#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use skein_config::{Edge, NodeDef, Params, WorkflowDef};
use skein_node::{InMemoryNodeRegistry, Node, NodeError, NodeKind};
use skein_runtime::{Runtime, RuntimeConfig};
use skein_store::{FAMILY_KEY, MEMBER_KEY, NODE_TYPE_KEY, ReadStore, Store};

pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Test node driven entirely by its params.
///
/// - `label`: appended to the call log in finalize
/// - `write`: map of keys written to the store
/// - `remove`: keys removed from the store
/// - `action`: action returned every time
/// - `actions`: actions returned on successive runs, last one repeating
pub struct RecordingNode {
  log: CallLog,
  calls: Mutex<usize>,
}

impl RecordingNode {
  pub fn new(log: CallLog) -> Self {
    Self {
      log,
      calls: Mutex::new(0),
    }
  }
}

#[async_trait]
impl Node for RecordingNode {
  async fn prepare(&self, _store: &dyn ReadStore, params: &Params) -> Result<Value, NodeError> {
    Ok(Value::Object(params.clone()))
  }

  async fn execute(&self, prepared: Value) -> Result<Value, NodeError> {
    Ok(prepared)
  }

  async fn finalize(
    &self,
    store: &mut dyn Store,
    prepared: Value,
    _executed: Value,
  ) -> Result<Option<String>, NodeError> {
    if let Some(label) = prepared["label"].as_str() {
      self.log.lock().unwrap().push(label.to_string());
    }
    if let Some(remove) = prepared["remove"].as_array() {
      for key in remove.iter().filter_map(Value::as_str) {
        store.remove(key);
      }
    }
    if let Some(write) = prepared["write"].as_object() {
      for (key, value) in write {
        store.set(key, value.clone());
      }
    }

    let mut calls = self.calls.lock().unwrap();
    let call = *calls;
    *calls += 1;

    let action = match &prepared["actions"] {
      Value::Array(actions) => actions.get(call).or(actions.last()).and_then(Value::as_str),
      _ => prepared["action"].as_str(),
    };
    Ok(action.map(String::from))
  }
}

/// Fails in execute.
pub struct FailingNode;

#[async_trait]
impl Node for FailingNode {
  async fn execute(&self, _prepared: Value) -> Result<Value, NodeError> {
    Err(NodeError::failed("exploded"))
  }
}

/// Writes the family params it was compiled with.
pub struct FamilyNode;

#[async_trait]
impl Node for FamilyNode {
  async fn prepare(&self, _store: &dyn ReadStore, params: &Params) -> Result<Value, NodeError> {
    Ok(json!({
      "node_type": params.get(NODE_TYPE_KEY),
      "family": params.get(FAMILY_KEY),
      "member": params.get(MEMBER_KEY),
    }))
  }

  async fn finalize(
    &self,
    store: &mut dyn Store,
    prepared: Value,
    _executed: Value,
  ) -> Result<Option<String>, NodeError> {
    store.set("family_params", prepared);
    Ok(None)
  }
}

pub fn call_log() -> CallLog {
  Arc::new(Mutex::new(Vec::new()))
}

pub fn logged(log: &CallLog) -> Vec<String> {
  log.lock().unwrap().clone()
}

pub fn registry(log: &CallLog) -> InMemoryNodeRegistry {
  let mut registry = InMemoryNodeRegistry::new();
  let record_log = log.clone();
  let static_log = log.clone();
  registry
    .register(NodeKind::new("record"), move || -> Arc<dyn Node> {
      Arc::new(RecordingNode::new(record_log.clone()))
    })
    .register(
      NodeKind::new("static").with_outputs(["value"]),
      move || -> Arc<dyn Node> { Arc::new(RecordingNode::new(static_log.clone())) },
    )
    .register(NodeKind::new("fail"), || -> Arc<dyn Node> {
      Arc::new(FailingNode)
    })
    .register_family("tool", NodeKind::new("tool"), || -> Arc<dyn Node> {
      Arc::new(FamilyNode)
    });
  registry
}

pub fn runtime(log: &CallLog) -> Runtime {
  Runtime::new(Arc::new(registry(log)), RuntimeConfig::default())
}

pub fn record(id: &str) -> NodeDef {
  NodeDef::new(id, "record").with_param("label", json!(id))
}

pub fn params(value: Value) -> Params {
  value.as_object().cloned().unwrap_or_default()
}

pub fn linear(nodes: Vec<NodeDef>) -> WorkflowDef {
  let edges = nodes
    .windows(2)
    .map(|pair| Edge::new(pair[0].id.clone(), pair[1].id.clone()))
    .collect();
  WorkflowDef::new(nodes, edges)
}
