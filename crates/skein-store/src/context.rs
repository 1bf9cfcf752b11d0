use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::keys::STDIN_KEY;
use crate::store::{ReadStore, Store};

/// The root execution context of one run.
///
/// A flat string-keyed map of JSON values. With namespacing enabled, each
/// node's writes appear here as a nested map under the node's id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
  data: Map<String, Value>,
}

impl Context {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_map(data: Map<String, Value>) -> Self {
    Self { data }
  }

  /// Seed the reserved `stdin` key.
  pub fn with_stdin(mut self, stdin: Value) -> Self {
    self.data.insert(STDIN_KEY.to_string(), stdin);
    self
  }

  pub fn as_map(&self) -> &Map<String, Value> {
    &self.data
  }

  pub fn into_map(self) -> Map<String, Value> {
    self.data
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }
}

impl From<Map<String, Value>> for Context {
  fn from(data: Map<String, Value>) -> Self {
    Self::from_map(data)
  }
}

impl ReadStore for Context {
  fn get(&self, key: &str) -> Option<&Value> {
    self.data.get(key)
  }

  fn keys(&self) -> Vec<String> {
    let mut keys: Vec<String> = self.data.keys().cloned().collect();
    keys.sort();
    keys
  }

  fn snapshot(&self) -> Map<String, Value> {
    self.data.clone()
  }
}

impl Store for Context {
  fn set(&mut self, key: &str, value: Value) {
    self.data.insert(key.to_string(), value);
  }

  fn remove(&mut self, key: &str) -> Option<Value> {
    self.data.remove(key)
  }

  fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
    self.data.get_mut(key)
  }
}
