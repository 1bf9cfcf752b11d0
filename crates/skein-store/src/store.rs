use serde_json::{Map, Value};

/// Read access to an execution context.
///
/// This is all a node sees during its prepare phase.
pub trait ReadStore: Send + Sync {
  /// Get a value by key.
  fn get(&self, key: &str) -> Option<&Value>;

  /// All visible keys, sorted and deduplicated.
  fn keys(&self) -> Vec<String>;

  fn contains_key(&self, key: &str) -> bool {
    self.get(key).is_some()
  }

  /// Copy of every visible entry.
  fn snapshot(&self) -> Map<String, Value> {
    self
      .keys()
      .into_iter()
      .filter_map(|key| self.get(&key).cloned().map(|value| (key, value)))
      .collect()
  }
}

/// Read-write access to an execution context.
///
/// Only the finalize phase of a node receives one.
pub trait Store: ReadStore {
  /// Set a value, replacing any previous one.
  fn set(&mut self, key: &str, value: Value);

  /// Remove a value, returning it.
  fn remove(&mut self, key: &str) -> Option<Value>;

  /// Mutable access to a value that writes would land on.
  fn get_mut(&mut self, key: &str) -> Option<&mut Value>;
}

/// Append `value` to the array stored at `key`.
///
/// A missing key or a non-array value is replaced by a one-element array.
pub fn append(store: &mut dyn Store, key: &str, value: Value) {
  if let Some(Value::Array(items)) = store.get_mut(key) {
    items.push(value);
    return;
  }
  store.set(key, Value::Array(vec![value]));
}
