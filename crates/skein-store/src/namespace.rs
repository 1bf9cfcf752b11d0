use std::collections::BTreeSet;

use serde_json::{Map, Value};
use tracing::warn;

use crate::keys::is_reserved_key;
use crate::store::{ReadStore, Store};

fn namespaced_get<'s>(root: &'s dyn ReadStore, namespace: &str, key: &str) -> Option<&'s Value> {
  if is_reserved_key(key) {
    return root.get(key);
  }
  root
    .get(namespace)
    .and_then(Value::as_object)
    .and_then(|scope| scope.get(key))
    .or_else(|| root.get(key))
}

fn namespaced_keys(root: &dyn ReadStore, namespace: &str) -> Vec<String> {
  let mut keys: BTreeSet<String> = root.keys().into_iter().collect();
  if let Some(scope) = root.get(namespace).and_then(Value::as_object) {
    keys.extend(scope.keys().cloned());
  }
  keys.into_iter().collect()
}

/// Read-only namespace view over a context.
///
/// Reads check `root[namespace][key]` first and fall back to `root[key]`.
/// Reserved keys are always read from the root.
pub struct NamespacedView<'a> {
  root: &'a dyn ReadStore,
  namespace: String,
}

impl<'a> NamespacedView<'a> {
  pub fn new(root: &'a dyn ReadStore, namespace: impl Into<String>) -> Self {
    Self {
      root,
      namespace: namespace.into(),
    }
  }
}

impl ReadStore for NamespacedView<'_> {
  fn get(&self, key: &str) -> Option<&Value> {
    namespaced_get(self.root, &self.namespace, key)
  }

  fn keys(&self) -> Vec<String> {
    namespaced_keys(self.root, &self.namespace)
  }
}

/// Read-write namespace proxy over a context.
///
/// Writes of ordinary keys land in `root[namespace][key]`; reserved keys are
/// written straight to the root. The namespace map is created on first write.
pub struct NamespacedStore<'a> {
  root: &'a mut dyn Store,
  namespace: String,
}

impl<'a> NamespacedStore<'a> {
  pub fn new(root: &'a mut dyn Store, namespace: impl Into<String>) -> Self {
    Self {
      root,
      namespace: namespace.into(),
    }
  }

  fn take_scope(&mut self) -> Map<String, Value> {
    match self.root.remove(&self.namespace) {
      Some(Value::Object(scope)) => scope,
      Some(other) => {
        warn!(
          namespace = %self.namespace,
          replaced = %other,
          "namespace_shadowed_value_replaced"
        );
        Map::new()
      }
      None => Map::new(),
    }
  }
}

impl ReadStore for NamespacedStore<'_> {
  fn get(&self, key: &str) -> Option<&Value> {
    namespaced_get(&*self.root, &self.namespace, key)
  }

  fn keys(&self) -> Vec<String> {
    namespaced_keys(&*self.root, &self.namespace)
  }
}

impl Store for NamespacedStore<'_> {
  fn set(&mut self, key: &str, value: Value) {
    if is_reserved_key(key) {
      self.root.set(key, value);
      return;
    }
    let mut scope = self.take_scope();
    scope.insert(key.to_string(), value);
    self.root.set(&self.namespace, Value::Object(scope));
  }

  fn remove(&mut self, key: &str) -> Option<Value> {
    if is_reserved_key(key) {
      return self.root.remove(key);
    }
    self
      .root
      .get_mut(&self.namespace)?
      .as_object_mut()?
      .remove(key)
  }

  fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
    if is_reserved_key(key) {
      return self.root.get_mut(key);
    }
    self
      .root
      .get_mut(&self.namespace)?
      .as_object_mut()?
      .get_mut(key)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::Context;
  use crate::keys::TEMPLATE_ERRORS_KEY;
  use crate::store::append;
  use serde_json::json;

  #[test]
  fn test_writes_land_in_namespace() {
    let mut ctx = Context::new();
    {
      let mut proxy = NamespacedStore::new(&mut ctx, "fetch");
      proxy.set("response", json!("hello"));
      assert_eq!(proxy.get("response"), Some(&json!("hello")));
    }

    assert_eq!(ctx.get("response"), None);
    assert_eq!(ctx.get("fetch"), Some(&json!({ "response": "hello" })));
  }

  #[test]
  fn test_reserved_keys_bypass_namespace() {
    let mut ctx = Context::new();
    {
      let mut proxy = NamespacedStore::new(&mut ctx, "fetch");
      append(&mut proxy, TEMPLATE_ERRORS_KEY, json!({ "reference": "missing" }));
    }

    assert_eq!(
      ctx.get(TEMPLATE_ERRORS_KEY),
      Some(&json!([{ "reference": "missing" }]))
    );
    assert_eq!(ctx.get("fetch"), None);
  }

  #[test]
  fn test_reads_fall_back_to_root() {
    let mut ctx = Context::new().with_stdin(json!("input"));
    ctx.set("shared", json!("root"));
    ctx.set("node", json!({ "shared": "own" }));

    let view = NamespacedView::new(&ctx, "node");
    assert_eq!(view.get("shared"), Some(&json!("own")));
    assert_eq!(view.get("stdin"), Some(&json!("input")));
    assert_eq!(view.get("missing"), None);

    let other = NamespacedView::new(&ctx, "other");
    assert_eq!(other.get("shared"), Some(&json!("root")));
  }

  #[test]
  fn test_two_nodes_do_not_collide() {
    let mut ctx = Context::new();
    NamespacedStore::new(&mut ctx, "a").set("output", json!(1));
    NamespacedStore::new(&mut ctx, "b").set("output", json!(2));

    assert_eq!(ctx.get("a"), Some(&json!({ "output": 1 })));
    assert_eq!(ctx.get("b"), Some(&json!({ "output": 2 })));
    assert_eq!(ctx.get("output"), None);
  }

  #[test]
  fn test_keys_are_union() {
    let mut ctx = Context::new();
    ctx.set("top", json!(true));
    NamespacedStore::new(&mut ctx, "n").set("inner", json!(true));

    let view = NamespacedView::new(&ctx, "n");
    assert_eq!(view.keys(), vec!["inner", "n", "top"]);
  }

  #[test]
  fn test_remove_follows_write_rule() {
    let mut ctx = Context::new();
    ctx.set("value", json!("root"));
    let mut proxy = NamespacedStore::new(&mut ctx, "n");
    proxy.set("value", json!("own"));

    assert_eq!(proxy.remove("value"), Some(json!("own")));
    assert_eq!(proxy.get("value"), Some(&json!("root")));
    assert_eq!(proxy.remove("value"), None);
  }

  #[test]
  fn test_non_object_namespace_value_is_replaced() {
    let mut ctx = Context::new();
    ctx.set("n", json!("scalar"));
    NamespacedStore::new(&mut ctx, "n").set("k", json!(1));
    assert_eq!(ctx.get("n"), Some(&json!({ "k": 1 })));
  }
}
