use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};
use skein_store::ReadStore;

use crate::path::{Segment, parse_path, walk};

fn template_re() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("template pattern is valid"))
}

fn single_re() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"^\$\{([^}]+)\}$").expect("single reference pattern is valid"))
}

/// Source of root values for reference resolution.
pub trait Lookup {
  fn lookup(&self, name: &str) -> Option<&Value>;
}

/// Root-name lookup in resolution order: invocation params, then the
/// execution context, then declared input defaults.
pub struct Scope<'a> {
  params: Option<&'a Map<String, Value>>,
  store: &'a dyn ReadStore,
  defaults: Option<&'a Map<String, Value>>,
}

impl<'a> Scope<'a> {
  pub fn new(store: &'a dyn ReadStore) -> Self {
    Self {
      params: None,
      store,
      defaults: None,
    }
  }

  pub fn with_params(mut self, params: &'a Map<String, Value>) -> Self {
    self.params = Some(params);
    self
  }

  pub fn with_defaults(mut self, defaults: &'a Map<String, Value>) -> Self {
    self.defaults = Some(defaults);
    self
  }
}

impl Lookup for Scope<'_> {
  fn lookup(&self, name: &str) -> Option<&Value> {
    self
      .params
      .and_then(|params| params.get(name))
      .or_else(|| self.store.get(name))
      .or_else(|| self.defaults.and_then(|defaults| defaults.get(name)))
  }
}

/// Outcome of resolving a value.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
  pub value: Value,
  /// Reference expressions that did not resolve, in order of appearance.
  pub unresolved: Vec<String>,
}

impl Resolved {
  pub fn is_complete(&self) -> bool {
    self.unresolved.is_empty()
  }
}

fn resolve_expr(expr: &str, scope: &dyn Lookup) -> Option<Value> {
  let segments = parse_path(expr)?;
  let (root, tail) = segments.split_first()?;
  let Segment::Key(root) = root else {
    return None;
  };
  walk(scope.lookup(root)?, tail)
}

/// Render a value for embedding in surrounding text.
///
/// Strings are inserted verbatim; everything else uses its compact JSON form.
pub fn value_to_string(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

/// Resolve a single template string.
pub fn resolve_str(template: &str, scope: &dyn Lookup) -> Resolved {
  if let Some(caps) = single_re().captures(template) {
    let expr = caps[1].trim();
    return match resolve_expr(expr, scope) {
      Some(value) => Resolved {
        value,
        unresolved: Vec::new(),
      },
      None => Resolved {
        value: Value::String(template.to_string()),
        unresolved: vec![expr.to_string()],
      },
    };
  }

  let mut unresolved = Vec::new();
  let rendered = template_re().replace_all(template, |caps: &Captures<'_>| {
    let expr = caps[1].trim();
    match resolve_expr(expr, scope) {
      Some(value) => value_to_string(&value),
      None => {
        unresolved.push(expr.to_string());
        caps[0].to_string()
      }
    }
  });

  Resolved {
    value: Value::String(rendered.into_owned()),
    unresolved,
  }
}

/// Resolve every template string inside `value`, recursing through maps and
/// arrays. Non-string leaves pass through unchanged.
pub fn resolve_value(value: &Value, scope: &dyn Lookup) -> Resolved {
  match value {
    Value::String(s) => resolve_str(s, scope),
    Value::Array(items) => {
      let mut unresolved = Vec::new();
      let items = items
        .iter()
        .map(|item| {
          let resolved = resolve_value(item, scope);
          unresolved.extend(resolved.unresolved);
          resolved.value
        })
        .collect();
      Resolved {
        value: Value::Array(items),
        unresolved,
      }
    }
    Value::Object(map) => {
      let mut unresolved = Vec::new();
      let map = map
        .iter()
        .map(|(key, item)| {
          let resolved = resolve_value(item, scope);
          unresolved.extend(resolved.unresolved);
          (key.clone(), resolved.value)
        })
        .collect();
      Resolved {
        value: Value::Object(map),
        unresolved,
      }
    }
    other => Resolved {
      value: other.clone(),
      unresolved: Vec::new(),
    },
  }
}

/// Whether `value` contains any `${...}` reference.
pub fn has_templates(value: &Value) -> bool {
  match value {
    Value::String(s) => template_re().is_match(s),
    Value::Array(items) => items.iter().any(has_templates),
    Value::Object(map) => map.values().any(has_templates),
    _ => false,
  }
}

/// All reference expressions inside `value`, in order of appearance.
pub fn extract_references(value: &Value) -> Vec<String> {
  let mut refs = Vec::new();
  collect_references(value, &mut refs);
  refs
}

fn collect_references(value: &Value, refs: &mut Vec<String>) {
  match value {
    Value::String(s) => refs.extend(
      template_re()
        .captures_iter(s)
        .map(|caps| caps[1].trim().to_string()),
    ),
    Value::Array(items) => items.iter().for_each(|item| collect_references(item, refs)),
    Value::Object(map) => map.values().for_each(|item| collect_references(item, refs)),
    _ => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use skein_store::{Context, Store};

  fn context() -> Context {
    let mut ctx = Context::new();
    ctx.set("count", json!(3));
    ctx.set("flag", json!(true));
    ctx.set("user", json!({ "name": "ada", "tags": ["x", "y"] }));
    ctx.set("fetch-data", json!({ "items": [{ "title": "first" }] }));
    ctx.set("nothing", Value::Null);
    ctx
  }

  #[test]
  fn test_single_reference_preserves_type() {
    let ctx = context();
    let scope = Scope::new(&ctx);

    assert_eq!(resolve_str("${count}", &scope).value, json!(3));
    assert_eq!(resolve_str("${flag}", &scope).value, json!(true));
    assert_eq!(resolve_str("${user.tags}", &scope).value, json!(["x", "y"]));
    assert_eq!(resolve_str("${user}", &scope).value["name"], json!("ada"));
    assert_eq!(resolve_str("${nothing}", &scope).value, Value::Null);
    assert_eq!(
      resolve_str("${fetch-data.items[0].title}", &scope).value,
      json!("first")
    );
  }

  #[test]
  fn test_embedded_references_produce_strings() {
    let ctx = context();
    let scope = Scope::new(&ctx);

    let resolved = resolve_str("n=${count} ok=${flag} tags=${user.tags} v=${nothing}", &scope);
    assert!(resolved.is_complete());
    assert_eq!(
      resolved.value,
      json!("n=3 ok=true tags=[\"x\",\"y\"] v=null")
    );

    assert_eq!(resolve_str(" ${count}", &scope).value, json!(" 3"));
    assert_eq!(resolve_str("${count}${count}", &scope).value, json!("33"));
  }

  #[test]
  fn test_unresolved_leaves_text_in_place() {
    let ctx = context();
    let scope = Scope::new(&ctx);

    let resolved = resolve_str("${missing.key}", &scope);
    assert_eq!(resolved.value, json!("${missing.key}"));
    assert_eq!(resolved.unresolved, vec!["missing.key"]);

    let resolved = resolve_str("Hello ${user.name}, ${user.tags[5]}", &scope);
    assert_eq!(resolved.value, json!("Hello ada, ${user.tags[5]}"));
    assert_eq!(resolved.unresolved, vec!["user.tags[5]"]);
  }

  #[test]
  fn test_lookup_order() {
    let mut ctx = Context::new();
    ctx.set("a", json!("context"));
    ctx.set("b", json!("context"));
    let params = json!({ "a": "param" }).as_object().cloned().unwrap();
    let defaults = json!({ "a": "default", "b": "default", "c": "default" })
      .as_object()
      .cloned()
      .unwrap();
    let scope = Scope::new(&ctx)
      .with_params(&params)
      .with_defaults(&defaults);

    assert_eq!(resolve_str("${a}", &scope).value, json!("param"));
    assert_eq!(resolve_str("${b}", &scope).value, json!("context"));
    assert_eq!(resolve_str("${c}", &scope).value, json!("default"));
  }

  #[test]
  fn test_resolve_nested_value() {
    let ctx = context();
    let scope = Scope::new(&ctx);
    let params = json!({
      "limit": "${count}",
      "static": 10,
      "headers": { "x-user": "${user.name}" },
      "list": ["${flag}", "id-${count}", "${gone}"]
    });

    let resolved = resolve_value(&params, &scope);
    assert_eq!(
      resolved.value,
      json!({
        "limit": 3,
        "static": 10,
        "headers": { "x-user": "ada" },
        "list": [true, "id-3", "${gone}"]
      })
    );
    assert_eq!(resolved.unresolved, vec!["gone"]);
  }

  #[test]
  fn test_non_templates_pass_through() {
    let ctx = context();
    let scope = Scope::new(&ctx);
    assert_eq!(resolve_str("plain $text {x}", &scope).value, json!("plain $text {x}"));
    assert_eq!(resolve_value(&json!(1.5), &scope).value, json!(1.5));
    assert!(!has_templates(&json!({ "a": ["b", 1] })));
    assert!(has_templates(&json!({ "a": ["${b}"] })));
  }

  #[test]
  fn test_extract_references() {
    let refs = extract_references(&json!({
      "prompt": "Summarize ${fetch.body} for ${ user }",
      "nested": [{ "x": "${stdin}" }]
    }));
    assert_eq!(refs.len(), 3);
    assert!(refs.contains(&"fetch.body".to_string()));
    assert!(refs.contains(&"user".to_string()));
    assert!(refs.contains(&"stdin".to_string()));
  }
}
