//! Declared workflow inputs and outputs, and the params map shared by nodes.
//!
//! Param values are arbitrary JSON. Any string inside them (at any depth) may
//! carry `${...}` template references which are resolved at runtime against the
//! execution context:
//!
//! ```json
//! {
//!   "path": "${file_path}",
//!   "first": "${fetch.items[0]}",
//!   "message": "Found ${fetch.total} results",
//!   "headers": { "x-user": "${user.id}" }
//! }
//! ```
//!
//! A string that is exactly one reference resolves to the referenced value with
//! its type preserved; anything else resolves to a string.

use serde::{Deserialize, Serialize};

/// Node params and invocation params: string keys, arbitrary JSON values.
pub type Params = serde_json::Map<String, serde_json::Value>;

fn default_value_type() -> String {
  "any".to_string()
}

fn default_required() -> bool {
  true
}

/// A declared workflow input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDef {
  #[serde(rename = "type", default = "default_value_type")]
  pub value_type: String,
  #[serde(default = "default_required")]
  pub required: bool,
  /// Used when the caller does not supply the input; last in lookup order.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default: Option<serde_json::Value>,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub description: String,
}

impl Default for InputDef {
  fn default() -> Self {
    Self {
      value_type: default_value_type(),
      required: default_required(),
      default: None,
      description: String::new(),
    }
  }
}

impl InputDef {
  /// An input the caller must supply.
  pub fn required() -> Self {
    Self::default()
  }

  /// An optional input falling back to `default`.
  pub fn optional(default: serde_json::Value) -> Self {
    Self {
      required: false,
      default: Some(default),
      ..Self::default()
    }
  }

  /// Whether a run without this input must be rejected.
  pub fn is_mandatory(&self) -> bool {
    self.required && self.default.is_none()
  }
}

/// A declared workflow output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDef {
  #[serde(rename = "type", default = "default_value_type")]
  pub value_type: String,
  /// Template resolved against the final context. When absent, the output is
  /// read from the context key with the output's own name.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub source: Option<String>,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub description: String,
}

impl OutputDef {
  pub fn from_source(source: impl Into<String>) -> Self {
    Self {
      value_type: default_value_type(),
      source: Some(source.into()),
      description: String::new(),
    }
  }

  /// The template this output resolves, given its declared name.
  pub fn template(&self, name: &str) -> String {
    match &self.source {
      Some(source) => source.clone(),
      None => format!("${{{}}}", name),
    }
  }
}
