use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use skein_config::Params;
use skein_node::{Node, NodeError};
use skein_store::{ReadStore, Store, TEMPLATE_ERRORS_KEY, append, is_reserved_key};
use skein_template::{Scope, resolve_value, value_to_string};
use tracing::warn;

/// A template reference that did not resolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateError {
  pub node_id: String,
  pub param: String,
  pub template: String,
  pub reference: String,
}

/// Prepared data of the wrapped node plus what resolution left unresolved.
///
/// Recording has to wait for finalize, the first phase with write access.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
  prepared: Value,
  template_errors: Vec<TemplateError>,
}

impl Envelope {
  fn open(value: Value) -> Result<Self, NodeError> {
    Ok(serde_json::from_value(value)?)
  }
}

/// Attach unresolved references to a failure so they survive without a
/// finalize phase to record them.
fn with_unresolved(errors: &[TemplateError]) -> impl FnOnce(NodeError) -> NodeError + '_ {
  move |source| {
    if errors.is_empty() {
      return source;
    }
    NodeError::Unresolved {
      references: errors.iter().map(|e| e.reference.clone()).collect(),
      source: Box::new(source),
    }
  }
}

/// Resolves `${...}` references in a node's params before it sees them.
pub struct TemplateNode {
  inner: Arc<dyn Node>,
  node_id: String,
  raw_params: Vec<String>,
  invocation_params: Arc<Params>,
  input_defaults: Arc<Params>,
}

impl TemplateNode {
  pub fn new(
    inner: Arc<dyn Node>,
    node_id: impl Into<String>,
    raw_params: Vec<String>,
    invocation_params: Arc<Params>,
    input_defaults: Arc<Params>,
  ) -> Self {
    Self {
      inner,
      node_id: node_id.into(),
      raw_params,
      invocation_params,
      input_defaults,
    }
  }

  fn is_raw(&self, param: &str) -> bool {
    is_reserved_key(param) || self.raw_params.iter().any(|p| p == param)
  }

  fn resolve_params(&self, store: &dyn ReadStore, params: &Params) -> (Params, Vec<TemplateError>) {
    let scope = Scope::new(store)
      .with_params(&self.invocation_params)
      .with_defaults(&self.input_defaults);

    let mut errors = Vec::new();
    let mut resolved = Params::new();
    for (name, value) in params {
      if self.is_raw(name) {
        resolved.insert(name.clone(), value.clone());
        continue;
      }

      let outcome = resolve_value(value, &scope);
      for reference in outcome.unresolved {
        warn!(
          node_id = %self.node_id,
          param = %name,
          reference = %reference,
          "template_unresolved"
        );
        errors.push(TemplateError {
          node_id: self.node_id.clone(),
          param: name.clone(),
          template: value_to_string(value),
          reference,
        });
      }
      resolved.insert(name.clone(), outcome.value);
    }

    (resolved, errors)
  }
}

#[async_trait]
impl Node for TemplateNode {
  async fn prepare(&self, store: &dyn ReadStore, params: &Params) -> Result<Value, NodeError> {
    let (resolved, template_errors) = self.resolve_params(store, params);
    let prepared = self
      .inner
      .prepare(store, &resolved)
      .await
      .map_err(with_unresolved(&template_errors))?;
    Ok(serde_json::to_value(Envelope {
      prepared,
      template_errors,
    })?)
  }

  async fn execute(&self, prepared: Value) -> Result<Value, NodeError> {
    let envelope = Envelope::open(prepared)?;
    self
      .inner
      .execute(envelope.prepared)
      .await
      .map_err(with_unresolved(&envelope.template_errors))
  }

  async fn finalize(
    &self,
    store: &mut dyn Store,
    prepared: Value,
    executed: Value,
  ) -> Result<Option<String>, NodeError> {
    let envelope = Envelope::open(prepared)?;
    for error in envelope.template_errors {
      append(store, TEMPLATE_ERRORS_KEY, serde_json::to_value(error)?);
    }
    self.inner.finalize(store, envelope.prepared, executed).await
  }
}
