use serde_json::Value;
use skein_config::{Params, WorkflowDef};
use skein_store::{Context, ReadStore};
use skein_template::{Scope, resolve_str};
use tracing::{debug, warn};

/// Keys checked, in order, when a workflow declares no outputs.
pub const CONVENTIONAL_OUTPUT_KEYS: [&str; 4] = ["response", "output", "result", "text"];

fn conventional(scope: &serde_json::Map<String, Value>) -> Option<(String, Value)> {
  CONVENTIONAL_OUTPUT_KEYS
    .iter()
    .find_map(|key| scope.get(*key).map(|value| (key.to_string(), value.clone())))
}

/// Extract the outputs of a finished run.
///
/// In priority order:
/// 1. declared outputs, resolved against params, context and input defaults
/// 2. the first conventional key found in the root context
/// 3. the first conventional key found in the last node's namespace
pub fn extract_outputs(
  def: &WorkflowDef,
  ctx: &Context,
  params: &Params,
  last_node: Option<&str>,
) -> Params {
  if !def.outputs.is_empty() {
    let defaults = def.input_defaults();
    let scope = Scope::new(ctx).with_params(params).with_defaults(&defaults);

    let mut outputs = Params::new();
    for (name, output) in &def.outputs {
      let resolved = resolve_str(&output.template(name), &scope);
      if resolved.is_complete() {
        outputs.insert(name.clone(), resolved.value);
      } else {
        warn!(
          output = %name,
          unresolved = ?resolved.unresolved,
          "output_unresolved"
        );
      }
    }
    return outputs;
  }

  let found = conventional(ctx.as_map()).or_else(|| {
    last_node
      .and_then(|node_id| ctx.get(node_id))
      .and_then(Value::as_object)
      .and_then(conventional)
  });

  match found {
    Some((key, value)) => {
      debug!(key = %key, "conventional_output_found");
      Params::from_iter([(key, value)])
    }
    None => Params::new(),
  }
}
