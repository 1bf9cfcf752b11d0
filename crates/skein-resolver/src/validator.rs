use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use skein_config::{NodeDef, WorkflowDef};
use skein_node::{NodeKind, NodeRegistry, WORKFLOW_NODE_TYPE, workflow_kind};
use skein_store::{STDIN_KEY, is_reserved_key};
use skein_template::{extract_references, root_name};
use skein_workflow::{Graph, Workflow};
use tracing::debug;

use crate::error::{ValidationError, Violation};

/// Validates workflow descriptions against a node-kind registry.
///
/// Validation never mutates the description, so it is idempotent.
#[derive(Clone)]
pub struct Validator {
  registry: Arc<dyn NodeRegistry>,
}

impl Validator {
  pub fn new(registry: Arc<dyn NodeRegistry>) -> Self {
    Self { registry }
  }

  /// Validate a description, producing the workflow the compiler consumes.
  pub fn validate(&self, def: &WorkflowDef) -> Result<Workflow, ValidationError> {
    let (violations, entry) = self.check(def);
    match entry {
      Some(entry) if violations.is_empty() => {
        debug!(
          workflow = %def.display_name(),
          entry_node = %entry,
          nodes = def.nodes.len(),
          "workflow_validated"
        );
        Ok(Workflow::new(def.clone(), entry))
      }
      _ => Err(ValidationError { violations }),
    }
  }

  /// Every violation in the description, in check order.
  pub fn violations(&self, def: &WorkflowDef) -> Vec<Violation> {
    self.check(def).0
  }

  fn check(&self, def: &WorkflowDef) -> (Vec<Violation>, Option<String>) {
    let mut violations = Vec::new();

    if def.nodes.is_empty() {
      violations.push(Violation::EmptyWorkflow);
      return (violations, None);
    }

    let node_ids = self.validate_node_ids(def, &mut violations);
    self.validate_edges(def, &node_ids, &mut violations);
    let entry = self.select_entry(def, &node_ids, &mut violations);
    if let Some(entry) = &entry {
      self.validate_reachability(def, entry, &mut violations);
    }
    self.validate_actions(def, &mut violations);

    let kinds: HashMap<&str, Option<NodeKind>> = def
      .nodes
      .iter()
      .map(|node| (node.id.as_str(), self.kind_of(&node.node_type)))
      .collect();

    self.validate_references(def, &node_ids, &kinds, &mut violations);
    self.validate_types(def, &kinds, &mut violations);

    (violations, entry)
  }

  fn kind_of(&self, node_type: &str) -> Option<NodeKind> {
    if node_type == WORKFLOW_NODE_TYPE {
      return Some(workflow_kind());
    }
    self.registry.lookup(node_type).map(|resolved| resolved.kind)
  }

  fn validate_node_ids<'a>(
    &self,
    def: &'a WorkflowDef,
    violations: &mut Vec<Violation>,
  ) -> HashSet<&'a str> {
    let mut seen = HashSet::new();
    for node in &def.nodes {
      if !seen.insert(node.id.as_str()) {
        violations.push(Violation::DuplicateNodeId {
          node_id: node.id.clone(),
        });
      }
    }
    seen
  }

  /// Validate that all edges reference existing nodes.
  fn validate_edges(
    &self,
    def: &WorkflowDef,
    node_ids: &HashSet<&str>,
    violations: &mut Vec<Violation>,
  ) {
    for edge in &def.edges {
      for endpoint in [&edge.from, &edge.to] {
        if !node_ids.contains(endpoint.as_str()) {
          violations.push(Violation::UnknownEdgeNode {
            from: edge.from.clone(),
            to: edge.to.clone(),
            node_id: endpoint.clone(),
          });
        }
      }
    }
  }

  fn select_entry(
    &self,
    def: &WorkflowDef,
    node_ids: &HashSet<&str>,
    violations: &mut Vec<Violation>,
  ) -> Option<String> {
    if let Some(start) = &def.start_node {
      if node_ids.contains(start.as_str()) {
        return Some(start.clone());
      }
      violations.push(Violation::UnknownStartNode {
        node_id: start.clone(),
      });
      return None;
    }

    let mut candidates = Graph::new(&def.nodes, &def.edges).entry_candidates();
    match candidates.len() {
      1 => candidates.pop(),
      0 => {
        violations.push(Violation::NoEntryNode);
        None
      }
      _ => {
        violations.push(Violation::MultipleEntryNodes {
          node_ids: candidates,
        });
        None
      }
    }
  }

  fn validate_reachability(
    &self,
    def: &WorkflowDef,
    entry: &str,
    violations: &mut Vec<Violation>,
  ) {
    let reached = Graph::new(&def.nodes, &def.edges).reachable_from(entry);
    let mut reported = HashSet::new();
    for node in &def.nodes {
      if !reached.contains(&node.id) && reported.insert(node.id.as_str()) {
        violations.push(Violation::UnreachableNode {
          node_id: node.id.clone(),
        });
      }
    }
  }

  fn validate_actions(&self, def: &WorkflowDef, violations: &mut Vec<Violation>) {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for edge in &def.edges {
      let key = (edge.from.as_str(), edge.action.as_str());
      if !seen.insert(key) && reported.insert(key) {
        violations.push(Violation::DuplicateAction {
          node_id: edge.from.clone(),
          action: edge.action.clone(),
        });
      }
    }
  }

  /// Check that every reference's root name is something the context can hold
  /// when the node runs. Skipped for flat graphs where some kind writes keys
  /// that cannot be known statically; with namespacing those writes stay under
  /// node ids, so every root can still be judged.
  fn validate_references(
    &self,
    def: &WorkflowDef,
    node_ids: &HashSet<&str>,
    kinds: &HashMap<&str, Option<NodeKind>>,
    violations: &mut Vec<Violation>,
  ) {
    let dynamic = kinds
      .values()
      .any(|kind| kind.as_ref().is_some_and(|kind| kind.outputs.is_none()));
    if dynamic && !def.enable_namespacing {
      debug!(workflow = %def.display_name(), "reference_check_skipped");
      return;
    }

    let mut roots: HashSet<&str> = node_ids.clone();
    roots.insert(STDIN_KEY);
    roots.extend(def.inputs.keys().map(String::as_str));
    for node in &def.nodes {
      if let Some(Some(kind)) = kinds.get(node.id.as_str()) {
        roots.extend(kind.outputs.iter().flatten().map(String::as_str));
      }
      if node.node_type == WORKFLOW_NODE_TYPE {
        roots.extend(mapped_output_keys(node));
      }
    }

    let is_known = |reference: &str| match root_name(reference) {
      Some(root) => is_reserved_key(&root) || roots.contains(root.as_str()),
      None => false,
    };

    for node in &def.nodes {
      let kind = kinds.get(node.id.as_str()).and_then(Option::as_ref);
      for (param, value) in &node.params {
        if is_reserved_key(param) || kind.is_some_and(|kind| kind.is_raw_param(param)) {
          continue;
        }
        for reference in extract_references(value) {
          if !is_known(&reference) {
            violations.push(Violation::UnresolvedReference {
              node_id: node.id.clone(),
              param: param.clone(),
              reference,
            });
          }
        }
      }
    }

    for (name, output) in &def.outputs {
      let Some(source) = &output.source else {
        continue;
      };
      for reference in extract_references(&Value::String(source.clone())) {
        if !is_known(&reference) {
          violations.push(Violation::UnresolvedOutputReference {
            output: name.clone(),
            reference,
          });
        }
      }
    }
  }

  fn validate_types(
    &self,
    def: &WorkflowDef,
    kinds: &HashMap<&str, Option<NodeKind>>,
    violations: &mut Vec<Violation>,
  ) {
    for node in &def.nodes {
      if matches!(kinds.get(node.id.as_str()), Some(None)) {
        violations.push(Violation::UnknownNodeType {
          node_id: node.id.clone(),
          node_type: node.node_type.clone(),
        });
      }
    }
  }
}

fn mapped_output_keys(node: &NodeDef) -> impl Iterator<Item = &str> {
  node
    .params
    .get("output_mapping")
    .and_then(Value::as_object)
    .into_iter()
    .flat_map(|mapping| mapping.keys().map(String::as_str))
}

#[cfg(test)]
mod tests {
  use super::*;
  use async_trait::async_trait;
  use serde_json::json;
  use skein_config::{Edge, InputDef, OutputDef};
  use skein_node::{InMemoryNodeRegistry, Node};

  struct Noop;

  #[async_trait]
  impl Node for Noop {}

  fn noop() -> Arc<dyn Node> {
    Arc::new(Noop)
  }

  fn validator() -> Validator {
    let mut registry = InMemoryNodeRegistry::new();
    registry
      .register(NodeKind::new("fetch").with_outputs(["body", "status"]), noop)
      .register(NodeKind::new("llm").with_outputs(["response"]), noop)
      .register(NodeKind::new("shell"), noop)
      .register_family("git", NodeKind::new("git").with_outputs(["git_result"]), noop);
    Validator::new(Arc::new(registry))
  }

  fn node(id: &str, node_type: &str) -> NodeDef {
    NodeDef::new(id, node_type)
  }

  #[test]
  fn test_validate_linear_workflow() {
    let mut def = WorkflowDef::new(
      vec![
        node("fetch", "fetch").with_param("url", json!("${url}")),
        node("summarize", "llm").with_param("prompt", json!("Summarize ${fetch.body}")),
      ],
      vec![Edge::new("fetch", "summarize")],
    );
    def.inputs.insert("url".to_string(), InputDef::required());

    let workflow = validator().validate(&def).unwrap();

    assert_eq!(workflow.entry_node(), "fetch");
    assert_eq!(workflow.graph().route("fetch", "default"), Some("summarize"));
  }

  #[test]
  fn test_validation_is_idempotent() {
    let def = WorkflowDef::new(
      vec![node("a", "llm"), node("b", "llm")],
      vec![Edge::new("a", "b"), Edge::on("b", "a", "retry")],
    );
    let validator = validator();

    let first = validator.violations(&def);
    let second = validator.violations(&def);
    assert_eq!(first, second);
    assert_eq!(first, vec![Violation::NoEntryNode]);
  }

  #[test]
  fn test_reports_all_violations() {
    let def = WorkflowDef::new(
      vec![
        node("a", "llm").with_param("prompt", json!("${nowhere}")),
        node("b", "mystery"),
        node("c", "llm"),
        node("d", "llm"),
        node("e", "llm"),
      ],
      vec![
        Edge::new("a", "b"),
        Edge::new("a", "c"),
        Edge::new("b", "ghost"),
        Edge::new("d", "e"),
        Edge::on("e", "d", "retry"),
      ],
    );

    let err = validator().validate(&def).unwrap_err();

    assert_eq!(
      err.violations,
      vec![
        Violation::UnknownEdgeNode {
          from: "b".to_string(),
          to: "ghost".to_string(),
          node_id: "ghost".to_string(),
        },
        Violation::UnreachableNode {
          node_id: "d".to_string(),
        },
        Violation::UnreachableNode {
          node_id: "e".to_string(),
        },
        Violation::DuplicateAction {
          node_id: "a".to_string(),
          action: "default".to_string(),
        },
        Violation::UnresolvedReference {
          node_id: "a".to_string(),
          param: "prompt".to_string(),
          reference: "nowhere".to_string(),
        },
        Violation::UnknownNodeType {
          node_id: "b".to_string(),
          node_type: "mystery".to_string(),
        },
      ]
    );
  }

  #[test]
  fn test_empty_and_duplicate_nodes() {
    let validator = validator();
    assert_eq!(
      validator.violations(&WorkflowDef::default()),
      vec![Violation::EmptyWorkflow]
    );

    let def = WorkflowDef::new(vec![node("a", "llm"), node("a", "llm")], vec![]);
    assert!(validator.violations(&def).contains(&Violation::DuplicateNodeId {
      node_id: "a".to_string()
    }));
  }

  #[test]
  fn test_multiple_entry_nodes() {
    let def = WorkflowDef::new(vec![node("a", "llm"), node("b", "llm")], vec![]);
    assert_eq!(
      validator().violations(&def),
      vec![Violation::MultipleEntryNodes {
        node_ids: vec!["a".to_string(), "b".to_string()],
      }]
    );
  }

  #[test]
  fn test_self_loop_keeps_entry() {
    let def = WorkflowDef::new(
      vec![node("poll", "llm"), node("done", "llm")],
      vec![Edge::on("poll", "poll", "retry"), Edge::new("poll", "done")],
    );
    let workflow = validator().validate(&def).unwrap();
    assert_eq!(workflow.entry_node(), "poll");
  }

  #[test]
  fn test_start_node_overrides_detection() {
    let mut def = WorkflowDef::new(
      vec![node("a", "llm"), node("b", "llm")],
      vec![Edge::new("a", "b"), Edge::on("b", "a", "retry")],
    );
    def.start_node = Some("a".to_string());
    assert_eq!(validator().validate(&def).unwrap().entry_node(), "a");

    def.start_node = Some("zzz".to_string());
    assert_eq!(
      validator().violations(&def),
      vec![Violation::UnknownStartNode {
        node_id: "zzz".to_string()
      }]
    );
  }

  #[test]
  fn test_reference_roots() {
    let mut def = WorkflowDef::new(
      vec![
        node("a", "llm").with_param("prompt", json!("${stdin} ${topic} ${__call_stack__}")),
        node("b", "git-commit").with_param("message", json!("${a.response} ${response}")),
        node("c", "llm").with_param("prompt", json!({ "nested": ["${git_result}"] })),
      ],
      vec![Edge::new("a", "b"), Edge::new("b", "c")],
    );
    def.inputs.insert("topic".to_string(), InputDef::optional(json!("rust")));
    def
      .outputs
      .insert("answer".to_string(), OutputDef::from_source("${c.response}"));
    def
      .outputs
      .insert("broken".to_string(), OutputDef::from_source("${missing}"));

    assert_eq!(
      validator().violations(&def),
      vec![Violation::UnresolvedOutputReference {
        output: "broken".to_string(),
        reference: "missing".to_string(),
      }]
    );
  }

  #[test]
  fn test_dynamic_outputs_skip_reference_check() {
    let def = WorkflowDef::new(
      vec![
        node("run", "shell"),
        node("use", "llm").with_param("prompt", json!("${whatever.shell_wrote}")),
      ],
      vec![Edge::new("run", "use")],
    );
    assert!(validator().validate(&def).is_ok());
  }

  #[test]
  fn test_workflow_node_outputs_and_raw_params() {
    let def = WorkflowDef::new(
      vec![
        node("child", WORKFLOW_NODE_TYPE)
          .with_param("workflow_name", json!("summarize"))
          .with_param("output_mapping", json!({ "summary": "${llm.response}" })),
        node("report", "llm").with_param("prompt", json!("${summary}")),
      ],
      vec![Edge::new("child", "report")],
    );
    assert!(validator().validate(&def).is_ok());
  }

  #[test]
  fn test_detached_cycle_is_unreachable() {
    let def = WorkflowDef::new(
      vec![node("a", "llm"), node("b", "llm"), node("c", "llm"), node("d", "llm")],
      vec![
        Edge::new("a", "b"),
        Edge::new("c", "d"),
        Edge::on("d", "c", "retry"),
      ],
    );

    assert_eq!(
      validator().violations(&def),
      vec![
        Violation::UnreachableNode {
          node_id: "c".to_string()
        },
        Violation::UnreachableNode {
          node_id: "d".to_string()
        },
      ]
    );
  }

  #[test]
  fn test_namespacing_keeps_reference_check_with_dynamic_outputs() {
    let mut def = WorkflowDef::new(
      vec![
        node("run", "shell"),
        node("use", "shell").with_param("cmd", json!("echo ${run.out} ${tpyo.value}")),
      ],
      vec![Edge::new("run", "use")],
    );
    def.enable_namespacing = true;

    assert_eq!(
      validator().violations(&def),
      vec![Violation::UnresolvedReference {
        node_id: "use".to_string(),
        param: "cmd".to_string(),
        reference: "tpyo.value".to_string(),
      }]
    );
  }
}
