use std::collections::HashMap;
use std::sync::Arc;

use crate::error::RegistryError;
use crate::node::Node;

/// Node type of the built-in sub-workflow node.
pub const WORKFLOW_NODE_TYPE: &str = "workflow";

/// Metadata the validator and compiler need about a node kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeKind {
  pub name: String,
  pub description: String,
  /// Keys the kind writes to the context. `None` means the kind writes keys
  /// that cannot be known ahead of time.
  pub outputs: Option<Vec<String>>,
  /// Params passed through without template resolution.
  pub raw_params: Vec<String>,
}

impl NodeKind {
  /// A kind with dynamic outputs and no raw params.
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      description: String::new(),
      outputs: None,
      raw_params: Vec::new(),
    }
  }

  pub fn with_description(mut self, description: impl Into<String>) -> Self {
    self.description = description.into();
    self
  }

  pub fn with_outputs<I, S>(mut self, outputs: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.outputs = Some(outputs.into_iter().map(Into::into).collect());
    self
  }

  pub fn with_raw_params<I, S>(mut self, params: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.raw_params = params.into_iter().map(Into::into).collect();
    self
  }

  pub fn is_raw_param(&self, name: &str) -> bool {
    self.raw_params.iter().any(|p| p == name)
  }
}

/// Metadata of the built-in sub-workflow kind.
///
/// Its outputs are whatever its `output_mapping` declares, which the
/// validator reads per node. The output mapping and an inline child
/// description are evaluated by the child, never against the parent.
pub fn workflow_kind() -> NodeKind {
  NodeKind::new(WORKFLOW_NODE_TYPE)
    .with_description("Runs another workflow as a single node")
    .with_outputs(Vec::<String>::new())
    .with_raw_params(["output_mapping", "workflow_ir"])
}

/// A family match: `<name>-<member>` resolved through a registered prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Family {
  pub name: String,
  pub member: String,
}

/// A node type resolved against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKind {
  pub kind: NodeKind,
  /// Set when the type matched a family prefix rather than an exact kind.
  pub family: Option<Family>,
}

/// Creates a fresh node instance per compile.
pub trait NodeFactory: Send + Sync {
  fn create(&self) -> Arc<dyn Node>;
}

impl<F> NodeFactory for F
where
  F: Fn() -> Arc<dyn Node> + Send + Sync,
{
  fn create(&self) -> Arc<dyn Node> {
    self()
  }
}

/// Lookup and instantiation of node kinds by type name.
pub trait NodeRegistry: Send + Sync {
  /// Resolve a node type. Exact kinds win over family prefixes.
  fn lookup(&self, node_type: &str) -> Option<ResolvedKind>;

  /// Create a new instance of a node type.
  fn instantiate(&self, node_type: &str) -> Result<Arc<dyn Node>, RegistryError>;

  /// All registered kinds and families.
  fn list(&self) -> Vec<NodeKind>;
}

#[derive(Clone)]
struct Entry {
  kind: NodeKind,
  factory: Arc<dyn NodeFactory>,
}

/// Registry backed by in-process factories.
#[derive(Clone, Default)]
pub struct InMemoryNodeRegistry {
  kinds: HashMap<String, Entry>,
  families: HashMap<String, Entry>,
}

impl InMemoryNodeRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a kind under its exact name.
  pub fn register(&mut self, kind: NodeKind, factory: impl NodeFactory + 'static) -> &mut Self {
    self.kinds.insert(
      kind.name.clone(),
      Entry {
        kind,
        factory: Arc::new(factory),
      },
    );
    self
  }

  /// Register a family: every `<prefix>-<member>` type resolves to `kind`.
  pub fn register_family(
    &mut self,
    prefix: impl Into<String>,
    kind: NodeKind,
    factory: impl NodeFactory + 'static,
  ) -> &mut Self {
    self.families.insert(
      prefix.into(),
      Entry {
        kind,
        factory: Arc::new(factory),
      },
    );
    self
  }

  fn find(&self, node_type: &str) -> Option<(&Entry, Option<Family>)> {
    if let Some(entry) = self.kinds.get(node_type) {
      return Some((entry, None));
    }

    // Longest matching prefix wins so `a-b-c` prefers family `a-b` over `a`.
    self
      .families
      .iter()
      .filter_map(|(prefix, entry)| {
        let member = node_type.strip_prefix(prefix.as_str())?.strip_prefix('-')?;
        (!member.is_empty()).then(|| (prefix, entry, member))
      })
      .max_by_key(|(prefix, _, _)| prefix.len())
      .map(|(prefix, entry, member)| {
        (
          entry,
          Some(Family {
            name: prefix.clone(),
            member: member.to_string(),
          }),
        )
      })
  }
}

impl NodeRegistry for InMemoryNodeRegistry {
  fn lookup(&self, node_type: &str) -> Option<ResolvedKind> {
    self.find(node_type).map(|(entry, family)| ResolvedKind {
      kind: entry.kind.clone(),
      family,
    })
  }

  fn instantiate(&self, node_type: &str) -> Result<Arc<dyn Node>, RegistryError> {
    self
      .find(node_type)
      .map(|(entry, _)| entry.factory.create())
      .ok_or_else(|| RegistryError::UnknownType {
        node_type: node_type.to_string(),
      })
  }

  fn list(&self) -> Vec<NodeKind> {
    let mut kinds: Vec<NodeKind> = self
      .kinds
      .values()
      .chain(self.families.values())
      .map(|entry| entry.kind.clone())
      .collect();
    kinds.sort_by(|a, b| a.name.cmp(&b.name));
    kinds
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use async_trait::async_trait;

  struct Noop;

  #[async_trait]
  impl Node for Noop {}

  fn noop() -> Arc<dyn Node> {
    Arc::new(Noop)
  }

  fn registry() -> InMemoryNodeRegistry {
    let mut registry = InMemoryNodeRegistry::new();
    registry
      .register(NodeKind::new("echo").with_outputs(["echo"]), noop)
      .register(NodeKind::new("git-special"), noop)
      .register_family("git", NodeKind::new("git"), noop)
      .register_family("mcp", NodeKind::new("mcp"), noop)
      .register_family("mcp-github", NodeKind::new("mcp-github"), noop);
    registry
  }

  #[test]
  fn test_exact_lookup() {
    let resolved = registry().lookup("echo").unwrap();
    assert_eq!(resolved.kind.name, "echo");
    assert_eq!(resolved.kind.outputs, Some(vec!["echo".to_string()]));
    assert_eq!(resolved.family, None);
  }

  #[test]
  fn test_family_lookup() {
    let resolved = registry().lookup("git-commit").unwrap();
    assert_eq!(resolved.kind.name, "git");
    assert_eq!(
      resolved.family,
      Some(Family {
        name: "git".to_string(),
        member: "commit".to_string(),
      })
    );
  }

  #[test]
  fn test_exact_kind_beats_family() {
    let resolved = registry().lookup("git-special").unwrap();
    assert_eq!(resolved.kind.name, "git-special");
    assert_eq!(resolved.family, None);
  }

  #[test]
  fn test_longest_family_prefix_wins() {
    let resolved = registry().lookup("mcp-github-issues").unwrap();
    assert_eq!(resolved.family.unwrap().member, "issues");
  }

  #[test]
  fn test_unknown_types() {
    let registry = registry();
    assert!(registry.lookup("nope").is_none());
    assert!(registry.lookup("git").is_none());
    assert!(registry.lookup("git-").is_none());
    assert!(matches!(
      registry.instantiate("nope"),
      Err(RegistryError::UnknownType { .. })
    ));
  }

  #[test]
  fn test_instantiate_creates_fresh_instances() {
    let registry = registry();
    let a = registry.instantiate("echo").unwrap();
    let b = registry.instantiate("echo").unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
  }

  #[test]
  fn test_workflow_kind_raw_params() {
    let kind = workflow_kind();
    assert!(kind.is_raw_param("output_mapping"));
    assert!(kind.is_raw_param("workflow_ir"));
    assert!(!kind.is_raw_param("param_mapping"));
  }
}
