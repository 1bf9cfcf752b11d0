use std::collections::{HashMap, HashSet};

use skein_config::{Edge, NodeDef};

/// Action-keyed routing structure for traversal and analysis.
#[derive(Debug, Clone, Default)]
pub struct Graph {
  /// node_id -> (action, target) in declaration order.
  routes: HashMap<String, Vec<(String, String)>>,
  /// node_id -> upstream node_ids, excluding self-loops.
  upstream: HashMap<String, Vec<String>>,
  /// Node ids in declaration order.
  order: Vec<String>,
}

impl Graph {
  /// Build a graph from nodes and edges.
  ///
  /// Edges are taken as given; rejecting unknown endpoints and duplicate
  /// actions is the resolver's job.
  pub fn new(nodes: &[NodeDef], edges: &[Edge]) -> Self {
    let mut routes: HashMap<String, Vec<(String, String)>> = HashMap::new();
    let mut upstream: HashMap<String, Vec<String>> = HashMap::new();

    for node in nodes {
      routes.entry(node.id.clone()).or_default();
      upstream.entry(node.id.clone()).or_default();
    }

    for edge in edges {
      routes
        .entry(edge.from.clone())
        .or_default()
        .push((edge.action.clone(), edge.to.clone()));
      if edge.from != edge.to {
        upstream
          .entry(edge.to.clone())
          .or_default()
          .push(edge.from.clone());
      }
    }

    Self {
      routes,
      upstream,
      order: nodes.iter().map(|n| n.id.clone()).collect(),
    }
  }

  /// Target of `action` from `node_id`, matched exactly and case-sensitively.
  pub fn route(&self, node_id: &str, action: &str) -> Option<&str> {
    self
      .routes
      .get(node_id)?
      .iter()
      .find(|(a, _)| a == action)
      .map(|(_, to)| to.as_str())
  }

  /// All `(action, target)` pairs leaving a node.
  pub fn successors(&self, node_id: &str) -> &[(String, String)] {
    self
      .routes
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  pub fn has_successors(&self, node_id: &str) -> bool {
    !self.successors(node_id).is_empty()
  }

  /// Upstream nodes of a node. A self-loop does not count as upstream.
  pub fn upstream(&self, node_id: &str) -> &[String] {
    self
      .upstream
      .get(node_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Nodes with no incoming edges from other nodes, in declaration order.
  pub fn entry_candidates(&self) -> Vec<String> {
    self
      .order
      .iter()
      .filter(|id| self.upstream(id).is_empty())
      .cloned()
      .collect()
  }

  /// Every node reachable from `start` by following edges forward, `start`
  /// included.
  pub fn reachable_from(&self, start: &str) -> HashSet<String> {
    let mut seen = HashSet::from([start.to_string()]);
    let mut pending = vec![start];
    while let Some(node_id) = pending.pop() {
      for (_, target) in self.successors(node_id) {
        if seen.insert(target.clone()) {
          pending.push(target.as_str());
        }
      }
    }
    seen
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn nodes(ids: &[&str]) -> Vec<NodeDef> {
    ids.iter().map(|id| NodeDef::new(*id, "test")).collect()
  }

  #[test]
  fn test_route_by_action() {
    let graph = Graph::new(
      &nodes(&["a", "b", "c"]),
      &[Edge::new("a", "b"), Edge::on("a", "c", "error")],
    );

    assert_eq!(graph.route("a", "default"), Some("b"));
    assert_eq!(graph.route("a", "error"), Some("c"));
    assert_eq!(graph.route("a", "Error"), None);
    assert_eq!(graph.route("b", "default"), None);
    assert!(graph.has_successors("a"));
    assert!(!graph.has_successors("c"));
  }

  #[test]
  fn test_entry_candidates_ignore_self_loops() {
    let graph = Graph::new(
      &nodes(&["a", "b"]),
      &[Edge::new("a", "b"), Edge::on("a", "a", "retry")],
    );

    assert_eq!(graph.entry_candidates(), vec!["a".to_string()]);
    assert!(graph.upstream("a").is_empty());
    assert_eq!(graph.upstream("b"), &["a".to_string()]);
  }

  #[test]
  fn test_cycle_has_no_entry_candidates() {
    let graph = Graph::new(
      &nodes(&["a", "b"]),
      &[Edge::new("a", "b"), Edge::on("b", "a", "retry")],
    );

    assert!(graph.entry_candidates().is_empty());
  }

  #[test]
  fn test_entry_candidates_keep_declaration_order() {
    let graph = Graph::new(&nodes(&["z", "y", "x"]), &[Edge::new("y", "x")]);
    assert_eq!(graph.entry_candidates(), vec!["z".to_string(), "y".to_string()]);
  }

  #[test]
  fn test_reachable_from_follows_loops() {
    let graph = Graph::new(
      &nodes(&["a", "b", "c", "d"]),
      &[
        Edge::new("a", "b"),
        Edge::on("b", "a", "retry"),
        Edge::new("c", "d"),
        Edge::on("d", "c", "retry"),
      ],
    );

    let reached = graph.reachable_from("a");
    assert_eq!(reached.len(), 2);
    assert!(reached.contains("a") && reached.contains("b"));
    assert!(!reached.contains("c"));
  }
}
