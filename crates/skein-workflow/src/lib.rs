//! Skein Workflow
//!
//! This crate provides the validated workflow representation for skein.
//! A `Workflow` is produced by the resolver from a `WorkflowDef` once every
//! structural and referential check has passed, and is what the compiler
//! consumes.
//!
//! Key differences from `skein-config`:
//! - Edges reference existing nodes and are unique per `(from, action)`
//! - The entry node has been selected
//! - Routing is indexed as `(node id, action) -> node id`
//!
//! The graph is not assumed to be acyclic. Self-loops and back-edges are the
//! standard way to express retries, so nothing here sorts or orders nodes.

mod graph;
mod workflow;

pub use graph::Graph;
pub use workflow::Workflow;
