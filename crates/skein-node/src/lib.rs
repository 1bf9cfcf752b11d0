//! Skein Node
//!
//! The contract every node kind implements, and the registry the compiler
//! instantiates node kinds from.
//!
//! A node runs in three phases:
//! 1. `prepare` reads the context and params and produces prepared data
//! 2. `execute` does the work from prepared data alone, without the context
//! 3. `finalize` writes results to the context and picks the next action
//!
//! Prepared and executed data are plain JSON values so wrappers can carry
//! their own bookkeeping through the phases without knowing the node.

mod error;
mod node;
mod registry;

pub use error::{NodeError, RegistryError};
pub use node::{Node, Phase};
pub use registry::{
  Family, InMemoryNodeRegistry, NodeFactory, NodeKind, NodeRegistry, ResolvedKind,
  WORKFLOW_NODE_TYPE, workflow_kind,
};
