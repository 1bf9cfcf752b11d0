//! Skein Config
//!
//! This crate contains the serializable workflow description types for skein.
//! A description is the raw graph a caller hands to the runtime: nodes,
//! action-labeled edges, declared inputs and outputs. Descriptions are not
//! validated here; the resolver turns them into a `Workflow` ready to compile.
//!
//! Descriptions are loaded from:
//! - JSON files (via CLI with `skein run file workflow.json`)
//! - Workflow storage (saved by name)
//! - Inline, as the `workflow_ir` param of a sub-workflow node

mod edge;
mod input;
mod node;
mod workflow;

pub use edge::{DEFAULT_ACTION, Edge};
pub use input::{InputDef, OutputDef, Params};
pub use node::NodeDef;
pub use workflow::WorkflowDef;
