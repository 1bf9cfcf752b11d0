//! Skein Runtime
//!
//! This crate turns validated workflows into running computations.
//!
//! The pipeline for one run is:
//! 1. Validate the description ([`Runtime::validate`])
//! 2. Compile it: instantiate nodes, wrap them, wire action routes
//!    ([`Compiler`])
//! 3. Drive it by action lookup until termination ([`Executor`])
//! 4. Extract outputs from the final context
//!
//! Nodes of type `workflow` re-enter the same pipeline for a child workflow.
//! Recursion is bounded by the call stack kept under `__call_stack__`.

mod call_stack;
mod compiler;
mod error;
mod events;
mod executor;
mod invocation;
mod output;
mod runtime;
mod storage;
mod subworkflow;
mod wrappers;

pub use call_stack::CallFrame;
pub use compiler::{CompiledNode, CompiledWorkflow, Compiler};
pub use error::RuntimeError;
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use executor::{ExecutionResult, Executor, StepRecord, Termination};
pub use invocation::Invocation;
pub use output::{CONVENTIONAL_OUTPUT_KEYS, extract_outputs};
pub use runtime::{DEFAULT_MAX_DEPTH, RunResult, Runtime, RuntimeConfig};
pub use storage::{
  FsWorkflowStorage, InMemoryWorkflowStorage, StorageError, StoredWorkflow, WorkflowStorage,
  load_file,
};
pub use subworkflow::StorageMode;
pub use wrappers::TemplateError;
