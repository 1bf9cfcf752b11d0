//! Skein Resolver
//!
//! Turns a raw `WorkflowDef` into a validated `Workflow`. Every check runs and
//! every violation is reported together, so a broken description can be fixed
//! in one pass.

mod error;
mod validator;

pub use error::{ValidationError, Violation};
pub use validator::Validator;
