//! Skein Store
//!
//! The execution context threaded through a run, and the namespace proxy that
//! isolates each node's writes when a workflow enables namespacing.
//!
//! Nodes never see a concrete type. They read through [`ReadStore`] and write
//! through [`Store`], so the same node works against the root [`Context`], a
//! [`NamespacedStore`], or anything else implementing the traits.

mod context;
mod keys;
mod namespace;
mod store;

pub use context::Context;
pub use keys::{
  CALL_STACK_KEY, FAMILY_KEY, MEMBER_KEY, METRICS_KEY, NODE_TYPE_KEY, PARENT_DIR_KEY,
  PARENT_IDENTITY_KEY, STDIN_KEY, TEMPLATE_ERRORS_KEY, is_reserved_key,
};
pub use namespace::{NamespacedStore, NamespacedView};
pub use store::{ReadStore, Store, append};
