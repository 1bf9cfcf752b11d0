/// Piped input of the top-level run. Not reserved, but never written by nodes
/// in practice and visible to every node through the root fallback.
pub const STDIN_KEY: &str = "stdin";

/// Graph identities currently executing, outermost first.
pub const CALL_STACK_KEY: &str = "__call_stack__";

/// Records of template references that did not resolve.
pub const TEMPLATE_ERRORS_KEY: &str = "__template_errors__";

/// Per-node timing collected by the instrumentation wrapper.
pub const METRICS_KEY: &str = "__metrics__";

// Injected into params only, never written to the context.
pub const NODE_TYPE_KEY: &str = "__node_type__";
pub const FAMILY_KEY: &str = "__family__";
pub const MEMBER_KEY: &str = "__member__";
pub const PARENT_IDENTITY_KEY: &str = "__parent_identity__";
pub const PARENT_DIR_KEY: &str = "__parent_dir__";

/// Whether `key` is a reserved `__name__` key.
///
/// Reserved keys always live at the root of the context and bypass
/// namespacing in both directions.
pub fn is_reserved_key(key: &str) -> bool {
  key.len() > 4 && key.starts_with("__") && key.ends_with("__")
}
