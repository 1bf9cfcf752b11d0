//! Skein Template
//!
//! Resolves `${...}` references inside node params against the execution
//! context.
//!
//! A reference is a root name followed by dotted keys and bracket indices:
//!
//! ```text
//! ${url}
//! ${fetch-data.items[0].title}
//! ${config["api key"]}
//! ```
//!
//! # Type preservation
//! A string that is exactly one reference resolves to the referenced value with
//! its JSON type intact, so `"${count}"` becomes `3`, not `"3"`. References
//! embedded in surrounding text always produce a string.
//!
//! # Unresolved references
//! A reference that does not resolve is reported back to the caller and the
//! original `${...}` text is left in place.

mod path;
mod resolve;

pub use path::{Segment, parse_path, root_name};
pub use resolve::{
  Lookup, Resolved, Scope, extract_references, has_templates, resolve_str, resolve_value,
  value_to_string,
};
