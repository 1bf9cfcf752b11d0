use std::path::{Path, PathBuf};

use skein_config::Params;

/// Where a run comes from and what the caller handed it.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
  /// Call-stack identity of the workflow being run.
  pub identity: String,
  /// Directory relative `workflow_ref` paths resolve against.
  pub base_dir: Option<PathBuf>,
  /// Caller-supplied parameters, first in template lookup order.
  pub params: Params,
}

impl Invocation {
  pub fn new(identity: impl Into<String>) -> Self {
    Self {
      identity: identity.into(),
      ..Self::default()
    }
  }

  pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
    self.base_dir = Some(base_dir.into());
    self
  }

  pub fn with_params(mut self, params: Params) -> Self {
    self.params = params;
    self
  }

  /// Invocation of a workflow file, identified by its canonical path.
  pub fn for_file(canonical: &Path) -> Self {
    let mut invocation = Self::new(canonical.display().to_string());
    invocation.base_dir = canonical.parent().map(Path::to_path_buf);
    invocation
  }
}
