//! Workflow storage: named workflow descriptions a sub-workflow node can
//! invoke by `workflow_name`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use skein_config::WorkflowDef;
use thiserror::Error;
use tokio::fs;

/// Errors from workflow storage and description files.
#[derive(Debug, Error)]
pub enum StorageError {
  /// No workflow is stored under the name.
  #[error("workflow not found: {name}")]
  NotFound { name: String },

  /// Names must be plain file stems.
  #[error("invalid workflow name: {name}")]
  InvalidName { name: String },

  /// IO error when reading or writing a description.
  #[error("failed to access {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The description is not valid JSON for a workflow.
  #[error("invalid workflow description {}: {source}", path.display())]
  InvalidDescription {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  /// A writer panicked while holding the in-memory store.
  #[error("workflow storage is poisoned")]
  Poisoned,
}

impl<T> From<PoisonError<T>> for StorageError {
  fn from(_: PoisonError<T>) -> Self {
    Self::Poisoned
  }
}

/// A description loaded from storage.
#[derive(Debug, Clone)]
pub struct StoredWorkflow {
  pub name: String,
  pub def: WorkflowDef,
  /// Backing file, when the storage has one.
  pub path: Option<PathBuf>,
}

impl StoredWorkflow {
  /// Call-stack identity: the backing file's path, or `name:<name>`.
  pub fn identity(&self) -> String {
    match &self.path {
      Some(path) => path.display().to_string(),
      None => format!("name:{}", self.name),
    }
  }

  /// Directory relative references inside the workflow resolve against.
  pub fn base_dir(&self) -> Option<PathBuf> {
    self
      .path
      .as_deref()
      .and_then(Path::parent)
      .map(Path::to_path_buf)
  }
}

/// Storage of named workflow descriptions.
#[async_trait]
pub trait WorkflowStorage: Send + Sync {
  /// Load a workflow by name.
  async fn load(&self, name: &str) -> Result<StoredWorkflow, StorageError>;

  /// Save a workflow under a name, replacing any previous one.
  async fn save(&self, name: &str, def: &WorkflowDef) -> Result<StoredWorkflow, StorageError>;

  /// Names of all stored workflows, sorted.
  async fn list(&self) -> Result<Vec<String>, StorageError>;
}

fn check_name(name: &str) -> Result<(), StorageError> {
  if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
    return Err(StorageError::InvalidName {
      name: name.to_string(),
    });
  }
  Ok(())
}

/// Read and parse a description file.
pub async fn load_file(path: &Path) -> Result<WorkflowDef, StorageError> {
  let content = fs::read_to_string(path)
    .await
    .map_err(|source| StorageError::Io {
      path: path.to_path_buf(),
      source,
    })?;
  serde_json::from_str(&content).map_err(|source| StorageError::InvalidDescription {
    path: path.to_path_buf(),
    source,
  })
}

/// Filesystem-based workflow storage.
///
/// Workflows are stored flat:
/// ```text
/// {root}/
/// ├── summarize.json
/// └── triage.json
/// ```
pub struct FsWorkflowStorage {
  root: PathBuf,
}

impl FsWorkflowStorage {
  /// Create a new filesystem storage at the given root path.
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  /// Get the root directory of the storage.
  pub fn root(&self) -> &Path {
    &self.root
  }

  fn path_for(&self, name: &str) -> PathBuf {
    self.root.join(format!("{}.json", name))
  }
}

#[async_trait]
impl WorkflowStorage for FsWorkflowStorage {
  async fn load(&self, name: &str) -> Result<StoredWorkflow, StorageError> {
    check_name(name)?;
    let path = self.path_for(name);
    if !fs::try_exists(&path).await.unwrap_or(false) {
      return Err(StorageError::NotFound {
        name: name.to_string(),
      });
    }

    let def = load_file(&path).await?;
    let path = fs::canonicalize(&path)
      .await
      .map_err(|source| StorageError::Io {
        path: path.clone(),
        source,
      })?;

    Ok(StoredWorkflow {
      name: name.to_string(),
      def,
      path: Some(path),
    })
  }

  async fn save(&self, name: &str, def: &WorkflowDef) -> Result<StoredWorkflow, StorageError> {
    check_name(name)?;
    let io_err = |path: &Path| {
      let path = path.to_path_buf();
      move |source| StorageError::Io { path, source }
    };

    fs::create_dir_all(&self.root)
      .await
      .map_err(io_err(&self.root))?;

    let path = self.path_for(name);
    let content =
      serde_json::to_string_pretty(def).map_err(|source| StorageError::InvalidDescription {
        path: path.clone(),
        source,
      })?;
    fs::write(&path, content).await.map_err(io_err(&path))?;

    self.load(name).await
  }

  async fn list(&self) -> Result<Vec<String>, StorageError> {
    let mut entries = match fs::read_dir(&self.root).await {
      Ok(entries) => entries,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(source) => {
        return Err(StorageError::Io {
          path: self.root.clone(),
          source,
        });
      }
    };

    let mut names = Vec::new();
    loop {
      let entry = match entries.next_entry().await {
        Ok(Some(entry)) => entry,
        Ok(None) => break,
        Err(source) => {
          return Err(StorageError::Io {
            path: self.root.clone(),
            source,
          });
        }
      };

      let path = entry.path();
      if path.extension().and_then(|e| e.to_str()) != Some("json") {
        continue;
      }
      if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
        names.push(stem.to_string());
      }
    }

    names.sort();
    Ok(names)
  }
}

/// In-memory workflow storage, mainly for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryWorkflowStorage {
  workflows: RwLock<HashMap<String, WorkflowDef>>,
}

impl InMemoryWorkflowStorage {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a workflow without going through the async trait.
  pub fn with_workflow(mut self, name: impl Into<String>, def: WorkflowDef) -> Self {
    self
      .workflows
      .get_mut()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(name.into(), def);
    self
  }
}

#[async_trait]
impl WorkflowStorage for InMemoryWorkflowStorage {
  async fn load(&self, name: &str) -> Result<StoredWorkflow, StorageError> {
    let def = self
      .workflows
      .read()?
      .get(name)
      .cloned()
      .ok_or_else(|| StorageError::NotFound {
        name: name.to_string(),
      })?;

    Ok(StoredWorkflow {
      name: name.to_string(),
      def,
      path: None,
    })
  }

  async fn save(&self, name: &str, def: &WorkflowDef) -> Result<StoredWorkflow, StorageError> {
    check_name(name)?;
    self
      .workflows
      .write()?
      .insert(name.to_string(), def.clone());
    Ok(StoredWorkflow {
      name: name.to_string(),
      def: def.clone(),
      path: None,
    })
  }

  async fn list(&self) -> Result<Vec<String>, StorageError> {
    let mut names: Vec<String> = self.workflows.read()?.keys().cloned().collect();
    names.sort();
    Ok(names)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use skein_config::NodeDef;
  use tempfile::TempDir;

  fn sample() -> WorkflowDef {
    WorkflowDef::new(vec![NodeDef::new("a", "echo")], vec![])
  }

  #[tokio::test]
  async fn test_fs_save_load_list() {
    let temp = TempDir::new().unwrap();
    let storage = FsWorkflowStorage::new(temp.path().join("workflows"));

    assert!(storage.list().await.unwrap().is_empty());

    let saved = storage.save("summarize", &sample()).await.unwrap();
    storage.save("triage", &sample()).await.unwrap();

    assert!(saved.path.as_ref().unwrap().ends_with("summarize.json"));
    assert_eq!(saved.identity(), saved.path.unwrap().display().to_string());

    let loaded = storage.load("summarize").await.unwrap();
    assert_eq!(loaded.def, sample());
    assert_eq!(storage.list().await.unwrap(), vec!["summarize", "triage"]);
  }

  #[tokio::test]
  async fn test_fs_not_found_and_invalid_name() {
    let temp = TempDir::new().unwrap();
    let storage = FsWorkflowStorage::new(temp.path());

    assert!(matches!(
      storage.load("missing").await,
      Err(StorageError::NotFound { .. })
    ));
    assert!(matches!(
      storage.load("../etc/passwd").await,
      Err(StorageError::InvalidName { .. })
    ));
  }

  #[tokio::test]
  async fn test_load_file_reports_bad_json() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("broken.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(matches!(
      load_file(&path).await,
      Err(StorageError::InvalidDescription { .. })
    ));
  }

  #[tokio::test]
  async fn test_in_memory_identity() {
    let storage = InMemoryWorkflowStorage::new().with_workflow("child", sample());
    let loaded = storage.load("child").await.unwrap();
    assert_eq!(loaded.identity(), "name:child");
    assert_eq!(loaded.base_dir(), None);
    assert_eq!(storage.list().await.unwrap(), vec!["child"]);
  }

  #[tokio::test]
  async fn test_in_memory_poisoned_lock_is_an_error() {
    let storage = InMemoryWorkflowStorage::new();
    let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
      let _guard = storage.workflows.write().unwrap();
      panic!("writer died");
    }));

    assert!(matches!(
      storage.save("summarize", &sample()).await,
      Err(StorageError::Poisoned)
    ));
    assert!(matches!(storage.list().await, Err(StorageError::Poisoned)));
    assert!(matches!(
      storage.load("summarize").await,
      Err(StorageError::Poisoned)
    ));
  }
}
