//! Workflow runtime.
//!
//! The [`Runtime`] struct is the main entry point for running workflows. It
//! owns the node registry, workflow storage and settings, and runs the
//! validate → compile → execute → extract pipeline. Sub-workflow nodes hold a
//! clone and re-enter the same pipeline for their child.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use skein_config::{Params, WorkflowDef};
use skein_node::NodeRegistry;
use skein_resolver::Validator;
use skein_store::{Context, ReadStore};
use skein_workflow::Workflow;
use tracing::{info, instrument};

use crate::call_stack::CallFrame;
use crate::compiler::{CompiledWorkflow, Compiler};
use crate::error::RuntimeError;
use crate::events::{ExecutionNotifier, NoopNotifier};
use crate::executor::{ExecutionResult, Executor};
use crate::invocation::Invocation;
use crate::output::extract_outputs;
use crate::storage::{
  FsWorkflowStorage, InMemoryWorkflowStorage, StorageError, WorkflowStorage, load_file,
};

/// Default bound on nested workflow depth, top level included.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Configuration for the runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
  /// Maximum call-stack depth, top-level workflow included.
  pub max_depth: usize,
  /// Directory of stored workflows. In-memory storage when unset.
  pub workflows_dir: Option<PathBuf>,
}

impl Default for RuntimeConfig {
  fn default() -> Self {
    Self {
      max_depth: DEFAULT_MAX_DEPTH,
      workflows_dir: None,
    }
  }
}

/// Result of a complete run.
#[derive(Debug)]
pub struct RunResult {
  pub execution: ExecutionResult,
  /// Extracted outputs.
  pub outputs: Params,
  /// Final context, call stack popped.
  pub context: Context,
}

type PipelineFuture<'a> =
  Pin<Box<dyn Future<Output = Result<ExecutionResult, RuntimeError>> + Send + 'a>>;

/// The workflow runtime.
#[derive(Clone)]
pub struct Runtime {
  registry: Arc<dyn NodeRegistry>,
  storage: Arc<dyn WorkflowStorage>,
  notifier: Arc<dyn ExecutionNotifier>,
  config: RuntimeConfig,
}

impl Runtime {
  /// Create a runtime. Storage comes from `config.workflows_dir`.
  pub fn new(registry: Arc<dyn NodeRegistry>, config: RuntimeConfig) -> Self {
    let storage: Arc<dyn WorkflowStorage> = match &config.workflows_dir {
      Some(dir) => Arc::new(FsWorkflowStorage::new(dir.clone())),
      None => Arc::new(InMemoryWorkflowStorage::new()),
    };
    Self {
      registry,
      storage,
      notifier: Arc::new(NoopNotifier),
      config,
    }
  }

  pub fn with_storage(mut self, storage: Arc<dyn WorkflowStorage>) -> Self {
    self.storage = storage;
    self
  }

  pub fn with_notifier(mut self, notifier: Arc<dyn ExecutionNotifier>) -> Self {
    self.notifier = notifier;
    self
  }

  pub fn registry(&self) -> &dyn NodeRegistry {
    self.registry.as_ref()
  }

  pub fn storage(&self) -> &dyn WorkflowStorage {
    self.storage.as_ref()
  }

  pub fn config(&self) -> &RuntimeConfig {
    &self.config
  }

  /// Validate a description without running it.
  pub fn validate(&self, def: &WorkflowDef) -> Result<Workflow, RuntimeError> {
    Ok(Validator::new(self.registry.clone()).validate(def)?)
  }

  /// Compile a validated workflow for one invocation.
  pub fn compile(
    &self,
    workflow: &Workflow,
    invocation: &Invocation,
  ) -> Result<CompiledWorkflow, RuntimeError> {
    Compiler::new(self.clone()).compile(workflow, invocation)
  }

  /// Run an in-memory description.
  pub async fn run(
    &self,
    def: &WorkflowDef,
    params: Params,
    ctx: Context,
  ) -> Result<RunResult, RuntimeError> {
    let invocation =
      Invocation::new(format!("inline:{}", def.display_name())).with_params(params);
    self.invoke(def, invocation, ctx).await
  }

  /// Run a description file. Relative `workflow_ref`s inside it resolve
  /// against the file's directory.
  pub async fn run_file(
    &self,
    path: &Path,
    params: Params,
    ctx: Context,
  ) -> Result<RunResult, RuntimeError> {
    let canonical = tokio::fs::canonicalize(path)
      .await
      .map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
      })?;
    let def = load_file(&canonical).await?;
    let invocation = Invocation::for_file(&canonical).with_params(params);
    self.invoke(&def, invocation, ctx).await
  }

  /// Run a workflow from storage.
  pub async fn run_named(
    &self,
    name: &str,
    params: Params,
    ctx: Context,
  ) -> Result<RunResult, RuntimeError> {
    let stored = self.storage.load(name).await?;
    let mut invocation = Invocation::new(stored.identity()).with_params(params);
    invocation.base_dir = stored.base_dir();
    self.invoke(&stored.def, invocation, ctx).await
  }

  /// Run the full pipeline and extract outputs.
  #[instrument(
    name = "runtime_invoke",
    skip(self, def, invocation, ctx),
    fields(workflow = %def.display_name(), identity = %invocation.identity)
  )]
  pub async fn invoke(
    &self,
    def: &WorkflowDef,
    invocation: Invocation,
    mut ctx: Context,
  ) -> Result<RunResult, RuntimeError> {
    let execution = self.execute_pipeline(def, &invocation, &mut ctx).await?;
    let outputs = extract_outputs(def, &ctx, &invocation.params, Some(execution.last_node()));

    info!(
      execution_id = %execution.execution_id,
      outputs = outputs.len(),
      "outputs_extracted"
    );

    Ok(RunResult {
      execution,
      outputs,
      context: ctx,
    })
  }

  /// Validate, compile and execute `def` against `ctx` under a call frame.
  ///
  /// Boxed because sub-workflow nodes call back into it recursively.
  pub(crate) fn execute_pipeline<'a>(
    &'a self,
    def: &'a WorkflowDef,
    invocation: &'a Invocation,
    ctx: &'a mut Context,
  ) -> PipelineFuture<'a> {
    Box::pin(async move {
      let mut frame = CallFrame::enter(ctx, invocation.identity.clone(), self.config.max_depth)?;

      let workflow = self.validate(def)?;
      check_inputs(&workflow, &invocation.params, &frame)?;
      let compiled = self.compile(&workflow, invocation)?;

      Executor::new(self.notifier.clone())
        .execute(&compiled, &mut frame)
        .await
    })
  }
}

/// Every mandatory input must come from the invocation params or the context.
fn check_inputs(
  workflow: &Workflow,
  params: &Params,
  ctx: &Context,
) -> Result<(), RuntimeError> {
  let names: Vec<String> = workflow
    .def()
    .inputs
    .iter()
    .filter(|(name, input)| {
      input.is_mandatory() && !params.contains_key(*name) && !ctx.contains_key(name)
    })
    .map(|(name, _)| name.clone())
    .collect();

  if names.is_empty() {
    Ok(())
  } else {
    Err(RuntimeError::MissingInputs { names })
  }
}
