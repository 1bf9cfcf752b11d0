use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use skein_config::{Params, WorkflowDef};
use skein_runtime::{DEFAULT_MAX_DEPTH, RunResult, Runtime, RuntimeConfig, load_file};
use skein_store::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod nodes;

/// Skein - compile and run node graph workflows
#[derive(Parser)]
#[command(name = "skein")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.skein)
  #[arg(long, global = true, env = "SKEIN_DATA_DIR")]
  data_dir: Option<PathBuf>,

  /// Maximum nesting depth of sub-workflows, top level included
  #[arg(long, global = true, env = "SKEIN_MAX_DEPTH", default_value_t = DEFAULT_MAX_DEPTH)]
  max_depth: usize,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a workflow
  Run {
    #[command(subcommand)]
    target: RunTarget,
  },

  /// Validate a workflow file without running it
  Validate {
    /// Path to the workflow file
    workflow_file: PathBuf,
  },

  /// Manage stored workflows
  Workflows {
    #[command(subcommand)]
    command: WorkflowsCommand,
  },
}

#[derive(Subcommand)]
enum RunTarget {
  /// Run a workflow file
  File {
    /// Path to the workflow file
    workflow_file: PathBuf,

    /// Invocation param as key=value; JSON values are parsed
    #[arg(long = "param", short = 'p', value_parser = parse_param)]
    params: Vec<(String, Value)>,
  },

  /// Run a stored workflow by name
  Saved {
    name: String,

    /// Invocation param as key=value; JSON values are parsed
    #[arg(long = "param", short = 'p', value_parser = parse_param)]
    params: Vec<(String, Value)>,
  },
}

#[derive(Subcommand)]
enum WorkflowsCommand {
  /// List stored workflows
  List,

  /// Store a workflow file under a name
  Save {
    name: String,
    workflow_file: PathBuf,
  },
}

fn parse_param(raw: &str) -> Result<(String, Value), String> {
  let (key, value) = raw
    .split_once('=')
    .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
  if key.is_empty() {
    return Err(format!("empty param name in '{raw}'"));
  }
  let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
  Ok((key.to_string(), value))
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("skein=info,warn")),
    )
    .with_writer(io::stderr)
    .with_target(false)
    .init();

  let cli = Cli::parse();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".skein"),
  };
  let config = RuntimeConfig {
    max_depth: cli.max_depth,
    workflows_dir: Some(data_dir.join("workflows")),
  };
  let runtime = Runtime::new(Arc::new(nodes::registry()), config);

  match cli.command {
    Some(Commands::Run { target }) => {
      let ctx = read_stdin_context()?;
      let result = match target {
        RunTarget::File {
          workflow_file,
          params,
        } => runtime
          .run_file(&workflow_file, Params::from_iter(params), ctx)
          .await
          .with_context(|| format!("workflow failed: {}", workflow_file.display()))?,
        RunTarget::Saved { name, params } => runtime
          .run_named(&name, Params::from_iter(params), ctx)
          .await
          .with_context(|| format!("workflow failed: {name}"))?,
      };
      print_outputs(&result)?;
    }
    Some(Commands::Validate { workflow_file }) => {
      let def = read_workflow(&workflow_file).await?;
      let workflow = runtime
        .validate(&def)
        .with_context(|| format!("invalid workflow: {}", workflow_file.display()))?;
      println!(
        "{}: ok ({} nodes, entry '{}')",
        workflow.name(),
        workflow.nodes().len(),
        workflow.entry_node()
      );
    }
    Some(Commands::Workflows { command }) => match command {
      WorkflowsCommand::List => {
        let names = runtime
          .storage()
          .list()
          .await
          .context("failed to list workflows")?;
        for name in names {
          println!("{name}");
        }
      }
      WorkflowsCommand::Save {
        name,
        workflow_file,
      } => {
        let def = read_workflow(&workflow_file).await?;
        runtime
          .validate(&def)
          .with_context(|| format!("invalid workflow: {}", workflow_file.display()))?;
        let stored = runtime
          .storage()
          .save(&name, &def)
          .await
          .with_context(|| format!("failed to save workflow: {name}"))?;
        info!(name = %stored.name, identity = %stored.identity(), "workflow_saved");
      }
    },
    None => {
      println!("skein - use --help to see available commands");
    }
  }

  Ok(())
}

async fn read_workflow(path: &Path) -> Result<WorkflowDef> {
  load_file(path)
    .await
    .with_context(|| format!("failed to load workflow file: {}", path.display()))
}

/// Piped stdin lands under the `stdin` key, parsed as JSON when it is JSON.
fn read_stdin_context() -> Result<Context> {
  let stdin = io::stdin();
  if stdin.is_terminal() {
    return Ok(Context::new());
  }

  let mut input = String::new();
  stdin
    .lock()
    .read_to_string(&mut input)
    .context("failed to read stdin")?;

  if input.trim().is_empty() {
    return Ok(Context::new());
  }
  let value = serde_json::from_str(&input).unwrap_or(Value::String(input));
  Ok(Context::new().with_stdin(value))
}

fn print_outputs(result: &RunResult) -> Result<()> {
  info!(
    execution_id = %result.execution.execution_id,
    steps = result.execution.steps.len(),
    "run_finished"
  );
  println!("{}", serde_json::to_string_pretty(&result.outputs)?);
  Ok(())
}
