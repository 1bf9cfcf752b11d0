//! Execution events and notifiers for observing progress.
//!
//! Events are emitted by the executor as a run proceeds so callers can show
//! progress, persist a trace, stream to a UI, etc.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted during workflow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionEvent {
  /// Workflow execution has started.
  WorkflowStarted {
    execution_id: String,
    workflow: String,
    identity: String,
  },

  /// A node has started its lifecycle.
  NodeStarted {
    execution_id: String,
    node_id: String,
  },

  /// A node has finished its lifecycle and chosen an action.
  NodeCompleted {
    execution_id: String,
    node_id: String,
    action: String,
    duration_ms: u64,
  },

  /// A node has failed.
  NodeFailed {
    execution_id: String,
    node_id: String,
    error: String,
  },

  /// Workflow execution has terminated normally.
  WorkflowCompleted {
    execution_id: String,
    last_node: String,
  },

  /// Workflow execution has failed.
  WorkflowFailed { execution_id: String, error: String },
}

/// Trait for receiving execution events.
///
/// The executor calls `notify` for each event. Implementations decide what
/// to do with them.
pub trait ExecutionNotifier: Send + Sync {
  /// Called when an execution event occurs.
  fn notify(&self, event: ExecutionEvent);
}

/// A no-op notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// A notifier that sends events to an unbounded channel.
///
/// Event volume is one or two per node, so an unbounded channel keeps a slow
/// consumer from stalling the executor without meaningful memory growth.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  /// Create a new channel notifier.
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // The receiver may have been dropped.
    let _ = self.sender.send(event);
  }
}
