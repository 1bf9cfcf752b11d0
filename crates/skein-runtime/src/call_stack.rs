use std::ops::{Deref, DerefMut};

use serde_json::Value;
use skein_store::{CALL_STACK_KEY, Context, ReadStore, Store};
use tracing::debug;

use crate::error::RuntimeError;

/// Read the call stack from a store. Missing or malformed means empty.
pub(crate) fn read_stack(store: &dyn ReadStore) -> Vec<String> {
  store
    .get(CALL_STACK_KEY)
    .and_then(Value::as_array)
    .map(|frames| {
      frames
        .iter()
        .filter_map(|frame| frame.as_str().map(String::from))
        .collect()
    })
    .unwrap_or_default()
}

/// Check whether `identity` may be pushed onto `stack`.
pub(crate) fn check_frames(
  stack: &[String],
  identity: &str,
  max_depth: usize,
) -> Result<(), RuntimeError> {
  if stack.iter().any(|frame| frame == identity) {
    return Err(RuntimeError::CircularReference {
      identity: identity.to_string(),
      stack: stack.to_vec(),
    });
  }
  if stack.len() >= max_depth {
    return Err(RuntimeError::DepthExceeded {
      identity: identity.to_string(),
      max_depth,
    });
  }
  Ok(())
}

/// A pushed call-stack frame.
///
/// Entering pushes the identity onto `__call_stack__`; dropping pops it, on
/// success and failure alike, and removes the key once empty. The context
/// stays reachable through the guard.
pub struct CallFrame<'a> {
  ctx: &'a mut Context,
  identity: String,
}

impl<'a> CallFrame<'a> {
  pub fn enter(
    ctx: &'a mut Context,
    identity: impl Into<String>,
    max_depth: usize,
  ) -> Result<Self, RuntimeError> {
    let identity = identity.into();
    let mut stack = read_stack(&*ctx);
    check_frames(&stack, &identity, max_depth)?;

    stack.push(identity.clone());
    debug!(identity = %identity, depth = stack.len(), "call_frame_entered");
    ctx.set(CALL_STACK_KEY, Value::from(stack));

    Ok(Self { ctx, identity })
  }
}

impl Deref for CallFrame<'_> {
  type Target = Context;

  fn deref(&self) -> &Context {
    self.ctx
  }
}

impl DerefMut for CallFrame<'_> {
  fn deref_mut(&mut self) -> &mut Context {
    self.ctx
  }
}

impl Drop for CallFrame<'_> {
  fn drop(&mut self) {
    let emptied = match self.ctx.get_mut(CALL_STACK_KEY) {
      Some(Value::Array(frames)) => {
        frames.pop();
        frames.is_empty()
      }
      _ => false,
    };
    if emptied {
      self.ctx.remove(CALL_STACK_KEY);
    }
    debug!(identity = %self.identity, "call_frame_exited");
  }
}
