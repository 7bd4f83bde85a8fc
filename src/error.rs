use std::any::Any;

use thiserror::Error;

/// The error surfaced by [`Group::wait`](crate::Group::wait).
///
/// Exactly one of these escapes a group; every later failure is discarded by
/// the first-error-wins arbitration.
#[derive(Error, Debug, PartialEq)]
pub enum GroupError<E> {
  /// The error returned by the first task whose failure claimed the group's
  /// error slot. Cancellation errors returned by tasks that observed a fired
  /// token arrive through this variant too.
  #[error("{0}")]
  Task(E),

  /// A task panicked. The panic is caught, converted to a message, and
  /// raced through the same arbitration as an ordinary task error.
  #[error("task panicked: {0}")]
  Panicked(String),
}

impl<E> GroupError<E> {
  /// Returns the task-level error, if this is a [`GroupError::Task`].
  pub fn into_task_error(self) -> Option<E> {
    match self {
      GroupError::Task(err) => Some(err),
      GroupError::Panicked(_) => None,
    }
  }

  /// Whether this error was produced by a panicking task.
  pub fn is_panic(&self) -> bool {
    matches!(self, GroupError::Panicked(_))
  }
}

/// Extracts a printable message from a caught panic payload.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
  if let Some(msg) = payload.downcast_ref::<&'static str>() {
    (*msg).to_string()
  } else if let Some(msg) = payload.downcast_ref::<String>() {
    msg.clone()
  } else {
    "unknown panic payload".to_string()
  }
}
