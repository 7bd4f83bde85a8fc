use crate::error::{panic_message, GroupError};
use crate::promise::Promise;

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, OnceLock};

use futures::FutureExt;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info_span, trace, Instrument};

lazy_static::lazy_static! {
  static ref NEXT_GROUP_TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(0);
}

/// A collection of concurrently running tasks in the same cancellation scope.
///
/// When any task in a `Group` fails, every other task in the group is asked
/// to cancel through the shared [`CancellationToken`]. When the parent token
/// of a group fires (see [`Group::with_parent`]), all tasks in the group are
/// asked to cancel as well. Cancellation is cooperative: a task that never
/// consults its token keeps running, and [`Group::wait`] keeps waiting for
/// it.
///
/// Tasks are launched with [`Group::spawn`] (producing a [`Promise`] for the
/// result) or [`Group::spawn_and_forget`] (side effects only). Exactly one
/// error escapes a group: the first failure claims the error slot and
/// cancels the rest; later failures are discarded.
pub struct Group<E: Send + 'static> {
  tracker: TaskTracker,
  cancel_token: CancellationToken,
  first_error: Arc<Mutex<Option<GroupError<E>>>>,
}

impl<E: Send + 'static> Group<E> {
  /// Creates a group whose cancellation token has no parent. The token only
  /// fires when a task in the group fails or when `wait` tears the group
  /// down.
  pub fn new() -> Self {
    Self::from_token(CancellationToken::new())
  }

  /// Creates a group whose cancellation token is a child of `parent`.
  ///
  /// The group's token fires when either the parent fires (timeout, outer
  /// shutdown) or a task in the group fails, so parent cancellation
  /// transitively reaches every outstanding task. Parent cancellation does
  /// not populate the group's error slot on its own; the error surfaces once
  /// a task observes the fired token and returns a cancellation error of its
  /// choosing.
  pub fn with_parent(parent: &CancellationToken) -> Self {
    Self::from_token(parent.child_token())
  }

  fn from_token(cancel_token: CancellationToken) -> Self {
    Self {
      tracker: TaskTracker::new(),
      cancel_token,
      first_error: Arc::new(Mutex::new(None)),
    }
  }

  /// Returns a clone of the group's cancellation token.
  ///
  /// Every spawned task already receives this token as its argument; the
  /// accessor exists for callers that want to observe or derive from the
  /// group's scope outside a task body.
  pub fn cancellation_token(&self) -> CancellationToken {
    self.cancel_token.clone()
  }

  /// Whether group-wide cancellation has been requested.
  pub fn is_cancelled(&self) -> bool {
    self.cancel_token.is_cancelled()
  }

  /// Number of spawned tasks that have not yet completed.
  pub fn pending_tasks(&self) -> usize {
    self.tracker.len()
  }

  /// Launches a result-producing task and returns a [`Promise`] for its
  /// value.
  ///
  /// The task runs concurrently on the Tokio runtime; this call never
  /// blocks. On success the value is stored into the promise before the
  /// task's completion is recorded, so after [`Group::wait`] returns
  /// `Ok(())` the promise is guaranteed ready. On failure the error enters
  /// first-error-wins arbitration and the promise stays empty.
  ///
  /// The task receives the group's token and must consult it cooperatively,
  /// typically by `select!`-ing `token.cancelled()` against its own work.
  pub fn spawn<T, F, Fut>(&self, task: F) -> Promise<T>
  where
    T: Send + Sync + 'static,
    F: FnOnce(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
  {
    let task_id = NEXT_GROUP_TASK_ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed);
    let cell = Arc::new(OnceLock::new());
    let promise = Promise {
      task_id,
      cell: cell.clone(),
    };

    let token = self.cancel_token.clone();
    let first_error = self.first_error.clone();

    debug!(%task_id, "Spawning result task on group.");
    self.tracker.spawn(
      async move {
        let task_token = token.clone();
        let outcome = AssertUnwindSafe(async move { task(task_token).await })
          .catch_unwind()
          .await;

        match outcome {
          Ok(Ok(value)) => {
            trace!(%task_id, "Task succeeded. Storing result into promise.");
            let _ = cell.set(value);
          }
          Ok(Err(err)) => {
            claim_first_error(&first_error, &token, task_id, GroupError::Task(err));
          }
          Err(payload) => {
            claim_first_error(
              &first_error,
              &token,
              task_id,
              GroupError::Panicked(panic_message(payload)),
            );
          }
        }
      }
      .instrument(info_span!("group_task", %task_id)),
    );

    promise
  }

  /// Launches a side-effect task with no result.
  ///
  /// Same lifecycle as [`Group::spawn`]: the task counts toward the pending
  /// total, receives the group's token, and on failure races for the error
  /// slot; a successful run records nothing.
  pub fn spawn_and_forget<F, Fut>(&self, task: F)
  where
    F: FnOnce(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
  {
    let task_id = NEXT_GROUP_TASK_ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed);
    let token = self.cancel_token.clone();
    let first_error = self.first_error.clone();

    debug!(%task_id, "Spawning fire-and-forget task on group.");
    self.tracker.spawn(
      async move {
        let task_token = token.clone();
        let outcome = AssertUnwindSafe(async move { task(task_token).await })
          .catch_unwind()
          .await;

        match outcome {
          Ok(Ok(())) => {
            trace!(%task_id, "Task succeeded.");
          }
          Ok(Err(err)) => {
            claim_first_error(&first_error, &token, task_id, GroupError::Task(err));
          }
          Err(payload) => {
            claim_first_error(
              &first_error,
              &token,
              task_id,
              GroupError::Panicked(panic_message(payload)),
            );
          }
        }
      }
      .instrument(info_span!("group_task", %task_id)),
    );
  }

  /// Waits until every task launched on this group has completed, then
  /// returns the first claimed error, if any.
  ///
  /// This includes tasks launched after a sibling already failed: a failure
  /// only requests cooperative cancellation, it never removes tasks from the
  /// pending count. After the last completion the group's own token is
  /// cancelled regardless of outcome, so no derived token is left armed.
  ///
  /// Consuming `self` makes the group a single-use barrier; promises from
  /// [`Group::spawn`] are only meaningful when this returns `Ok(())`.
  pub async fn wait(self) -> Result<(), GroupError<E>> {
    self.tracker.close();
    self.tracker.wait().await;

    // Teardown: release the scope whether or not anything failed.
    self.cancel_token.cancel();

    match self.first_error.lock().take() {
      Some(err) => {
        debug!("Group finished with an error.");
        Err(err)
      }
      None => {
        trace!("Group finished cleanly.");
        Ok(())
      }
    }
  }
}

impl<E: Send + 'static> Default for Group<E> {
  fn default() -> Self {
    Self::new()
  }
}

impl<E: Send + 'static> fmt::Debug for Group<E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Group")
      .field("pending_tasks", &self.tracker.len())
      .field("cancelled", &self.cancel_token.is_cancelled())
      .field("error_claimed", &self.first_error.lock().is_some())
      .finish()
  }
}

/// The single-assignment race at the heart of the group: the first failing
/// task stores its error and fires group-wide cancellation inside one
/// critical section; every later failure finds the slot claimed and is
/// dropped. There is no aggregation of the losers.
fn claim_first_error<E: Send + 'static>(
  first_error: &Mutex<Option<GroupError<E>>>,
  cancel_token: &CancellationToken,
  task_id: u64,
  err: GroupError<E>,
) {
  let mut slot = first_error.lock();
  if slot.is_none() {
    debug!(%task_id, "Task failed first. Storing error and cancelling the group.");
    *slot = Some(err);
    cancel_token.cancel();
  } else {
    trace!(%task_id, "Task failed after a sibling already claimed the error slot. Discarding.");
  }
}
