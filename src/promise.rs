use std::fmt;
use std::sync::{Arc, OnceLock};

/// A write-once holder for the result of a task spawned through
/// [`Group::spawn`](crate::Group::spawn).
///
/// The bound task writes the cell at most once, on its success path. The
/// value is meaningful only after the owning group's
/// [`wait`](crate::Group::wait) returned `Ok(())`: `wait` is the
/// synchronization barrier that orders the task's write before the caller's
/// read. Reading earlier, or after `wait` returned an error, yields whatever
/// the cell holds at that moment (usually `None`, because the task never ran
/// to success).
pub struct Promise<T: Send + 'static> {
  pub(crate) task_id: u64,
  pub(crate) cell: Arc<OnceLock<T>>,
}

impl<T: Send + 'static> Promise<T> {
  /// Returns the unique ID of the task bound to this promise.
  pub fn id(&self) -> u64 {
    self.task_id
  }

  /// Whether the bound task has already stored its result.
  pub fn is_ready(&self) -> bool {
    self.cell.get().is_some()
  }

  /// Returns the stored result, or `None` if the bound task has not
  /// succeeded.
  ///
  /// Call this only after the owning group's `wait` returned `Ok(())`; at
  /// that point a successful task's value is guaranteed present.
  pub fn get(&self) -> Option<&T> {
    self.cell.get()
  }
}

impl<T: Send + 'static> Clone for Promise<T> {
  fn clone(&self) -> Self {
    Self {
      task_id: self.task_id,
      cell: self.cell.clone(),
    }
  }
}

impl<T: Send + fmt::Debug + 'static> fmt::Debug for Promise<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Promise")
      .field("task_id", &self.task_id)
      .field("value", &self.cell.get())
      .finish()
  }
}
