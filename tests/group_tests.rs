use promise_group::{CancellationToken, Group, GroupError};

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::time::sleep;

#[derive(Debug, PartialEq, Error)]
enum TaskError {
  #[error("task was cancelled")]
  Cancelled,
  #[error("task failed: {0}")]
  Failed(&'static str),
}

// Helper to initialize tracing for tests (Once ensures it runs once even
// though every test calls it).
fn setup_tracing_for_test() {
  use std::sync::Once;
  use tracing_subscriber::{fmt, EnvFilter};
  static TRACING_INIT: Once = Once::new();

  TRACING_INIT.call_once(|| {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,promise_group=trace"));

    fmt::Subscriber::builder()
      .with_env_filter(filter)
      .with_test_writer()
      .try_init()
      .ok();
  });
}

// A task that sleeps for `delay` unless the group is cancelled first, then
// returns the given outcome. Mirrors the select-against-the-token shape that
// cooperative tasks are expected to have.
fn delayed_task(
  delay: Duration,
  outcome: Result<(), TaskError>,
) -> impl FnOnce(CancellationToken) -> BoxFuture<'static, Result<(), TaskError>> {
  move |token| {
    Box::pin(async move {
      tokio::select! {
        _ = token.cancelled() => Err(TaskError::Cancelled),
        _ = sleep(delay) => outcome,
      }
    })
  }
}

// Like `delayed_task`, but bumps a counter on successful completion so tests
// can verify each task's side effect happened exactly once.
fn counting_task(
  delay: Duration,
  counter: Arc<AtomicU32>,
) -> impl FnOnce(CancellationToken) -> BoxFuture<'static, Result<(), TaskError>> {
  move |token| {
    Box::pin(async move {
      tokio::select! {
        _ = token.cancelled() => Err(TaskError::Cancelled),
        _ = sleep(delay) => {
          counter.fetch_add(1, Ordering::SeqCst);
          Ok(())
        }
      }
    })
  }
}

#[tokio::test]
async fn test_spawn_and_forget_all_succeed() {
  setup_tracing_for_test();
  let counter = Arc::new(AtomicU32::new(0));

  let group = Group::new();
  group.spawn_and_forget(counting_task(Duration::from_millis(50), counter.clone()));
  group.spawn_and_forget(counting_task(Duration::from_millis(50), counter.clone()));
  group.spawn_and_forget(counting_task(Duration::from_millis(50), counter.clone()));

  assert!(group.wait().await.is_ok());
  assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_first_error_wins_over_later_failure() {
  setup_tracing_for_test();
  let counter = Arc::new(AtomicU32::new(0));

  let group = Group::new();
  // Two quick successes, one failure, and one task that would fail much
  // later but observes cancellation first and loses the arbitration.
  group.spawn_and_forget(counting_task(Duration::from_millis(20), counter.clone()));
  group.spawn_and_forget(counting_task(Duration::from_millis(20), counter.clone()));
  group.spawn_and_forget(delayed_task(
    Duration::from_millis(80),
    Err(TaskError::Failed("boom")),
  ));
  group.spawn_and_forget(delayed_task(
    Duration::from_millis(500),
    Err(TaskError::Failed("too late")),
  ));

  let err = group.wait().await.unwrap_err();
  assert_eq!(err, GroupError::Task(TaskError::Failed("boom")));
  assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_simultaneous_failures_yield_single_error() {
  setup_tracing_for_test();

  let group = Group::new();
  // Every task fails at the same logical instant; any one of them may win,
  // but the group must surface exactly one error without panicking or
  // deadlocking on the repeated cancellations.
  for _ in 0..8 {
    group.spawn_and_forget(delayed_task(
      Duration::from_millis(10),
      Err(TaskError::Failed("simultaneous")),
    ));
  }

  let err = group.wait().await.unwrap_err();
  // Cancellation only fires after a claim, so the winner is always one of
  // the real failures, never a task's cancellation error.
  assert_eq!(err, GroupError::Task(TaskError::Failed("simultaneous")));
}

#[tokio::test]
async fn test_parent_cancellation_propagates_to_tasks() {
  setup_tracing_for_test();

  let parent = CancellationToken::new();
  let group = Group::with_parent(&parent);

  group.spawn_and_forget(delayed_task(Duration::from_millis(500), Ok(())));
  group.spawn_and_forget(delayed_task(
    Duration::from_millis(500),
    Err(TaskError::Failed("never seen")),
  ));

  // Stand-in for a parent deadline: an outside source firing the parent
  // token while the tasks are still running.
  let watchdog_parent = parent.clone();
  tokio::spawn(async move {
    sleep(Duration::from_millis(100)).await;
    watchdog_parent.cancel();
  });

  let started = Instant::now();
  let err = group.wait().await.unwrap_err();
  assert_eq!(err, GroupError::Task(TaskError::Cancelled));
  // The tasks must not have run to their full 500ms duration.
  assert!(started.elapsed() < Duration::from_millis(400));
}

#[tokio::test]
async fn test_spawn_after_sibling_failure_is_still_counted() {
  setup_tracing_for_test();
  let late_task_ran = Arc::new(AtomicBool::new(false));

  let group = Group::new();
  group.spawn_and_forget(delayed_task(
    Duration::from_millis(10),
    Err(TaskError::Failed("boom")),
  ));

  sleep(Duration::from_millis(50)).await;
  assert!(group.is_cancelled());

  // A task launched after the failure still joins the pending count; it
  // observes the already-fired token and its cancellation error loses the
  // arbitration.
  let flag = late_task_ran.clone();
  group.spawn_and_forget(move |token: CancellationToken| async move {
    token.cancelled().await;
    flag.store(true, Ordering::SeqCst);
    Err(TaskError::Cancelled)
  });

  let err = group.wait().await.unwrap_err();
  assert_eq!(err, GroupError::Task(TaskError::Failed("boom")));
  assert!(late_task_ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_task_panic_becomes_group_error() {
  setup_tracing_for_test();

  let group: Group<TaskError> = Group::new();
  group.spawn_and_forget(|_token: CancellationToken| async move {
    sleep(Duration::from_millis(10)).await;
    panic!("task exploded")
  });
  // A cooperative sibling gets cancelled by the panicking task and loses
  // the arbitration.
  group.spawn_and_forget(delayed_task(Duration::from_millis(500), Ok(())));

  let started = Instant::now();
  let err = group.wait().await.unwrap_err();
  assert!(err.is_panic());
  assert_eq!(err, GroupError::Panicked("task exploded".to_string()));
  assert!(started.elapsed() < Duration::from_millis(400));
}

#[tokio::test]
async fn test_wait_on_empty_group() {
  setup_tracing_for_test();

  let group: Group<TaskError> = Group::new();
  assert!(group.wait().await.is_ok());
}

#[tokio::test]
async fn test_group_introspection() {
  setup_tracing_for_test();

  let group: Group<TaskError> = Group::new();
  assert_eq!(group.pending_tasks(), 0);
  assert!(!group.is_cancelled());

  group.spawn_and_forget(delayed_task(Duration::from_millis(100), Ok(())));
  assert_eq!(group.pending_tasks(), 1);

  let token = group.cancellation_token();
  assert!(group.wait().await.is_ok());
  // Teardown fires the group's token even on a clean finish.
  assert!(token.is_cancelled());
}
