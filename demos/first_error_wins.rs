use promise_group::{CancellationToken, Group};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
enum DemoError {
  #[error("task was cancelled")]
  Cancelled,
  #[error("task {0} failed")]
  TaskFailed(usize),
}

fn flaky_task(
  id: usize,
  delay_ms: u64,
  fails: bool,
) -> impl FnOnce(CancellationToken) -> futures::future::BoxFuture<'static, Result<(), DemoError>> {
  move |token| {
    Box::pin(async move {
      tokio::select! {
        _ = token.cancelled() => {
          info!("Task {} observed cancellation and is stopping", id);
          Err(DemoError::Cancelled)
        }
        _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => {
          if fails {
            info!("Task {} failing", id);
            Err(DemoError::TaskFailed(id))
          } else {
            info!("Task {} completed", id);
            Ok(())
          }
        }
      }
    })
  }
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();

  info!("--- First Error Wins Example ---");

  let group = Group::new();

  group.spawn_and_forget(flaky_task(0, 100, false));
  group.spawn_and_forget(flaky_task(1, 200, true)); // first failure, claims the slot
  group.spawn_and_forget(flaky_task(2, 800, true)); // cancelled long before it could fail
  group.spawn_and_forget(flaky_task(3, 800, false)); // cancelled as well

  match group.wait().await {
    Ok(()) => info!("Group finished cleanly (unexpected here)"),
    Err(e) => info!("Group surfaced exactly one error: {}", e),
  }

  info!("--- First Error Wins Example End ---");
}
