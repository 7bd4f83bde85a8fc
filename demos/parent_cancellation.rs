use promise_group::{CancellationToken, Group};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
enum DemoError {
  #[error("deadline exceeded")]
  DeadlineExceeded,
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();

  info!("--- Parent Cancellation Example ---");

  // An outer scope with a deadline. Firing the parent token reaches every
  // task in the group through its derived token.
  let parent = CancellationToken::new();
  let deadline_token = parent.clone();
  tokio::spawn(async move {
    tokio::time::sleep(Duration::from_millis(300)).await;
    info!("Deadline reached, cancelling the parent scope");
    deadline_token.cancel();
  });

  let group: Group<DemoError> = Group::with_parent(&parent);

  for id in 0..3 {
    group.spawn_and_forget(move |token: CancellationToken| async move {
      tokio::select! {
        _ = token.cancelled() => {
          info!("Task {} stopping: scope cancelled", id);
          Err(DemoError::DeadlineExceeded)
        }
        _ = tokio::time::sleep(Duration::from_secs(2)) => {
          info!("Task {} finished its full two seconds", id);
          Ok(())
        }
      }
    });
  }

  match group.wait().await {
    Ok(()) => info!("Group finished cleanly (unexpected here)"),
    Err(e) => info!("Group stopped early: {}", e),
  }

  info!("--- Parent Cancellation Example End ---");
}
