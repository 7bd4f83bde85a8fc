use promise_group::{CancellationToken, Group};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
enum DemoError {
  #[error("task was cancelled")]
  Cancelled,
}

async fn fetch_number(token: CancellationToken, id: usize, delay_ms: u64) -> Result<u64, DemoError> {
  info!("Task {} starting, will work for {}ms", id, delay_ms);
  tokio::select! {
    _ = token.cancelled() => Err(DemoError::Cancelled),
    _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => {
      info!("Task {} finished", id);
      Ok(id as u64 * 10)
    }
  }
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false) // Disable module paths for cleaner example output
    .init();

  info!("--- Basic Usage Example ---");

  let group: Group<DemoError> = Group::new();

  let mut promises = Vec::new();
  for i in 0..5 {
    let delay: u64 = 100 + (i as u64 % 3 * 50);
    promises.push(group.spawn(move |token| fetch_number(token, i, delay)));
  }

  // A side-effect task with no result of its own.
  group.spawn_and_forget(|token| async move {
    tokio::select! {
      _ = token.cancelled() => Err(DemoError::Cancelled),
      _ = tokio::time::sleep(Duration::from_millis(150)) => {
        info!("Side-effect task done");
        Ok(())
      }
    }
  });

  info!("All tasks spawned. Waiting on the group...");

  match group.wait().await {
    Ok(()) => {
      for promise in &promises {
        info!("Promise {} delivered: {:?}", promise.id(), promise.get());
      }
    }
    Err(e) => info!("Group failed: {}", e),
  }

  info!("--- Basic Usage Example End ---");
}
