//! A Tokio-based task group running futures in a shared cancellation
//! scope, cancelling all siblings on the first failure and delivering
//! typed results through write-once promises.

mod error;
mod group;
mod promise;

pub use error::GroupError;
pub use group::Group;
pub use promise::Promise;

pub use tokio_util::sync::CancellationToken;
