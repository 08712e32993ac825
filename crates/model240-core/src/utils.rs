/*!
 * Utility functions and helpers for the Model240 gateway.
 *
 * The instrument driver is synchronous, so anything that talks to it from an
 * async context goes through [`blocking_with_timeout`].
 */
use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;
use tracing::warn;

use crate::error::{Error, Result};

/// Run a future with a timeout
///
/// # Arguments
///
/// * `duration` - The timeout duration
/// * `future` - The future to run
///
/// # Returns
///
/// The result of the future, or a timeout error if the timeout is reached
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(format!(
            "Operation timed out after {} ms",
            duration.as_millis()
        ))),
    }
}

/// Run a blocking closure on the blocking thread pool, bounded by a timeout
///
/// On timeout the closure keeps running to completion on its worker thread;
/// only the caller stops waiting. Anything the closure owns (such as a lock
/// guard) is therefore released when the closure returns, not when the timeout
/// fires.
///
/// # Arguments
///
/// * `duration` - How long the caller waits
/// * `name` - A name for the task (for logging)
/// * `f` - The blocking work
pub async fn blocking_with_timeout<F, T>(duration: Duration, name: &str, f: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::task::spawn_blocking(f);
    let result = with_timeout(duration, async {
        handle
            .await
            .map_err(|e| Error::runtime(format!("Blocking task '{}' failed: {}", name, e)))
    })
    .await;

    if let Err(Error::Timeout(_)) = &result {
        warn!("Blocking task '{}' exceeded {} ms", name, duration.as_millis());
    }

    result
}
