//! Bounded retry for storage operations

use std::{fmt::Display, future::Future, time::Duration};
use tokio::time::sleep;
use tracing::warn;

/// Run `op`, and if it fails run it exactly once more after `delay`
pub async fn retry_once<F, Fut, T, E>(delay: Duration, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    match op().await {
        Ok(value) => Ok(value),
        Err(e) => {
            warn!("Operation failed: {}, retrying once in {:?}", e, delay);
            sleep(delay).await;
            op().await
        }
    }
}
