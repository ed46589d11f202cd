//! Timeout constants and async wrappers.

use std::future::Future;
use std::time::Duration;

use crate::error::{ProtocolError, Result};

/// Idle time before a silent connection is dropped
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// How long shutdown waits for sessions to drain
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll interval while draining connections on shutdown
pub const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Await `future`, failing with `ConnectionTimeout` after `duration`
pub async fn with_timeout<F, T>(future: F, duration: Duration) -> Result<T>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| ProtocolError::ConnectionTimeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn elapsed_future_times_out() {
        let result = with_timeout(tokio::time::sleep(Duration::from_secs(5)), Duration::from_secs(1)).await;
        assert!(matches!(result, Err(ProtocolError::ConnectionTimeout)));
    }

    #[tokio::test]
    async fn ready_future_passes_through() {
        assert_eq!(with_timeout(async { 7 }, Duration::from_secs(1)).await.unwrap(), 7);
    }
}
