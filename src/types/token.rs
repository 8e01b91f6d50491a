use std::future::Future;

use anyhow::{Result, anyhow};

use crate::types::error::S3purgeError;

/// A cancellation token that governs every S3 round-trip of a run.
///
/// This is a type alias for [`tokio_util::sync::CancellationToken`]. Call
/// [`cancel()`](tokio_util::sync::CancellationToken::cancel) on it (e.g., in a
/// Ctrl+C handler) to abort the in-flight request and stop emptying.
pub type PurgeCancellationToken = tokio_util::sync::CancellationToken;

/// Create a new [`PurgeCancellationToken`].
///
/// # Example
///
/// ```
/// use s3purge_rs::create_cancellation_token;
///
/// let token = create_cancellation_token();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
pub fn create_cancellation_token() -> PurgeCancellationToken {
    tokio_util::sync::CancellationToken::new()
}

/// Drive `future` to completion unless `token` is cancelled first.
///
/// A cancelled token wins over a future that is ready at the same time, and
/// the in-flight future is dropped.
pub async fn run_cancellable<T, F>(token: &PurgeCancellationToken, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(anyhow!(S3purgeError::Cancelled)),
        result = future => result,
    }
}
