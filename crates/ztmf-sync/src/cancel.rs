//! Cancellation plumbing.
//!
//! Every external call (query, object fetch, webhook post) is raced against the
//! invocation's [`CancellationToken`] so a deadline or signal stops work at the
//! next await point.

use crate::error::{Result, SyncError};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Runs `fut` unless `cancel` fires first.
///
/// `stage` names the operation in the resulting [`SyncError::Cancelled`].
pub async fn guard<T, F>(cancel: &CancellationToken, stage: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(SyncError::Cancelled(stage));
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SyncError::Cancelled(stage)),
        result = fut => result,
    }
}
