//! Moves processed drop files under `processed/<date>/`.

use super::ObjectStore;
use crate::cancel::guard;
use crate::error::Result;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// `processed/<YYYY-MM-DD>/<file name of key>`
pub fn archive_key(key: &str, date: NaiveDate) -> String {
    let file_name = key.rsplit('/').next().unwrap_or(key);
    format!("processed/{}/{}", date.format("%Y-%m-%d"), file_name)
}

#[derive(Clone)]
pub struct Archiver {
    store: Arc<dyn ObjectStore>,
}

impl Archiver {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Copies `key` to its archive location, then deletes the original.
    /// Returns the archive key.
    pub async fn archive(&self, bucket: &str, key: &str, cancel: &CancellationToken) -> Result<String> {
        let dest = archive_key(key, Utc::now().date_naive());

        guard(cancel, "archive copy", self.store.copy(bucket, key, &dest)).await?;
        guard(cancel, "archive delete", self.store.delete(bucket, key)).await?;

        info!(bucket, source = key, archived_to = %dest, "Archived CFACTS file");
        Ok(dest)
    }
}
