//! Full-refresh loader for CFACTS records into the relational store.

use super::target::LoadTarget;
use super::{load, LoadOptions, LoadReport};
use crate::cfacts::{CfactsSystem, CFACTS_TABLE};
use crate::error::Result;
use crate::value::SqlValue;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Clone)]
pub struct RelationalLoader {
    target: Arc<dyn LoadTarget>,
    batch_size: usize,
    table: String,
}

impl RelationalLoader {
    pub fn new(target: Arc<dyn LoadTarget>, batch_size: usize) -> Self {
        Self {
            target,
            batch_size,
            table: CFACTS_TABLE.to_string(),
        }
    }

    /// Writes to `table` instead of `cfacts_systems`.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Replaces the table contents with `records`.
    ///
    /// An empty batch leaves the table untouched instead of truncating it.
    pub async fn replace_all(
        &self,
        records: &[CfactsSystem],
        dry_run: bool,
        cancel: &CancellationToken,
    ) -> Result<LoadReport> {
        if records.is_empty() {
            warn!(table = %self.table, "No records to load; table left unchanged");
            return Ok(LoadReport {
                table: self.table.clone(),
                rows_submitted: 0,
                rows_loaded: 0,
                committed: false,
                events: Vec::new(),
                duration: Duration::ZERO,
            });
        }

        let columns = CfactsSystem::columns();
        let rows: Vec<Vec<SqlValue>> = records.iter().map(CfactsSystem::values).collect();
        let options = LoadOptions {
            truncate: true,
            dry_run,
            batch_size: self.batch_size,
        };

        info!(
            table = %self.table,
            records = records.len(),
            batch_size = self.batch_size,
            dry_run,
            "Loading CFACTS systems"
        );
        load(self.target.as_ref(), &self.table, &columns, &rows, options, cancel).await
    }
}
