//! Loader for extracted tables into the warehouse.

use super::target::LoadTarget;
use super::{load, LoadOptions, LoadReport};
use crate::error::Result;
use crate::export::Extraction;
use crate::value::{Row, SqlValue};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Warehouse spelling of `columns`.
pub fn warehouse_columns(columns: &[String]) -> Vec<String> {
    columns.iter().map(|c| c.to_uppercase()).collect()
}

/// Values of `row` in `columns` order, looked up by lower-cased name.
/// Missing columns become NULL.
pub fn ordered_values(row: &Row, columns: &[String]) -> Vec<SqlValue> {
    columns
        .iter()
        .map(|c| row.get(&c.to_lowercase()).cloned().unwrap_or(SqlValue::Null))
        .collect()
}

#[derive(Clone)]
pub struct WarehouseLoader {
    target: Arc<dyn LoadTarget>,
    batch_size: usize,
}

impl WarehouseLoader {
    pub fn new(target: Arc<dyn LoadTarget>, batch_size: usize) -> Self {
        Self { target, batch_size }
    }

    /// Writes `extraction` into `destination`, optionally truncating first.
    pub async fn load_extraction(
        &self,
        destination: &str,
        extraction: &Extraction,
        truncate: bool,
        dry_run: bool,
        cancel: &CancellationToken,
    ) -> Result<LoadReport> {
        let rows: Vec<Vec<SqlValue>> = extraction
            .rows
            .iter()
            .map(|row| ordered_values(row, &extraction.columns))
            .collect();
        let options = LoadOptions {
            truncate,
            dry_run,
            batch_size: self.batch_size,
        };

        load(
            self.target.as_ref(),
            destination,
            &warehouse_columns(&extraction.columns),
            &rows,
            options,
            cancel,
        )
        .await
    }
}
