//! Transactional batch loading.
//!
//! Both destinations share [`load`]: one transaction per table, an optional
//! truncate, then one multi-row `INSERT` per batch. Dry runs do every write and
//! roll back. Any error, cancellation or row-count mismatch rolls back too, so
//! a destination table is only ever fully old or fully new.

pub mod relational;
pub mod target;
pub mod warehouse;

use crate::cancel::guard;
use crate::error::{Result, SyncError};
use crate::export::registry::validate_identifier;
use crate::value::SqlValue;
use serde::Serialize;
use std::time::{Duration, Instant};
use target::{LoadTarget, LoadTransaction};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

pub use relational::RelationalLoader;
pub use target::PgTarget;
pub use warehouse::WarehouseLoader;

/// PostgreSQL's limit on bind parameters in one statement.
pub const MAX_BIND_PARAMS: usize = 65_535;

/// A write performed by a loader, reported by the loader itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WriteEvent {
    /// Table emptied; `rows` is set when the store reports a count
    Deleted { table: String, rows: Option<u64> },
    /// One insert statement
    Inserted { table: String, rows: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub truncate: bool,
    pub dry_run: bool,
    pub batch_size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub table: String,
    pub rows_submitted: u64,
    /// Rows the store reported as inserted; equal to `rows_submitted` on success
    pub rows_loaded: u64,
    pub committed: bool,
    pub events: Vec<WriteEvent>,
    pub duration: Duration,
}

impl LoadReport {
    /// Number of insert statements issued.
    pub fn statements(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, WriteEvent::Inserted { .. }))
            .count()
    }
}

/// Rows per statement: the configured batch size, capped so one statement
/// stays under [`MAX_BIND_PARAMS`].
pub fn rows_per_statement(batch_size: usize, columns: usize) -> usize {
    let cap = MAX_BIND_PARAMS / columns.max(1);
    batch_size.min(cap).max(1)
}

/// Loads `rows` into `table` inside a single transaction.
///
/// Every row must have one value per entry of `columns`.
#[instrument(skip(target, columns, rows, cancel), fields(target_store = target.name(), rows = rows.len()))]
pub async fn load(
    target: &dyn LoadTarget,
    table: &str,
    columns: &[String],
    rows: &[Vec<SqlValue>],
    options: LoadOptions,
    cancel: &CancellationToken,
) -> Result<LoadReport> {
    validate_identifier(table)?;
    for column in columns {
        validate_identifier(column)?;
    }
    if options.batch_size == 0 {
        return Err(SyncError::Config("batch size must be greater than 0".to_string()));
    }

    let started = Instant::now();
    let rows_submitted = rows.len() as u64;
    let mut tx = guard(cancel, "begin transaction", target.begin()).await?;

    let (rows_loaded, events) =
        match write_all(tx.as_mut(), table, columns, rows, options, cancel).await {
            Ok(written) => written,
            Err(e) => {
                rollback_quietly(tx, table).await;
                return Err(e);
            },
        };

    if rows_loaded != rows_submitted {
        rollback_quietly(tx, table).await;
        return Err(SyncError::RowCountMismatch {
            table: table.to_string(),
            expected: rows_submitted,
            actual: rows_loaded,
        });
    }

    let committed = if options.dry_run {
        tx.rollback().await?;
        info!(table, rows = rows_loaded, "Dry run: transaction rolled back");
        false
    } else if cancel.is_cancelled() {
        rollback_quietly(tx, table).await;
        return Err(SyncError::Cancelled("commit"));
    } else {
        tx.commit().await?;
        info!(table, rows = rows_loaded, "Transaction committed");
        true
    };

    Ok(LoadReport {
        table: table.to_string(),
        rows_submitted,
        rows_loaded,
        committed,
        events,
        duration: started.elapsed(),
    })
}

async fn write_all(
    tx: &mut dyn LoadTransaction,
    table: &str,
    columns: &[String],
    rows: &[Vec<SqlValue>],
    options: LoadOptions,
    cancel: &CancellationToken,
) -> Result<(u64, Vec<WriteEvent>)> {
    let mut events = Vec::new();

    if options.truncate {
        let deleted = guard(cancel, "truncate", tx.truncate(table)).await?;
        info!(table, "Truncated table");
        events.push(WriteEvent::Deleted {
            table: table.to_string(),
            rows: deleted,
        });
    }

    let per_statement = rows_per_statement(options.batch_size, columns.len());
    let batches = rows.len().div_ceil(per_statement);
    let mut loaded = 0u64;

    for (i, chunk) in rows.chunks(per_statement).enumerate() {
        let inserted = guard(cancel, "insert batch", tx.insert(table, columns, chunk))
            .await
            .map_err(|e| SyncError::BatchInsert {
                table: table.to_string(),
                start: i * per_statement + 1,
                source: Box::new(e),
            })?;

        loaded += inserted;
        events.push(WriteEvent::Inserted {
            table: table.to_string(),
            rows: inserted,
        });
        info!(table, batch = i + 1, batches, rows = loaded, "Inserted batch");
    }

    Ok((loaded, events))
}

async fn rollback_quietly(tx: Box<dyn LoadTransaction>, table: &str) {
    match tx.rollback().await {
        Ok(()) => info!(table, "Transaction rolled back"),
        Err(e) => warn!(table, error = %e, "Rollback failed; connection discarded"),
    }
}
