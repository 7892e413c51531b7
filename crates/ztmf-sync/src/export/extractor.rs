//! Generic table extraction from the relational store.

use super::registry::{allowed_predicate, validate_identifier, validate_order_by};
use crate::cancel::guard;
use crate::error::{Result, SyncError};
use crate::value::{column_names, decode_row, Row};
use async_trait::async_trait;
use futures::TryStreamExt;
use serde::de::DeserializeOwned;
use sqlx::PgPool;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

const PROGRESS_EVERY: usize = 10_000;

/// All rows of one table plus the column names discovered in the result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub table: String,
    /// Lower-cased column names in result-set order; empty when no rows came back
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Extraction {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Decodes every row into `T` by column name.
    ///
    /// ```ignore
    /// #[derive(serde::Deserialize)]
    /// struct Pillar { pillarid: i64, pillar: String }
    ///
    /// let pillars: Vec<Pillar> = extraction.decode_rows()?;
    /// ```
    pub fn decode_rows<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.rows
            .iter()
            .map(|row| -> Result<T> {
                let object: serde_json::Map<String, serde_json::Value> = row
                    .iter()
                    .map(|(column, value)| (column.clone(), value.to_json()))
                    .collect();
                Ok(serde_json::from_value(serde_json::Value::Object(object))?)
            })
            .collect()
    }
}

/// Builds `SELECT * FROM <table> [WHERE <predicate>] ORDER BY <order_by>`.
///
/// Every interpolated piece is validated; the predicate must already be one of
/// the registered ones.
pub fn build_select(table: &str, predicate: Option<&str>, order_by: &str) -> Result<String> {
    validate_identifier(table)?;
    validate_order_by(order_by)?;

    let mut sql = format!("SELECT * FROM {table}");
    if let Some(predicate) = predicate {
        sql.push_str(" WHERE ");
        sql.push_str(predicate);
    }
    sql.push_str(" ORDER BY ");
    sql.push_str(order_by);
    Ok(sql)
}

/// Source of table rows for the multi-table export.
#[async_trait]
pub trait TableSource: Send + Sync {
    /// Reads every row of `table` matching `filter`, ordered by `order_by`.
    ///
    /// `filter` is a raw clause; blank means no filter. Clauses outside the
    /// allow-list fail before any query is issued.
    async fn extract(
        &self,
        table: &str,
        filter: &str,
        order_by: &str,
        cancel: &CancellationToken,
    ) -> Result<Extraction>;
}

/// [`TableSource`] over a PostgreSQL pool.
#[derive(Clone)]
pub struct PgExtractor {
    pool: PgPool,
}

impl PgExtractor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TableSource for PgExtractor {
    #[instrument(skip(self, cancel))]
    async fn extract(
        &self,
        table: &str,
        filter: &str,
        order_by: &str,
        cancel: &CancellationToken,
    ) -> Result<Extraction> {
        let predicate = allowed_predicate(filter)?;
        let sql = build_select(table, predicate, order_by)?;
        debug!(%sql, "Extracting table");

        let started = Instant::now();
        let (columns, rows) = guard(cancel, "extract", async {
            let mut stream = sqlx::query(&sql).fetch(&self.pool);
            let mut columns = Vec::new();
            let mut rows = Vec::new();

            while let Some(row) = stream.try_next().await? {
                if columns.is_empty() {
                    columns = column_names(&row);
                }
                rows.push(decode_row(&row)?);
                if rows.len() % PROGRESS_EVERY == 0 {
                    info!(table, rows = rows.len(), "Extraction progress");
                }
            }

            Ok::<_, SyncError>((columns, rows))
        })
        .await?;

        info!(
            table,
            rows = rows.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Extracted table"
        );

        Ok(Extraction {
            table: table.to_string(),
            columns,
            rows,
        })
    }
}
