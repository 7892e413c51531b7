//! Write-side seam between the loaders and a concrete database.

use crate::error::{Result, SyncError};
use crate::value::SqlValue;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::debug;

/// A store the loaders can open transactions against.
#[async_trait]
pub trait LoadTarget: Send + Sync {
    /// Label used in logs and connection errors.
    fn name(&self) -> &str;

    async fn begin(&self) -> Result<Box<dyn LoadTransaction>>;
}

/// One open transaction.
///
/// Dropping it without calling [`commit`](LoadTransaction::commit) must
/// discard every write.
#[async_trait]
pub trait LoadTransaction: Send {
    /// Removes all rows of `table`. Returns the deleted count when the store
    /// reports one.
    async fn truncate(&mut self, table: &str) -> Result<Option<u64>>;

    /// Inserts `rows` with one multi-row statement and returns the affected
    /// row count reported by the store.
    async fn insert(&mut self, table: &str, columns: &[String], rows: &[Vec<SqlValue>]) -> Result<u64>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// [`LoadTarget`] backed by a PostgreSQL-protocol pool.
#[derive(Clone)]
pub struct PgTarget {
    name: String,
    pool: PgPool,
}

impl PgTarget {
    pub fn new(name: impl Into<String>, pool: PgPool) -> Self {
        Self {
            name: name.into(),
            pool,
        }
    }
}

#[async_trait]
impl LoadTarget for PgTarget {
    fn name(&self) -> &str {
        &self.name
    }

    async fn begin(&self) -> Result<Box<dyn LoadTransaction>> {
        let tx = self.pool.begin().await?;
        debug!(target_store = %self.name, "Transaction opened");
        Ok(Box::new(PgLoadTransaction { tx }))
    }
}

struct PgLoadTransaction {
    tx: Transaction<'static, Postgres>,
}

/// `INSERT INTO <table> (<columns>) VALUES (...), (...)` for `rows`.
///
/// Identifiers must already be validated by the caller.
pub fn insert_statement<'args>(
    table: &str,
    columns: &[String],
    rows: &'args [Vec<SqlValue>],
) -> QueryBuilder<'args, Postgres> {
    let mut builder =
        QueryBuilder::<Postgres>::new(format!("INSERT INTO {} ({}) ", table, columns.join(", ")));
    builder.push_values(rows, |mut b, row| {
        for value in row {
            value.push_to(&mut b);
        }
    });
    builder
}

#[async_trait]
impl LoadTransaction for PgLoadTransaction {
    async fn truncate(&mut self, table: &str) -> Result<Option<u64>> {
        // PostgreSQL reports 0 affected rows for TRUNCATE, so no count is returned.
        sqlx::query(&format!("TRUNCATE TABLE {table}"))
            .execute(&mut *self.tx)
            .await?;
        Ok(None)
    }

    async fn insert(&mut self, table: &str, columns: &[String], rows: &[Vec<SqlValue>]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(SyncError::RowShape(format!(
                "{} values for {} columns of {table}",
                bad.len(),
                columns.len()
            )));
        }

        let mut builder = insert_statement(table, columns, rows);
        let result = builder.build().execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let PgLoadTransaction { tx } = *self;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let PgLoadTransaction { tx } = *self;
        tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn insert_statement_shape() {
        let columns = vec!["fisma_uuid".to_string(), "is_active".to_string()];
        let rows = vec![
            vec![SqlValue::from("a"), SqlValue::Null],
            vec![SqlValue::from("b"), SqlValue::Bool(true)],
        ];
        let builder = insert_statement("cfacts_systems", &columns, &rows);
        assert_eq!(
            builder.sql(),
            "INSERT INTO cfacts_systems (fisma_uuid, is_active) VALUES ($1, NULL), ($2, $3)"
        );
    }
}
