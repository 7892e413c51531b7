//! CFACTS records read from a warehouse view.
//!
//! The query names every known column explicitly and casts each one to text,
//! so rows scan into nullable strings whatever the view's native types are.
//! Timestamps are rendered in one of the accepted layouts before coercion.

use super::mapping::{build_record, Field, FieldKind, RawFields};
use super::model::CfactsSystem;
use crate::cancel::guard;
use crate::error::{Result, RowLocator, SyncError};
use crate::export::registry::validate_identifier;
use futures::TryStreamExt;
use sqlx::{PgPool, Row as _};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Select-list expression for one field.
fn select_expr(field: Field) -> String {
    let source = field.source_name();
    match field.kind() {
        FieldKind::Timestamp => format!(
            "TO_CHAR(CAST({source} AS TIMESTAMP), 'YYYY-MM-DD HH24:MI:SS.US') AS {source}"
        ),
        _ => format!("CAST({source} AS VARCHAR) AS {source}"),
    }
}

/// `SELECT` statement for `view` covering [`Field::ALL`] in order.
pub fn view_query(view: &str) -> Result<String> {
    validate_identifier(view)?;
    let columns: Vec<String> = Field::ALL.iter().map(|f| select_expr(*f)).collect();
    Ok(format!("SELECT {} FROM {}", columns.join(", "), view))
}

/// One view row; cell `i` belongs to `Field::ALL[i]`.
struct ViewRow<'a>(&'a [Option<String>]);

impl RawFields for ViewRow<'_> {
    fn raw(&self, field: Field) -> Option<&str> {
        let idx = Field::ALL.iter().position(|f| *f == field)?;
        self.0.get(idx).and_then(|v| v.as_deref())
    }
}

/// Coerces scanned view rows into records. Row numbers start at 1.
pub fn rows_to_records(rows: &[Vec<Option<String>>]) -> Result<Vec<CfactsSystem>> {
    rows.iter()
        .enumerate()
        .map(|(i, cells)| build_record(&ViewRow(cells), RowLocator::Row(i as u64 + 1)))
        .collect()
}

#[derive(Clone)]
pub struct WarehouseView {
    pool: PgPool,
    query: String,
    view: String,
}

impl WarehouseView {
    pub fn new(pool: PgPool, view: impl Into<String>) -> Result<Self> {
        let view = view.into();
        let query = view_query(&view)?;
        Ok(Self { pool, query, view })
    }

    pub fn view(&self) -> &str {
        &self.view
    }

    #[instrument(skip(self, cancel), fields(view = %self.view))]
    pub async fn fetch(&self, cancel: &CancellationToken) -> Result<Vec<CfactsSystem>> {
        let rows = guard(cancel, "warehouse query", async {
            let mut stream = sqlx::query(&self.query).fetch(&self.pool);
            let mut rows = Vec::new();
            while let Some(row) = stream.try_next().await? {
                let cells = (0..Field::ALL.len())
                    .map(|idx| row.try_get::<Option<String>, _>(idx))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows.push(cells);
            }
            Ok::<_, SyncError>(rows)
        })
        .await?;

        let records = rows_to_records(&rows)?;
        info!(rows = records.len(), "Read CFACTS systems from warehouse view");
        Ok(records)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn row(uuid: &str, acronym: &str) -> Vec<Option<String>> {
        let mut cells = vec![None; Field::ALL.len()];
        cells[0] = Some(uuid.to_string());
        cells[1] = Some(acronym.to_string());
        cells
    }

    #[test]
    fn query_lists_every_column_explicitly() {
        let sql = view_query("BUS_ZEROTRUST.PRIVATE.CFACTS_SYSTEMS_V").unwrap();
        assert!(!sql.contains('*'));
        assert!(sql.starts_with("SELECT CAST(FISMA_UUID AS VARCHAR) AS FISMA_UUID"));
        assert!(sql.contains("TO_CHAR(CAST(LAST_MODIFIED_DATE AS TIMESTAMP)"));
        assert!(sql.ends_with("FROM BUS_ZEROTRUST.PRIVATE.CFACTS_SYSTEMS_V"));
        assert!(view_query("cfacts; DROP TABLE users").is_err());
    }

    #[test]
    fn rendered_timestamps_match_an_accepted_layout() {
        let mut cells = row("u-1", "ABC");
        cells[13] = Some("2025-09-30 00:00:00.000000".to_string());
        cells[5] = Some("true".to_string());
        let records = rows_to_records(&[cells]).unwrap();
        assert!(records[0].ato_expiration_date.is_some());
        assert_eq!(records[0].is_active, Some(true));
    }

    #[test]
    fn empty_uuid_reports_row_number() {
        let rows = vec![row("u-1", "A"), row("", "B")];
        let err = rows_to_records(&rows).unwrap_err();
        assert_eq!(err.to_string(), "row 2: FISMA_UUID is empty");
    }
}
