//! Relational store to warehouse, one table at a time.

use super::{PhaseTracker, SyncKind, SyncPhase, SyncResult, TableSyncResult};
use crate::error::{Result, SyncError};
use crate::event::TriggerType;
use crate::export::{select_tables, TableSource, TableSyncSpec};
use crate::load::{LoadReport, WarehouseLoader};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablesRequest {
    /// Origin table names; empty means every registered table
    pub tables: Vec<String>,
    pub full_refresh: bool,
    pub dry_run: bool,
    pub trigger: TriggerType,
}

pub struct TableSync {
    source: Arc<dyn TableSource>,
    loader: WarehouseLoader,
}

impl TableSync {
    pub fn new(source: Arc<dyn TableSource>, loader: WarehouseLoader) -> Self {
        Self { source, loader }
    }

    /// Syncs every selected table in registry order.
    ///
    /// A failed table is recorded and the next one still runs. Unknown table
    /// names fail the whole request before anything is read. Once `cancel`
    /// fires, the remaining tables are recorded as cancelled.
    #[instrument(skip(self, request, cancel), fields(trigger = %request.trigger, dry_run = request.dry_run))]
    pub async fn run(&self, request: &TablesRequest, cancel: &CancellationToken) -> Result<SyncResult> {
        let specs = select_tables(&request.tables)?;
        let started_at = Utc::now();
        let clock = Instant::now();

        info!(
            tables = specs.len(),
            full_refresh = request.full_refresh,
            "Starting table sync"
        );

        let mut results = Vec::with_capacity(specs.len());
        for spec in specs {
            if cancel.is_cancelled() {
                warn!(table = spec.origin, "Skipping table after cancellation");
                results.push(failed(spec, 0, Duration::ZERO, &SyncError::Cancelled("table sync")));
                continue;
            }
            results.push(self.sync_table(spec, request, cancel).await);
        }

        let result = SyncResult::new(
            SyncKind::Tables,
            started_at,
            clock.elapsed(),
            request.dry_run,
            results,
            None,
        );
        info!(summary = %result.summary(), "Table sync finished");
        Ok(result)
    }

    async fn sync_table(
        &self,
        spec: &TableSyncSpec,
        request: &TablesRequest,
        cancel: &CancellationToken,
    ) -> TableSyncResult {
        let mut phase = PhaseTracker::new(spec.origin);
        let clock = Instant::now();
        let mut extracted = 0u64;

        let outcome = async {
            phase.advance(SyncPhase::Extracting)?;
            let extraction = self
                .source
                .extract(spec.origin, spec.filter.unwrap_or(""), spec.order_by, cancel)
                .await?;
            extracted = extraction.len() as u64;

            phase.advance(SyncPhase::Validating)?;
            if !extraction.is_empty() && extraction.columns.is_empty() {
                return Err(SyncError::RowShape(format!(
                    "{} returned rows without column names",
                    spec.origin
                )));
            }

            phase.advance(SyncPhase::Loading)?;
            let report = self
                .loader
                .load_extraction(
                    spec.destination,
                    &extraction,
                    request.full_refresh,
                    request.dry_run,
                    cancel,
                )
                .await?;
            if report.rows_loaded != extracted {
                return Err(SyncError::RowCountMismatch {
                    table: spec.destination.to_string(),
                    expected: extracted,
                    actual: report.rows_loaded,
                });
            }

            phase.advance(SyncPhase::Skipped)?;
            Ok::<LoadReport, SyncError>(report)
        }
        .await;

        let result = match outcome {
            Ok(report) => {
                info!(
                    origin = spec.origin,
                    destination = spec.destination,
                    rows = report.rows_loaded,
                    committed = report.committed,
                    "Table synced"
                );
                TableSyncResult {
                    origin: spec.origin.to_string(),
                    destination: spec.destination.to_string(),
                    rows_extracted: extracted,
                    rows_loaded: report.rows_loaded,
                    duration: clock.elapsed(),
                    error: None,
                    events: report.events,
                }
            },
            Err(e) => {
                phase.fail();
                error!(origin = spec.origin, destination = spec.destination, error = %e, "Table sync failed");
                failed(spec, extracted, clock.elapsed(), &e)
            },
        };
        phase.finish();
        result
    }
}

fn failed(spec: &TableSyncSpec, extracted: u64, duration: Duration, error: &SyncError) -> TableSyncResult {
    TableSyncResult {
        origin: spec.origin.to_string(),
        destination: spec.destination.to_string(),
        rows_extracted: extracted,
        rows_loaded: 0,
        duration,
        error: Some(error.to_string()),
        events: Vec::new(),
    }
}
