//! CFACTS system inventory into the relational store.
//!
//! Two entry points share the load: a CSV drop file in object storage, or a
//! warehouse view. Both abort on the first error and never report partial
//! success.

use super::{PhaseTracker, SyncKind, SyncPhase, SyncResult, TableSyncResult};
use crate::cancel::guard;
use crate::cfacts::{parse_csv, CfactsSystem, WarehouseView};
use crate::error::{Result, SyncError};
use crate::event::{validate_key, TriggerType};
use crate::load::{LoadReport, RelationalLoader};
use crate::storage::{Archiver, ObjectStore};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRequest {
    pub bucket: String,
    pub key: String,
    pub dry_run: bool,
    pub trigger: TriggerType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarehouseRequest {
    pub dry_run: bool,
    pub trigger: TriggerType,
}

/// Anything that can produce the full CFACTS inventory.
#[async_trait]
pub trait CfactsSource: Send + Sync {
    /// Label used as the origin in results.
    fn describe(&self) -> String;

    async fn fetch_records(&self, cancel: &CancellationToken) -> Result<Vec<CfactsSystem>>;
}

#[async_trait]
impl CfactsSource for WarehouseView {
    fn describe(&self) -> String {
        self.view().to_string()
    }

    async fn fetch_records(&self, cancel: &CancellationToken) -> Result<Vec<CfactsSystem>> {
        self.fetch(cancel).await
    }
}

fn table_result(origin: String, extracted: usize, report: LoadReport) -> TableSyncResult {
    TableSyncResult {
        origin,
        destination: report.table,
        rows_extracted: extracted as u64,
        rows_loaded: report.rows_loaded,
        duration: report.duration,
        error: None,
        events: report.events,
    }
}

/// CSV drop file: download, parse, replace, archive.
pub struct CfactsFileSync {
    store: Arc<dyn ObjectStore>,
    loader: RelationalLoader,
    archiver: Archiver,
}

impl CfactsFileSync {
    pub fn new(store: Arc<dyn ObjectStore>, loader: RelationalLoader) -> Self {
        let archiver = Archiver::new(Arc::clone(&store));
        Self {
            store,
            loader,
            archiver,
        }
    }

    #[instrument(skip(self, request, cancel), fields(bucket = %request.bucket, key = %request.key, dry_run = request.dry_run))]
    pub async fn run(&self, request: &FileRequest, cancel: &CancellationToken) -> Result<SyncResult> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let mut phase = PhaseTracker::new(format!("s3://{}/{}", request.bucket, request.key));

        let loaded = self.extract_and_load(request, &mut phase, cancel).await;
        let (extracted, report) = match loaded {
            Ok(done) => done,
            Err(e) => {
                phase.fail();
                phase.finish();
                error!(error = %e, "CFACTS file sync failed");
                return Err(e);
            },
        };

        // The data is already committed here, so archive problems only warn.
        let archived_to = if request.dry_run {
            phase.advance(SyncPhase::Skipped)?;
            info!("Dry run: source file left in place");
            None
        } else {
            phase.advance(SyncPhase::Archiving)?;
            match self.archiver.archive(&request.bucket, &request.key, cancel).await {
                Ok(dest) => Some(dest),
                Err(e) => {
                    warn!(error = %e, "Failed to archive source file; data already synced");
                    None
                },
            }
        };

        let origin = format!("s3://{}/{}", request.bucket, request.key);
        let result = SyncResult::new(
            SyncKind::CfactsFile,
            started_at,
            clock.elapsed(),
            request.dry_run,
            vec![table_result(origin, extracted, report)],
            archived_to,
        );
        phase.finish();
        info!(summary = %result.summary(), "CFACTS file sync finished");
        Ok(result)
    }

    async fn extract_and_load(
        &self,
        request: &FileRequest,
        phase: &mut PhaseTracker,
        cancel: &CancellationToken,
    ) -> Result<(usize, LoadReport)> {
        phase.advance(SyncPhase::Extracting)?;
        validate_key(&request.key)?;
        let bytes = guard(cancel, "download", self.store.get(&request.bucket, &request.key)).await?;

        phase.advance(SyncPhase::Validating)?;
        let records = parse_csv(bytes.as_slice())?;
        info!(records = records.len(), bytes = bytes.len(), "Parsed CFACTS file");

        phase.advance(SyncPhase::Loading)?;
        let report = self.loader.replace_all(&records, request.dry_run, cancel).await?;
        Ok((records.len(), report))
    }
}

/// Warehouse view: fetch, replace.
pub struct CfactsWarehouseSync {
    source: Arc<dyn CfactsSource>,
    loader: RelationalLoader,
}

impl CfactsWarehouseSync {
    pub fn new(source: Arc<dyn CfactsSource>, loader: RelationalLoader) -> Self {
        Self { source, loader }
    }

    #[instrument(skip(self, request, cancel), fields(dry_run = request.dry_run))]
    pub async fn run(&self, request: &WarehouseRequest, cancel: &CancellationToken) -> Result<SyncResult> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let origin = self.source.describe();
        let mut phase = PhaseTracker::new(origin.clone());

        let outcome = async {
            phase.advance(SyncPhase::Extracting)?;
            let records = self.source.fetch_records(cancel).await?;

            // Rows were coerced while fetching; nothing further to check.
            phase.advance(SyncPhase::Validating)?;

            phase.advance(SyncPhase::Loading)?;
            let report = self.loader.replace_all(&records, request.dry_run, cancel).await?;
            phase.advance(SyncPhase::Skipped)?;
            Ok::<_, SyncError>((records.len(), report))
        }
        .await;

        let (extracted, report) = match outcome {
            Ok(done) => done,
            Err(e) => {
                phase.fail();
                phase.finish();
                error!(error = %e, "CFACTS warehouse sync failed");
                return Err(e);
            },
        };

        let result = SyncResult::new(
            SyncKind::CfactsWarehouse,
            started_at,
            clock.elapsed(),
            request.dry_run,
            vec![table_result(origin, extracted, report)],
            None,
        );
        phase.finish();
        info!(summary = %result.summary(), "CFACTS warehouse sync finished");
        Ok(result)
    }
}
