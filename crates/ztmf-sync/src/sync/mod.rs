//! Sync orchestration.
//!
//! Each path walks one [`PhaseTracker`] through
//! `Idle -> Extracting -> Validating -> Loading -> (Archiving | Skipped) -> Reporting -> Done`,
//! dropping to `Failed -> Reporting -> Done` on a hard error. The multi-table
//! path runs one tracker per table and keeps going after a table fails; the
//! CFACTS paths abort on the first error.

pub mod cfacts;
pub mod tables;

pub use cfacts::{CfactsFileSync, CfactsSource, CfactsWarehouseSync, FileRequest, WarehouseRequest};
pub use tables::{TableSync, TablesRequest};

use crate::error::{Result, SyncError};
use crate::load::WriteEvent;
use crate::notify::message::{format_duration, format_number};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    Extracting,
    Validating,
    Loading,
    Archiving,
    Skipped,
    Reporting,
    Done,
    Failed,
}

impl SyncPhase {
    pub fn can_advance_to(self, next: SyncPhase) -> bool {
        use SyncPhase::*;
        matches!(
            (self, next),
            (Idle, Extracting)
                | (Extracting, Validating)
                | (Validating, Loading)
                | (Loading, Archiving)
                | (Loading, Skipped)
                | (Archiving, Reporting)
                | (Skipped, Reporting)
                | (Reporting, Done)
                | (Extracting, Failed)
                | (Validating, Failed)
                | (Loading, Failed)
                | (Failed, Reporting)
        )
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Current phase of one sync unit, with logged transitions.
#[derive(Debug)]
pub struct PhaseTracker {
    unit: String,
    phase: SyncPhase,
}

impl PhaseTracker {
    pub fn new(unit: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            phase: SyncPhase::Idle,
        }
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn advance(&mut self, next: SyncPhase) -> Result<()> {
        if !self.phase.can_advance_to(next) {
            return Err(SyncError::InvalidTransition {
                from: self.phase.to_string(),
                to: next.to_string(),
            });
        }
        debug!(unit = %self.unit, from = %self.phase, to = %next, "Phase transition");
        self.phase = next;
        Ok(())
    }

    /// Moves to `Failed` if the current phase allows it.
    pub fn fail(&mut self) {
        if self.advance(SyncPhase::Failed).is_err() {
            warn!(unit = %self.unit, phase = %self.phase, "Failure outside a failable phase");
        }
    }

    /// `Reporting` then `Done`.
    pub fn finish(&mut self) {
        if self.advance(SyncPhase::Reporting).and_then(|_| self.advance(SyncPhase::Done)).is_err() {
            warn!(unit = %self.unit, phase = %self.phase, "Finished from an unexpected phase");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncKind {
    Tables,
    CfactsFile,
    CfactsWarehouse,
}

impl SyncKind {
    /// Prefix of the trigger label shown in notifications.
    pub fn label(self) -> &'static str {
        match self {
            SyncKind::Tables => "tables",
            SyncKind::CfactsFile => "cfacts-s3",
            SyncKind::CfactsWarehouse => "cfacts-warehouse",
        }
    }
}

/// Outcome for one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSyncResult {
    pub origin: String,
    pub destination: String,
    pub rows_extracted: u64,
    pub rows_loaded: u64,
    pub duration: Duration,
    pub error: Option<String>,
    pub events: Vec<WriteEvent>,
}

impl TableSyncResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Immutable outcome of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncResult {
    kind: SyncKind,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    duration: Duration,
    dry_run: bool,
    tables: Vec<TableSyncResult>,
    total_rows: u64,
    error_count: usize,
    archived_to: Option<String>,
}

impl SyncResult {
    pub fn new(
        kind: SyncKind,
        started_at: DateTime<Utc>,
        duration: Duration,
        dry_run: bool,
        tables: Vec<TableSyncResult>,
        archived_to: Option<String>,
    ) -> Self {
        let total_rows = tables
            .iter()
            .filter(|t| t.is_success())
            .map(|t| t.rows_loaded)
            .sum();
        let error_count = tables.iter().filter(|t| !t.is_success()).count();
        let finished_at = started_at
            + chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero());

        Self {
            kind,
            started_at,
            finished_at,
            duration,
            dry_run,
            tables,
            total_rows,
            error_count,
            archived_to,
        }
    }

    pub fn kind(&self) -> SyncKind {
        self.kind
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn tables(&self) -> &[TableSyncResult] {
        &self.tables
    }

    /// Rows loaded by tables that succeeded.
    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn archived_to(&self) -> Option<&str> {
        self.archived_to.as_deref()
    }

    pub fn is_success(&self) -> bool {
        self.error_count == 0
    }

    pub fn status(&self) -> &'static str {
        match (self.is_success(), self.dry_run) {
            (false, _) => "COMPLETED WITH ERRORS",
            (true, true) => "DRY RUN COMPLETED",
            (true, false) => "COMPLETED",
        }
    }

    /// One-line summary such as `COMPLETED: 12 tables, 4,210 total rows, 0 errors, 3.1s`.
    pub fn summary(&self) -> String {
        format!(
            "{}: {} tables, {} total rows, {} errors, {}",
            self.status(),
            self.tables.len(),
            format_number(self.total_rows),
            self.error_count,
            format_duration(self.duration)
        )
    }
}
