//! In-memory stand-ins for the stores, so sync behavior can be checked without
//! any infrastructure.
//!
//! - [`FakeTarget`]: a [`LoadTarget`] that stages writes per transaction and
//!   only publishes them on commit, recording every statement
//! - [`MemoryStore`]: an [`ObjectStore`] over a map
//! - [`FakeSource`]: a [`TableSource`] serving canned extractions
//! - [`FakeCfacts`]: a [`CfactsSource`] serving canned records

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use ztmf_sync::cfacts::CfactsSystem;
use ztmf_sync::error::{Result, SyncError};
use ztmf_sync::export::{Extraction, TableSource};
use ztmf_sync::load::target::{LoadTarget, LoadTransaction};
use ztmf_sync::storage::ObjectStore;
use ztmf_sync::sync::CfactsSource;
use ztmf_sync::value::{Row, SqlValue};

pub type Rows = Vec<Vec<SqlValue>>;

// ============================================================================
// Load target
// ============================================================================

/// Operation seen by a [`FakeTarget`], in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Begin,
    Truncate(String),
    Insert { table: String, rows: usize },
    Commit,
    Rollback,
}

#[derive(Default)]
struct TargetState {
    tables: BTreeMap<String, Rows>,
    ops: Vec<Op>,
    inserts: usize,
    /// Fail the n-th insert statement (1-based, counted across transactions)
    fail_insert: Option<usize>,
    /// Report one row fewer than inserted
    short_count: bool,
    /// Cancel this token after the n-th insert statement
    cancel_after: Option<(usize, CancellationToken)>,
    fail_tables: HashSet<String>,
}

#[derive(Clone, Default)]
pub struct FakeTarget {
    state: Arc<Mutex<TargetState>>,
}

impl FakeTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populates `table` as if committed earlier.
    pub fn seed(&self, table: &str, rows: Rows) {
        self.state.lock().unwrap().tables.insert(table.to_string(), rows);
    }

    pub fn fail_insert(&self, n: usize) {
        self.state.lock().unwrap().fail_insert = Some(n);
    }

    /// Every insert into `table` fails.
    pub fn fail_table(&self, table: &str) {
        self.state.lock().unwrap().fail_tables.insert(table.to_string());
    }

    pub fn short_count(&self) {
        self.state.lock().unwrap().short_count = true;
    }

    pub fn cancel_after(&self, n: usize, token: CancellationToken) {
        self.state.lock().unwrap().cancel_after = Some((n, token));
    }

    /// Committed contents of `table`.
    pub fn rows(&self, table: &str) -> Rows {
        self.state.lock().unwrap().tables.get(table).cloned().unwrap_or_default()
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.state.lock().unwrap().tables.contains_key(table)
    }

    pub fn ops(&self) -> Vec<Op> {
        self.state.lock().unwrap().ops.clone()
    }

    /// Row counts of each insert statement, in order.
    pub fn statement_sizes(&self) -> Vec<usize> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Insert { rows, .. } => Some(rows),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, op: &Op) -> usize {
        self.ops().iter().filter(|o| *o == op).count()
    }
}

#[async_trait]
impl LoadTarget for FakeTarget {
    fn name(&self) -> &str {
        "fake"
    }

    async fn begin(&self) -> Result<Box<dyn LoadTransaction>> {
        self.state.lock().unwrap().ops.push(Op::Begin);
        Ok(Box::new(FakeTransaction {
            state: Arc::clone(&self.state),
            staged: BTreeMap::new(),
        }))
    }
}

struct FakeTransaction {
    state: Arc<Mutex<TargetState>>,
    staged: BTreeMap<String, Rows>,
}

impl FakeTransaction {
    fn staged_table(&mut self, table: &str) -> &mut Rows {
        if !self.staged.contains_key(table) {
            let current = self.state.lock().unwrap().tables.get(table).cloned().unwrap_or_default();
            self.staged.insert(table.to_string(), current);
        }
        self.staged.get_mut(table).unwrap()
    }
}

#[async_trait]
impl LoadTransaction for FakeTransaction {
    async fn truncate(&mut self, table: &str) -> Result<Option<u64>> {
        let staged = self.staged_table(table);
        let deleted = staged.len() as u64;
        staged.clear();
        self.state.lock().unwrap().ops.push(Op::Truncate(table.to_string()));
        Ok(Some(deleted))
    }

    async fn insert(&mut self, table: &str, columns: &[String], rows: &[Vec<SqlValue>]) -> Result<u64> {
        assert!(rows.iter().all(|r| r.len() == columns.len()), "row shape");

        let (fail, short) = {
            let mut state = self.state.lock().unwrap();
            state.inserts += 1;
            let n = state.inserts;
            state.ops.push(Op::Insert {
                table: table.to_string(),
                rows: rows.len(),
            });
            if let Some((after, token)) = &state.cancel_after {
                if n >= *after {
                    token.cancel();
                }
            }
            let fail = state.fail_insert == Some(n) || state.fail_tables.contains(table);
            (fail, state.short_count)
        };

        if fail {
            return Err(SyncError::Storage(format!("injected failure inserting into {table}")));
        }

        self.staged_table(table).extend(rows.iter().cloned());
        let reported = rows.len() as u64;
        Ok(if short { reported.saturating_sub(1) } else { reported })
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        for (table, rows) in self.staged {
            state.tables.insert(table, rows);
        }
        state.ops.push(Op::Commit);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.state.lock().unwrap().ops.push(Op::Rollback);
        Ok(())
    }
}

// ============================================================================
// Object store
// ============================================================================

#[derive(Clone, Default)]
pub struct MemoryStore {
    objects: Arc<Mutex<BTreeMap<(String, String), Vec<u8>>>>,
    fail_copy: Arc<Mutex<bool>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), body.into());
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.objects
            .lock()
            .unwrap()
            .contains_key(&(bucket.to_string(), key.to_string()))
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    pub fn fail_copies(&self) {
        *self.fail_copy.lock().unwrap() = true;
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| SyncError::Storage(format!("no such key s3://{bucket}/{key}")))
    }

    async fn copy(&self, bucket: &str, source_key: &str, dest_key: &str) -> Result<()> {
        if *self.fail_copy.lock().unwrap() {
            return Err(SyncError::Storage("injected copy failure".into()));
        }
        let body = self.get(bucket, source_key).await?;
        self.put(bucket, dest_key, body);
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.objects
            .lock()
            .unwrap()
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}

// ============================================================================
// Sources
// ============================================================================

#[derive(Clone, Default)]
pub struct FakeSource {
    tables: Arc<Mutex<BTreeMap<String, Extraction>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    calls: Arc<Mutex<Vec<(String, String)>>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, extraction: Extraction) -> Self {
        self.tables
            .lock()
            .unwrap()
            .insert(extraction.table.clone(), extraction);
        self
    }

    pub fn failing(self, table: &str) -> Self {
        self.failing.lock().unwrap().insert(table.to_string());
        self
    }

    /// `(table, filter)` of every extract call.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TableSource for FakeSource {
    async fn extract(
        &self,
        table: &str,
        filter: &str,
        _order_by: &str,
        _cancel: &CancellationToken,
    ) -> Result<Extraction> {
        self.calls
            .lock()
            .unwrap()
            .push((table.to_string(), filter.to_string()));
        if self.failing.lock().unwrap().contains(table) {
            return Err(SyncError::Storage(format!("injected extract failure for {table}")));
        }
        Ok(self
            .tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_else(|| Extraction {
                table: table.to_string(),
                ..Extraction::default()
            }))
    }
}

pub struct FakeCfacts {
    pub records: Vec<CfactsSystem>,
}

#[async_trait]
impl CfactsSource for FakeCfacts {
    fn describe(&self) -> String {
        "CFACTS_SYSTEMS_V".to_string()
    }

    async fn fetch_records(&self, _cancel: &CancellationToken) -> Result<Vec<CfactsSystem>> {
        Ok(self.records.clone())
    }
}

// ============================================================================
// Data builders
// ============================================================================

pub const CSV_HEADER: &str = "FISMA_UUID,FISMA_ACRONYM,AUTHORIZATION_PACKAGE_NAME,PRIMARY_ISSO_NAME,\
PRIMARY_ISSO_EMAIL,IS_ACTIVE,IS_RETIRED,IS_DECOMMISSIONED,LIFECYCLE_PHASE,COMPONENT_ACRONYM,\
DIVISION_NAME,GROUP_ACRONYM,GROUP_NAME,ATO_EXPIRATION_DATE,DECOMMISSION_DATE,LAST_MODIFIED_DATE";

/// A full-width CFACTS export with `n` valid rows.
pub fn cfacts_csv(n: usize) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for i in 0..n {
        out.push_str(&format!(
            "uuid-{i:04},SYS{i},Package {i},\"\"\"Doe, Jane\"\"\",isso{i}@example.gov,true,false,0,\
             Operate,OIT,Division {i},GRP,Group {i},2026-09-30 00:00:00.000000,,2025-01-15T10:00:00Z\n"
        ));
    }
    out
}

pub fn cfacts_record(i: usize) -> CfactsSystem {
    CfactsSystem {
        fisma_uuid: format!("uuid-{i:04}"),
        fisma_acronym: format!("SYS{i}"),
        authorization_package_name: None,
        primary_isso_name: None,
        primary_isso_email: None,
        is_active: Some(true),
        is_retired: None,
        is_decommissioned: None,
        lifecycle_phase: None,
        component_acronym: None,
        division_name: None,
        group_acronym: None,
        group_name: None,
        ato_expiration_date: None,
        decommission_date: None,
        last_modified_date: None,
    }
}

/// `n` rows of `(id, name)` for `table`.
pub fn extraction(table: &str, n: usize) -> Extraction {
    let rows = (0..n)
        .map(|i| {
            let mut row = Row::new();
            row.insert("id".to_string(), SqlValue::Int(i as i64));
            row.insert("name".to_string(), SqlValue::Text(format!("{table}-{i}")));
            row
        })
        .collect();
    Extraction {
        table: table.to_string(),
        columns: vec!["id".to_string(), "name".to_string()],
        rows,
    }
}

/// `n` rows with `width` integer columns.
pub fn wide_rows(n: usize, width: usize) -> (Vec<String>, Rows) {
    let columns = (0..width).map(|c| format!("c{c}")).collect();
    let rows = (0..n)
        .map(|i| (0..width).map(|c| SqlValue::Int((i * width + c) as i64)).collect())
        .collect();
    (columns, rows)
}
