//! Multi-table export from the relational store.

pub mod extractor;
pub mod registry;

pub use extractor::{Extraction, PgExtractor, TableSource};
pub use registry::{select_tables, TableSyncSpec, TABLE_REGISTRY};
