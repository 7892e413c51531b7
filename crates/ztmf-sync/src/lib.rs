//! ZTMF Sync Library
//!
//! Moves data between the ZTMF PostgreSQL database, the analytics warehouse and
//! the CFACTS drop bucket.
//!
//! # Sync paths
//!
//! - **CFACTS file**: a CSV in `incoming/` is parsed, validated and swapped
//!   into `cfacts_systems` in one transaction, then archived under
//!   `processed/<date>/`
//! - **CFACTS warehouse**: the same load, fed from a warehouse view
//! - **Tables**: every registered table is extracted and reloaded into its
//!   warehouse counterpart, one transaction per table
//!
//! Every path supports a dry run that performs all writes and rolls them back,
//! and every path reports its outcome to a chat webhook when one is configured.
//!
//! # Example
//!
//! ```no_run
//! use tokio_util::sync::CancellationToken;
//! use ztmf_sync::{config::Config, event::{EventSync, parse_invocation}, runner};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let invocation = parse_invocation(br#"{"triggerType":"manual","dryRun":true}"#, &config.environment, EventSync::Tables)?;
//! let result = runner::run(&config, &invocation, &CancellationToken::new()).await?;
//! tracing::info!(summary = %result.summary(), "done");
//! # Ok(())
//! # }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod cancel;
pub mod cfacts;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod export;
pub mod load;
pub mod notify;
pub mod runner;
pub mod storage;
pub mod sync;
pub mod value;

pub use error::{Result, SyncError};
