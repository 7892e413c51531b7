//! ZTMF Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared plumbing for the ZTMF data-sync binaries.
//!
//! - **Logging**: `tracing` subscriber bootstrap driven by `LOG_*` variables
//! - **Environment**: typed lookups over process environment variables
//! - **Errors**: the common error type and result alias
//!
//! # Example
//!
//! ```no_run
//! use ztmf_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_logging(&LogConfig::from_env()?)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

pub mod env;
pub mod error;
pub mod logging;

pub use error::{Result, ZtmfError};
