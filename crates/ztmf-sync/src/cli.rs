//! Command-line surface of the `ztmf-sync` binary.

use crate::error::{Result, SyncError};
use crate::event::{parse_invocation, validate_key, EventSync, Invocation, TriggerType};
use crate::sync::{FileRequest, TablesRequest, WarehouseRequest};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

#[derive(Parser, Debug)]
#[command(name = "ztmf-sync")]
#[command(author, version, about = "ZTMF data synchronization", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Debug-level console logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Cancel the sync after this many seconds (overrides SYNC_TIMEOUT_SECS)
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export registered tables from the ZTMF database to the warehouse
    Tables {
        /// Origin or destination table name; repeat for several (default: all)
        #[arg(long = "table")]
        tables: Vec<String>,

        /// Truncate each destination table before loading
        #[arg(long)]
        full_refresh: bool,

        /// Perform every write, then roll back
        #[arg(long)]
        dry_run: bool,

        #[arg(long, value_enum, default_value_t = TriggerType::Manual)]
        trigger: TriggerType,
    },

    /// Load a CFACTS CSV drop file into cfacts_systems
    CfactsFile {
        #[arg(long)]
        bucket: String,

        /// Object key under incoming/, ending in .csv
        #[arg(long)]
        key: String,

        #[arg(long)]
        dry_run: bool,
    },

    /// Load cfacts_systems from the warehouse view
    CfactsWarehouse {
        #[arg(long)]
        dry_run: bool,

        #[arg(long, value_enum, default_value_t = TriggerType::Manual)]
        trigger: TriggerType,
    },

    /// Run the sync described by a JSON invocation event
    Event {
        /// Event file; reads stdin when omitted
        #[arg(long)]
        file: Option<PathBuf>,

        /// Sync driven by events that do not name a file
        #[arg(long, value_enum, default_value_t = EventSync::Tables)]
        sync: EventSync,
    },
}

impl Commands {
    /// Turns the parsed command into an [`Invocation`].
    pub async fn into_invocation(self, environment: &str) -> Result<Invocation> {
        match self {
            Commands::Tables {
                tables,
                full_refresh,
                dry_run,
                trigger,
            } => {
                reject_s3(trigger)?;
                Ok(Invocation::Tables(TablesRequest {
                    tables,
                    full_refresh,
                    dry_run,
                    trigger,
                }))
            },
            Commands::CfactsFile { bucket, key, dry_run } => {
                validate_key(&key)?;
                Ok(Invocation::File(FileRequest {
                    bucket,
                    key,
                    dry_run,
                    trigger: TriggerType::Manual,
                }))
            },
            Commands::CfactsWarehouse { dry_run, trigger } => {
                reject_s3(trigger)?;
                Ok(Invocation::Warehouse(WarehouseRequest { dry_run, trigger }))
            },
            Commands::Event { file, sync } => {
                let json = match file {
                    Some(path) => tokio::fs::read(&path).await?,
                    None => {
                        let mut buf = Vec::new();
                        tokio::io::stdin().read_to_end(&mut buf).await?;
                        buf
                    },
                };
                parse_invocation(&json, environment, sync)
            },
        }
    }
}

fn reject_s3(trigger: TriggerType) -> Result<()> {
    if trigger == TriggerType::S3 {
        return Err(SyncError::InvalidEvent(
            "trigger s3 is only valid for file syncs".to_string(),
        ));
    }
    Ok(())
}
