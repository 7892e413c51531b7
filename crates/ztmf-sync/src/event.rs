//! Invocation events.
//!
//! Accepted shapes:
//!
//! * object-storage notification: `{"Records": [{"s3": {"bucket": {"name": ..}, "object": {"key": ..}}}]}`
//! * manual file event: `{"bucket": .., "key": .., "dryRun": .., "triggerType": "s3" | "manual"}`
//! * scheduler heartbeat: `{"detail-type": "Scheduled Event", ..}`
//! * table or warehouse event: `{"triggerType": .., "tables": [..], "fullRefresh": .., "dryRun": ..}`
//!
//! Keys may be camelCase or snake_case.

use crate::error::{Result, SyncError};
use crate::sync::{FileRequest, TablesRequest, WarehouseRequest};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const INCOMING_PREFIX: &str = "incoming/";
pub const CSV_SUFFIX: &str = ".csv";
const SCHEDULED_DETAIL_TYPE: &str = "Scheduled Event";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TriggerType {
    S3,
    Manual,
    Scheduled,
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TriggerType::S3 => "s3",
            TriggerType::Manual => "manual",
            TriggerType::Scheduled => "scheduled",
        };
        f.write_str(s)
    }
}

/// Which sync a non-file event drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum EventSync {
    #[default]
    Tables,
    CfactsWarehouse,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    File(FileRequest),
    Tables(TablesRequest),
    Warehouse(WarehouseRequest),
}

impl Invocation {
    pub fn dry_run(&self) -> bool {
        match self {
            Invocation::File(r) => r.dry_run,
            Invocation::Tables(r) => r.dry_run,
            Invocation::Warehouse(r) => r.dry_run,
        }
    }

    pub fn trigger(&self) -> TriggerType {
        match self {
            Invocation::File(r) => r.trigger,
            Invocation::Tables(r) => r.trigger,
            Invocation::Warehouse(r) => r.trigger,
        }
    }
}

/// Rejects keys outside `incoming/*.csv`.
pub fn validate_key(key: &str) -> Result<()> {
    if key.starts_with(INCOMING_PREFIX) && key.ends_with(CSV_SUFFIX) {
        Ok(())
    } else {
        Err(SyncError::InvalidKey(key.to_string()))
    }
}

fn is_prod(environment: &str) -> bool {
    environment.eq_ignore_ascii_case("prod")
}

#[derive(Debug, Deserialize)]
struct BucketRef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ObjectRef {
    key: String,
}

#[derive(Debug, Deserialize)]
struct S3Entity {
    bucket: BucketRef,
    object: ObjectRef,
}

#[derive(Debug, Deserialize)]
struct S3Record {
    s3: S3Entity,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawEvent {
    #[serde(rename = "Records")]
    records: Vec<S3Record>,
    bucket: Option<String>,
    key: Option<String>,
    #[serde(alias = "triggerType")]
    trigger_type: Option<TriggerType>,
    tables: Vec<String>,
    #[serde(alias = "fullRefresh")]
    full_refresh: bool,
    #[serde(alias = "dryRun")]
    dry_run: Option<bool>,
    #[serde(rename = "detail-type")]
    detail_type: Option<String>,
}

/// Parses a JSON invocation event.
///
/// `environment` decides the dry-run default of scheduler heartbeats (dry run
/// everywhere but `prod`); `sync` picks the path for events that do not name
/// a file.
pub fn parse_invocation(json: &[u8], environment: &str, sync: EventSync) -> Result<Invocation> {
    let raw: RawEvent =
        serde_json::from_slice(json).map_err(|e| SyncError::InvalidEvent(e.to_string()))?;

    if let Some(record) = raw.records.first() {
        let request = FileRequest {
            bucket: record.s3.bucket.name.clone(),
            key: record.s3.object.key.clone(),
            dry_run: false,
            trigger: TriggerType::S3,
        };
        validate_key(&request.key)?;
        return Ok(Invocation::File(request));
    }

    if raw.bucket.is_some() || raw.key.is_some() {
        return file_event(raw);
    }

    let scheduled = raw.detail_type.as_deref() == Some(SCHEDULED_DETAIL_TYPE);
    let (trigger, dry_run) = if scheduled {
        (TriggerType::Scheduled, !is_prod(environment))
    } else {
        match (raw.trigger_type, sync) {
            (Some(trigger), _) => (trigger, raw.dry_run.unwrap_or(false)),
            // An empty test event against the warehouse view stays harmless outside prod.
            (None, EventSync::CfactsWarehouse) => {
                (TriggerType::Manual, raw.dry_run.unwrap_or(!is_prod(environment)))
            },
            (None, EventSync::Tables) => (TriggerType::Manual, raw.dry_run.unwrap_or(false)),
        }
    };

    if trigger == TriggerType::S3 {
        return Err(SyncError::InvalidEvent(
            "trigger type s3 requires a bucket and key".to_string(),
        ));
    }

    Ok(match sync {
        EventSync::Tables => Invocation::Tables(TablesRequest {
            tables: if scheduled { Vec::new() } else { raw.tables },
            full_refresh: !scheduled && raw.full_refresh,
            dry_run,
            trigger,
        }),
        EventSync::CfactsWarehouse => Invocation::Warehouse(WarehouseRequest { dry_run, trigger }),
    })
}

fn file_event(raw: RawEvent) -> Result<Invocation> {
    let bucket = raw.bucket.unwrap_or_default();
    let key = raw.key.unwrap_or_default();
    if bucket.trim().is_empty() || key.trim().is_empty() {
        return Err(SyncError::InvalidEvent(
            "file events need both bucket and key".to_string(),
        ));
    }

    let trigger = raw.trigger_type.unwrap_or(TriggerType::Manual);
    if trigger == TriggerType::Scheduled {
        return Err(SyncError::InvalidEvent(
            "file events must use trigger type s3 or manual".to_string(),
        ));
    }
    validate_key(&key)?;

    Ok(Invocation::File(FileRequest {
        bucket,
        key,
        dry_run: raw.dry_run.unwrap_or(false),
        trigger,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<Invocation> {
        parse_invocation(json.as_bytes(), "dev", EventSync::Tables)
    }

    #[test]
    fn key_validation() {
        assert!(validate_key("incoming/cfacts.csv").is_ok());
        assert!(validate_key("incoming/2026/q1.csv").is_ok());
        assert!(validate_key("processed/cfacts.csv").is_err());
        assert!(validate_key("incoming/cfacts.txt").is_err());
        assert!(validate_key("cfacts.csv").is_err());
    }

    #[test]
    fn storage_notification_is_a_live_s3_run() {
        let invocation = parse(
            r#"{"Records":[{"eventName":"ObjectCreated:Put","s3":{"bucket":{"name":"drops"},"object":{"key":"incoming/cfacts.csv","size":10}}}]}"#,
        )
        .unwrap();
        assert_eq!(
            invocation,
            Invocation::File(FileRequest {
                bucket: "drops".into(),
                key: "incoming/cfacts.csv".into(),
                dry_run: false,
                trigger: TriggerType::S3,
            })
        );
    }

    #[test]
    fn manual_file_event_in_either_case() {
        let camel = parse(r#"{"bucket":"b","key":"incoming/x.csv","dryRun":true}"#).unwrap();
        let snake =
            parse(r#"{"bucket":"b","key":"incoming/x.csv","dry_run":true,"trigger_type":"manual"}"#)
                .unwrap();
        assert_eq!(camel, snake);
        assert!(camel.dry_run());
        assert_eq!(camel.trigger(), TriggerType::Manual);
    }

    #[test]
    fn bad_file_events() {
        let err = parse(r#"{"bucket":"b","key":"outgoing/x.csv"}"#).unwrap_err();
        assert!(matches!(err, SyncError::InvalidKey(_)));
        assert!(matches!(parse(r#"{"bucket":"b"}"#).unwrap_err(), SyncError::InvalidEvent(_)));
        assert!(matches!(parse("not json").unwrap_err(), SyncError::InvalidEvent(_)));
        assert!(matches!(
            parse(r#"{"triggerType":"weekly"}"#).unwrap_err(),
            SyncError::InvalidEvent(_)
        ));
    }

    #[test]
    fn table_event() {
        let invocation = parse(
            r#"{"triggerType":"manual","tables":["scores","ZTMF_USERS"],"fullRefresh":true,"dryRun":false}"#,
        )
        .unwrap();
        assert_eq!(
            invocation,
            Invocation::Tables(TablesRequest {
                tables: vec!["scores".into(), "ZTMF_USERS".into()],
                full_refresh: true,
                dry_run: false,
                trigger: TriggerType::Manual,
            })
        );
    }

    #[test]
    fn scheduled_heartbeat_dry_runs_outside_prod() {
        let heartbeat = r#"{"version":"0","detail-type":"Scheduled Event","source":"aws.events","detail":{}}"#;

        let dev = parse_invocation(heartbeat.as_bytes(), "dev", EventSync::Tables).unwrap();
        assert_eq!(
            dev,
            Invocation::Tables(TablesRequest {
                tables: vec![],
                full_refresh: false,
                dry_run: true,
                trigger: TriggerType::Scheduled,
            })
        );

        let prod = parse_invocation(heartbeat.as_bytes(), "prod", EventSync::CfactsWarehouse).unwrap();
        assert_eq!(
            prod,
            Invocation::Warehouse(WarehouseRequest {
                dry_run: false,
                trigger: TriggerType::Scheduled,
            })
        );
    }

    #[test]
    fn empty_warehouse_event_defaults_to_dry_run_outside_prod() {
        let dev = parse_invocation(b"{}", "dev", EventSync::CfactsWarehouse).unwrap();
        assert!(dev.dry_run());
        let prod = parse_invocation(b"{}", "prod", EventSync::CfactsWarehouse).unwrap();
        assert!(!prod.dry_run());
        assert!(!parse("{}").unwrap().dry_run());
    }
}
