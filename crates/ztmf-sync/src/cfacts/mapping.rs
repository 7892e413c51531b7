//! CFACTS field list, source spellings and coercion rules.
//!
//! Both source adapters go through [`build_record`], so a CSV export and a
//! warehouse view row with the same content produce the same
//! [`CfactsSystem`].

use super::model::CfactsSystem;
use crate::error::{Result, RowLocator, SyncError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// How a raw cell is turned into a field value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Mandatory text; blank rejects the row
    Identifier,
    Text,
    /// Text that may arrive wrapped in extra `"` to protect embedded commas
    QuotedName,
    Flag,
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    FismaUuid,
    FismaAcronym,
    AuthorizationPackageName,
    PrimaryIssoName,
    PrimaryIssoEmail,
    IsActive,
    IsRetired,
    IsDecommissioned,
    LifecyclePhase,
    ComponentAcronym,
    DivisionName,
    GroupAcronym,
    GroupName,
    AtoExpirationDate,
    DecommissionDate,
    LastModifiedDate,
}

impl Field {
    pub const ALL: [Field; 16] = [
        Field::FismaUuid,
        Field::FismaAcronym,
        Field::AuthorizationPackageName,
        Field::PrimaryIssoName,
        Field::PrimaryIssoEmail,
        Field::IsActive,
        Field::IsRetired,
        Field::IsDecommissioned,
        Field::LifecyclePhase,
        Field::ComponentAcronym,
        Field::DivisionName,
        Field::GroupAcronym,
        Field::GroupName,
        Field::AtoExpirationDate,
        Field::DecommissionDate,
        Field::LastModifiedDate,
    ];

    pub const REQUIRED: [Field; 2] = [Field::FismaUuid, Field::FismaAcronym];

    /// Destination column in `cfacts_systems`.
    pub fn column(self) -> &'static str {
        match self {
            Field::FismaUuid => "fisma_uuid",
            Field::FismaAcronym => "fisma_acronym",
            Field::AuthorizationPackageName => "authorization_package_name",
            Field::PrimaryIssoName => "primary_isso_name",
            Field::PrimaryIssoEmail => "primary_isso_email",
            Field::IsActive => "is_active",
            Field::IsRetired => "is_retired",
            Field::IsDecommissioned => "is_decommissioned",
            Field::LifecyclePhase => "lifecycle_phase",
            Field::ComponentAcronym => "component_acronym",
            Field::DivisionName => "division_name",
            Field::GroupAcronym => "group_acronym",
            Field::GroupName => "group_name",
            Field::AtoExpirationDate => "ato_expiration_date",
            Field::DecommissionDate => "decommission_date",
            Field::LastModifiedDate => "last_modified_date",
        }
    }

    /// Spelling used by the CFACTS export header and the warehouse view.
    pub fn source_name(self) -> &'static str {
        match self {
            Field::FismaUuid => "FISMA_UUID",
            Field::FismaAcronym => "FISMA_ACRONYM",
            Field::AuthorizationPackageName => "AUTHORIZATION_PACKAGE_NAME",
            Field::PrimaryIssoName => "PRIMARY_ISSO_NAME",
            Field::PrimaryIssoEmail => "PRIMARY_ISSO_EMAIL",
            Field::IsActive => "IS_ACTIVE",
            Field::IsRetired => "IS_RETIRED",
            Field::IsDecommissioned => "IS_DECOMMISSIONED",
            Field::LifecyclePhase => "LIFECYCLE_PHASE",
            Field::ComponentAcronym => "COMPONENT_ACRONYM",
            Field::DivisionName => "DIVISION_NAME",
            Field::GroupAcronym => "GROUP_ACRONYM",
            Field::GroupName => "GROUP_NAME",
            Field::AtoExpirationDate => "ATO_EXPIRATION_DATE",
            Field::DecommissionDate => "DECOMMISSION_DATE",
            Field::LastModifiedDate => "LAST_MODIFIED_DATE",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            Field::FismaUuid | Field::FismaAcronym => FieldKind::Identifier,
            Field::PrimaryIssoName => FieldKind::QuotedName,
            Field::IsActive | Field::IsRetired | Field::IsDecommissioned => FieldKind::Flag,
            Field::AtoExpirationDate | Field::DecommissionDate | Field::LastModifiedDate => {
                FieldKind::Timestamp
            },
            _ => FieldKind::Text,
        }
    }

    /// Resolves a header cell to a field.
    ///
    /// Accepts the source spelling and the destination column name in any
    /// case, optionally quoted or prefixed by a byte-order mark.
    pub fn from_source(name: &str) -> Option<Field> {
        let normalized = normalize_header(name);
        Field::ALL
            .into_iter()
            .find(|f| f.source_name() == normalized)
    }
}

fn normalize_header(name: &str) -> String {
    name.trim_start_matches('\u{feff}')
        .trim()
        .trim_matches('"')
        .trim()
        .to_ascii_uppercase()
}

/// Boolean coercion: blank is absent, `true`/`1` (any case) is true, anything
/// else is false.
pub fn coerce_bool(raw: &str) -> Option<bool> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    Some(matches!(value.to_ascii_lowercase().as_str(), "true" | "1"))
}

/// Accepted timestamp layouts, tried in order. All are read as UTC.
pub const TIMESTAMP_LAYOUTS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.9f",
    "%Y-%m-%d %H:%M:%S%.6f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%d",
];

/// Parses a non-blank timestamp against [`TIMESTAMP_LAYOUTS`].
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let value = raw.trim();
    TIMESTAMP_LAYOUTS.iter().find_map(|layout| {
        let naive = if layout.contains("%H") {
            NaiveDateTime::parse_from_str(value, layout).ok()
        } else {
            NaiveDate::parse_from_str(value, layout)
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        };
        naive.map(|n| n.and_utc())
    })
}

/// Removes the `"` characters wrapping a name, keeping inner ones.
pub fn strip_wrapping_quotes(raw: &str) -> &str {
    raw.trim().trim_matches('"').trim()
}

/// Cell access for one source row.
pub trait RawFields {
    /// Raw cell for `field`, or `None` when the source has no such column.
    fn raw(&self, field: Field) -> Option<&str>;

    /// 1-based column position, when the source has one.
    fn position(&self, _field: Field) -> Option<usize> {
        None
    }
}

/// Builds a validated record from one source row.
pub fn build_record(row: &impl RawFields, at: RowLocator) -> Result<CfactsSystem> {
    let cell = |field: Field| row.raw(field).map(str::trim).filter(|v| !v.is_empty());

    let identifier = |field: Field| -> Result<String> {
        cell(field).map(str::to_string).ok_or(SyncError::EmptyField {
            at,
            column: field.source_name(),
        })
    };

    let text = |field: Field| -> Option<String> {
        let value = cell(field)?;
        let value = match field.kind() {
            FieldKind::QuotedName => strip_wrapping_quotes(value),
            _ => value,
        };
        (!value.is_empty()).then(|| value.to_string())
    };

    let flag = |field: Field| cell(field).and_then(coerce_bool);

    let timestamp = |field: Field| -> Result<Option<DateTime<Utc>>> {
        match cell(field) {
            None => Ok(None),
            Some(value) => parse_timestamp(value)
                .map(Some)
                .ok_or_else(|| SyncError::InvalidTimestamp {
                    at,
                    column: field.source_name(),
                    position: row.position(field),
                    value: value.to_string(),
                }),
        }
    };

    Ok(CfactsSystem {
        fisma_uuid: identifier(Field::FismaUuid)?,
        fisma_acronym: identifier(Field::FismaAcronym)?,
        authorization_package_name: text(Field::AuthorizationPackageName),
        primary_isso_name: text(Field::PrimaryIssoName),
        primary_isso_email: text(Field::PrimaryIssoEmail),
        is_active: flag(Field::IsActive),
        is_retired: flag(Field::IsRetired),
        is_decommissioned: flag(Field::IsDecommissioned),
        lifecycle_phase: text(Field::LifecyclePhase),
        component_acronym: text(Field::ComponentAcronym),
        division_name: text(Field::DivisionName),
        group_acronym: text(Field::GroupAcronym),
        group_name: text(Field::GroupName),
        ato_expiration_date: timestamp(Field::AtoExpirationDate)?,
        decommission_date: timestamp(Field::DecommissionDate)?,
        last_modified_date: timestamp(Field::LastModifiedDate)?,
    })
}
