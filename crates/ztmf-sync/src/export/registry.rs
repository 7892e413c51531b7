//! Closed registries for the multi-table export.
//!
//! Table names, ordering columns and filter predicates end up interpolated
//! into SQL text, so every one of them comes from a compile-time list here.
//! Nothing in this module can be extended at runtime.

use crate::error::{Result, SyncError};

/// One origin/destination table pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSyncSpec {
    /// Table in the relational store
    pub origin: &'static str,
    /// Table in the warehouse
    pub destination: &'static str,
    /// Comma-separated ordering columns for deterministic extraction
    pub order_by: &'static str,
    /// Allow-listed predicate limiting the exported rows
    pub filter: Option<&'static str>,
}

impl TableSyncSpec {
    /// True when `name` is this spec's origin or destination (case-insensitive).
    pub fn matches(&self, name: &str) -> bool {
        let name = name.trim();
        self.origin.eq_ignore_ascii_case(name) || self.destination.eq_ignore_ascii_case(name)
    }
}

/// Only systems flagged for warehouse sync.
pub const SYNC_ENABLED_SYSTEMS: &str = "sdl_sync_enabled = true";

/// Rows belonging to systems flagged for warehouse sync.
pub const SYNC_ENABLED_SYSTEM_ROWS: &str =
    "fismasystemid IN (SELECT fismasystemid FROM fismasystems WHERE sdl_sync_enabled = true)";

/// Every predicate the extractor will interpolate.
pub const ALLOWED_PREDICATES: &[&str] = &[SYNC_ENABLED_SYSTEMS, SYNC_ENABLED_SYSTEM_ROWS];

/// Tables exported to the warehouse, in processing order.
pub const TABLE_REGISTRY: &[TableSyncSpec] = &[
    TableSyncSpec {
        origin: "datacalls",
        destination: "ZTMF_DATACALLS",
        order_by: "datacallid",
        filter: None,
    },
    TableSyncSpec {
        origin: "datacalls_fismasystems",
        destination: "ZTMF_DATACALLS_FISMASYSTEMS",
        order_by: "datacallid, fismasystemid",
        filter: Some(SYNC_ENABLED_SYSTEM_ROWS),
    },
    TableSyncSpec {
        origin: "events",
        destination: "ZTMF_EVENTS",
        order_by: "createdat",
        filter: None,
    },
    TableSyncSpec {
        origin: "fismasystems",
        destination: "ZTMF_FISMASYSTEMS",
        order_by: "fismasystemid",
        filter: Some(SYNC_ENABLED_SYSTEMS),
    },
    TableSyncSpec {
        origin: "functionoptions",
        destination: "ZTMF_FUNCTIONOPTIONS",
        order_by: "functionoptionid",
        filter: None,
    },
    TableSyncSpec {
        origin: "functions",
        destination: "ZTMF_FUNCTIONS",
        order_by: "functionid",
        filter: None,
    },
    TableSyncSpec {
        origin: "massemails",
        destination: "ZTMF_MASSEMAILS",
        order_by: "massemailid",
        filter: None,
    },
    TableSyncSpec {
        origin: "pillars",
        destination: "ZTMF_PILLARS",
        order_by: "pillarid",
        filter: None,
    },
    TableSyncSpec {
        origin: "questions",
        destination: "ZTMF_QUESTIONS",
        order_by: "questionid",
        filter: None,
    },
    TableSyncSpec {
        origin: "scores",
        destination: "ZTMF_SCORES",
        order_by: "scoreid",
        filter: Some(SYNC_ENABLED_SYSTEM_ROWS),
    },
    TableSyncSpec {
        origin: "users",
        destination: "ZTMF_USERS",
        order_by: "userid",
        filter: None,
    },
    TableSyncSpec {
        origin: "users_fismasystems",
        destination: "ZTMF_USERS_FISMASYSTEMS",
        order_by: "userid, fismasystemid",
        filter: Some(SYNC_ENABLED_SYSTEM_ROWS),
    },
];

/// Resolves requested table names against [`TABLE_REGISTRY`].
///
/// An empty request selects every table. Results keep registry order and
/// contain each spec once.
pub fn select_tables(requested: &[String]) -> Result<Vec<&'static TableSyncSpec>> {
    if requested.is_empty() {
        return Ok(TABLE_REGISTRY.iter().collect());
    }

    for name in requested {
        if !TABLE_REGISTRY.iter().any(|spec| spec.matches(name)) {
            return Err(SyncError::UnknownTable(name.clone()));
        }
    }

    Ok(TABLE_REGISTRY
        .iter()
        .filter(|spec| requested.iter().any(|name| spec.matches(name)))
        .collect())
}

/// Returns the registered predicate equal to `clause`.
///
/// A blank clause means "no filter". Anything else not in
/// [`ALLOWED_PREDICATES`] is rejected.
pub fn allowed_predicate(clause: &str) -> Result<Option<&'static str>> {
    let clause = clause.trim();
    if clause.is_empty() {
        return Ok(None);
    }

    ALLOWED_PREDICATES
        .iter()
        .find(|p| **p == clause)
        .map(|p| Some(*p))
        .ok_or_else(|| SyncError::UnregisteredPredicate(clause.to_string()))
}

const MAX_IDENTIFIER_LEN: usize = 255;

/// Checks a table, view or column name before it is interpolated.
///
/// Dotted names (`db.schema.table`) are checked per component; each component
/// is 1 to 255 ASCII letters, digits, `_` or `-`.
pub fn validate_identifier(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.split('.').all(|part| {
            !part.is_empty()
                && part.len() <= MAX_IDENTIFIER_LEN
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        });

    if valid {
        Ok(())
    } else {
        Err(SyncError::InvalidIdentifier(name.to_string()))
    }
}

/// Checks a comma-separated ordering list, column by column.
pub fn validate_order_by(order_by: &str) -> Result<()> {
    order_by
        .split(',')
        .try_for_each(|column| validate_identifier(column.trim()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn registry_entries_are_well_formed() {
        for spec in TABLE_REGISTRY {
            validate_identifier(spec.origin).unwrap();
            validate_identifier(spec.destination).unwrap();
            validate_order_by(spec.order_by).unwrap();
            if let Some(filter) = spec.filter {
                assert_eq!(allowed_predicate(filter).unwrap(), Some(filter));
            }
        }
        assert_eq!(TABLE_REGISTRY.len(), 12);
    }

    #[test]
    fn selects_by_either_name_without_duplicates() {
        let picked = select_tables(&[
            "ZTMF_SCORES".to_string(),
            "scores".to_string(),
            "pillars".to_string(),
        ])
        .unwrap();
        let origins: Vec<_> = picked.iter().map(|s| s.origin).collect();
        assert_eq!(origins, vec!["pillars", "scores"]);
    }

    #[test]
    fn empty_request_selects_everything() {
        assert_eq!(select_tables(&[]).unwrap().len(), TABLE_REGISTRY.len());
    }

    #[test]
    fn unknown_table_is_rejected() {
        let err = select_tables(&["pillars".to_string(), "secrets".to_string()]).unwrap_err();
        assert_eq!(err.to_string(), "unknown table: secrets");
    }

    #[test]
    fn predicates() {
        assert_eq!(allowed_predicate("").unwrap(), None);
        assert_eq!(
            allowed_predicate(" sdl_sync_enabled = true ").unwrap(),
            Some(SYNC_ENABLED_SYSTEMS)
        );
        assert!(matches!(
            allowed_predicate("1=1; DROP TABLE users"),
            Err(SyncError::UnregisteredPredicate(_))
        ));
        assert!(allowed_predicate("sdl_sync_enabled = false").is_err());
    }

    #[test]
    fn identifiers() {
        validate_identifier("BUS_ZEROTRUST.PRIVATE.ZTMF_SCORES").unwrap();
        validate_identifier("my-table_1").unwrap();
        for bad in ["", "a..b", "users;", "users fismasystems", "\"users\"", "a.", "x".repeat(256).as_str()] {
            assert!(validate_identifier(bad).is_err(), "{bad:?}");
        }
        validate_identifier(&"x".repeat(255)).unwrap();
        assert!(validate_order_by("userid, fismasystemid").is_ok());
        assert!(validate_order_by("userid DESC").is_err());
    }
}
