use super::mapping::Field;
use crate::value::SqlValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Destination table for CFACTS records in the relational store.
pub const CFACTS_TABLE: &str = "cfacts_systems";

/// One FISMA system as exported from CFACTS.
///
/// Only the identifier and acronym are guaranteed; every other field stays
/// `None` when the source leaves it blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfactsSystem {
    pub fisma_uuid: String,
    pub fisma_acronym: String,
    pub authorization_package_name: Option<String>,
    pub primary_isso_name: Option<String>,
    pub primary_isso_email: Option<String>,
    pub is_active: Option<bool>,
    pub is_retired: Option<bool>,
    pub is_decommissioned: Option<bool>,
    pub lifecycle_phase: Option<String>,
    pub component_acronym: Option<String>,
    pub division_name: Option<String>,
    pub group_acronym: Option<String>,
    pub group_name: Option<String>,
    pub ato_expiration_date: Option<DateTime<Utc>>,
    pub decommission_date: Option<DateTime<Utc>>,
    pub last_modified_date: Option<DateTime<Utc>>,
}

impl CfactsSystem {
    /// Destination column names, in [`Field::ALL`] order.
    pub fn columns() -> Vec<String> {
        Field::ALL.iter().map(|f| f.column().to_string()).collect()
    }

    /// Column values in the same order as [`CfactsSystem::columns`].
    pub fn values(&self) -> Vec<SqlValue> {
        Field::ALL.iter().map(|f| self.value(*f)).collect()
    }

    pub fn value(&self, field: Field) -> SqlValue {
        match field {
            Field::FismaUuid => self.fisma_uuid.as_str().into(),
            Field::FismaAcronym => self.fisma_acronym.as_str().into(),
            Field::AuthorizationPackageName => self.authorization_package_name.clone().into(),
            Field::PrimaryIssoName => self.primary_isso_name.clone().into(),
            Field::PrimaryIssoEmail => self.primary_isso_email.clone().into(),
            Field::IsActive => self.is_active.into(),
            Field::IsRetired => self.is_retired.into(),
            Field::IsDecommissioned => self.is_decommissioned.into(),
            Field::LifecyclePhase => self.lifecycle_phase.clone().into(),
            Field::ComponentAcronym => self.component_acronym.clone().into(),
            Field::DivisionName => self.division_name.clone().into(),
            Field::GroupAcronym => self.group_acronym.clone().into(),
            Field::GroupName => self.group_name.clone().into(),
            Field::AtoExpirationDate => self.ato_expiration_date.into(),
            Field::DecommissionDate => self.decommission_date.into(),
            Field::LastModifiedDate => self.last_modified_date.into(),
        }
    }
}
