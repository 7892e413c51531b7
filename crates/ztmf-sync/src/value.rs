//! Dynamically typed column values.
//!
//! The multi-table export discovers its column set at runtime, so rows travel
//! as [`Row`] maps of [`SqlValue`]. Values are decoded from PostgreSQL by the
//! column's declared type and bound back into insert statements unchanged.

use crate::error::{Result, SyncError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::postgres::{PgRow, Postgres};
use sqlx::query_builder::Separated;
use sqlx::types::{BigDecimal, Json};
use sqlx::{Column, Row as _, TypeInfo};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One extracted row keyed by lower-cased column name.
pub type Row = BTreeMap<String, SqlValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Numeric(BigDecimal),
    Text(String),
    Uuid(Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Json(serde_json::Value),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Appends this value to a `VALUES` tuple.
    ///
    /// NULL is written as a literal so that rows mixing NULLs and typed
    /// parameters in the same column still resolve to the target column type.
    pub fn push_to<'args>(&self, b: &mut Separated<'_, 'args, Postgres, &'static str>) {
        match self {
            SqlValue::Null => {
                b.push("NULL");
            },
            SqlValue::Bool(v) => {
                b.push_bind(*v);
            },
            SqlValue::Int(v) => {
                b.push_bind(*v);
            },
            SqlValue::Float(v) => {
                b.push_bind(*v);
            },
            SqlValue::Numeric(v) => {
                b.push_bind(v.clone());
            },
            SqlValue::Text(v) => {
                b.push_bind(v.clone());
            },
            SqlValue::Uuid(v) => {
                b.push_bind(*v);
            },
            SqlValue::Date(v) => {
                b.push_bind(*v);
            },
            SqlValue::Time(v) => {
                b.push_bind(*v);
            },
            SqlValue::Timestamp(v) => {
                b.push_bind(*v);
            },
            SqlValue::TimestampTz(v) => {
                b.push_bind(*v);
            },
            SqlValue::Json(v) => {
                b.push_bind(Json(v.clone()));
            },
        }
    }

    /// JSON rendering used by typed row decoding.
    ///
    /// Dates and timestamps use the same textual forms chrono's serde support
    /// reads back; numerics become strings to keep their precision.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            SqlValue::Null => Value::Null,
            SqlValue::Bool(v) => Value::Bool(*v),
            SqlValue::Int(v) => Value::from(*v),
            SqlValue::Float(v) => serde_json::Number::from_f64(*v)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            SqlValue::Numeric(v) => Value::String(v.to_string()),
            SqlValue::Text(v) => Value::String(v.clone()),
            SqlValue::Uuid(v) => Value::String(v.to_string()),
            SqlValue::Date(v) => Value::String(v.format("%Y-%m-%d").to_string()),
            SqlValue::Time(v) => Value::String(v.format("%H:%M:%S%.f").to_string()),
            SqlValue::Timestamp(v) => Value::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            SqlValue::TimestampTz(v) => Value::String(v.to_rfc3339()),
            SqlValue::Json(v) => v.clone(),
        }
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::TimestampTz(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

fn get<'r, T>(row: &'r PgRow, idx: usize) -> Result<Option<T>>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    Ok(row.try_get::<Option<T>, _>(idx)?)
}

fn wrap<T>(value: Option<T>, f: impl FnOnce(T) -> SqlValue) -> SqlValue {
    value.map(f).unwrap_or(SqlValue::Null)
}

/// Decodes column `idx` of `row` according to its declared PostgreSQL type.
///
/// Unknown scalar types (user-defined enums, `citext`, ...) are read as text.
/// Arrays are rejected since neither destination stores them.
pub fn decode_column(row: &PgRow, idx: usize) -> Result<SqlValue> {
    let column = &row.columns()[idx];
    let type_name = column.type_info().name();

    let value = match type_name {
        "BOOL" => wrap(get::<bool>(row, idx)?, SqlValue::Bool),
        "INT2" => wrap(get::<i16>(row, idx)?, |v| SqlValue::Int(v.into())),
        "INT4" => wrap(get::<i32>(row, idx)?, |v| SqlValue::Int(v.into())),
        "INT8" => wrap(get::<i64>(row, idx)?, SqlValue::Int),
        "FLOAT4" => wrap(get::<f32>(row, idx)?, |v| SqlValue::Float(v.into())),
        "FLOAT8" => wrap(get::<f64>(row, idx)?, SqlValue::Float),
        "NUMERIC" => wrap(get::<BigDecimal>(row, idx)?, SqlValue::Numeric),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => wrap(get::<String>(row, idx)?, SqlValue::Text),
        "UUID" => wrap(get::<Uuid>(row, idx)?, SqlValue::Uuid),
        "DATE" => wrap(get::<NaiveDate>(row, idx)?, SqlValue::Date),
        "TIME" => wrap(get::<NaiveTime>(row, idx)?, SqlValue::Time),
        "TIMESTAMP" => wrap(get::<NaiveDateTime>(row, idx)?, SqlValue::Timestamp),
        "TIMESTAMPTZ" => wrap(get::<DateTime<Utc>>(row, idx)?, SqlValue::TimestampTz),
        "JSON" | "JSONB" => wrap(get::<serde_json::Value>(row, idx)?, SqlValue::Json),
        other if other.ends_with("[]") || other.starts_with('_') => {
            return Err(SyncError::UnsupportedColumnType {
                column: column.name().to_string(),
                type_name: other.to_string(),
            });
        },
        _ => wrap(
            row.try_get_unchecked::<Option<String>, _>(idx)?,
            SqlValue::Text,
        ),
    };

    Ok(value)
}

/// Column names of `row` in result-set order, lower-cased.
pub fn column_names(row: &PgRow) -> Vec<String> {
    row.columns()
        .iter()
        .map(|c| c.name().to_lowercase())
        .collect()
}

/// Decodes every column of `row` into a [`Row`].
pub fn decode_row(row: &PgRow) -> Result<Row> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| Ok((column.name().to_lowercase(), decode_column(row, idx)?)))
        .collect()
}
