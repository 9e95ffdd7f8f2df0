use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::database::backend::Dialect;

/// A single cell of a row headed for an INSERT statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Decimal(Decimal),
    String(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Date(NaiveDate),
    /// Wall-clock time without a zone, already converted to the zone the
    /// backend is configured for.
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Json(Value),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Renders the value as a SQL literal for the given dialect. Strings are
    /// escaped by doubling single quotes, which is safe for SQLite and for
    /// Postgres with `standard_conforming_strings` on (the default since 9.1).
    pub fn to_sql_literal(&self, dialect: Dialect) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(value) => match dialect {
                Dialect::Postgres => if *value { "TRUE" } else { "FALSE" }.to_string(),
                Dialect::Sqlite => if *value { "1" } else { "0" }.to_string(),
            },
            SqlValue::I64(value) => value.to_string(),
            SqlValue::F64(value) => {
                if value.is_finite() {
                    format!("{:?}", value)
                } else {
                    "NULL".to_string()
                }
            }
            SqlValue::Decimal(value) => value.to_string(),
            SqlValue::String(value) => quote_literal(value),
            SqlValue::Bytes(value) => match dialect {
                Dialect::Postgres => format!("'\\x{}'", hex::encode(value)),
                Dialect::Sqlite => format!("X'{}'", hex::encode(value)),
            },
            SqlValue::Uuid(value) => quote_literal(&value.to_string()),
            SqlValue::Date(value) => quote_literal(&value.format("%Y-%m-%d").to_string()),
            SqlValue::Timestamp(value) => {
                quote_literal(&value.format("%Y-%m-%d %H:%M:%S%.6f").to_string())
            }
            SqlValue::TimestampTz(value) => {
                quote_literal(&value.format("%Y-%m-%d %H:%M:%S%.6f+00:00").to_string())
            }
            SqlValue::Json(value) => quote_literal(&value.to_string()),
        }
    }
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

macro_rules! impl_from_for_sql_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for SqlValue {
                fn from(value: $ty) -> Self {
                    SqlValue::$variant(value.into())
                }
            }
        )*
    };
}

impl_from_for_sql_value!(
    bool => Bool,
    i16 => I64,
    i32 => I64,
    i64 => I64,
    u8 => I64,
    u16 => I64,
    u32 => I64,
    f32 => F64,
    f64 => F64,
    Decimal => Decimal,
    String => String,
    Vec<u8> => Bytes,
    Uuid => Uuid,
    NaiveDate => Date,
    NaiveDateTime => Timestamp,
    DateTime<Utc> => TimestampTz,
    Value => Json,
);

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::String(value.to_string())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}
