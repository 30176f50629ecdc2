//! Runtime value definitions
//!
//! This module provides the value model shared by literals, bound parameters
//! and result rows.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Column value kinds known to the descriptor tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    Decimal,
    Text,
    Uuid,
    Timestamp,
    Date,
    Json,
}

impl ValueKind {
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Decimal => "decimal",
            ValueKind::Text => "text",
            ValueKind::Uuid => "uuid",
            ValueKind::Timestamp => "timestamp",
            ValueKind::Date => "date",
            ValueKind::Json => "json",
        }
    }
}

/// A single SQL value as bound into a statement or read back from a row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(String), // Store as string to preserve precision
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Json(serde_json::Value),
    List(Vec<SqlValue>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Kind of this value, `None` for NULL and lists
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            SqlValue::Null | SqlValue::List(_) => None,
            SqlValue::Bool(_) => Some(ValueKind::Bool),
            SqlValue::Int(_) => Some(ValueKind::Int),
            SqlValue::Float(_) => Some(ValueKind::Float),
            SqlValue::Decimal(_) => Some(ValueKind::Decimal),
            SqlValue::Text(_) => Some(ValueKind::Text),
            SqlValue::Uuid(_) => Some(ValueKind::Uuid),
            SqlValue::Timestamp(_) => Some(ValueKind::Timestamp),
            SqlValue::Date(_) => Some(ValueKind::Date),
            SqlValue::Json(_) => Some(ValueKind::Json),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::List(_) => "list",
            other => other.kind().map(|k| k.name()).unwrap_or("unknown"),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view used by mixed int/float/decimal arithmetic
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Int(i) => Some(*i as f64),
            SqlValue::Float(f) => Some(*f),
            SqlValue::Decimal(d) => d.parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert this value to the requested kind, as a database driver would.
    ///
    /// Returns `None` when the value cannot represent the kind. NULL coerces
    /// to NULL for every kind.
    pub fn coerce(&self, kind: ValueKind) -> Option<SqlValue> {
        if self.is_null() || self.kind() == Some(kind) {
            return Some(self.clone());
        }

        match (kind, self) {
            (ValueKind::Int, SqlValue::Float(f)) => integral_f64_to_i64(*f).map(SqlValue::Int),
            (ValueKind::Int, SqlValue::Decimal(d)) => d
                .parse::<i64>()
                .ok()
                .or_else(|| d.parse::<f64>().ok().and_then(integral_f64_to_i64))
                .map(SqlValue::Int),
            (ValueKind::Int, SqlValue::Text(s)) => s.trim().parse().ok().map(SqlValue::Int),
            (ValueKind::Float, v) => v
                .as_f64()
                .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
                .map(SqlValue::Float),
            (ValueKind::Decimal, SqlValue::Int(i)) => Some(SqlValue::Decimal(i.to_string())),
            (ValueKind::Decimal, SqlValue::Float(f)) => Some(SqlValue::Decimal(f.to_string())),
            (ValueKind::Text, SqlValue::Uuid(u)) => Some(SqlValue::Text(u.to_string())),
            (ValueKind::Text, SqlValue::Decimal(d)) => Some(SqlValue::Text(d.clone())),
            (ValueKind::Uuid, SqlValue::Text(s)) => Uuid::parse_str(s).ok().map(SqlValue::Uuid),
            (ValueKind::Bool, SqlValue::Int(i)) => Some(SqlValue::Bool(*i != 0)),
            (ValueKind::Timestamp, SqlValue::Text(s)) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| SqlValue::Timestamp(dt.with_timezone(&Utc))),
            (ValueKind::Timestamp, SqlValue::Date(d)) => d
                .and_hms_opt(0, 0, 0)
                .map(|naive| SqlValue::Timestamp(naive.and_utc())),
            (ValueKind::Date, SqlValue::Timestamp(ts)) => Some(SqlValue::Date(ts.date_naive())),
            (ValueKind::Date, SqlValue::Text(s)) => {
                NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().map(SqlValue::Date)
            }
            (ValueKind::Json, other) => serde_json::to_value(other).ok().map(SqlValue::Json),
            _ => None,
        }
    }

    /// SQL-style ordering: numbers compare across int/float/decimal, NULL and
    /// mismatched kinds are unordered.
    pub fn compare(&self, other: &SqlValue) -> Option<Ordering> {
        match (self, other) {
            (SqlValue::Null, _) | (_, SqlValue::Null) => None,
            (SqlValue::Int(a), SqlValue::Int(b)) => Some(a.cmp(b)),
            (SqlValue::Bool(a), SqlValue::Bool(b)) => Some(a.cmp(b)),
            (SqlValue::Text(a), SqlValue::Text(b)) => Some(a.cmp(b)),
            (SqlValue::Uuid(a), SqlValue::Uuid(b)) => Some(a.cmp(b)),
            (SqlValue::Timestamp(a), SqlValue::Timestamp(b)) => Some(a.cmp(b)),
            (SqlValue::Date(a), SqlValue::Date(b)) => Some(a.cmp(b)),
            (SqlValue::Timestamp(a), SqlValue::Date(b)) => {
                b.and_hms_opt(0, 0, 0).map(|b| a.naive_utc().cmp(&b))
            }
            (SqlValue::Date(a), SqlValue::Timestamp(b)) => {
                a.and_hms_opt(0, 0, 0).map(|a| a.cmp(&b.naive_utc()))
            }
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => None,
            },
        }
    }
}

/// Whole floats inside the `i64` range; `as` would saturate silently
fn integral_f64_to_i64(f: f64) -> Option<i64> {
    // i64::MAX is not representable as f64, 2^63 is the first value past it
    const UPPER: f64 = 9_223_372_036_854_775_808.0;
    (f.fract() == 0.0 && f >= -UPPER && f < UPPER).then_some(f as i64)
}

impl PartialEq for SqlValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SqlValue::Null, SqlValue::Null) => true,
            (SqlValue::Bool(a), SqlValue::Bool(b)) => a == b,
            (SqlValue::Int(a), SqlValue::Int(b)) => a == b,
            (SqlValue::Float(a), SqlValue::Float(b)) => a.to_bits() == b.to_bits(),
            (SqlValue::Decimal(a), SqlValue::Decimal(b)) => a == b,
            (SqlValue::Text(a), SqlValue::Text(b)) => a == b,
            (SqlValue::Uuid(a), SqlValue::Uuid(b)) => a == b,
            (SqlValue::Timestamp(a), SqlValue::Timestamp(b)) => a == b,
            (SqlValue::Date(a), SqlValue::Date(b)) => a == b,
            (SqlValue::Json(a), SqlValue::Json(b)) => a == b,
            (SqlValue::List(a), SqlValue::List(b)) => a == b,
            _ => false,
        }
    }
}

// Floats compare bitwise so values can key the dedup and group maps.
impl Eq for SqlValue {}

impl Hash for SqlValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            SqlValue::Null => {}
            SqlValue::Bool(b) => b.hash(state),
            SqlValue::Int(i) => i.hash(state),
            SqlValue::Float(f) => f.to_bits().hash(state),
            SqlValue::Decimal(d) => d.hash(state),
            SqlValue::Text(s) => s.hash(state),
            SqlValue::Uuid(u) => u.hash(state),
            SqlValue::Timestamp(ts) => ts.hash(state),
            SqlValue::Date(d) => d.hash(state),
            SqlValue::Json(j) => j.to_string().hash(state),
            SqlValue::List(items) => items.hash(state),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Bool(b) => write!(f, "{}", b),
            SqlValue::Int(i) => write!(f, "{}", i),
            SqlValue::Float(x) => write!(f, "{}", x),
            SqlValue::Decimal(d) => write!(f, "{}", d),
            SqlValue::Text(s) => write!(f, "'{}'", s),
            SqlValue::Uuid(u) => write!(f, "{}", u),
            SqlValue::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            SqlValue::Date(d) => write!(f, "{}", d),
            SqlValue::Json(j) => write!(f, "{}", j),
            SqlValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

/// Convert basic Rust types to SqlValue
impl From<String> for SqlValue {
    fn from(val: String) -> Self {
        SqlValue::Text(val)
    }
}

impl From<&str> for SqlValue {
    fn from(val: &str) -> Self {
        SqlValue::Text(val.to_string())
    }
}

impl From<bool> for SqlValue {
    fn from(val: bool) -> Self {
        SqlValue::Bool(val)
    }
}

impl From<i16> for SqlValue {
    fn from(val: i16) -> Self {
        SqlValue::Int(val as i64)
    }
}

impl From<i32> for SqlValue {
    fn from(val: i32) -> Self {
        SqlValue::Int(val as i64)
    }
}

impl From<i64> for SqlValue {
    fn from(val: i64) -> Self {
        SqlValue::Int(val)
    }
}

macro_rules! small_int_into_sql {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for SqlValue {
                fn from(val: $ty) -> Self {
                    SqlValue::Int(i64::from(val))
                }
            }
        )*
    };
}

small_int_into_sql!(i8, u8, u16, u32);

/// u64 does not fit a signed bigint and travels as a decimal
impl From<u64> for SqlValue {
    fn from(val: u64) -> Self {
        SqlValue::Decimal(val.to_string())
    }
}

impl From<Decimal> for SqlValue {
    fn from(val: Decimal) -> Self {
        SqlValue::Decimal(val.to_string())
    }
}

impl From<f32> for SqlValue {
    fn from(val: f32) -> Self {
        SqlValue::Float(val as f64)
    }
}

impl From<f64> for SqlValue {
    fn from(val: f64) -> Self {
        SqlValue::Float(val)
    }
}

impl From<Uuid> for SqlValue {
    fn from(val: Uuid) -> Self {
        SqlValue::Uuid(val)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(val: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(val)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(val: NaiveDateTime) -> Self {
        SqlValue::Timestamp(val.and_utc())
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(val: NaiveDate) -> Self {
        SqlValue::Date(val)
    }
}

impl From<serde_json::Value> for SqlValue {
    fn from(val: serde_json::Value) -> Self {
        SqlValue::Json(val)
    }
}

impl<T> From<Vec<T>> for SqlValue
where
    T: Into<SqlValue>,
{
    fn from(val: Vec<T>) -> Self {
        SqlValue::List(val.into_iter().map(Into::into).collect())
    }
}

impl<T> From<Option<T>> for SqlValue
where
    T: Into<SqlValue>,
{
    fn from(val: Option<T>) -> Self {
        match val {
            Some(v) => v.into(),
            None => SqlValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_numeric_compare_across_kinds() {
        assert_eq!(SqlValue::Int(3).compare(&SqlValue::Float(2.5)), Some(Ordering::Greater));
        assert_eq!(
            SqlValue::Decimal("10.50".into()).compare(&SqlValue::Int(10)),
            Some(Ordering::Greater)
        );
        assert_eq!(SqlValue::Null.compare(&SqlValue::Int(1)), None);
        assert_eq!(SqlValue::Text("a".into()).compare(&SqlValue::Int(1)), None);
    }

    #[test]
    fn test_hash_and_eq_usable_as_keys() {
        let mut keys = HashSet::new();
        keys.insert(SqlValue::Int(1));
        keys.insert(SqlValue::Int(1));
        keys.insert(SqlValue::Float(1.0));
        keys.insert(SqlValue::Text("1".into()));
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn test_coerce_driver_shapes() {
        assert_eq!(
            SqlValue::Decimal("42".into()).coerce(ValueKind::Int),
            Some(SqlValue::Int(42))
        );
        assert_eq!(
            SqlValue::Decimal("2.5".into()).coerce(ValueKind::Float),
            Some(SqlValue::Float(2.5))
        );
        assert_eq!(SqlValue::Text("abc".into()).coerce(ValueKind::Int), None);
        assert_eq!(SqlValue::Null.coerce(ValueKind::Uuid), Some(SqlValue::Null));

        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(
            SqlValue::Text("2024-03-01".into()).coerce(ValueKind::Date),
            Some(SqlValue::Date(date))
        );
    }

    #[test]
    fn test_int_coercion_rejects_out_of_range_floats() {
        assert_eq!(SqlValue::Float(1e19).coerce(ValueKind::Int), None);
        assert_eq!(SqlValue::Float(-1e19).coerce(ValueKind::Int), None);
        assert_eq!(SqlValue::Float(f64::INFINITY).coerce(ValueKind::Int), None);
        assert_eq!(SqlValue::Decimal("1e19".into()).coerce(ValueKind::Int), None);
        assert_eq!(
            SqlValue::Float(-9_223_372_036_854_775_808.0).coerce(ValueKind::Int),
            Some(SqlValue::Int(i64::MIN))
        );
        assert_eq!(SqlValue::Float(12.0).coerce(ValueKind::Int), Some(SqlValue::Int(12)));
        assert_eq!(SqlValue::Float(12.5).coerce(ValueKind::Int), None);
    }

    #[test]
    fn test_option_and_vec_conversions() {
        assert_eq!(SqlValue::from(None::<i32>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some(5i32)), SqlValue::Int(5));
        assert_eq!(
            SqlValue::from(vec![1i64, 2]),
            SqlValue::List(vec![SqlValue::Int(1), SqlValue::Int(2)])
        );
    }
}
