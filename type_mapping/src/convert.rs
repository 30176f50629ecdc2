//! Conversion from SqlValue back into Rust field types
//!
//! Materialized entities read their fields through [`FromSqlValue`].

use crate::types::{SqlValue, ValueKind};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("unexpected NULL for non-optional {expected}")]
    UnexpectedNull { expected: &'static str },

    #[error("cannot convert {found} into {expected}")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("value {value} is out of range for {expected}")]
    OutOfRange { expected: &'static str, value: String },
}

/// Types that can be read out of a [`SqlValue`]
pub trait FromSqlValue: Sized {
    fn from_sql_value(value: &SqlValue) -> Result<Self, ConversionError>;
}

fn coerced(value: &SqlValue, kind: ValueKind, expected: &'static str) -> Result<SqlValue, ConversionError> {
    if value.is_null() {
        return Err(ConversionError::UnexpectedNull { expected });
    }
    value.coerce(kind).ok_or(ConversionError::Mismatch {
        expected,
        found: value.type_name(),
    })
}

impl FromSqlValue for SqlValue {
    fn from_sql_value(value: &SqlValue) -> Result<Self, ConversionError> {
        Ok(value.clone())
    }
}

impl FromSqlValue for bool {
    fn from_sql_value(value: &SqlValue) -> Result<Self, ConversionError> {
        match coerced(value, ValueKind::Bool, "bool")? {
            SqlValue::Bool(b) => Ok(b),
            other => Err(ConversionError::Mismatch {
                expected: "bool",
                found: other.type_name(),
            }),
        }
    }
}

impl FromSqlValue for i64 {
    fn from_sql_value(value: &SqlValue) -> Result<Self, ConversionError> {
        match coerced(value, ValueKind::Int, "i64")? {
            SqlValue::Int(i) => Ok(i),
            other => Err(ConversionError::Mismatch {
                expected: "i64",
                found: other.type_name(),
            }),
        }
    }
}

impl FromSqlValue for i32 {
    fn from_sql_value(value: &SqlValue) -> Result<Self, ConversionError> {
        let wide = i64::from_sql_value(value).map_err(|e| match e {
            ConversionError::UnexpectedNull { .. } => ConversionError::UnexpectedNull { expected: "i32" },
            _ => ConversionError::Mismatch {
                expected: "i32",
                found: value.type_name(),
            },
        })?;
        i32::try_from(wide).map_err(|_| ConversionError::OutOfRange {
            expected: "i32",
            value: wide.to_string(),
        })
    }
}

impl FromSqlValue for i16 {
    fn from_sql_value(value: &SqlValue) -> Result<Self, ConversionError> {
        let wide = i64::from_sql_value(value)?;
        i16::try_from(wide).map_err(|_| ConversionError::OutOfRange {
            expected: "i16",
            value: wide.to_string(),
        })
    }
}

macro_rules! narrow_int_from_sql {
    ($($ty:ty),*) => {
        $(
            impl FromSqlValue for $ty {
                fn from_sql_value(value: &SqlValue) -> Result<Self, ConversionError> {
                    let wide = i64::from_sql_value(value)?;
                    <$ty>::try_from(wide).map_err(|_| ConversionError::OutOfRange {
                        expected: stringify!($ty),
                        value: wide.to_string(),
                    })
                }
            }
        )*
    };
}

narrow_int_from_sql!(i8, u8, u16, u32);

impl FromSqlValue for u64 {
    fn from_sql_value(value: &SqlValue) -> Result<Self, ConversionError> {
        match value {
            SqlValue::Null => Err(ConversionError::UnexpectedNull { expected: "u64" }),
            SqlValue::Int(i) => u64::try_from(*i).map_err(|_| ConversionError::OutOfRange {
                expected: "u64",
                value: i.to_string(),
            }),
            SqlValue::Decimal(d) | SqlValue::Text(d) => d.trim().parse().map_err(|_| ConversionError::OutOfRange {
                expected: "u64",
                value: d.clone(),
            }),
            other => Err(ConversionError::Mismatch {
                expected: "u64",
                found: other.type_name(),
            }),
        }
    }
}

impl FromSqlValue for Decimal {
    fn from_sql_value(value: &SqlValue) -> Result<Self, ConversionError> {
        let text = match value {
            SqlValue::Text(s) => SqlValue::Decimal(s.trim().to_string()),
            other => coerced(other, ValueKind::Decimal, "Decimal")?,
        };
        match text {
            SqlValue::Decimal(d) => d
                .parse()
                .or_else(|_| Decimal::from_scientific(&d))
                .map_err(|_| ConversionError::OutOfRange {
                    expected: "Decimal",
                    value: d,
                }),
            other => Err(ConversionError::Mismatch {
                expected: "Decimal",
                found: other.type_name(),
            }),
        }
    }
}

impl FromSqlValue for f64 {
    fn from_sql_value(value: &SqlValue) -> Result<Self, ConversionError> {
        match coerced(value, ValueKind::Float, "f64")? {
            SqlValue::Float(f) => Ok(f),
            other => Err(ConversionError::Mismatch {
                expected: "f64",
                found: other.type_name(),
            }),
        }
    }
}

impl FromSqlValue for f32 {
    fn from_sql_value(value: &SqlValue) -> Result<Self, ConversionError> {
        f64::from_sql_value(value).map(|f| f as f32)
    }
}

impl FromSqlValue for String {
    fn from_sql_value(value: &SqlValue) -> Result<Self, ConversionError> {
        match coerced(value, ValueKind::Text, "String")? {
            SqlValue::Text(s) => Ok(s),
            other => Err(ConversionError::Mismatch {
                expected: "String",
                found: other.type_name(),
            }),
        }
    }
}

impl FromSqlValue for Uuid {
    fn from_sql_value(value: &SqlValue) -> Result<Self, ConversionError> {
        match coerced(value, ValueKind::Uuid, "Uuid")? {
            SqlValue::Uuid(u) => Ok(u),
            other => Err(ConversionError::Mismatch {
                expected: "Uuid",
                found: other.type_name(),
            }),
        }
    }
}

impl FromSqlValue for DateTime<Utc> {
    fn from_sql_value(value: &SqlValue) -> Result<Self, ConversionError> {
        match coerced(value, ValueKind::Timestamp, "DateTime<Utc>")? {
            SqlValue::Timestamp(ts) => Ok(ts),
            other => Err(ConversionError::Mismatch {
                expected: "DateTime<Utc>",
                found: other.type_name(),
            }),
        }
    }
}

impl FromSqlValue for NaiveDateTime {
    fn from_sql_value(value: &SqlValue) -> Result<Self, ConversionError> {
        DateTime::<Utc>::from_sql_value(value).map(|ts| ts.naive_utc())
    }
}

impl FromSqlValue for NaiveDate {
    fn from_sql_value(value: &SqlValue) -> Result<Self, ConversionError> {
        match coerced(value, ValueKind::Date, "NaiveDate")? {
            SqlValue::Date(d) => Ok(d),
            other => Err(ConversionError::Mismatch {
                expected: "NaiveDate",
                found: other.type_name(),
            }),
        }
    }
}

impl FromSqlValue for serde_json::Value {
    fn from_sql_value(value: &SqlValue) -> Result<Self, ConversionError> {
        match value {
            SqlValue::Null => Ok(serde_json::Value::Null),
            SqlValue::Json(j) => Ok(j.clone()),
            SqlValue::Text(s) => serde_json::from_str(s).map_err(|_| ConversionError::Mismatch {
                expected: "serde_json::Value",
                found: "text",
            }),
            other => serde_json::to_value(other).map_err(|_| ConversionError::Mismatch {
                expected: "serde_json::Value",
                found: other.type_name(),
            }),
        }
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    fn from_sql_value(value: &SqlValue) -> Result<Self, ConversionError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_sql_value(value).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_handling() {
        assert_eq!(Option::<i64>::from_sql_value(&SqlValue::Null), Ok(None));
        assert_eq!(
            i64::from_sql_value(&SqlValue::Null),
            Err(ConversionError::UnexpectedNull { expected: "i64" })
        );
    }

    #[test]
    fn test_narrowing_out_of_range() {
        let err = i32::from_sql_value(&SqlValue::Int(i64::MAX)).unwrap_err();
        assert!(matches!(err, ConversionError::OutOfRange { expected: "i32", .. }));
        assert_eq!(i32::from_sql_value(&SqlValue::Int(7)), Ok(7));
    }

    #[test]
    fn test_unsigned_round_trip() {
        assert_eq!(u32::from_sql_value(&SqlValue::from(7u32)), Ok(7));
        assert_eq!(u64::from_sql_value(&SqlValue::from(u64::MAX)), Ok(u64::MAX));
        assert!(matches!(
            u8::from_sql_value(&SqlValue::Int(-1)),
            Err(ConversionError::OutOfRange { expected: "u8", .. })
        ));
    }

    #[test]
    fn test_decimal_round_trip() {
        let amount: Decimal = "1234.50".parse().unwrap();
        assert_eq!(SqlValue::from(amount), SqlValue::Decimal("1234.50".into()));
        assert_eq!(Decimal::from_sql_value(&SqlValue::from(amount)), Ok(amount));
        assert_eq!(Decimal::from_sql_value(&SqlValue::Int(7)), Ok(Decimal::from(7)));
        assert_eq!(Decimal::from_sql_value(&SqlValue::Text(" 0.25 ".into())), Ok("0.25".parse().unwrap()));
        assert_eq!(Option::<Decimal>::from_sql_value(&SqlValue::Null), Ok(None));
        assert!(matches!(
            Decimal::from_sql_value(&SqlValue::Text("lots".into())),
            Err(ConversionError::OutOfRange { expected: "Decimal", .. })
        ));
    }

    #[test]
    fn test_driver_decimal_into_float() {
        assert_eq!(f64::from_sql_value(&SqlValue::Decimal("12.25".into())), Ok(12.25));
    }

    #[test]
    fn test_mismatch_reports_found_kind() {
        let err = Uuid::from_sql_value(&SqlValue::Bool(true)).unwrap_err();
        assert_eq!(
            err,
            ConversionError::Mismatch {
                expected: "Uuid",
                found: "bool"
            }
        );
    }
}
