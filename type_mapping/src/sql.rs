//! Rust type to column kind mapping
//!
//! This module handles the mapping between Rust field types and the
//! [`ValueKind`](crate::ValueKind) recorded in entity descriptors.

/// Strip a single `Option<...>` wrapper from a normalized type string
pub fn strip_option(rust_type: &str) -> &str {
    let trimmed = rust_type.trim();
    trimmed
        .strip_prefix("Option<")
        .or_else(|| trimmed.strip_prefix("std::option::Option<"))
        .and_then(|inner| inner.strip_suffix('>'))
        .unwrap_or(trimmed)
}

/// Get the ValueKind variant name for a Rust type
/// This is used by the entity derive when generating descriptor tables.
/// Returns `None` for types without `FromSqlValue` / `SqlValue::from` support.
pub fn rust_type_to_value_kind_variant(rust_type: &str) -> Option<&'static str> {
    // Normalize type string by removing all whitespace for consistent matching
    let normalized = rust_type.replace(' ', "");
    let variant = match strip_option(&normalized) {
        "String" => "Text",
        "i8" | "i16" | "i32" | "i64" | "u8" | "u16" | "u32" => "Int",
        "u64" => "Decimal", // does not fit in a signed bigint
        "f32" | "f64" => "Float",
        "bool" => "Bool",
        "Uuid" | "uuid::Uuid" => "Uuid",
        "DateTime<Utc>"
        | "chrono::DateTime<chrono::Utc>"
        | "NaiveDateTime"
        | "chrono::NaiveDateTime" => "Timestamp",
        "NaiveDate" | "chrono::NaiveDate" => "Date",
        // rust_decimal::Decimal under any re-export path (sqlx::types, queryhaus::sqlx::types)
        t if t == "Decimal" || t.ends_with("::Decimal") => "Decimal",
        "serde_json::Value" | "Value" => "Json",
        _ => return None,
    };
    Some(variant)
}

/// Check if a Rust type is Optional (nullable in SQL)
pub fn is_optional_type(rust_type: &str) -> bool {
    let trimmed = rust_type.trim();
    trimmed.starts_with("Option") || trimmed.starts_with("std::option::Option")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_kind_variants() {
        assert_eq!(rust_type_to_value_kind_variant("i32"), Some("Int"));
        assert_eq!(rust_type_to_value_kind_variant("Option<i64>"), Some("Int"));
        assert_eq!(rust_type_to_value_kind_variant("chrono::NaiveDate"), Some("Date"));
        assert_eq!(rust_type_to_value_kind_variant("Option < DateTime < Utc > >"), Some("Timestamp"));
        assert_eq!(rust_type_to_value_kind_variant("uuid::Uuid"), Some("Uuid"));
        assert_eq!(rust_type_to_value_kind_variant("sqlx::types::Decimal"), Some("Decimal"));
        assert_eq!(rust_type_to_value_kind_variant("Option<rust_decimal::Decimal>"), Some("Decimal"));
        assert_eq!(rust_type_to_value_kind_variant("::queryhaus::sqlx::types::Decimal"), Some("Decimal"));
    }

    #[test]
    fn test_unsupported_types_have_no_kind() {
        assert_eq!(rust_type_to_value_kind_variant("MyEnum"), None);
        assert_eq!(rust_type_to_value_kind_variant("&str"), None);
        assert_eq!(rust_type_to_value_kind_variant("bigdecimal::BigDecimal"), None);
        assert_eq!(rust_type_to_value_kind_variant("Vec<u8>"), None);
    }

    #[test]
    fn test_optional_detection() {
        assert!(is_optional_type("Option<String>"));
        assert!(!is_optional_type("String"));
        assert_eq!(strip_option("Option<Uuid>"), "Uuid");
        assert_eq!(strip_option("Uuid"), "Uuid");
    }
}
