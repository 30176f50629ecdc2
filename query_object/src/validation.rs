//! Validation module
//!
//! Identifiers that end up verbatim in generated SQL (table names, grouping
//! key names, aggregate aliases) are validated here. Values never are: they
//! always travel as bound parameters.

use std::fmt;
use thiserror::Error;

/// Validation errors for SQL identifiers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid characters in name '{0}': only alphanumeric characters and underscores are allowed")]
    InvalidCharacters(String),

    #[error("Name '{name}' is too long: {length} characters (max {max_length})")]
    TooLong {
        name: String,
        length: usize,
        max_length: usize,
    },

    #[error("Name cannot be empty")]
    Empty,

    #[error("Name '{0}' must start with a letter or underscore")]
    InvalidStartCharacter(String),

    #[error("Name '{0}' is a reserved SQL keyword")]
    ReservedKeyword(String),
}

/// Identifier length limit shared by PostgreSQL and the derive macro
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Keywords of the generated grammar that cannot be used as bare identifiers
const RESERVED_KEYWORDS: &[&str] = &[
    "ALL", "AND", "AS", "ASC", "BETWEEN", "BY", "CASE", "CROSS", "DESC", "DISTINCT", "ELSE",
    "END", "EXISTS", "FALSE", "FETCH", "FROM", "FULL", "GROUP", "HAVING", "IN", "INNER", "IS",
    "JOIN", "LEFT", "LIKE", "LIMIT", "NOT", "NULL", "OFFSET", "ON", "OR", "ORDER", "OUTER",
    "RIGHT", "SELECT", "THEN", "TRUE", "UNION", "USING", "WHEN", "WHERE", "WITH", "COUNT",
    "SUM", "AVG", "MIN", "MAX", "INSERT", "UPDATE", "DELETE", "CREATE", "DROP", "ALTER",
    "TABLE",
];

fn validate_identifier(name: &str) -> Result<(), ValidationError> {
    let first_char = name.chars().next().ok_or(ValidationError::Empty)?;

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ValidationError::TooLong {
            name: name.to_string(),
            length: name.len(),
            max_length: MAX_IDENTIFIER_LENGTH,
        });
    }

    if !first_char.is_ascii_alphabetic() && first_char != '_' {
        return Err(ValidationError::InvalidStartCharacter(name.to_string()));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ValidationError::InvalidCharacters(name.to_string()));
    }

    if is_reserved_keyword(name) {
        return Err(ValidationError::ReservedKeyword(name.to_string()));
    }

    Ok(())
}

/// Check if a name is a reserved SQL keyword (case insensitive)
pub fn is_reserved_keyword(name: &str) -> bool {
    RESERVED_KEYWORDS
        .iter()
        .any(|keyword| keyword.eq_ignore_ascii_case(name))
}

/// A validated table name that is safe to use in SQL queries
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidatedTableName(String);

impl ValidatedTableName {
    pub fn new(name: &str) -> Result<Self, ValidationError> {
        validate_identifier(name)?;
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ValidatedTableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated column or output name (grouping keys, aggregate aliases)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidatedFieldName(String);

impl ValidatedFieldName {
    pub fn new(name: &str) -> Result<Self, ValidationError> {
        validate_identifier(name)?;
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ValidatedFieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        for name in ["orders", "order_items", "OrderItems", "_private", "t1", &"a".repeat(63)] {
            assert!(ValidatedTableName::new(name).is_ok(), "should accept {}", name);
        }
    }

    #[test]
    fn test_invalid_names() {
        let cases = [
            ("", ValidationError::Empty),
            ("1orders", ValidationError::InvalidStartCharacter("1orders".to_string())),
            ("order-items", ValidationError::InvalidCharacters("order-items".to_string())),
            ("orders; DROP TABLE orders", ValidationError::InvalidCharacters("orders; DROP TABLE orders".to_string())),
            ("select", ValidationError::ReservedKeyword("select".to_string())),
        ];

        for (name, expected) in cases {
            assert_eq!(ValidatedTableName::new(name).unwrap_err(), expected);
        }
    }

    #[test]
    fn test_too_long_name() {
        match ValidatedFieldName::new(&"a".repeat(64)).unwrap_err() {
            ValidationError::TooLong { length, max_length, .. } => {
                assert_eq!(length, 64);
                assert_eq!(max_length, 63);
            }
            other => panic!("Expected TooLong error, got {:?}", other),
        }
    }

    #[test]
    fn test_aggregate_names_are_reserved() {
        assert!(ValidatedFieldName::new("count").is_err());
        assert!(ValidatedFieldName::new("order_count").is_ok());
    }
}
