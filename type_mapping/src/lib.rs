//! Unified value mapping between Rust types and SQL values
//! This crate provides the value model used across the queryhaus ecosystem

pub mod convert;
pub mod sql;
pub mod types;

// Re-export commonly used items
pub use convert::{ConversionError, FromSqlValue};
pub use sql::{is_optional_type, rust_type_to_value_kind_variant, strip_option};
pub use types::{SqlValue, ValueKind};
