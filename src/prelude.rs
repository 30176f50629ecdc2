//! Convenience re-exports for common QueryHaus usage
//!
//! This prelude module re-exports the most commonly used items from the QueryHaus ecosystem,
//! making it easier to import everything you need with a single use statement.
//!
//! # Example
//!
//! ```rust
//! use queryhaus::prelude::*;
//!
//! // Now you have access to the query builders, entity macros and executor
//! ```

// Core QueryHaus components
pub use crate::core::QueryHaus;
pub use crate::errors::QueryHausError;
pub use crate::executor::PgExecutor;

// Re-export centralized config
pub use config::{AppConfig, DatabaseConfig, QueryConfig};

// Re-export commonly used query-object types for convenience
pub use query_object::prelude::*;

// Re-export entity derive for model creation
pub use entity_derive::{entity, Entity};

// Common external dependencies
pub use anyhow;
pub use sqlx;
pub use tokio;

// Commonly used chrono and uuid types for entity fields
pub use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
pub use uuid::Uuid;
pub use sqlx::PgPool;
