//! # QueryHaus
//!
//! A typed query compiler for PostgreSQL: fluent expressions over entity
//! types are compiled into parameterized SQL, executed, and the flat result
//! rows are materialized back into object graphs or groups.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use queryhaus::prelude::*;
//!
//! #[entity]
//! #[table(name = "customers")]
//! pub struct Customer {
//!     #[primary_key]
//!     pub id: i64,
//!     pub name: String,
//!     #[relation]
//!     pub orders: Vec<Order>,
//! }
//!
//! #[entity]
//! #[table(name = "orders")]
//! pub struct Order {
//!     #[primary_key]
//!     pub id: i64,
//!     pub customer_id: i64,
//!     pub status: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig::new(
//!         "localhost".to_string(), 5432, "shop".to_string(),
//!         "postgres".to_string(), "password".to_string(),
//!         1, 5, 30,
//!     );
//!     let queryhaus = QueryHaus::new(config).await?;
//!
//!     let customers = queryhaus
//!         .query::<Customer>()
//!         .inner_join::<Order>(field::<Customer>("id"), field::<Order>("customer_id"))?
//!         .filter(field::<Order>("status").eq("paid"))?
//!         .to_list(queryhaus.executor())
//!         .await?;
//!
//!     for customer in customers {
//!         println!("{} has {} paid orders", customer.name, customer.orders.len());
//!     }
//!     Ok(())
//! }
//! ```

/// Conditional debug logging macros
/// These macros only compile in code when the `debug-logging` feature is enabled
#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

// Generated entity code names `::queryhaus`, which must also resolve inside this crate
extern crate self as queryhaus;

pub mod core;
pub mod errors;
pub mod executor;
pub mod prelude;

// Re-export the main public types for convenience
pub use crate::core::QueryHaus;
pub use crate::errors::QueryHausError;
pub use crate::executor::PgExecutor;

// Re-export centralized config
pub use config::{AppConfig, DatabaseConfig, QueryConfig};

// Re-export internal crates used by macros and public API
// These MUST be public for the generated macro code to work correctly
pub use entity_derive::{entity, Entity};
pub use query_object;
pub use type_mapping;

// Re-export external dependencies used in public API
pub use async_trait;
pub use sqlx;
