//! Execution collaborator
//!
//! The compiler never talks to a database itself. A [`QueryExecutor`] runs one
//! statement per logical query and hands back flat rows.

use crate::errors::QueryError;
use crate::row::{ParameterBag, ResultRow};
use async_trait::async_trait;

#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run `sql` with `parameters` bound in bag order.
    ///
    /// Driver failures should be reported as [`QueryError::Execution`] without
    /// reinterpretation.
    async fn execute(&self, sql: &str, parameters: &ParameterBag) -> Result<Vec<ResultRow>, QueryError>;
}
