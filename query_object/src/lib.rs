//! Query Object - query compiler and materializer for QueryHaus
//!
//! This crate turns declarative clause calls into parameterized SQL and
//! rebuilds typed object graphs from the flat rows the database returns:
//! the expression tree, alias registry, constant folding, clause
//! translation, plan assembly and materialization.

/// Trace logging that only compiles in with the `debug-logging` feature
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

pub mod alias;
pub mod ast;
pub mod errors;
pub mod folding;
pub mod materializer;
pub mod prelude;
pub mod query_builder;
pub mod row;
pub mod traits;
pub mod validation;

pub use alias::AliasRegistry;
pub use ast::Expr;
pub use errors::QueryError;
pub use folding::{matches, FoldingAnalyzer, Foldability};
pub use materializer::{EntityNode, GroupKey, Materializer};
pub use query_builder::{
    ClauseKind, CompiledQuery, GroupedQuery, JoinType, Query, QueryPlan, SortOrder,
};
pub use row::{ParameterBag, ResultRow};
pub use traits::*;
pub use validation::{ValidatedFieldName, ValidatedTableName, ValidationError};
