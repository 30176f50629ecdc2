//! Query builder
//!
//! Fluent clause calls feed a [`QueryPlan`] through the clause translator;
//! the SQL generator renders the plan and the materializer reads the rows
//! back.

pub mod builder;
pub mod join;
pub mod ordering;
pub mod plan;
pub mod sql_generation;
pub mod translator;

#[cfg(test)]
mod tests;


pub use builder::{GroupedQuery, Query};
pub use join::JoinType;
pub use ordering::SortOrder;
pub use plan::{ClauseKind, EntityBinding, JoinDescriptor, OutputKey, QueryPlan, RowShape};
pub use sql_generation::{CompiledQuery, SqlGenerator};
pub use translator::ClauseTranslator;
