//! Convenience re-exports for common query-object usage

// Entity metadata and execution
pub use crate::traits::{Cardinality, Entity, EntityDescriptor, FieldDescriptor, QueryExecutor, RelationDescriptor};

// Expression construction
pub use crate::ast::{
    avg, between, call, construct, count, count_distinct, count_of, field, in_list, like, lit,
    max, min, not_in, param, static_value, sum, Expr, IntoExpr,
};

// Query building
pub use crate::query_builder::{CompiledQuery, GroupedQuery, JoinType, Query, SortOrder};

// Results
pub use crate::materializer::{EntityNode, GroupKey};
pub use crate::row::{ParameterBag, ResultRow};

// Error types
pub use crate::errors::QueryError;

// In-memory predicate evaluation
pub use crate::folding::matches;

// Common external dependencies that are frequently used
pub use async_trait::async_trait;
pub use type_mapping::{FromSqlValue, SqlValue, ValueKind};
