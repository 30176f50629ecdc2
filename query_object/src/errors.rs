//! Error types for query compilation, execution and materialization

use crate::validation::ValidationError;
use thiserror::Error;
use type_mapping::ConversionError;

#[derive(Error, Debug)]
pub enum QueryError {
    /// An expression shape outside the closed clause grammar
    #[error("Unsupported construct '{kind}': {detail}")]
    UnsupportedConstruct { kind: String, detail: String },

    /// A result column is missing or cannot be converted to the declared shape
    #[error("Row shape mismatch on column '{column}': {detail}")]
    RowShapeMismatch { column: String, detail: String },

    /// An entity type requested twice with conflicting expectations
    #[error("Ambiguous alias for entity '{entity}': {existing} conflicts with {requested}")]
    AmbiguousAlias {
        entity: String,
        existing: String,
        requested: String,
    },

    #[error("Unknown field '{field}' on entity '{entity}'")]
    UnknownField { entity: String, field: String },

    /// Constant folding failed (type mismatch, division by zero, ...)
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Failure reported by the execution collaborator, passed through unmodified
    #[error("Execution error: {0}")]
    Execution(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl QueryError {
    pub fn unsupported(kind: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::UnsupportedConstruct {
            kind: kind.into(),
            detail: detail.into(),
        }
    }

    pub fn row_shape(column: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::RowShapeMismatch {
            column: column.into(),
            detail: detail.into(),
        }
    }

    pub fn unknown_field(entity: &str, field: &str) -> Self {
        Self::UnknownField {
            entity: entity.to_string(),
            field: field.to_string(),
        }
    }

    pub fn evaluation(detail: impl Into<String>) -> Self {
        Self::Evaluation(detail.into())
    }

    pub fn execution<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Execution(Box::new(error))
    }

    pub fn conversion(column: impl Into<String>, error: ConversionError) -> Self {
        Self::row_shape(column, error.to_string())
    }
}
