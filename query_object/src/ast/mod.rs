//! Expression tree
//!
//! Predicates, selectors, join keys, sort keys and aggregates are all
//! described as [`Expr`] values built with the functions in [`builders`] and
//! the operator overloads on `Expr`. The tree is immutable once built.

pub mod builders;
pub mod operators;

pub use builders::{
    avg, between, call, construct, count, count_distinct, count_of, field, in_list, like, lit,
    max, min, not_in, param, static_value, sum, IntoExpr,
};
pub use operators::{AggregateFunction, BinaryOperator, Function, LogicalOperator, StaticAccessor};

use crate::traits::EntityDescriptor;
use type_mapping::SqlValue;

#[derive(Debug, Clone)]
pub enum Expr {
    /// Comparison, arithmetic or bitwise operation
    Comparison {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Field access, `target.name`
    Member { target: Box<Expr>, name: String },
    Literal(SqlValue),
    Call { function: Function, args: Vec<Expr> },
    /// Construction of a projection type from bound expressions
    Construct {
        target: &'static EntityDescriptor,
        bindings: Vec<(String, Expr)>,
    },
    /// The row of an entity participating in the query
    Param(&'static EntityDescriptor),
}

impl Expr {
    /// Node tag, used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Comparison { .. } => "Comparison",
            Expr::Logical { .. } => "Logical",
            Expr::Member { .. } => "Member",
            Expr::Literal(_) => "Literal",
            Expr::Call { .. } => "Call",
            Expr::Construct { .. } => "Construct",
            Expr::Param(_) => "Param",
        }
    }

    /// Direct children in evaluation order
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Comparison { left, right, .. } | Expr::Logical { left, right, .. } => {
                vec![left.as_ref(), right.as_ref()]
            }
            Expr::Member { target, .. } => vec![target.as_ref()],
            Expr::Call { args, .. } => args.iter().collect(),
            Expr::Construct { bindings, .. } => bindings.iter().map(|(_, e)| e).collect(),
            Expr::Literal(_) | Expr::Param(_) => Vec::new(),
        }
    }

    /// Entity and field name when this is a member access on an entity row
    pub fn as_entity_member(&self) -> Option<(&'static EntityDescriptor, &str)> {
        match self {
            Expr::Member { target, name } => match target.as_ref() {
                Expr::Param(entity) => Some((*entity, name.as_str())),
                _ => None,
            },
            _ => None,
        }
    }
}
