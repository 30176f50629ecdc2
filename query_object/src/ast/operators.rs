//! Operator and function tables of the expression grammar

use type_mapping::SqlValue;

/// Binary operators of `Comparison` nodes: comparison, arithmetic and bitwise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinaryOperator {
    pub fn to_sql(&self) -> &'static str {
        match self {
            BinaryOperator::Eq => "=",
            BinaryOperator::Ne => "!=",
            BinaryOperator::Gt => ">",
            BinaryOperator::Gte => ">=",
            BinaryOperator::Lt => "<",
            BinaryOperator::Lte => "<=",
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Rem => "%",
            BinaryOperator::BitAnd => "&",
            BinaryOperator::BitOr => "|",
            BinaryOperator::BitXor => "^",
            BinaryOperator::Shl => "<<",
            BinaryOperator::Shr => ">>",
        }
    }

    /// True for operators producing a boolean
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Eq
                | BinaryOperator::Ne
                | BinaryOperator::Gt
                | BinaryOperator::Gte
                | BinaryOperator::Lt
                | BinaryOperator::Lte
        )
    }

    pub fn is_bitwise(&self) -> bool {
        matches!(
            self,
            BinaryOperator::BitAnd
                | BinaryOperator::BitOr
                | BinaryOperator::BitXor
                | BinaryOperator::Shl
                | BinaryOperator::Shr
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    pub fn to_sql(&self) -> &'static str {
        match self {
            LogicalOperator::And => "AND",
            LogicalOperator::Or => "OR",
        }
    }
}

/// Aggregate functions available in `HAVING` and aggregate select lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    Count,
    CountDistinct,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    pub fn to_sql(&self) -> &'static str {
        match self {
            AggregateFunction::Count | AggregateFunction::CountDistinct => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        }
    }
}

/// A named zero-argument value source resolved at build time
#[derive(Debug, Clone, Copy)]
pub struct StaticAccessor {
    pub name: &'static str,
    pub get: fn() -> SqlValue,
}

/// Callee of a `Call` node
#[derive(Debug, Clone)]
pub enum Function {
    /// `(field BETWEEN lo AND hi)`, inclusive
    Between,
    /// `(field IN (...))`
    In,
    /// `(field NOT IN (...))`
    NotIn,
    /// `(field LIKE pattern)`
    Like,
    Aggregate(AggregateFunction),
    Static(StaticAccessor),
    /// Any other call; outside the grammar and always rejected by the translator
    Named(String),
}

impl Function {
    pub fn name(&self) -> &str {
        match self {
            Function::Between => "BETWEEN",
            Function::In => "IN",
            Function::NotIn => "NOT IN",
            Function::Like => "LIKE",
            Function::Aggregate(aggregate) => aggregate.to_sql(),
            Function::Static(accessor) => accessor.name,
            Function::Named(name) => name,
        }
    }

    /// Reserved predicate helpers
    pub fn is_predicate_helper(&self) -> bool {
        matches!(
            self,
            Function::Between | Function::In | Function::NotIn | Function::Like
        )
    }

    /// Argument count of the reserved helpers
    pub fn arity(&self) -> Option<usize> {
        match self {
            Function::Between => Some(3),
            Function::In | Function::NotIn | Function::Like => Some(2),
            _ => None,
        }
    }
}
