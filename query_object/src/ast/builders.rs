//! Expression constructors
//!
//! ```ignore
//! let recent_paid = field::<Order>("status")
//!     .eq("paid")
//!     .and(field::<Order>("placed_on").between(begin, end));
//! let doubled = field::<Order>("total") * 2;
//! ```

use super::{AggregateFunction, BinaryOperator, Expr, Function, LogicalOperator, StaticAccessor};
use crate::traits::Entity;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::ops;
use type_mapping::SqlValue;
use uuid::Uuid;

/// Conversion into an expression operand.
///
/// Plain values become literals, expressions pass through.
pub trait IntoExpr {
    fn into_expr(self) -> Expr;
}

impl IntoExpr for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

impl IntoExpr for &Expr {
    fn into_expr(self) -> Expr {
        self.clone()
    }
}

macro_rules! literal_into_expr {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoExpr for $ty {
                fn into_expr(self) -> Expr {
                    Expr::Literal(SqlValue::from(self))
                }
            }
        )*
    };
}

literal_into_expr!(
    bool,
    i8,
    u8,
    u16,
    u32,
    u64,
    i16,
    i32,
    i64,
    f32,
    f64,
    String,
    &str,
    Uuid,
    DateTime<Utc>,
    NaiveDateTime,
    NaiveDate,
    serde_json::Value,
);

impl IntoExpr for SqlValue {
    fn into_expr(self) -> Expr {
        Expr::Literal(self)
    }
}

impl<T: Into<SqlValue>> IntoExpr for Option<T> {
    fn into_expr(self) -> Expr {
        Expr::Literal(SqlValue::from(self))
    }
}

impl<T: Into<SqlValue>> IntoExpr for Vec<T> {
    fn into_expr(self) -> Expr {
        Expr::Literal(SqlValue::from(self))
    }
}

/// Row reference of entity `T`
pub fn param<T: Entity>() -> Expr {
    Expr::Param(T::descriptor())
}

/// `T.name`
pub fn field<T: Entity>(name: &str) -> Expr {
    param::<T>().member(name)
}

pub fn lit(value: impl Into<SqlValue>) -> Expr {
    Expr::Literal(value.into())
}

/// A value produced by `get` once per query build
pub fn static_value(name: &'static str, get: fn() -> SqlValue) -> Expr {
    Expr::Call {
        function: Function::Static(StaticAccessor { name, get }),
        args: Vec::new(),
    }
}

/// A call outside the query grammar; building is allowed, translating is not
pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Expr {
    Expr::Call {
        function: Function::Named(name.into()),
        args,
    }
}

pub fn between(target: impl IntoExpr, low: impl IntoExpr, high: impl IntoExpr) -> Expr {
    Expr::Call {
        function: Function::Between,
        args: vec![target.into_expr(), low.into_expr(), high.into_expr()],
    }
}

pub fn in_list(target: impl IntoExpr, values: impl IntoExpr) -> Expr {
    Expr::Call {
        function: Function::In,
        args: vec![target.into_expr(), values.into_expr()],
    }
}

pub fn not_in(target: impl IntoExpr, values: impl IntoExpr) -> Expr {
    Expr::Call {
        function: Function::NotIn,
        args: vec![target.into_expr(), values.into_expr()],
    }
}

pub fn like(target: impl IntoExpr, pattern: impl IntoExpr) -> Expr {
    Expr::Call {
        function: Function::Like,
        args: vec![target.into_expr(), pattern.into_expr()],
    }
}

fn aggregate(function: AggregateFunction, args: Vec<Expr>) -> Expr {
    Expr::Call {
        function: Function::Aggregate(function),
        args,
    }
}

/// `COUNT(*)`
pub fn count() -> Expr {
    aggregate(AggregateFunction::Count, Vec::new())
}

pub fn count_of(target: impl IntoExpr) -> Expr {
    aggregate(AggregateFunction::Count, vec![target.into_expr()])
}

pub fn count_distinct(target: impl IntoExpr) -> Expr {
    aggregate(AggregateFunction::CountDistinct, vec![target.into_expr()])
}

pub fn sum(target: impl IntoExpr) -> Expr {
    aggregate(AggregateFunction::Sum, vec![target.into_expr()])
}

pub fn avg(target: impl IntoExpr) -> Expr {
    aggregate(AggregateFunction::Avg, vec![target.into_expr()])
}

pub fn min(target: impl IntoExpr) -> Expr {
    aggregate(AggregateFunction::Min, vec![target.into_expr()])
}

pub fn max(target: impl IntoExpr) -> Expr {
    aggregate(AggregateFunction::Max, vec![target.into_expr()])
}

/// Projection into `P`, bindings are `(field of P, source expression)`
pub fn construct<P: Entity>(bindings: Vec<(&str, Expr)>) -> Expr {
    Expr::Construct {
        target: P::descriptor(),
        bindings: bindings
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect(),
    }
}

impl Expr {
    fn binary(self, op: BinaryOperator, rhs: impl IntoExpr) -> Expr {
        Expr::Comparison {
            op,
            left: Box::new(self),
            right: Box::new(rhs.into_expr()),
        }
    }

    fn logical(self, op: LogicalOperator, rhs: Expr) -> Expr {
        Expr::Logical {
            op,
            left: Box::new(self),
            right: Box::new(rhs),
        }
    }

    pub fn member(self, name: &str) -> Expr {
        Expr::Member {
            target: Box::new(self),
            name: name.to_string(),
        }
    }

    pub fn eq(self, rhs: impl IntoExpr) -> Expr {
        self.binary(BinaryOperator::Eq, rhs)
    }

    pub fn ne(self, rhs: impl IntoExpr) -> Expr {
        self.binary(BinaryOperator::Ne, rhs)
    }

    pub fn gt(self, rhs: impl IntoExpr) -> Expr {
        self.binary(BinaryOperator::Gt, rhs)
    }

    pub fn gte(self, rhs: impl IntoExpr) -> Expr {
        self.binary(BinaryOperator::Gte, rhs)
    }

    pub fn lt(self, rhs: impl IntoExpr) -> Expr {
        self.binary(BinaryOperator::Lt, rhs)
    }

    pub fn lte(self, rhs: impl IntoExpr) -> Expr {
        self.binary(BinaryOperator::Lte, rhs)
    }

    pub fn and(self, rhs: Expr) -> Expr {
        self.logical(LogicalOperator::And, rhs)
    }

    pub fn or(self, rhs: Expr) -> Expr {
        self.logical(LogicalOperator::Or, rhs)
    }

    pub fn between(self, low: impl IntoExpr, high: impl IntoExpr) -> Expr {
        between(self, low, high)
    }

    pub fn in_list(self, values: impl IntoExpr) -> Expr {
        in_list(self, values)
    }

    pub fn not_in(self, values: impl IntoExpr) -> Expr {
        not_in(self, values)
    }

    pub fn like(self, pattern: impl IntoExpr) -> Expr {
        like(self, pattern)
    }
}

macro_rules! binary_operator_overload {
    ($($trait:ident :: $method:ident => $op:ident),* $(,)?) => {
        $(
            impl<R: IntoExpr> ops::$trait<R> for Expr {
                type Output = Expr;

                fn $method(self, rhs: R) -> Expr {
                    self.binary(BinaryOperator::$op, rhs)
                }
            }
        )*
    };
}

binary_operator_overload!(
    Add::add => Add,
    Sub::sub => Sub,
    Mul::mul => Mul,
    Div::div => Div,
    Rem::rem => Rem,
    BitAnd::bitand => BitAnd,
    BitOr::bitor => BitOr,
    BitXor::bitxor => BitXor,
    Shl::shl => Shl,
    Shr::shr => Shr,
);
