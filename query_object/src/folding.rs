//! Constant folding
//!
//! [`FoldingAnalyzer`] decides which subtrees of an expression can be
//! resolved once at build time and evaluates them. Foldable subtrees end up
//! as a single bound parameter instead of being translated structurally.
//!
//! The evaluator is shared with [`matches`], which runs a predicate against
//! an already materialized entity.

use crate::ast::{BinaryOperator, Expr, Function, LogicalOperator};
use crate::errors::QueryError;
use crate::traits::{Entity, EntityDescriptor};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::marker::PhantomData;
use type_mapping::SqlValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Foldability {
    Foldable,
    NotFoldable,
}

/// Classifier and memoizing evaluator over one expression tree.
///
/// Results are keyed by node identity, so the analyzer borrows the tree for
/// its whole lifetime.
#[derive(Debug, Default)]
pub struct FoldingAnalyzer<'a> {
    classes: HashMap<*const Expr, Foldability>,
    values: HashMap<*const Expr, SqlValue>,
    _tree: PhantomData<&'a Expr>,
}

impl<'a> FoldingAnalyzer<'a> {
    pub fn new() -> Self {
        Self {
            classes: HashMap::new(),
            values: HashMap::new(),
            _tree: PhantomData,
        }
    }

    /// Classify `node`, and every node below it, depth first
    pub fn classify(&mut self, node: &'a Expr) -> Foldability {
        let key = node as *const Expr;
        if let Some(class) = self.classes.get(&key) {
            return *class;
        }

        // Children first so every node of the tree ends up classified
        let children_foldable = node
            .children()
            .into_iter()
            .fold(true, |all, child| self.classify(child) == Foldability::Foldable && all);

        let foldable = match node {
            Expr::Param(_) | Expr::Construct { .. } => false,
            Expr::Literal(_) => true,
            Expr::Call { function, args } => matches!(function, Function::Static(_)) && args.is_empty(),
            Expr::Member { .. } | Expr::Comparison { .. } | Expr::Logical { .. } => children_foldable,
        };

        let class = if foldable {
            Foldability::Foldable
        } else {
            Foldability::NotFoldable
        };
        self.classes.insert(key, class);
        class
    }

    pub fn is_foldable(&mut self, node: &'a Expr) -> bool {
        self.classify(node) == Foldability::Foldable
    }

    /// Value of `node` when it is foldable, `None` otherwise.
    ///
    /// Each foldable node is evaluated at most once per analyzer.
    pub fn fold(&mut self, node: &'a Expr) -> Result<Option<SqlValue>, QueryError> {
        if !self.is_foldable(node) {
            return Ok(None);
        }
        self.evaluate(node).map(Some)
    }

    /// Number of memoized values
    pub fn evaluated(&self) -> usize {
        self.values.len()
    }

    fn evaluate(&mut self, node: &'a Expr) -> Result<SqlValue, QueryError> {
        let key = node as *const Expr;
        if let Some(value) = self.values.get(&key) {
            return Ok(value.clone());
        }

        let value = match node {
            Expr::Literal(value) => value.clone(),
            Expr::Call {
                function: Function::Static(accessor),
                ..
            } => (accessor.get)(),
            Expr::Member { target, name } => {
                let target = self.evaluate(target)?;
                member_of(&target, name)?
            }
            Expr::Comparison { op, left, right } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                apply_binary(*op, &left, &right)?
            }
            Expr::Logical { op, left, right } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                apply_logical(*op, &left, &right)?
            }
            other => {
                return Err(QueryError::unsupported(
                    other.kind_name(),
                    "node cannot be evaluated at build time",
                ));
            }
        };

        self.values.insert(key, value.clone());
        Ok(value)
    }
}

/// Source of row values for in-memory evaluation
pub trait RowScope {
    fn field_value(&self, entity: &EntityDescriptor, field: &str) -> Option<SqlValue>;
}

/// Scope exposing the fields of one entity instance
pub struct EntityScope<'e, T: Entity>(pub &'e T);

impl<T: Entity> RowScope for EntityScope<'_, T> {
    fn field_value(&self, entity: &EntityDescriptor, field: &str) -> Option<SqlValue> {
        if T::descriptor().is_same(entity) {
            self.0.field_value(field)
        } else {
            None
        }
    }
}

/// Evaluate `predicate` against `entity` with SQL semantics.
///
/// A NULL outcome does not match, as in a `WHERE` clause.
pub fn matches<T: Entity>(predicate: &Expr, entity: &T) -> Result<bool, QueryError> {
    match evaluate_in_scope(predicate, &EntityScope(entity))? {
        SqlValue::Bool(b) => Ok(b),
        SqlValue::Null => Ok(false),
        other => Err(QueryError::evaluation(format!(
            "predicate produced {} instead of bool",
            other.type_name()
        ))),
    }
}

/// Evaluate any row-level expression against `scope`
pub fn evaluate_in_scope(expr: &Expr, scope: &dyn RowScope) -> Result<SqlValue, QueryError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Param(entity) => Err(QueryError::unsupported(
            "Param",
            format!("row of {} is not a value, access one of its fields", entity.type_name),
        )),
        Expr::Member { target, name } => match target.as_ref() {
            Expr::Param(entity) => scope
                .field_value(entity, name)
                .ok_or_else(|| QueryError::unknown_field(entity.type_name, name)),
            other => member_of(&evaluate_in_scope(other, scope)?, name),
        },
        Expr::Comparison { op, left, right } => {
            let left = evaluate_in_scope(left, scope)?;
            let right = evaluate_in_scope(right, scope)?;
            apply_binary(*op, &left, &right)
        }
        Expr::Logical { op, left, right } => {
            let left = evaluate_in_scope(left, scope)?;
            let right = evaluate_in_scope(right, scope)?;
            apply_logical(*op, &left, &right)
        }
        Expr::Call { function, args } => {
            if let Some(arity) = function.arity() {
                if args.len() != arity {
                    return Err(arity_error(function, arity, args.len()));
                }
            }
            match function {
                Function::Static(accessor) if args.is_empty() => Ok((accessor.get)()),
                Function::Between | Function::In | Function::NotIn | Function::Like => {
                    let values = args
                        .iter()
                        .map(|arg| evaluate_in_scope(arg, scope))
                        .collect::<Result<Vec<_>, _>>()?;
                    apply_predicate_helper(function, &values)
                }
                other => Err(QueryError::unsupported(
                    "Call",
                    format!("function '{}' cannot be evaluated per row", other.name()),
                )),
            }
        }
        Expr::Construct { target, .. } => Err(QueryError::unsupported(
            "Construct",
            format!("construction of {} cannot be evaluated", target.type_name),
        )),
    }
}

pub(crate) fn arity_error(function: &Function, expected: usize, found: usize) -> QueryError {
    QueryError::unsupported(
        "Call",
        format!(
            "{} expects {} arguments, found {}",
            function.name(),
            expected,
            found
        ),
    )
}

/// Field lookup on a folded value; only JSON objects have members
fn member_of(target: &SqlValue, name: &str) -> Result<SqlValue, QueryError> {
    match target {
        SqlValue::Null => Ok(SqlValue::Null),
        SqlValue::Json(serde_json::Value::Object(map)) => map
            .get(name)
            .map(json_to_sql)
            .ok_or_else(|| QueryError::evaluation(format!("no member '{}' in object", name))),
        other => Err(QueryError::evaluation(format!(
            "cannot access member '{}' of {}",
            name,
            other.type_name()
        ))),
    }
}

fn json_to_sql(value: &serde_json::Value) -> SqlValue {
    match value {
        serde_json::Value::Null => SqlValue::Null,
        serde_json::Value::Bool(b) => SqlValue::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Int(i),
            None => n.as_f64().map(SqlValue::Float).unwrap_or(SqlValue::Null),
        },
        serde_json::Value::String(s) => SqlValue::Text(s.clone()),
        serde_json::Value::Array(items) => SqlValue::List(items.iter().map(json_to_sql).collect()),
        object => SqlValue::Json(object.clone()),
    }
}

fn sql_equals(left: &SqlValue, right: &SqlValue) -> bool {
    left.compare(right) == Some(Ordering::Equal) || left == right
}

pub(crate) fn apply_binary(op: BinaryOperator, left: &SqlValue, right: &SqlValue) -> Result<SqlValue, QueryError> {
    if left.is_null() || right.is_null() {
        return Ok(SqlValue::Null);
    }

    if op.is_comparison() {
        let result = match op {
            BinaryOperator::Eq => sql_equals(left, right),
            BinaryOperator::Ne => !sql_equals(left, right),
            _ => {
                let ordering = left.compare(right).ok_or_else(|| {
                    QueryError::evaluation(format!(
                        "cannot compare {} with {}",
                        left.type_name(),
                        right.type_name()
                    ))
                })?;
                match op {
                    BinaryOperator::Gt => ordering == Ordering::Greater,
                    BinaryOperator::Gte => ordering != Ordering::Less,
                    BinaryOperator::Lt => ordering == Ordering::Less,
                    _ => ordering != Ordering::Greater,
                }
            }
        };
        return Ok(SqlValue::Bool(result));
    }

    if let (SqlValue::Int(a), SqlValue::Int(b)) = (left, right) {
        return integer_arithmetic(op, *a, *b).map(SqlValue::Int);
    }

    if op.is_bitwise() {
        return Err(QueryError::evaluation(format!(
            "operator {} requires integers, found {} and {}",
            op.to_sql(),
            left.type_name(),
            right.type_name()
        )));
    }

    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => {
            let value = match op {
                BinaryOperator::Add => a + b,
                BinaryOperator::Sub => a - b,
                BinaryOperator::Mul => a * b,
                BinaryOperator::Div | BinaryOperator::Rem if b == 0.0 => {
                    return Err(QueryError::evaluation("division by zero"));
                }
                BinaryOperator::Div => a / b,
                _ => a % b,
            };
            Ok(SqlValue::Float(value))
        }
        _ => Err(QueryError::evaluation(format!(
            "operator {} is not defined for {} and {}",
            op.to_sql(),
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn integer_arithmetic(op: BinaryOperator, a: i64, b: i64) -> Result<i64, QueryError> {
    let overflow = || QueryError::evaluation(format!("integer overflow in {} {} {}", a, op.to_sql(), b));
    match op {
        BinaryOperator::Add => a.checked_add(b).ok_or_else(overflow),
        BinaryOperator::Sub => a.checked_sub(b).ok_or_else(overflow),
        BinaryOperator::Mul => a.checked_mul(b).ok_or_else(overflow),
        BinaryOperator::Div | BinaryOperator::Rem if b == 0 => {
            Err(QueryError::evaluation("division by zero"))
        }
        BinaryOperator::Div => a.checked_div(b).ok_or_else(overflow),
        BinaryOperator::Rem => a.checked_rem(b).ok_or_else(overflow),
        BinaryOperator::BitAnd => Ok(a & b),
        BinaryOperator::BitOr => Ok(a | b),
        BinaryOperator::BitXor => Ok(a ^ b),
        BinaryOperator::Shl | BinaryOperator::Shr => {
            let shift = u32::try_from(b).ok().filter(|s| *s < 64).ok_or_else(overflow)?;
            Ok(if op == BinaryOperator::Shl { a << shift } else { a >> shift })
        }
        _ => Err(overflow()),
    }
}

/// Three-valued AND/OR
pub(crate) fn apply_logical(op: LogicalOperator, left: &SqlValue, right: &SqlValue) -> Result<SqlValue, QueryError> {
    let truth = |value: &SqlValue| -> Result<Option<bool>, QueryError> {
        match value {
            SqlValue::Null => Ok(None),
            SqlValue::Bool(b) => Ok(Some(*b)),
            other => Err(QueryError::evaluation(format!(
                "operator {} requires bool operands, found {}",
                op.to_sql(),
                other.type_name()
            ))),
        }
    };

    let result = match (op, truth(left)?, truth(right)?) {
        (LogicalOperator::And, Some(false), _) | (LogicalOperator::And, _, Some(false)) => Some(false),
        (LogicalOperator::And, Some(true), Some(true)) => Some(true),
        (LogicalOperator::Or, Some(true), _) | (LogicalOperator::Or, _, Some(true)) => Some(true),
        (LogicalOperator::Or, Some(false), Some(false)) => Some(false),
        _ => None,
    };
    Ok(result.map(SqlValue::Bool).unwrap_or(SqlValue::Null))
}

fn apply_predicate_helper(function: &Function, args: &[SqlValue]) -> Result<SqlValue, QueryError> {
    let target = &args[0];
    if target.is_null() {
        return Ok(SqlValue::Null);
    }

    match function {
        Function::Between => {
            let lower = apply_binary(BinaryOperator::Gte, target, &args[1])?;
            let upper = apply_binary(BinaryOperator::Lte, target, &args[2])?;
            apply_logical(LogicalOperator::And, &lower, &upper)
        }
        Function::In | Function::NotIn => {
            let items = match &args[1] {
                SqlValue::List(items) => items.as_slice(),
                single => std::slice::from_ref(single),
            };
            let found = items.iter().any(|item| !item.is_null() && sql_equals(target, item));
            Ok(SqlValue::Bool(found == matches!(function, Function::In)))
        }
        Function::Like => match (target.as_str(), args[1].as_str()) {
            (Some(text), Some(pattern)) => Ok(SqlValue::Bool(like_match(text, pattern))),
            _ if args[1].is_null() => Ok(SqlValue::Null),
            _ => Err(QueryError::evaluation(format!(
                "LIKE requires text operands, found {} and {}",
                target.type_name(),
                args[1].type_name()
            ))),
        },
        other => Err(QueryError::unsupported("Call", format!("'{}' is not a predicate", other.name()))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum LikeToken {
    AnyRun,
    AnyOne,
    Char(char),
}

fn like_tokens(pattern: &str) -> Vec<LikeToken> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '%' => LikeToken::AnyRun,
            '_' => LikeToken::AnyOne,
            // A trailing backslash matches itself
            '\\' => LikeToken::Char(chars.next().unwrap_or('\\')),
            other => LikeToken::Char(other),
        });
    }
    tokens
}

/// SQL `LIKE` with `%` and `_` wildcards and `\` escapes.
///
/// Greedy two-pointer match: on a mismatch only the most recent `%` is
/// widened by one character, so the cost is O(text × pattern).
fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern = like_tokens(pattern);

    let (mut t, mut p) = (0, 0);
    // (pattern index after the last `%`, text index it currently absorbs up to)
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some(LikeToken::AnyRun) => {
                p += 1;
                backtrack = Some((p, t));
                continue;
            }
            Some(LikeToken::AnyOne) => {
                t += 1;
                p += 1;
                continue;
            }
            Some(LikeToken::Char(c)) if *c == text[t] => {
                t += 1;
                p += 1;
                continue;
            }
            _ => {}
        }

        match backtrack {
            Some((resume, absorbed)) => {
                p = resume;
                t = absorbed + 1;
                backtrack = Some((resume, t));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|token| *token == LikeToken::AnyRun)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{between, field, lit, param, static_value};
    use crate::traits::entity::fixtures::Order;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    static THRESHOLD_READS: AtomicUsize = AtomicUsize::new(0);

    fn threshold() -> SqlValue {
        THRESHOLD_READS.fetch_add(1, AtomicOrdering::SeqCst);
        SqlValue::Int(40)
    }

    #[test]
    fn test_literal_arithmetic_folds() {
        let expr = lit(6i64) * 7i64;
        let mut analyzer = FoldingAnalyzer::new();
        assert_eq!(analyzer.classify(&expr), Foldability::Foldable);
        assert_eq!(analyzer.fold(&expr).unwrap(), Some(SqlValue::Int(42)));
    }

    #[test]
    fn test_fold_is_memoized_and_idempotent() {
        let expr = static_value("threshold", threshold) + 2i64;
        let mut analyzer = FoldingAnalyzer::new();

        let before = THRESHOLD_READS.load(AtomicOrdering::SeqCst);
        let first = analyzer.fold(&expr).unwrap();
        let second = analyzer.fold(&expr).unwrap();
        let after = THRESHOLD_READS.load(AtomicOrdering::SeqCst);

        assert_eq!(first, Some(SqlValue::Int(42)));
        assert_eq!(first, second);
        assert_eq!(after - before, 1);
    }

    #[test]
    fn test_param_rooted_access_never_folds() {
        let expr = field::<Order>("total").gt(lit(10i64) + 5i64);
        let row = param::<Order>();
        let mut analyzer = FoldingAnalyzer::new();

        assert_eq!(analyzer.classify(&expr), Foldability::NotFoldable);
        assert_eq!(analyzer.fold(&expr).unwrap(), None);
        assert_eq!(analyzer.fold(&row).unwrap(), None);

        // The constant side is still foldable on its own
        if let Expr::Comparison { right, .. } = &expr {
            assert_eq!(analyzer.fold(right).unwrap(), Some(SqlValue::Int(15)));
        }
    }

    #[test]
    fn test_json_member_and_errors() {
        let settings = lit(serde_json::json!({ "limit": 3 }));
        let expr = settings.member("limit");
        let division = lit(1i64) / 0i64;
        let mut analyzer = FoldingAnalyzer::new();

        assert_eq!(analyzer.fold(&expr).unwrap(), Some(SqlValue::Int(3)));
        assert!(matches!(analyzer.fold(&division), Err(QueryError::Evaluation(_))));
    }

    #[test]
    fn test_helpers_and_aggregates_are_not_foldable() {
        let helper = between(lit(1i64), lit(0i64), lit(2i64));
        let aggregate = crate::ast::count();
        let mut analyzer = FoldingAnalyzer::new();
        assert!(!analyzer.is_foldable(&helper));
        assert!(!analyzer.is_foldable(&aggregate));
    }

    #[test]
    fn test_matches_between_is_inclusive() {
        let order = Order {
            id: 1,
            customer_id: 1,
            status: "paid".into(),
            total: 10.0,
            items: Vec::new(),
        };

        assert!(matches(&field::<Order>("total").between(10i64, 20i64), &order).unwrap());
        assert!(matches(&field::<Order>("total").between(5i64, 10i64), &order).unwrap());
        assert!(!matches(&field::<Order>("total").between(20i64, 5i64), &order).unwrap());
        assert!(matches(&field::<Order>("status").like("pa%"), &order).unwrap());
        assert!(matches(&field::<Order>("id").not_in(vec![2i64, 3]), &order).unwrap());
    }

    #[test]
    fn test_three_valued_logic() {
        let null = SqlValue::Null;
        let yes = SqlValue::Bool(true);
        let no = SqlValue::Bool(false);
        assert_eq!(apply_logical(LogicalOperator::And, &null, &no).unwrap(), no);
        assert_eq!(apply_logical(LogicalOperator::And, &null, &yes).unwrap(), null);
        assert_eq!(apply_logical(LogicalOperator::Or, &null, &yes).unwrap(), yes);
    }

    #[test]
    fn test_like_wildcards() {
        assert!(like_match("widget-42", "widget-__"));
        assert!(like_match("100%", "100\\%"));
        assert!(!like_match("1000", "100\\%"));
        assert!(like_match("", "%"));
    }

    #[test]
    fn test_like_backtracks_only_to_last_wildcard() {
        let text = "a".repeat(40);
        assert!(!like_match(&text, &format!("{}b", "%a".repeat(10))));
        assert!(like_match(&text, &"%a".repeat(10)));
        assert!(like_match(&format!("{}b", text), &format!("{}b", "%a".repeat(10))));

        assert!(like_match("abcabd", "%abd"));
        assert!(like_match("mississippi", "m%iss%ppi"));
        assert!(!like_match("mississippi", "m%iss%pppi"));
        assert!(like_match("a_b", "a\\_b"));
        assert!(!like_match("axb", "a\\_b"));
        assert!(like_match("end\\", "end\\"));
    }
}
