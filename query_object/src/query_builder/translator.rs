//! Clause translator
//!
//! Lowers one expression into a SQL fragment. Values never reach the SQL
//! text: literals and folded constants are bound as parameters and only
//! their placeholders are emitted. NULL is the exception and renders as the
//! `NULL` keyword, since an untyped NULL parameter cannot be compared with a
//! non-text column. The grammar is closed, any node shape not
//! handled here is rejected with [`QueryError::UnsupportedConstruct`].

use crate::alias::AliasRegistry;
use crate::ast::{AggregateFunction, BinaryOperator, Expr, Function};
use crate::errors::QueryError;
use crate::folding::{arity_error, FoldingAnalyzer};
use crate::query_builder::plan::ClauseKind;
use crate::row::ParameterBag;
use crate::traits::EntityDescriptor;
use config::QueryConfig;
use type_mapping::SqlValue;

pub struct ClauseTranslator<'q> {
    aliases: &'q mut AliasRegistry,
    parameters: &'q mut ParameterBag,
    config: &'q QueryConfig,
    grouped: bool,
}

impl<'q> ClauseTranslator<'q> {
    pub fn new(
        aliases: &'q mut AliasRegistry,
        parameters: &'q mut ParameterBag,
        config: &'q QueryConfig,
        grouped: bool,
    ) -> Self {
        Self {
            aliases,
            parameters,
            config,
            grouped,
        }
    }

    /// Lower `expr` as it appears in `clause`
    pub fn translate(&mut self, expr: &Expr, clause: ClauseKind) -> Result<String, QueryError> {
        let mut analyzer = FoldingAnalyzer::new();
        self.lower(expr, clause, &mut analyzer)
    }

    fn lower<'a>(
        &mut self,
        expr: &'a Expr,
        clause: ClauseKind,
        analyzer: &mut FoldingAnalyzer<'a>,
    ) -> Result<String, QueryError> {
        match expr {
            Expr::Literal(SqlValue::List(_)) => Err(QueryError::unsupported(
                "Literal",
                "list literals are only valid as the set of IN / NOT IN",
            )),
            Expr::Literal(value) => Ok(self.value_sql(value.clone())),
            Expr::Param(entity) => Err(QueryError::unsupported(
                "Param",
                format!("row of {} must be accessed through one of its fields", entity.type_name),
            )),
            Expr::Member { target, name } => {
                if let Expr::Param(entity) = target.as_ref() {
                    return self.column(*entity, name, clause);
                }
                match analyzer.fold(expr)? {
                    Some(value) => self.bind_scalar(value),
                    None => Err(QueryError::unsupported(
                        "Member",
                        format!("member '{}' must be read from an entity row or a constant", name),
                    )),
                }
            }
            Expr::Comparison { op, left, right } => {
                if !op.is_comparison() {
                    if let Some(value) = analyzer.fold(expr)? {
                        return self.bind_scalar(value);
                    }
                }

                if matches!(op, BinaryOperator::Eq | BinaryOperator::Ne) {
                    if let Some(operand) = null_test_operand(left, right) {
                        let operand = self.lower(operand, clause, analyzer)?;
                        let test = if *op == BinaryOperator::Eq { "IS NULL" } else { "IS NOT NULL" };
                        return Ok(format!("{} {}", operand, test));
                    }
                }

                let left = self.lower(left, clause, analyzer)?;
                let right = self.lower(right, clause, analyzer)?;
                if op.is_comparison() {
                    Ok(format!("{} {} {}", left, op.to_sql(), right))
                } else {
                    Ok(format!("({} {} {})", left, op.to_sql(), right))
                }
            }
            Expr::Logical { op, left, right } => {
                let left = self.lower(left, clause, analyzer)?;
                let right = self.lower(right, clause, analyzer)?;
                Ok(format!("({}) {} ({})", left, op.to_sql(), right))
            }
            Expr::Call { function, args } => self.lower_call(expr, function, args, clause, analyzer),
            Expr::Construct { target, bindings } => self.lower_construct(*target, bindings, clause),
        }
    }

    fn lower_call<'a>(
        &mut self,
        expr: &'a Expr,
        function: &'a Function,
        args: &'a [Expr],
        clause: ClauseKind,
        analyzer: &mut FoldingAnalyzer<'a>,
    ) -> Result<String, QueryError> {
        match function {
            Function::Between | Function::In | Function::NotIn | Function::Like => {
                if !clause.accepts_predicates() {
                    return Err(QueryError::unsupported(
                        "Call",
                        format!(
                            "{} is a predicate helper and is only valid in WHERE or HAVING, not in {:?}",
                            function.name(),
                            clause
                        ),
                    ));
                }
                let arity = function.arity().unwrap_or(args.len());
                if args.len() != arity {
                    return Err(arity_error(function, arity, args.len()));
                }

                match function {
                    Function::Between => {
                        let target = self.lower(&args[0], clause, analyzer)?;
                        let low = self.lower(&args[1], clause, analyzer)?;
                        let high = self.lower(&args[2], clause, analyzer)?;
                        Ok(format!("({} BETWEEN {} AND {})", target, low, high))
                    }
                    Function::Like => {
                        let target = self.lower(&args[0], clause, analyzer)?;
                        let pattern = self.lower(&args[1], clause, analyzer)?;
                        Ok(format!("({} LIKE {})", target, pattern))
                    }
                    _ => {
                        let items = set_items(&args[1], analyzer)?;
                        let negated = matches!(function, Function::NotIn);
                        if items.is_empty() {
                            // Nothing is a member of the empty set
                            return Ok(if negated { "1=1" } else { "1=0" }.to_string());
                        }
                        let target = self.lower(&args[0], clause, analyzer)?;
                        let placeholders = items
                            .into_iter()
                            .map(|item| self.value_sql(item))
                            .collect::<Vec<_>>();
                        Ok(format!(
                            "({} {} ({}))",
                            target,
                            function.name(),
                            placeholders.join(", ")
                        ))
                    }
                }
            }
            Function::Aggregate(aggregate) => {
                if !clause.accepts_aggregates() {
                    return Err(QueryError::unsupported(
                        "Call",
                        format!(
                            "aggregate {} is only valid in HAVING or aggregate selections, not in {:?}",
                            aggregate.to_sql(),
                            clause
                        ),
                    ));
                }
                match (aggregate, args) {
                    (AggregateFunction::Count, []) => Ok("COUNT(*)".to_string()),
                    (AggregateFunction::CountDistinct, [arg]) => {
                        let arg = self.lower(arg, clause, analyzer)?;
                        Ok(format!("COUNT(DISTINCT {})", arg))
                    }
                    (_, [arg]) => {
                        let arg = self.lower(arg, clause, analyzer)?;
                        Ok(format!("{}({})", aggregate.to_sql(), arg))
                    }
                    _ => Err(arity_error(function, 1, args.len())),
                }
            }
            Function::Static(accessor) => match analyzer.fold(expr)? {
                Some(value) => self.bind_scalar(value),
                None => Err(QueryError::unsupported(
                    "Call",
                    format!("static accessor '{}' takes no arguments", accessor.name),
                )),
            },
            Function::Named(name) => Err(QueryError::unsupported(
                "Call",
                format!("function '{}' is outside the query grammar", name),
            )),
        }
    }

    fn lower_construct(
        &mut self,
        target: &'static EntityDescriptor,
        bindings: &[(String, Expr)],
        clause: ClauseKind,
    ) -> Result<String, QueryError> {
        if clause != ClauseKind::Select {
            return Err(QueryError::unsupported(
                "Construct",
                format!("projection into {} is only valid in SELECT", target.type_name),
            ));
        }
        if bindings.is_empty() {
            return Err(QueryError::unsupported(
                "Construct",
                format!("projection into {} binds no fields", target.type_name),
            ));
        }

        let target_alias = self.aliases.alias_for(target)?;
        let mut columns = Vec::with_capacity(bindings.len());
        let mut seen: Vec<&str> = Vec::with_capacity(bindings.len());

        for (name, value) in bindings {
            let field = target
                .field(name)
                .ok_or_else(|| QueryError::unknown_field(target.type_name, name))?;
            if seen.contains(&field.name) {
                return Err(QueryError::unsupported(
                    "Construct",
                    format!("field '{}' of {} is bound twice", name, target.type_name),
                ));
            }
            seen.push(field.name);

            let (source, source_name) = value.as_entity_member().ok_or_else(|| {
                QueryError::unsupported(
                    "Construct",
                    format!(
                        "binding '{}' must read a field of an entity row, found {}",
                        name,
                        value.kind_name()
                    ),
                )
            })?;
            let source_field = source
                .field(source_name)
                .ok_or_else(|| QueryError::unknown_field(source.type_name, source_name))?;
            let source_alias = self.aliases.alias_for(source)?;

            columns.push(format!(
                "{}.{} AS {}_{}",
                source_alias, source_field.column, target_alias, field.name
            ));
        }

        Ok(columns.join(", "))
    }

    /// Column reference of `entity.name` as seen from `clause`
    fn column(
        &mut self,
        entity: &'static EntityDescriptor,
        name: &str,
        clause: ClauseKind,
    ) -> Result<String, QueryError> {
        let field = entity
            .field(name)
            .ok_or_else(|| QueryError::unknown_field(entity.type_name, name))?;

        if self.reads_grouped_columns(clause) {
            let alias = self.aliases.lookup(entity).ok_or_else(|| {
                QueryError::unsupported(
                    "Member",
                    format!("{} is not part of the grouped query", entity.type_name),
                )
            })?;
            Ok(format!("{}.{}_{}", self.config.cte_alias, alias, field.name))
        } else {
            let alias = self.aliases.alias_for(entity)?;
            Ok(format!("{}.{}", alias, field.column))
        }
    }

    fn reads_grouped_columns(&self, clause: ClauseKind) -> bool {
        clause.reads_grouped_columns() || (self.grouped && clause == ClauseKind::OrderBy)
    }

    fn bind_scalar(&mut self, value: SqlValue) -> Result<String, QueryError> {
        if let SqlValue::List(_) = value {
            return Err(QueryError::unsupported(
                "Literal",
                "constant evaluated to a list outside IN / NOT IN",
            ));
        }
        Ok(self.value_sql(value))
    }

    /// Placeholder bound to `value`, or the `NULL` keyword
    fn value_sql(&mut self, value: SqlValue) -> String {
        match value {
            SqlValue::Null => "NULL".to_string(),
            value => self.parameters.push(value),
        }
    }
}

/// Operand compared against a NULL literal, if any
fn null_test_operand<'a>(left: &'a Expr, right: &'a Expr) -> Option<&'a Expr> {
    match (left, right) {
        (operand, Expr::Literal(SqlValue::Null)) => Some(operand),
        (Expr::Literal(SqlValue::Null), operand) => Some(operand),
        _ => None,
    }
}

/// Members of the set operand of IN / NOT IN; it must be a constant
fn set_items<'a>(set: &'a Expr, analyzer: &mut FoldingAnalyzer<'a>) -> Result<Vec<SqlValue>, QueryError> {
    match analyzer.fold(set)? {
        Some(SqlValue::List(items)) => Ok(items),
        Some(single) => Ok(vec![single]),
        None => Err(QueryError::unsupported(
            set.kind_name(),
            "the set of IN / NOT IN must be a list literal or a constant",
        )),
    }
}
