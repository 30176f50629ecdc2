//! SQL assembly
//!
//! Renders a [`QueryPlan`] into final SQL text. Clauses are emitted in the
//! fixed order SELECT, FROM, JOIN, WHERE, GROUP BY, HAVING, ORDER BY, LIMIT,
//! OFFSET. Grouped plans are rewritten into a two-stage statement: the
//! ungrouped select becomes a common table expression, and a grouping
//! subquery over it is joined back so per-row and aggregate columns come out
//! of one result set.

use crate::errors::QueryError;
use crate::query_builder::plan::{ClauseKind, QueryPlan, RowShape};
use crate::row::ParameterBag;
use crate::validation::ValidatedTableName;

/// Column carrying the result of [`SqlGenerator::assemble_count`]
pub const COUNT_COLUMN: &str = "row_count";

/// Final SQL, its parameters, and the metadata to read its rows back
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub sql: String,
    pub parameters: ParameterBag,
    pub shape: RowShape,
}

pub struct SqlGenerator;

impl SqlGenerator {
    /// Render `plan`; the plan is consumed
    pub fn assemble(plan: QueryPlan) -> Result<CompiledQuery, QueryError> {
        Self::validate_tables(&plan)?;

        let sql = if plan.is_grouped() {
            Self::build_grouped_query(&plan)?
        } else {
            join_lines([
                format!("SELECT {}", Self::build_select_clause(&plan)),
                Self::build_from_clause(&plan),
                Self::build_join_clause(&plan),
                Self::build_where_clause(plan.fragments(ClauseKind::Where)),
                Self::build_order_clause(plan.fragments(ClauseKind::OrderBy)),
                Self::build_limit_clause(&plan),
            ])
        };

        Ok(Self::finish(sql, plan))
    }

    /// Render a `COUNT(*)` over the filtered rows of `plan`
    pub fn assemble_count(plan: QueryPlan) -> Result<CompiledQuery, QueryError> {
        Self::validate_tables(&plan)?;
        if plan.is_grouped() {
            return Err(QueryError::unsupported(
                "GroupBy",
                "count is not available on grouped queries",
            ));
        }

        let sql = join_lines([
            format!("SELECT COUNT(*) AS {}", COUNT_COLUMN),
            Self::build_from_clause(&plan),
            Self::build_join_clause(&plan),
            Self::build_where_clause(plan.fragments(ClauseKind::Where)),
        ]);

        Ok(Self::finish(sql, plan))
    }

    fn finish(sql: String, plan: QueryPlan) -> CompiledQuery {
        tracing::debug!(sql = %sql, parameters = plan.parameters().len(), "Assembled query");
        let shape = plan.row_shape();
        CompiledQuery {
            sql,
            parameters: plan.into_parameters(),
            shape,
        }
    }

    /// Table names reach the SQL text verbatim
    fn validate_tables(plan: &QueryPlan) -> Result<(), QueryError> {
        for entity in plan.participants() {
            ValidatedTableName::new(entity.table_name)?;
        }
        Ok(())
    }

    /// Projection list, or every field of the root and joined entities
    pub fn build_select_clause(plan: &QueryPlan) -> String {
        let projection = plan.fragments(ClauseKind::Select);
        if !projection.is_empty() {
            return projection.join(ClauseKind::Select.separator());
        }

        let mut columns = plan.root_binding().select_list();
        for join in plan.joins() {
            columns.extend(join.related.select_list());
        }
        columns.join(ClauseKind::Select.separator())
    }

    pub fn build_from_clause(plan: &QueryPlan) -> String {
        format!(
            "FROM {}",
            plan.fragments(ClauseKind::From)
                .join(ClauseKind::From.separator())
        )
    }

    pub fn build_join_clause(plan: &QueryPlan) -> String {
        plan.fragments(ClauseKind::Join)
            .join(ClauseKind::Join.separator())
    }

    /// `WHERE` over the filter fragments; several are ANDed, each parenthesized
    pub fn build_where_clause(fragments: &[String]) -> String {
        match build_predicate(fragments) {
            Some(predicate) => format!("WHERE {}", predicate),
            None => String::new(),
        }
    }

    pub fn build_order_clause(fragments: &[String]) -> String {
        if fragments.is_empty() {
            return String::new();
        }
        format!(
            "ORDER BY {}",
            fragments.join(ClauseKind::OrderBy.separator())
        )
    }

    /// LIMIT/OFFSET; the latest call of each wins
    pub fn build_limit_clause(plan: &QueryPlan) -> String {
        let mut clauses = Vec::new();

        if let Some(limit) = plan.fragments(ClauseKind::Limit).last() {
            clauses.push(format!("LIMIT {}", limit));
        }

        if let Some(offset) = plan.fragments(ClauseKind::Offset).last() {
            clauses.push(format!("OFFSET {}", offset));
        }

        clauses.join("\n")
    }

    fn build_grouped_query(plan: &QueryPlan) -> Result<String, QueryError> {
        let config = plan.config();
        let group_fragments = plan.fragments(ClauseKind::GroupBy);
        let keys = plan.grouping_keys();
        if keys.is_empty() || keys.len() != group_fragments.len() {
            return Err(QueryError::unsupported(
                "GroupBy",
                "grouped query requires at least one grouping key",
            ));
        }

        let inner = join_lines([
            format!("SELECT {}", Self::build_select_clause(plan)),
            Self::build_from_clause(plan),
            Self::build_join_clause(plan),
            Self::build_where_clause(plan.fragments(ClauseKind::Where)),
        ]);

        let mut group_columns: Vec<String> = group_fragments
            .iter()
            .zip(keys)
            .map(|(fragment, key)| format!("{} AS {}", fragment, key.name))
            .collect();
        group_columns.extend(plan.fragments(ClauseKind::SelectAggregate).iter().cloned());

        let mut grouping = format!(
            "SELECT {} FROM {} {} GROUP BY {}",
            group_columns.join(ClauseKind::SelectAggregate.separator()),
            config.cte_name,
            config.cte_alias,
            group_fragments.join(ClauseKind::GroupBy.separator())
        );
        if let Some(having) = build_predicate(plan.fragments(ClauseKind::Having)) {
            grouping.push_str(&format!(" HAVING {}", having));
        }

        let on = group_fragments
            .iter()
            .zip(keys)
            .map(|(fragment, key)| format!("{} = {}.{}", fragment, config.group_alias, key.name))
            .collect::<Vec<_>>()
            .join(" AND ");

        Ok(join_lines([
            format!("WITH {} AS (\n{}\n)", config.cte_name, inner),
            format!("SELECT {}.*, {}.*", config.group_alias, config.cte_alias),
            format!("FROM {} {}", config.cte_name, config.cte_alias),
            format!("INNER JOIN ({}) {} ON {}", grouping, config.group_alias, on),
            Self::build_order_clause(plan.fragments(ClauseKind::OrderBy)),
            Self::build_limit_clause(plan),
        ]))
    }
}

fn build_predicate(fragments: &[String]) -> Option<String> {
    match fragments {
        [] => None,
        [single] => Some(single.clone()),
        many => Some(
            many.iter()
                .map(|fragment| format!("({})", fragment))
                .collect::<Vec<_>>()
                .join(ClauseKind::Where.separator()),
        ),
    }
}

fn join_lines<const N: usize>(parts: [String; N]) -> String {
    parts
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
