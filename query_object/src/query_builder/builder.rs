//! Fluent query construction
//!
//! ```ignore
//! let orders = Query::<Customer>::new()
//!     .join::<Order>(JoinType::Inner, field::<Customer>("id"), field::<Order>("customer_id"))?
//!     .filter(field::<Order>("status").eq("paid"))?
//!     .order_by(field::<Customer>("name"), SortOrder::Asc)?
//!     .to_list(&executor)
//!     .await?;
//! ```
//!
//! Every clause call appends exactly one fragment to the plan. Calls that
//! translate an expression return `Result` so an unsupported construct is
//! reported where it was declared.

use crate::ast::{AggregateFunction, Expr, Function};
use crate::errors::QueryError;
use crate::materializer::{GroupKey, Materializer};
use crate::query_builder::join::JoinType;
use crate::query_builder::ordering::SortOrder;
use crate::query_builder::plan::{ClauseKind, EntityBinding, JoinDescriptor, OutputKey, QueryPlan};
use crate::query_builder::sql_generation::{CompiledQuery, SqlGenerator, COUNT_COLUMN};
use crate::row::ResultRow;
use crate::traits::{Entity, QueryExecutor};
use crate::validation::ValidatedFieldName;
use config::QueryConfig;
use std::collections::HashMap;
use std::marker::PhantomData;
use type_mapping::{FromSqlValue, ValueKind};

/// Query over entity `T` producing `R` (a projection, or `T` itself)
#[derive(Debug)]
pub struct Query<T: Entity, R: Entity = T> {
    plan: QueryPlan,
    ordered: bool,
    _types: PhantomData<fn() -> (T, R)>,
}

impl<T: Entity> Default for Query<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> Query<T> {
    pub fn new() -> Self {
        Self::with_config(QueryConfig::default())
    }

    /// Query using the naming conventions of `config`
    pub fn with_config(config: QueryConfig) -> Self {
        Self {
            plan: QueryPlan::new(T::descriptor(), config),
            ordered: false,
            _types: PhantomData,
        }
    }

    /// Project every row into `P`; `projection` must be `construct::<P>(...)`
    pub fn select<P: Entity>(mut self, projection: Expr) -> Result<Query<T, P>, QueryError> {
        let target = P::descriptor();
        let fields = match &projection {
            Expr::Construct { target: constructed, bindings } if constructed.is_same(target) => bindings
                .iter()
                .map(|(name, _)| {
                    target
                        .field(name)
                        .ok_or_else(|| QueryError::unknown_field(target.type_name, name))
                })
                .collect::<Result<Vec<_>, _>>()?,
            other => {
                return Err(QueryError::unsupported(
                    other.kind_name(),
                    format!("select expects a construction of {}", target.type_name),
                ));
            }
        };

        ensure_participants(&self.plan, &projection)?;
        let select_list = self.plan.translate(&projection, ClauseKind::Select)?;
        let alias = self
            .plan
            .aliases()
            .lookup(target)
            .map(str::to_string)
            .ok_or_else(|| QueryError::unsupported("Construct", "projection alias was not registered"))?;

        self.plan.set_projection(
            EntityBinding {
                entity: target,
                alias,
                fields,
            },
            select_list,
        );

        Ok(Query {
            plan: self.plan,
            ordered: self.ordered,
            _types: PhantomData,
        })
    }

    /// Group rows by named keys; ordering must be declared afterwards
    pub fn group_by<I, S>(self, keys: I) -> Result<GroupedQuery<T>, QueryError>
    where
        I: IntoIterator<Item = (S, Expr)>,
        S: AsRef<str>,
    {
        if self.ordered {
            return Err(QueryError::unsupported(
                "OrderBy",
                "order_by must be declared after group_by in grouped queries",
            ));
        }

        let mut plan = self.plan;
        plan.begin_grouping();

        for (name, key) in keys {
            let name = output_name(&plan, name.as_ref())?;
            ensure_participants(&plan, &key)?;
            let fragment = plan.translate(&key, ClauseKind::GroupBy)?;
            let kind = infer_kind(&key);
            plan.add_grouping_key(OutputKey { name, kind }, fragment);
        }

        if plan.grouping_keys().is_empty() {
            return Err(QueryError::unsupported(
                "GroupBy",
                "at least one grouping key is required",
            ));
        }

        Ok(GroupedQuery {
            plan,
            _types: PhantomData,
        })
    }
}

impl<T: Entity, R: Entity> Query<T, R> {
    /// Add a predicate; multiple filters are ANDed
    pub fn filter(mut self, predicate: Expr) -> Result<Self, QueryError> {
        add_predicate(&mut self.plan, &predicate, ClauseKind::Where)?;
        Ok(self)
    }

    /// Join `U` on `left_key = right_key`; `left_key` must read an entity already in the query
    pub fn join<U: Entity>(mut self, join_type: JoinType, left_key: Expr, right_key: Expr) -> Result<Self, QueryError> {
        add_join::<U>(&mut self.plan, join_type, left_key, right_key)?;
        Ok(self)
    }

    pub fn inner_join<U: Entity>(self, left_key: Expr, right_key: Expr) -> Result<Self, QueryError> {
        self.join::<U>(JoinType::Inner, left_key, right_key)
    }

    pub fn left_join<U: Entity>(self, left_key: Expr, right_key: Expr) -> Result<Self, QueryError> {
        self.join::<U>(JoinType::Left, left_key, right_key)
    }

    pub fn order_by(mut self, key: Expr, order: SortOrder) -> Result<Self, QueryError> {
        add_order(&mut self.plan, &key, order)?;
        self.ordered = true;
        Ok(self)
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.plan.push(ClauseKind::Limit, limit.to_string());
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.plan.push(ClauseKind::Offset, offset.to_string());
        self
    }

    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    pub fn compile(self) -> Result<CompiledQuery, QueryError> {
        SqlGenerator::assemble(self.plan)
    }

    /// Execute and materialize every result
    pub async fn to_list<E>(self, executor: &E) -> Result<Vec<R>, QueryError>
    where
        E: QueryExecutor + ?Sized,
    {
        let compiled = self.compile()?;
        let rows = fetch(&compiled, executor).await?;
        let nodes = Materializer::new(&compiled.shape)?.materialize(&rows)?;
        nodes.iter().map(R::from_node).collect()
    }

    /// First result, if any.
    ///
    /// Queries building object graphs fetch every row of the first parent,
    /// so no `LIMIT` is applied to them.
    pub async fn first<E>(mut self, executor: &E) -> Result<Option<R>, QueryError>
    where
        E: QueryExecutor + ?Sized,
    {
        if self.plan.joins().is_empty() || self.plan.projection().is_some() {
            self.plan.push(ClauseKind::Limit, "1".to_string());
        }
        Ok(self.to_list(executor).await?.into_iter().next())
    }

    /// Number of rows matching the filters and joins
    pub async fn count<E>(self, executor: &E) -> Result<i64, QueryError>
    where
        E: QueryExecutor + ?Sized,
    {
        let compiled = SqlGenerator::assemble_count(self.plan)?;
        let rows = fetch(&compiled, executor).await?;
        let value = rows
            .first()
            .and_then(|row| row.get(COUNT_COLUMN))
            .ok_or_else(|| QueryError::row_shape(COUNT_COLUMN, "count query returned no value"))?;
        i64::from_sql_value(value).map_err(|e| QueryError::conversion(COUNT_COLUMN, e))
    }
}

/// Query grouped by named keys, materialized into groups of `T`
#[derive(Debug)]
pub struct GroupedQuery<T: Entity> {
    plan: QueryPlan,
    _types: PhantomData<fn() -> T>,
}

impl<T: Entity> GroupedQuery<T> {
    pub fn filter(mut self, predicate: Expr) -> Result<Self, QueryError> {
        add_predicate(&mut self.plan, &predicate, ClauseKind::Where)?;
        Ok(self)
    }

    pub fn join<U: Entity>(mut self, join_type: JoinType, left_key: Expr, right_key: Expr) -> Result<Self, QueryError> {
        add_join::<U>(&mut self.plan, join_type, left_key, right_key)?;
        Ok(self)
    }

    /// Add an aggregate column named `alias`; its value becomes part of the group key
    pub fn aggregate(mut self, alias: &str, aggregate: Expr) -> Result<Self, QueryError> {
        if !matches!(
            aggregate,
            Expr::Call {
                function: Function::Aggregate(_),
                ..
            }
        ) {
            return Err(QueryError::unsupported(
                aggregate.kind_name(),
                format!("aggregate '{}' must be an aggregate function call", alias),
            ));
        }

        let name = output_name(&self.plan, alias)?;
        ensure_participants(&self.plan, &aggregate)?;
        let fragment = self.plan.translate(&aggregate, ClauseKind::SelectAggregate)?;
        let kind = infer_kind(&aggregate);
        self.plan.add_aggregation_key(OutputKey { name, kind }, fragment);
        Ok(self)
    }

    /// Predicate over the groups; may use aggregates
    pub fn having(mut self, predicate: Expr) -> Result<Self, QueryError> {
        add_predicate(&mut self.plan, &predicate, ClauseKind::Having)?;
        Ok(self)
    }

    pub fn order_by(mut self, key: Expr, order: SortOrder) -> Result<Self, QueryError> {
        add_order(&mut self.plan, &key, order)?;
        Ok(self)
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.plan.push(ClauseKind::Limit, limit.to_string());
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.plan.push(ClauseKind::Offset, offset.to_string());
        self
    }

    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    pub fn compile(self) -> Result<CompiledQuery, QueryError> {
        SqlGenerator::assemble(self.plan)
    }

    /// Groups in first-seen order
    pub async fn to_group_list<E>(self, executor: &E) -> Result<Vec<(GroupKey, Vec<T>)>, QueryError>
    where
        E: QueryExecutor + ?Sized,
    {
        let compiled = self.compile()?;
        let rows = fetch(&compiled, executor).await?;
        let groups = Materializer::new(&compiled.shape)?.materialize_groups(&rows)?;

        groups
            .into_iter()
            .map(|(key, nodes)| {
                let members = nodes.iter().map(T::from_node).collect::<Result<Vec<_>, _>>()?;
                Ok((key, members))
            })
            .collect()
    }

    pub async fn to_groups<E>(self, executor: &E) -> Result<HashMap<GroupKey, Vec<T>>, QueryError>
    where
        E: QueryExecutor + ?Sized,
    {
        Ok(self.to_group_list(executor).await?.into_iter().collect())
    }
}

async fn fetch<E>(compiled: &CompiledQuery, executor: &E) -> Result<Vec<ResultRow>, QueryError>
where
    E: QueryExecutor + ?Sized,
{
    let rows = executor.execute(&compiled.sql, &compiled.parameters).await?;
    tracing::debug!(rows = rows.len(), "Fetched rows");
    Ok(rows)
}

fn add_predicate(plan: &mut QueryPlan, predicate: &Expr, clause: ClauseKind) -> Result<(), QueryError> {
    ensure_participants(plan, predicate)?;
    let fragment = plan.translate(predicate, clause)?;
    plan.push(clause, fragment);
    Ok(())
}

fn add_order(plan: &mut QueryPlan, key: &Expr, order: SortOrder) -> Result<(), QueryError> {
    ensure_participants(plan, key)?;
    let fragment = plan.translate(key, ClauseKind::OrderBy)?;
    plan.push(ClauseKind::OrderBy, format!("{} {}", fragment, order.to_sql()));
    Ok(())
}

fn add_join<U: Entity>(
    plan: &mut QueryPlan,
    join_type: JoinType,
    left_key: Expr,
    right_key: Expr,
) -> Result<(), QueryError> {
    let related = U::descriptor();
    if plan.participates(related) {
        return Err(QueryError::AmbiguousAlias {
            entity: related.type_name.to_string(),
            existing: "an entity already part of this query".to_string(),
            requested: "a second join".to_string(),
        });
    }

    let (left, _) = left_key.as_entity_member().ok_or_else(|| {
        QueryError::unsupported(left_key.kind_name(), "join keys must read entity fields")
    })?;
    if !plan.participates(left) {
        return Err(QueryError::unsupported(
            "Join",
            format!("left key reads {}, which is not part of the query", left.type_name),
        ));
    }

    let (right, _) = right_key.as_entity_member().ok_or_else(|| {
        QueryError::unsupported(right_key.kind_name(), "join keys must read entity fields")
    })?;
    if !right.is_same(related) {
        return Err(QueryError::unsupported(
            "Join",
            format!("right key must read a field of {}, found {}", related.type_name, right.type_name),
        ));
    }

    let condition = plan.translate(&left_key.eq(right_key), ClauseKind::Join)?;
    let alias = plan
        .aliases()
        .lookup(related)
        .map(str::to_string)
        .ok_or_else(|| QueryError::unsupported("Join", "joined entity alias was not registered"))?;

    let binding = EntityBinding::full(related, alias);
    if let Some(name) = plan.output_key_colliding_with(&binding) {
        return Err(QueryError::unsupported(
            "Join",
            format!(
                "output column '{}' collides with a flattened column of {}",
                name, related.type_name
            ),
        ));
    }

    plan.add_join(JoinDescriptor {
        join_type,
        left,
        related: binding,
        condition,
    });
    Ok(())
}

/// Every entity row read by `expr` must be the root or a joined entity
fn ensure_participants(plan: &QueryPlan, expr: &Expr) -> Result<(), QueryError> {
    if let Expr::Param(entity) = expr {
        if !plan.participates(entity) {
            return Err(QueryError::unsupported(
                "Param",
                format!("{} is not part of the query; join it first", entity.type_name),
            ));
        }
    }
    expr.children()
        .into_iter()
        .try_for_each(|child| ensure_participants(plan, child))
}

/// Validated, unique output column name of a grouped query
fn output_name(plan: &QueryPlan, name: &str) -> Result<String, QueryError> {
    let name = ValidatedFieldName::new(name)?;
    if plan.has_output_key(name.as_str()) {
        return Err(QueryError::unsupported(
            "GroupBy",
            format!("output column '{}' is declared twice", name),
        ));
    }
    if plan.has_row_column(name.as_str()) {
        return Err(QueryError::unsupported(
            "GroupBy",
            format!("output column '{}' collides with a flattened entity column", name),
        ));
    }
    Ok(name.into_string())
}

/// Kind a grouping or aggregate column is read back as
pub(crate) fn infer_kind(expr: &Expr) -> Option<ValueKind> {
    match expr {
        Expr::Literal(value) => value.kind(),
        Expr::Member { .. } => expr
            .as_entity_member()
            .and_then(|(entity, name)| entity.field(name))
            .map(|field| field.kind),
        Expr::Comparison { op, left, right } => {
            if op.is_comparison() {
                return Some(ValueKind::Bool);
            }
            match (infer_kind(left), infer_kind(right)) {
                (Some(ValueKind::Int), Some(ValueKind::Int)) => Some(ValueKind::Int),
                (Some(_), Some(_)) => Some(ValueKind::Float),
                _ => None,
            }
        }
        Expr::Logical { .. } => Some(ValueKind::Bool),
        Expr::Call {
            function: Function::Aggregate(aggregate),
            args,
        } => match aggregate {
            AggregateFunction::Count | AggregateFunction::CountDistinct => Some(ValueKind::Int),
            AggregateFunction::Avg => Some(ValueKind::Float),
            AggregateFunction::Sum | AggregateFunction::Min | AggregateFunction::Max => {
                args.first().and_then(infer_kind)
            }
        },
        Expr::Call { function, .. } if function.is_predicate_helper() => Some(ValueKind::Bool),
        _ => None,
    }
}
