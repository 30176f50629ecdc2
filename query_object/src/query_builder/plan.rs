//! Query plan
//!
//! The plan accumulates one fragment list per [`ClauseKind`] in call order,
//! together with the metadata the materializer needs to read the rows back:
//! which entity sits behind which alias, how joins hang together, and the
//! names of grouping and aggregation columns.

use crate::alias::AliasRegistry;
use crate::ast::Expr;
use crate::errors::QueryError;
use crate::query_builder::join::JoinType;
use crate::query_builder::translator::ClauseTranslator;
use crate::row::ParameterBag;
use crate::traits::{EntityDescriptor, FieldDescriptor};
use config::QueryConfig;
use std::collections::BTreeMap;
use type_mapping::ValueKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClauseKind {
    Select,
    From,
    Join,
    Where,
    GroupBy,
    Having,
    SelectAggregate,
    OrderBy,
    Limit,
    Offset,
}

impl ClauseKind {
    pub const ALL: [ClauseKind; 10] = [
        ClauseKind::Select,
        ClauseKind::From,
        ClauseKind::Join,
        ClauseKind::Where,
        ClauseKind::GroupBy,
        ClauseKind::Having,
        ClauseKind::SelectAggregate,
        ClauseKind::OrderBy,
        ClauseKind::Limit,
        ClauseKind::Offset,
    ];

    /// Separator between fragments of the same clause
    pub fn separator(&self) -> &'static str {
        match self {
            ClauseKind::Select | ClauseKind::GroupBy | ClauseKind::SelectAggregate | ClauseKind::OrderBy => ", ",
            ClauseKind::Where | ClauseKind::Having => " AND ",
            ClauseKind::From | ClauseKind::Join | ClauseKind::Limit | ClauseKind::Offset => "\n",
        }
    }

    /// Clauses in which the reserved predicate helpers may appear
    pub fn accepts_predicates(&self) -> bool {
        matches!(self, ClauseKind::Where | ClauseKind::Having)
    }

    /// Clauses in which aggregate functions may appear
    pub fn accepts_aggregates(&self) -> bool {
        matches!(self, ClauseKind::Having | ClauseKind::SelectAggregate)
    }

    /// Clauses rendered against the flattened columns of the grouping CTE
    pub fn reads_grouped_columns(&self) -> bool {
        matches!(
            self,
            ClauseKind::GroupBy | ClauseKind::Having | ClauseKind::SelectAggregate
        )
    }
}

/// An entity behind an alias, with the fields selected for it
#[derive(Debug, Clone)]
pub struct EntityBinding {
    pub entity: &'static EntityDescriptor,
    pub alias: String,
    pub fields: Vec<&'static FieldDescriptor>,
}

impl EntityBinding {
    /// Binding selecting every field of `entity`
    pub fn full(entity: &'static EntityDescriptor, alias: impl Into<String>) -> Self {
        Self {
            entity,
            alias: alias.into(),
            fields: entity.fields.iter().collect(),
        }
    }

    /// Flattened column alias of `field`
    pub fn column(&self, field: &str) -> String {
        format!("{}_{}", self.alias, field)
    }

    /// Case-insensitive match against the flattened column names
    pub fn has_column(&self, name: &str) -> bool {
        self.fields
            .iter()
            .any(|field| self.column(field.name).eq_ignore_ascii_case(name))
    }

    /// `{alias}.{column} AS {alias}_{field}` for every selected field
    pub fn select_list(&self) -> Vec<String> {
        self.fields
            .iter()
            .map(|field| format!("{}.{} AS {}", self.alias, field.column, self.column(field.name)))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct JoinDescriptor {
    pub join_type: JoinType,
    /// Entity owning the left key; the related entity attaches to it
    pub left: &'static EntityDescriptor,
    pub related: EntityBinding,
    /// Rendered `ON` condition
    pub condition: String,
}

impl JoinDescriptor {
    pub fn to_sql(&self) -> String {
        format!(
            "{} {} {} ON {}",
            self.join_type.to_sql(),
            self.related.entity.table_name,
            self.related.alias,
            self.condition
        )
    }
}

/// A grouping or aggregation output column
#[derive(Debug, Clone, PartialEq)]
pub struct OutputKey {
    pub name: String,
    /// Kind the column is coerced to before keying; `None` keeps the driver value
    pub kind: Option<ValueKind>,
}

/// Everything the materializer needs to read rows of a compiled query
#[derive(Debug, Clone)]
pub struct RowShape {
    pub root: EntityBinding,
    pub projection: Option<EntityBinding>,
    pub joins: Vec<JoinDescriptor>,
    pub grouping_keys: Vec<OutputKey>,
    pub aggregation_keys: Vec<OutputKey>,
    pub default_key_field: String,
}

impl RowShape {
    pub fn is_grouped(&self) -> bool {
        !self.grouping_keys.is_empty()
    }
}

/// Mutable accumulator of one fluent chain
#[derive(Debug, Clone)]
pub struct QueryPlan {
    config: QueryConfig,
    root: &'static EntityDescriptor,
    aliases: AliasRegistry,
    parameters: ParameterBag,
    fragments: BTreeMap<ClauseKind, Vec<String>>,
    joins: Vec<JoinDescriptor>,
    projection: Option<EntityBinding>,
    grouped: bool,
    grouping_keys: Vec<OutputKey>,
    aggregation_keys: Vec<OutputKey>,
}

impl QueryPlan {
    pub fn new(root: &'static EntityDescriptor, config: QueryConfig) -> Self {
        let aliases = AliasRegistry::rooted(config.alias_prefix.clone(), root);
        let parameters = ParameterBag::new(config.parameter_prefix.clone());
        let mut plan = Self {
            config,
            root,
            aliases,
            parameters,
            fragments: BTreeMap::new(),
            joins: Vec::new(),
            projection: None,
            grouped: false,
            grouping_keys: Vec::new(),
            aggregation_keys: Vec::new(),
        };
        let from = format!("{} {}", root.table_name, plan.root_alias());
        plan.push(ClauseKind::From, from);
        plan
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn root(&self) -> &'static EntityDescriptor {
        self.root
    }

    pub fn root_alias(&self) -> String {
        format!("{}0", self.config.alias_prefix)
    }

    pub fn aliases(&self) -> &AliasRegistry {
        &self.aliases
    }

    pub fn parameters(&self) -> &ParameterBag {
        &self.parameters
    }

    pub fn fragments(&self, clause: ClauseKind) -> &[String] {
        self.fragments
            .get(&clause)
            .map(|fragments| fragments.as_slice())
            .unwrap_or(&[])
    }

    pub fn push(&mut self, clause: ClauseKind, fragment: String) {
        crate::trace_log!("Plan {:?} fragment: {}", clause, fragment);
        self.fragments.entry(clause).or_default().push(fragment);
    }

    /// Lower `expr` for `clause`, binding its parameters into this plan
    pub fn translate(&mut self, expr: &Expr, clause: ClauseKind) -> Result<String, QueryError> {
        let mut translator = ClauseTranslator::new(
            &mut self.aliases,
            &mut self.parameters,
            &self.config,
            self.grouped,
        );
        translator.translate(expr, clause)
    }

    /// Root entity and every joined entity, in join order
    pub fn participants(&self) -> impl Iterator<Item = &'static EntityDescriptor> + '_ {
        std::iter::once(self.root).chain(self.joins.iter().map(|join| join.related.entity))
    }

    pub fn participates(&self, entity: &EntityDescriptor) -> bool {
        self.participants().any(|participant| participant.is_same(entity))
    }

    pub fn add_join(&mut self, join: JoinDescriptor) {
        self.push(ClauseKind::Join, join.to_sql());
        self.joins.push(join);
    }

    pub fn joins(&self) -> &[JoinDescriptor] {
        &self.joins
    }

    pub fn set_projection(&mut self, projection: EntityBinding, select_list: String) {
        self.push(ClauseKind::Select, select_list);
        self.projection = Some(projection);
    }

    pub fn projection(&self) -> Option<&EntityBinding> {
        self.projection.as_ref()
    }

    /// Switch to grouped rendering; later order keys read CTE columns
    pub fn begin_grouping(&mut self) {
        self.grouped = true;
    }

    pub fn is_grouped(&self) -> bool {
        self.grouped
    }

    pub fn add_grouping_key(&mut self, key: OutputKey, fragment: String) {
        self.push(ClauseKind::GroupBy, fragment);
        self.grouping_keys.push(key);
    }

    pub fn add_aggregation_key(&mut self, key: OutputKey, fragment: String) {
        self.push(ClauseKind::SelectAggregate, format!("{} AS {}", fragment, key.name));
        self.aggregation_keys.push(key);
    }

    pub fn grouping_keys(&self) -> &[OutputKey] {
        &self.grouping_keys
    }

    pub fn aggregation_keys(&self) -> &[OutputKey] {
        &self.aggregation_keys
    }

    /// Whether `name` is already used by a grouping or aggregation column
    pub fn has_output_key(&self, name: &str) -> bool {
        self.grouping_keys
            .iter()
            .chain(&self.aggregation_keys)
            .any(|key| key.name.eq_ignore_ascii_case(name))
    }

    /// Whether `name` matches a flattened `{alias}_{field}` column of the
    /// root or a joined entity
    pub fn has_row_column(&self, name: &str) -> bool {
        std::iter::once(self.root_binding())
            .chain(self.joins.iter().map(|join| join.related.clone()))
            .any(|binding| binding.has_column(name))
    }

    /// Output key that collides with a flattened column of `binding`
    pub fn output_key_colliding_with(&self, binding: &EntityBinding) -> Option<&str> {
        self.grouping_keys
            .iter()
            .chain(&self.aggregation_keys)
            .map(|key| key.name.as_str())
            .find(|name| binding.has_column(name))
    }

    /// Root binding selecting every field
    pub fn root_binding(&self) -> EntityBinding {
        EntityBinding::full(self.root, self.root_alias())
    }

    pub fn row_shape(&self) -> RowShape {
        RowShape {
            root: self.root_binding(),
            projection: self.projection.clone(),
            joins: self.joins.clone(),
            grouping_keys: self.grouping_keys.clone(),
            aggregation_keys: self.aggregation_keys.clone(),
            default_key_field: self.config.default_key_field.clone(),
        }
    }

    /// Consume the plan, keeping the bound parameters
    pub fn into_parameters(self) -> ParameterBag {
        self.parameters
    }
}
