//! Materialization engine
//!
//! Rebuilds entities from flat, denormalized result rows. Rows of a joined
//! query repeat the parent columns once per child row; the engine keys every
//! entity by its primary key so a parent with N child rows is built exactly
//! once and carries N children. Grouped queries add an outer map keyed by the
//! grouping and aggregation values of each row.

mod node;

pub use node::EntityNode;

use crate::errors::QueryError;
use crate::query_builder::plan::{EntityBinding, OutputKey, RowShape};
use crate::row::ResultRow;
use crate::traits::{Cardinality, RelationDescriptor};
use std::collections::HashMap;
use type_mapping::SqlValue;

/// Composite key of one group: grouping values then aggregation values,
/// in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey(Vec<SqlValue>);

impl GroupKey {
    pub fn new(values: Vec<SqlValue>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<&SqlValue> {
        self.0.get(index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<SqlValue>> for GroupKey {
    fn from(values: Vec<SqlValue>) -> Self {
        Self(values)
    }
}

/// Arena slot: an entity and the slots attached below it
#[derive(Debug)]
struct Slot {
    node: EntityNode,
    children: Vec<(&'static str, usize)>,
}

/// Dedup state of one materialization pass (or of one group)
#[derive(Debug, Default)]
struct Graph {
    slots: Vec<Slot>,
    roots: Vec<usize>,
    by_key: HashMap<SqlValue, usize>,
    // (parent slot, join index, related key) -> slot
    attached: HashMap<(usize, usize, SqlValue), usize>,
}

impl Graph {
    fn insert(&mut self, node: EntityNode) -> usize {
        self.slots.push(Slot {
            node,
            children: Vec::new(),
        });
        self.slots.len() - 1
    }

    fn build(&self, index: usize) -> EntityNode {
        let slot = &self.slots[index];
        let mut node = slot.node.clone();
        for (relation, child) in &slot.children {
            node.push_related(*relation, self.build(*child));
        }
        node
    }

    fn into_roots(self) -> Vec<EntityNode> {
        self.roots.iter().map(|root| self.build(*root)).collect()
    }
}

/// Row-to-entity engine driven by the descriptors of a compiled query
#[derive(Debug)]
pub struct Materializer<'s> {
    shape: &'s RowShape,
    // Binding index of each join's parent: 0 is the root, k + 1 the k-th join
    parents: Vec<usize>,
    relations: Vec<Option<&'static RelationDescriptor>>,
}

impl<'s> Materializer<'s> {
    pub fn new(shape: &'s RowShape) -> Result<Self, QueryError> {
        let mut parents = Vec::with_capacity(shape.joins.len());
        let mut relations = Vec::with_capacity(shape.joins.len());

        for (index, join) in shape.joins.iter().enumerate() {
            let parent = if shape.root.entity.is_same(join.left) {
                Some(0)
            } else {
                shape.joins[..index]
                    .iter()
                    .position(|earlier| earlier.related.entity.is_same(join.left))
                    .map(|position| position + 1)
            };
            let parent = parent.ok_or_else(|| {
                QueryError::unsupported(
                    "Join",
                    format!(
                        "{} joins from {}, which is not part of the query",
                        join.related.entity.type_name, join.left.type_name
                    ),
                )
            })?;
            parents.push(parent);
            relations.push(join.left.relation_to(join.related.entity));
        }

        Ok(Self {
            shape,
            parents,
            relations,
        })
    }

    /// Whether rows are folded into object graphs rather than mapped one to one
    fn builds_graphs(&self) -> bool {
        self.shape.projection.is_none() && (!self.shape.joins.is_empty() || self.shape.is_grouped())
    }

    /// Entities of an ungrouped query, in first-seen order
    pub fn materialize(&self, rows: &[ResultRow]) -> Result<Vec<EntityNode>, QueryError> {
        let nodes = if self.builds_graphs() {
            self.check_relations()?;
            let mut graph = Graph::default();
            for row in rows {
                self.absorb(&mut graph, row)?;
            }
            graph.into_roots()
        } else {
            let binding = self.shape.projection.as_ref().unwrap_or(&self.shape.root);
            rows.iter()
                .map(|row| read_node(row, binding))
                .collect::<Result<Vec<_>, _>>()?
        };

        tracing::debug!(rows = rows.len(), entities = nodes.len(), "Materialized rows");
        Ok(nodes)
    }

    /// Entities of a grouped query, per group in first-seen order
    pub fn materialize_groups(&self, rows: &[ResultRow]) -> Result<Vec<(GroupKey, Vec<EntityNode>)>, QueryError> {
        if !self.shape.is_grouped() {
            return Err(QueryError::unsupported(
                "GroupBy",
                "query declares no grouping keys",
            ));
        }
        self.check_relations()?;

        let mut order: Vec<GroupKey> = Vec::new();
        let mut groups: HashMap<GroupKey, Graph> = HashMap::new();

        for row in rows {
            let key = self.group_key(row)?;
            if !groups.contains_key(&key) {
                order.push(key.clone());
            }
            let graph = groups.entry(key).or_default();
            self.absorb(graph, row)?;
        }

        let mut result = Vec::with_capacity(order.len());
        for key in order {
            if let Some(graph) = groups.remove(&key) {
                result.push((key, graph.into_roots()));
            }
        }

        tracing::debug!(rows = rows.len(), groups = result.len(), "Materialized grouped rows");
        Ok(result)
    }

    fn check_relations(&self) -> Result<(), QueryError> {
        for (join, relation) in self.shape.joins.iter().zip(&self.relations) {
            if relation.is_none() {
                return Err(QueryError::unsupported(
                    "Join",
                    format!(
                        "{} declares no relation to {}; select a projection to read joined columns",
                        join.left.type_name, join.related.entity.type_name
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Fold one row into `graph`: dedup the root, then run every join processor
    fn absorb(&self, graph: &mut Graph, row: &ResultRow) -> Result<(), QueryError> {
        let root = &self.shape.root;
        let root_key = self.read_key(row, root)?;
        if root_key.is_null() {
            return Err(QueryError::row_shape(
                self.key_column(root)?,
                "primary key is NULL",
            ));
        }

        let root_slot = match graph.by_key.get(&root_key) {
            Some(slot) => *slot,
            None => {
                let slot = graph.insert(read_node(row, root)?);
                graph.roots.push(slot);
                graph.by_key.insert(root_key, slot);
                slot
            }
        };

        let mut resolved: Vec<Option<usize>> = Vec::with_capacity(self.shape.joins.len() + 1);
        resolved.push(Some(root_slot));

        for (index, join) in self.shape.joins.iter().enumerate() {
            let Some(parent) = resolved[self.parents[index]] else {
                resolved.push(None);
                continue;
            };
            let Some(relation) = self.relations[index] else {
                resolved.push(None);
                continue;
            };

            let key = self.read_key(row, &join.related)?;
            if key.is_null() {
                // Outer join without a match
                resolved.push(None);
                continue;
            }

            // A one-to-one relation keeps the first entity attached
            let dedup_key = match relation.cardinality {
                Cardinality::Many => key,
                Cardinality::One => SqlValue::Null,
            };

            let child = match graph.attached.get(&(parent, index, dedup_key.clone())) {
                Some(child) => *child,
                None => {
                    let child = graph.insert(read_node(row, &join.related)?);
                    graph.slots[parent].children.push((relation.name, child));
                    graph.attached.insert((parent, index, dedup_key), child);
                    crate::trace_log!(
                        "Attached {} to {}",
                        join.related.entity.type_name,
                        join.left.type_name
                    );
                    child
                }
            };
            resolved.push(Some(child));
        }

        Ok(())
    }

    fn key_column(&self, binding: &EntityBinding) -> Result<String, QueryError> {
        let default_key = &self.shape.default_key_field;
        match binding.entity.key_field(default_key) {
            Some(field) => Ok(binding.column(field.name)),
            None => Err(QueryError::row_shape(
                binding.column(default_key),
                format!("{} declares no primary key", binding.entity.type_name),
            )),
        }
    }

    fn read_key(&self, row: &ResultRow, binding: &EntityBinding) -> Result<SqlValue, QueryError> {
        let column = self.key_column(binding)?;
        let kind = binding
            .entity
            .key_field(&self.shape.default_key_field)
            .map(|field| field.kind);
        read_column(row, &column, kind)
    }

    fn group_key(&self, row: &ResultRow) -> Result<GroupKey, QueryError> {
        self.shape
            .grouping_keys
            .iter()
            .chain(&self.shape.aggregation_keys)
            .map(|key: &OutputKey| read_column(row, &key.name, key.kind))
            .collect::<Result<Vec<_>, _>>()
            .map(GroupKey)
    }
}

fn read_column(row: &ResultRow, column: &str, kind: Option<type_mapping::ValueKind>) -> Result<SqlValue, QueryError> {
    let value = row
        .get(column)
        .ok_or_else(|| QueryError::row_shape(column, "column missing from result row"))?;

    match kind {
        Some(kind) => value.coerce(kind).ok_or_else(|| {
            QueryError::row_shape(
                column,
                format!("cannot convert {} to {}", value.type_name(), kind.name()),
            )
        }),
        None => Ok(value.clone()),
    }
}

/// Build the entity of `binding` from its `{alias}_{field}` columns
fn read_node(row: &ResultRow, binding: &EntityBinding) -> Result<EntityNode, QueryError> {
    let mut node = EntityNode::new(binding.entity);
    for field in &binding.fields {
        let value = read_column(row, &binding.column(field.name), Some(field.kind))?;
        node.set(field.name, value);
    }
    Ok(node)
}
