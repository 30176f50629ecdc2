//! Untyped materialized entities

use crate::errors::QueryError;
use crate::traits::{Entity, EntityDescriptor};
use std::collections::HashMap;
use type_mapping::{FromSqlValue, SqlValue};

/// Field values of one entity plus its attached relations.
///
/// Generated `Entity::from_node` implementations read typed values out of it.
#[derive(Debug, Clone)]
pub struct EntityNode {
    entity: &'static EntityDescriptor,
    values: HashMap<&'static str, SqlValue>,
    relations: Vec<(&'static str, Vec<EntityNode>)>,
}

impl EntityNode {
    pub fn new(entity: &'static EntityDescriptor) -> Self {
        Self {
            entity,
            values: HashMap::new(),
            relations: Vec::new(),
        }
    }

    pub fn entity(&self) -> &'static EntityDescriptor {
        self.entity
    }

    pub fn set(&mut self, field: &'static str, value: SqlValue) {
        self.values.insert(field, value);
    }

    pub fn value(&self, field: &str) -> Option<&SqlValue> {
        self.values.get(field)
    }

    /// Typed field value; an unset field reads as NULL
    pub fn get<V: FromSqlValue>(&self, field: &str) -> Result<V, QueryError> {
        let converted = match self.values.get(field) {
            Some(value) => V::from_sql_value(value),
            None => V::from_sql_value(&SqlValue::Null),
        };
        converted.map_err(|e| QueryError::conversion(format!("{}.{}", self.entity.type_name, field), e))
    }

    /// Attach `node` under relation `name`, creating the list on first use
    pub fn push_related(&mut self, name: &'static str, node: EntityNode) {
        match self.relations.iter_mut().find(|(relation, _)| *relation == name) {
            Some((_, nodes)) => nodes.push(node),
            None => self.relations.push((name, vec![node])),
        }
    }

    pub fn has_related(&self, name: &str) -> bool {
        !self.relation(name).is_empty()
    }

    pub fn relation(&self, name: &str) -> &[EntityNode] {
        self.relations
            .iter()
            .find(|(relation, _)| *relation == name)
            .map(|(_, nodes)| nodes.as_slice())
            .unwrap_or(&[])
    }

    /// One-to-many relation converted to `U`
    pub fn related<U: Entity>(&self, name: &str) -> Result<Vec<U>, QueryError> {
        self.relation(name).iter().map(U::from_node).collect()
    }

    /// One-to-one relation converted to `U`
    pub fn related_one<U: Entity>(&self, name: &str) -> Result<Option<U>, QueryError> {
        self.relation(name).first().map(U::from_node).transpose()
    }
}
