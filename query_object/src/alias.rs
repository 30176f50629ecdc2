//! Alias registry
//!
//! Every entity type taking part in a query gets one short alias,
//! `{prefix}{n}` in first-seen order. The same registry is threaded into
//! materialization so columns can be located by `{alias}_{field}`.

use crate::errors::QueryError;
use crate::traits::EntityDescriptor;

#[derive(Debug, Clone)]
struct AliasEntry {
    entity: &'static EntityDescriptor,
    alias: String,
}

#[derive(Debug, Clone)]
pub struct AliasRegistry {
    prefix: String,
    entries: Vec<AliasEntry>,
}

impl AliasRegistry {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            entries: Vec::new(),
        }
    }

    /// Registry whose first alias belongs to the query root
    pub fn rooted(prefix: impl Into<String>, root: &'static EntityDescriptor) -> Self {
        let prefix = prefix.into();
        Self {
            entries: vec![AliasEntry {
                entity: root,
                alias: format!("{}0", prefix),
            }],
            prefix,
        }
    }

    /// Alias of `entity`, registering it on first use
    pub fn alias_for(&mut self, entity: &'static EntityDescriptor) -> Result<String, QueryError> {
        if let Some(entry) = self
            .entries
            .iter()
            .find(|entry| entry.entity.type_name == entity.type_name)
        {
            if entry.entity.table_name != entity.table_name {
                return Err(QueryError::AmbiguousAlias {
                    entity: entity.type_name.to_string(),
                    existing: format!("alias {} on table {}", entry.alias, entry.entity.table_name),
                    requested: format!("table {}", entity.table_name),
                });
            }
            return Ok(entry.alias.clone());
        }

        let alias = format!("{}{}", self.prefix, self.entries.len());
        crate::trace_log!("Registered alias {} for {}", alias, entity.type_name);
        self.entries.push(AliasEntry {
            entity,
            alias: alias.clone(),
        });
        Ok(alias)
    }

    /// Alias of an already registered entity
    pub fn lookup(&self, entity: &EntityDescriptor) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.entity.is_same(entity))
            .map(|entry| entry.alias.as_str())
    }

    pub fn contains(&self, entity: &EntityDescriptor) -> bool {
        self.lookup(entity).is_some()
    }

    /// Registered entities with their aliases, in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&'static EntityDescriptor, &str)> {
        self.entries
            .iter()
            .map(|entry| (entry.entity, entry.alias.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
