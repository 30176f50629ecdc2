//! Traits for query compilation and execution
//!
//! This module contains the entity metadata contract consumed by the
//! translator and materializer, and the execution collaborator contract.

pub mod entity;
pub mod executor;

// Re-export all public items for convenience
pub use entity::{Cardinality, Entity, EntityDescriptor, FieldDescriptor, RelationDescriptor};
pub use executor::QueryExecutor;
