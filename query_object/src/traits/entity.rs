//! Entity metadata
//!
//! Every queryable type supplies a static [`EntityDescriptor`] describing its
//! table, columns and relations. The translator resolves member accesses
//! against it and the materializer reads result columns through it.

use crate::errors::QueryError;
use crate::materializer::EntityNode;
use std::fmt::Debug;
use type_mapping::{SqlValue, ValueKind};

/// Metadata and conversions for a queryable type.
/// This trait should be derived using `#[derive(Entity)]` or the `#[entity]`
/// attribute macro.
///
/// Recommended usage:
/// ```ignore
/// use queryhaus::prelude::*;
///
/// #[entity]
/// #[table(name = "customers")]
/// pub struct Customer {
///     #[primary_key]
///     pub id: i64,
///     pub name: String,
///     #[relation]
///     pub orders: Vec<Order>,
/// }
/// ```
pub trait Entity: Sized + Send + Sync + Debug + 'static {
    /// Static descriptor table for this type
    fn descriptor() -> &'static EntityDescriptor;

    /// Build an instance from a materialized node
    fn from_node(node: &EntityNode) -> Result<Self, QueryError>;

    /// Read a field by name, used when evaluating predicates in memory
    fn field_value(&self, field: &str) -> Option<SqlValue>;
}

/// Relation multiplicity as seen from the owning entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// `Option<U>` field, set once
    One,
    /// `Vec<U>` field, appended per distinct related key
    Many,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Rust field name, also the suffix of flattened column aliases
    pub name: &'static str,
    /// Column name in the table
    pub column: &'static str,
    pub kind: ValueKind,
    pub nullable: bool,
    pub primary_key: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct RelationDescriptor {
    /// Rust field name holding the related entities
    pub name: &'static str,
    /// Descriptor of the related type; a function so descriptors may refer to each other
    pub target: fn() -> &'static EntityDescriptor,
    pub cardinality: Cardinality,
}

/// Static field/column table of an entity type
#[derive(Debug)]
pub struct EntityDescriptor {
    pub type_name: &'static str,
    pub table_name: &'static str,
    pub fields: &'static [FieldDescriptor],
    pub relations: &'static [RelationDescriptor],
}

impl EntityDescriptor {
    pub fn field(&self, name: &str) -> Option<&'static FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field used as primary key: the marked one, else the field named `default_key`
    pub fn key_field(&self, default_key: &str) -> Option<&'static FieldDescriptor> {
        self.fields
            .iter()
            .find(|f| f.primary_key)
            .or_else(|| self.fields.iter().find(|f| f.name == default_key))
    }

    /// Relation of this entity whose target is `target`
    pub fn relation_to(&self, target: &EntityDescriptor) -> Option<&'static RelationDescriptor> {
        self.relations
            .iter()
            .find(|r| (r.target)().is_same(target))
    }

    pub fn relation(&self, name: &str) -> Option<&'static RelationDescriptor> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Identity of descriptors: one static table per type
    pub fn is_same(&self, other: &EntityDescriptor) -> bool {
        std::ptr::eq(self, other)
            || (self.type_name == other.type_name && self.table_name == other.table_name)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Hand-written descriptors shared by the unit tests of this crate

    use super::*;
    use type_mapping::FromSqlValue;

    #[derive(Debug, Clone, PartialEq)]
    pub struct Customer {
        pub id: i64,
        pub name: String,
        pub orders: Vec<Order>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct Order {
        pub id: i64,
        pub customer_id: i64,
        pub status: String,
        pub total: f64,
        pub items: Vec<OrderItem>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct OrderItem {
        pub id: i64,
        pub order_id: i64,
        pub sku: String,
        pub quantity: i64,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct OrderSummary {
        pub order_id: i64,
        pub customer_name: String,
    }

    const fn field(name: &'static str, kind: ValueKind, primary_key: bool) -> FieldDescriptor {
        FieldDescriptor {
            name,
            column: name,
            kind,
            nullable: false,
            primary_key,
        }
    }

    pub static CUSTOMER: EntityDescriptor = EntityDescriptor {
        type_name: "Customer",
        table_name: "customers",
        fields: &[field("id", ValueKind::Int, true), field("name", ValueKind::Text, false)],
        relations: &[RelationDescriptor {
            name: "orders",
            target: Order::descriptor,
            cardinality: Cardinality::Many,
        }],
    };

    pub static ORDER: EntityDescriptor = EntityDescriptor {
        type_name: "Order",
        table_name: "orders",
        fields: &[
            field("id", ValueKind::Int, true),
            field("customer_id", ValueKind::Int, false),
            field("status", ValueKind::Text, false),
            field("total", ValueKind::Float, false),
        ],
        relations: &[RelationDescriptor {
            name: "items",
            target: OrderItem::descriptor,
            cardinality: Cardinality::Many,
        }],
    };

    pub static ORDER_ITEM: EntityDescriptor = EntityDescriptor {
        type_name: "OrderItem",
        table_name: "order_items",
        fields: &[
            field("id", ValueKind::Int, false),
            field("order_id", ValueKind::Int, false),
            field("sku", ValueKind::Text, false),
            field("quantity", ValueKind::Int, false),
        ],
        relations: &[],
    };

    pub static ORDER_SUMMARY: EntityDescriptor = EntityDescriptor {
        type_name: "OrderSummary",
        table_name: "order_summaries",
        fields: &[
            field("order_id", ValueKind::Int, false),
            field("customer_name", ValueKind::Text, false),
        ],
        relations: &[],
    };

    fn read<V: FromSqlValue>(node: &EntityNode, field: &str) -> Result<V, QueryError> {
        node.get(field)
    }

    impl Entity for Customer {
        fn descriptor() -> &'static EntityDescriptor {
            &CUSTOMER
        }

        fn from_node(node: &EntityNode) -> Result<Self, QueryError> {
            Ok(Self {
                id: read(node, "id")?,
                name: read(node, "name")?,
                orders: node.related("orders")?,
            })
        }

        fn field_value(&self, field: &str) -> Option<SqlValue> {
            match field {
                "id" => Some(self.id.into()),
                "name" => Some(self.name.clone().into()),
                _ => None,
            }
        }
    }

    impl Entity for Order {
        fn descriptor() -> &'static EntityDescriptor {
            &ORDER
        }

        fn from_node(node: &EntityNode) -> Result<Self, QueryError> {
            Ok(Self {
                id: read(node, "id")?,
                customer_id: read(node, "customer_id")?,
                status: read(node, "status")?,
                total: read(node, "total")?,
                items: node.related("items")?,
            })
        }

        fn field_value(&self, field: &str) -> Option<SqlValue> {
            match field {
                "id" => Some(self.id.into()),
                "customer_id" => Some(self.customer_id.into()),
                "status" => Some(self.status.clone().into()),
                "total" => Some(self.total.into()),
                _ => None,
            }
        }
    }

    impl Entity for OrderItem {
        fn descriptor() -> &'static EntityDescriptor {
            &ORDER_ITEM
        }

        fn from_node(node: &EntityNode) -> Result<Self, QueryError> {
            Ok(Self {
                id: read(node, "id")?,
                order_id: read(node, "order_id")?,
                sku: read(node, "sku")?,
                quantity: read(node, "quantity")?,
            })
        }

        fn field_value(&self, field: &str) -> Option<SqlValue> {
            match field {
                "id" => Some(self.id.into()),
                "order_id" => Some(self.order_id.into()),
                "sku" => Some(self.sku.clone().into()),
                "quantity" => Some(self.quantity.into()),
                _ => None,
            }
        }
    }

    impl Entity for OrderSummary {
        fn descriptor() -> &'static EntityDescriptor {
            &ORDER_SUMMARY
        }

        fn from_node(node: &EntityNode) -> Result<Self, QueryError> {
            Ok(Self {
                order_id: read(node, "order_id")?,
                customer_name: read(node, "customer_name")?,
            })
        }

        fn field_value(&self, field: &str) -> Option<SqlValue> {
            match field {
                "order_id" => Some(self.order_id.into()),
                "customer_name" => Some(self.customer_name.clone().into()),
                _ => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_key_field_marked_or_default() {
        assert_eq!(ORDER.key_field("id").map(|f| f.name), Some("id"));
        // OrderItem marks no key, falls back to the configured default
        assert_eq!(ORDER_ITEM.key_field("id").map(|f| f.name), Some("id"));
        assert!(ORDER_ITEM.key_field("uid").is_none());
    }

    #[test]
    fn test_relation_lookup_by_target() {
        let relation = CUSTOMER.relation_to(&ORDER).unwrap();
        assert_eq!(relation.name, "orders");
        assert_eq!(relation.cardinality, Cardinality::Many);
        assert!(CUSTOMER.relation_to(&ORDER_ITEM).is_none());
        assert!(Order::descriptor().is_same(&ORDER));
    }
}
