//! Procedural macros for generating entity metadata
//!
//! This crate provides the `#[entity]` attribute and the `Entity` derive,
//! which generate the static descriptor table the query compiler and the
//! materializer read, plus the conversions between rows and structs.

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod code_generation;
mod entity_macro;
mod parsing;

use code_generation::generate_entity_impl;
use entity_macro::entity_attribute;
use parsing::parse_entity;

/// Derive macro for the `Entity` trait
///
/// Note: It's recommended to use the `#[entity]` attribute macro instead,
/// which automatically includes this derive along with `Debug` and `Clone`.
///
/// Manual usage:
/// ```ignore
/// #[derive(Debug, Clone, Entity)]
/// #[table(name = "customers")]
/// pub struct Customer {
///     #[primary_key]
///     pub id: i64,
///
///     #[column(name = "full_name")]
///     pub name: String,
///
///     #[relation]
///     pub orders: Vec<Order>,
/// }
/// ```
///
/// Without `#[table]` the table name is the table-case plural of the type
/// name (`OrderItem` becomes `order_items`). Without `#[primary_key]` the
/// configured default key field (`id`) is used when rows are deduplicated.
#[proc_macro_derive(Entity, attributes(table, primary_key, column, relation))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let info = match parse_entity(&input) {
        Ok(info) => info,
        Err(e) => return e.to_compile_error().into(),
    };

    TokenStream::from(generate_entity_impl(&input.ident, &info))
}

/// Convenience attribute macro that adds all necessary derives for an entity
///
/// Usage:
/// ```ignore
/// use queryhaus::prelude::*;
///
/// #[entity]
/// #[table(name = "orders")]
/// pub struct Order {
///     #[primary_key]
///     pub id: i64,
///     pub customer_id: i64,
/// }
/// ```
#[proc_macro_attribute]
pub fn entity(attr: TokenStream, item: TokenStream) -> TokenStream {
    entity_attribute(attr, item)
}
