//! Code generation for entity descriptors and conversions
//!
//! This module turns parsed entity metadata into the `Entity` implementation:
//! a static descriptor table, node-to-struct conversion and field access by
//! name.

use proc_macro2::TokenStream;
use quote::quote;
use syn::Ident;

use crate::parsing::{EntityInfo, RelationKind};

/// Root of the runtime paths used by generated code
fn runtime() -> TokenStream {
    quote!(::queryhaus)
}

pub fn generate_entity_impl(name: &Ident, info: &EntityInfo) -> TokenStream {
    let rt = runtime();
    let descriptor = generate_descriptor(info);
    let from_node = generate_from_node(info);
    let field_value = generate_field_value(info);

    quote! {
        impl #rt::query_object::Entity for #name {
            fn descriptor() -> &'static #rt::query_object::EntityDescriptor {
                #descriptor
            }

            fn from_node(
                node: &#rt::query_object::EntityNode,
            ) -> ::std::result::Result<Self, #rt::query_object::QueryError> {
                #from_node
            }

            fn field_value(&self, field: &str) -> ::std::option::Option<#rt::type_mapping::SqlValue> {
                #field_value
            }
        }
    }
}

fn generate_descriptor(info: &EntityInfo) -> TokenStream {
    let rt = runtime();
    let type_name = &info.table.type_name;
    let table_name = &info.table.name;

    let fields = info.columns.iter().map(|column| {
        let name = &column.name;
        let column_name = &column.column;
        let kind = &column.kind;
        let nullable = column.nullable;
        let primary_key = column.primary_key;
        quote! {
            #rt::query_object::FieldDescriptor {
                name: #name,
                column: #column_name,
                kind: #rt::type_mapping::ValueKind::#kind,
                nullable: #nullable,
                primary_key: #primary_key,
            }
        }
    });

    let relations = info.relations.iter().map(|relation| {
        let name = &relation.name;
        let target = &relation.target;
        let cardinality = match relation.kind {
            RelationKind::One => quote!(One),
            RelationKind::Many => quote!(Many),
        };
        quote! {
            #rt::query_object::RelationDescriptor {
                name: #name,
                target: <#target as #rt::query_object::Entity>::descriptor,
                cardinality: #rt::query_object::Cardinality::#cardinality,
            }
        }
    });

    quote! {
        static DESCRIPTOR: #rt::query_object::EntityDescriptor = #rt::query_object::EntityDescriptor {
            type_name: #type_name,
            table_name: #table_name,
            fields: &[#(#fields),*],
            relations: &[#(#relations),*],
        };
        &DESCRIPTOR
    }
}

fn generate_from_node(info: &EntityInfo) -> TokenStream {
    let columns = info.columns.iter().map(|column| {
        let ident = &column.ident;
        let name = &column.name;
        let ty = &column.ty;
        quote!(#ident: node.get::<#ty>(#name)?)
    });

    let relations = info.relations.iter().map(|relation| {
        let ident = &relation.ident;
        let name = &relation.name;
        let target = &relation.target;
        match relation.kind {
            RelationKind::Many => quote!(#ident: node.related::<#target>(#name)?),
            RelationKind::One => quote!(#ident: node.related_one::<#target>(#name)?),
        }
    });

    quote! {
        ::std::result::Result::Ok(Self {
            #(#columns,)*
            #(#relations,)*
        })
    }
}

fn generate_field_value(info: &EntityInfo) -> TokenStream {
    let rt = runtime();
    let arms = info.columns.iter().map(|column| {
        let ident = &column.ident;
        let name = &column.name;
        quote! {
            #name => ::std::option::Option::Some(
                #rt::type_mapping::SqlValue::from(::std::clone::Clone::clone(&self.#ident))
            ),
        }
    });

    quote! {
        match field {
            #(#arms)*
            _ => ::std::option::Option::None,
        }
    }
}
