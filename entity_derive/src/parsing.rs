//! Parsing utilities for entity attributes
//!
//! This module handles the parsing of `#[table]`, `#[primary_key]`,
//! `#[column]` and `#[relation]` attributes and the compile-time validation
//! of table and column names.

use inflector::Inflector;
use proc_macro2::Span;
use query_object::validation::{ValidatedFieldName, ValidatedTableName};
use quote::quote;
use syn::{
    Attribute, Data, DeriveInput, Error, Fields, GenericArgument, Ident, LitStr, PathArguments,
    Result, Type,
};
use type_mapping::{is_optional_type, rust_type_to_value_kind_variant};

/// Validate table name and return syn::Error for better proc macro error handling
pub fn validate_table_name_syn(name: &str, span: Span) -> Result<()> {
    ValidatedTableName::new(name)
        .map(|_| ())
        .map_err(|e| Error::new(span, format!("Invalid table name '{}': {}", name, e)))
}

/// Validate field or column name and return syn::Error for better proc macro error handling
pub fn validate_field_name_syn(name: &str, span: Span) -> Result<()> {
    ValidatedFieldName::new(name)
        .map(|_| ())
        .map_err(|e| Error::new(span, format!("Invalid field name '{}': {}", name, e)))
}

#[derive(Debug)]
pub struct TableInfo {
    pub type_name: String,
    pub name: String,
}

/// A persisted field, one column of the table
#[derive(Debug)]
pub struct ColumnField {
    pub ident: Ident,
    pub name: String,
    pub column: String,
    pub ty: Type,
    /// `ValueKind` variant the field maps to
    pub kind: Ident,
    pub nullable: bool,
    pub primary_key: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    One,
    Many,
}

/// A `#[relation]` field holding related entities
#[derive(Debug)]
pub struct RelationField {
    pub ident: Ident,
    pub name: String,
    pub target: Type,
    pub kind: RelationKind,
}

#[derive(Debug)]
pub struct EntityInfo {
    pub table: TableInfo,
    pub columns: Vec<ColumnField>,
    pub relations: Vec<RelationField>,
}

pub fn parse_entity(input: &DeriveInput) -> Result<EntityInfo> {
    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "Entity cannot be derived for generic structs: the descriptor is a single static table",
        ));
    }

    let table = parse_table_attributes(&input.ident, &input.attrs)?;
    let (columns, relations) = parse_field_attributes(&input.data)?;

    if columns.is_empty() {
        return Err(Error::new_spanned(
            &input.ident,
            "Entity needs at least one non-relation field",
        ));
    }

    Ok(EntityInfo {
        table,
        columns,
        relations,
    })
}

/// `#[table(name = "...")]`, defaulting to the table-case plural of the type name
pub fn parse_table_attributes(ident: &Ident, attrs: &[Attribute]) -> Result<TableInfo> {
    let mut table_name: Option<LitStr> = None;

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("table")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                table_name = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("unsupported table attribute, expected `name = \"...\"`"))
            }
        })?;
    }

    let (name, span) = match table_name {
        Some(lit) => (lit.value(), lit.span()),
        None => (ident.to_string().to_table_case(), ident.span()),
    };

    // Validate table name at compile time with proper error handling
    validate_table_name_syn(&name, span)?;

    Ok(TableInfo {
        type_name: ident.to_string(),
        name,
    })
}

pub fn parse_field_attributes(data: &Data) -> Result<(Vec<ColumnField>, Vec<RelationField>)> {
    let fields_named = match data {
        Data::Struct(data_struct) => match &data_struct.fields {
            Fields::Named(fields_named) => fields_named,
            _ => {
                return Err(Error::new(
                    Span::call_site(),
                    "Entity can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(Error::new(
                Span::call_site(),
                "Entity can only be derived for structs with named fields",
            ))
        }
    };

    let mut columns = Vec::new();
    let mut relations = Vec::new();

    for field in &fields_named.named {
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| Error::new_spanned(field, "Field must have a name"))?;
        let name = ident.to_string();
        let is_primary_key = has_attribute(&field.attrs, "primary_key");

        if has_attribute(&field.attrs, "relation") {
            if is_primary_key {
                return Err(Error::new_spanned(&ident, "a relation field cannot be the primary key"));
            }
            let (target, kind) = relation_target(&field.ty)?;
            relations.push(RelationField {
                ident,
                name,
                target,
                kind,
            });
            continue;
        }

        validate_field_name_syn(&name, ident.span())?;

        let column = match parse_column_name(&field.attrs)? {
            Some(lit) => {
                validate_field_name_syn(&lit.value(), lit.span())?;
                lit.value()
            }
            None => name.clone(),
        };

        let ty = &field.ty;
        // Normalize type string by removing all whitespace for consistent matching
        let type_string = quote!(#ty).to_string().replace(' ', "");
        let nullable = is_optional_type(&type_string);

        if is_primary_key {
            if nullable {
                return Err(Error::new_spanned(ty, "the primary key cannot be optional"));
            }
            if columns.iter().any(|c: &ColumnField| c.primary_key) {
                return Err(Error::new_spanned(&ident, "only one field can be marked #[primary_key]"));
            }
        }

        let kind = rust_type_to_value_kind_variant(&type_string).ok_or_else(|| {
            Error::new_spanned(
                ty,
                "unsupported field type: expected a string, integer, float, bool, Uuid, \
                 chrono date/time, Decimal or serde_json::Value (optionally wrapped in Option)",
            )
        })?;

        columns.push(ColumnField {
            kind: Ident::new(kind, Span::call_site()),
            ident,
            name,
            column,
            ty: field.ty.clone(),
            nullable,
            primary_key: is_primary_key,
        });
    }

    if let Some(duplicate) = columns
        .iter()
        .enumerate()
        .find(|(i, c)| columns[..*i].iter().any(|earlier| earlier.column == c.column))
        .map(|(_, c)| c)
    {
        return Err(Error::new_spanned(
            &duplicate.ident,
            format!("column '{}' is mapped twice", duplicate.column),
        ));
    }

    Ok((columns, relations))
}

pub fn has_attribute(attrs: &[Attribute], name: &str) -> bool {
    attrs.iter().any(|attr| attr.path().is_ident(name))
}

/// `#[column(name = "...")]`
fn parse_column_name(attrs: &[Attribute]) -> Result<Option<LitStr>> {
    let mut column = None;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("column")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                column = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("unsupported column attribute, expected `name = \"...\"`"))
            }
        })?;
    }
    Ok(column)
}

/// Related type of a `Vec<U>` (one-to-many) or `Option<U>` (one-to-one) field
fn relation_target(ty: &Type) -> Result<(Type, RelationKind)> {
    let invalid = || Error::new_spanned(ty, "#[relation] fields must be Vec<Entity> or Option<Entity>");

    let Type::Path(type_path) = ty else {
        return Err(invalid());
    };
    let segment = type_path.path.segments.last().ok_or_else(invalid)?;
    let kind = match segment.ident.to_string().as_str() {
        "Vec" => RelationKind::Many,
        "Option" => RelationKind::One,
        _ => return Err(invalid()),
    };
    let PathArguments::AngleBracketed(arguments) = &segment.arguments else {
        return Err(invalid());
    };
    match arguments.args.first() {
        Some(GenericArgument::Type(target)) if arguments.args.len() == 1 => Ok((target.clone(), kind)),
        _ => Err(invalid()),
    }
}
