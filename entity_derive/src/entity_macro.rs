use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Error};

/// Convenience attribute macro that adds the derives an entity needs
///
/// Usage:
/// ```ignore
/// use queryhaus::prelude::*;
///
/// #[entity]
/// #[table(name = "users")]
/// pub struct User {
///     #[primary_key]
///     pub id: i64,
///     pub name: String,
/// }
/// ```
pub fn entity_attribute(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);

    if !matches!(input.data, Data::Struct(_)) {
        return Error::new_spanned(&input.ident, "entity can only be used on structs")
            .to_compile_error()
            .into();
    }

    // Add the derives in front of the remaining attributes
    let expanded = quote! {
        #[derive(Debug, Clone, ::queryhaus::Entity)]
        #input
    };

    TokenStream::from(expanded)
}
