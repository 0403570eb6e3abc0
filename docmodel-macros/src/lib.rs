//! Procedural macros for the docmodel project.
//!
//! This crate provides compile-time code generation for the docmodel framework. The only macro
//! is `#[derive(Entity)]`, re-exported from the `docmodel` crate:
//!
//! ```ignore
//! use docmodel::Entity;
//! use bson::oid::ObjectId;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Serialize, Deserialize, Entity)]
//! #[entity(collection = "people")]
//! pub struct Person {
//!     #[serde(skip)]
//!     pub id: Option<ObjectId>,
//!     pub name: String,
//! }
//! ```
//!
//! The collection defaults to the lower-cased type name. The identity
//! is the field marked `#[entity(id)]`, or else the field named `id`; it must be an
//! `Option<ObjectId>` excluded from serde with `#[serde(skip)]`.

#[allow(unused_extern_crates)]
extern crate self as docmodel_macros;

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Field, Fields, Ident, LitStr, parse_macro_input};

#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    expand_entity(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_entity(input: DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let collection = match collection_attr(&input.attrs)? {
        Some(collection) => collection,
        None => LitStr::new(&default_collection_name(&name.to_string()), Span::call_site()),
    };

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => fields.named.iter().collect::<Vec<_>>(),
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Entity can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Entity can only be derived for structs",
            ));
        }
    };

    let id_field = id_field(name, &fields)?;
    let id = id_field.ident.as_ref();

    if !is_serde_skipped(&id_field.attrs)? {
        return Err(syn::Error::new_spanned(
            id_field,
            "the identity field must be marked #[serde(skip)]",
        ));
    }

    Ok(quote! {
        impl #impl_generics ::docmodel::entity::Entity for #name #ty_generics #where_clause {
            fn collection_name() -> &'static str {
                #collection
            }

            fn id(&self) -> ::core::option::Option<::docmodel::bson::oid::ObjectId> {
                self.#id
            }

            fn set_id(&mut self, id: ::docmodel::bson::oid::ObjectId) {
                self.#id = ::core::option::Option::Some(id);
            }
        }
    })
}

fn default_collection_name(type_name: &str) -> String {
    type_name.to_lowercase()
}

fn collection_attr(attrs: &[Attribute]) -> syn::Result<Option<LitStr>> {
    let mut collection = None;

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("entity")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("collection") {
                let value: LitStr = meta.value()?.parse()?;
                if value.value().is_empty() {
                    return Err(meta.error("collection name cannot be empty"));
                }
                collection = Some(value);
                Ok(())
            } else {
                Err(meta.error("unsupported entity attribute, expected `collection = \"...\"`"))
            }
        })?;
    }

    Ok(collection)
}

fn has_id_marker(field: &Field) -> syn::Result<bool> {
    let mut marked = false;

    for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("entity")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("id") {
                marked = true;
                Ok(())
            } else {
                Err(meta.error("unsupported entity field attribute, expected `id`"))
            }
        })?;
    }

    Ok(marked)
}

fn id_field<'a>(name: &Ident, fields: &[&'a Field]) -> syn::Result<&'a Field> {
    let mut marked = Vec::new();
    for field in fields {
        if has_id_marker(field)? {
            marked.push(*field);
        }
    }

    match marked.as_slice() {
        [field] => Ok(*field),
        [] => fields
            .iter()
            .find(|field| field.ident.as_ref().is_some_and(|ident| ident == "id"))
            .copied()
            .ok_or_else(|| {
                syn::Error::new_spanned(
                    name,
                    "no identity field: add an `id` field or mark one with #[entity(id)]",
                )
            }),
        [_, second, ..] => Err(syn::Error::new_spanned(
            second,
            "only one field can be marked #[entity(id)]",
        )),
    }
}

fn is_serde_skipped(attrs: &[Attribute]) -> syn::Result<bool> {
    let mut skipped = false;

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                skipped = true;
            } else if meta.input.peek(syn::Token![=]) {
                // Consume the value of attributes such as `rename = "..."`.
                let _: syn::Expr = meta.value()?.parse()?;
            } else if meta.input.peek(syn::token::Paren) {
                let _content;
                syn::parenthesized!(_content in meta.input);
            }
            Ok(())
        })?;
    }

    Ok(skipped)
}
