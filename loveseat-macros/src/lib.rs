//! Procedural macros for the loveseat project.
//!
//! This crate provides `#[derive(Mapper)]`, which implements
//! `loveseat::mapper::Mapper` for a struct wrapping a single `Instance`.
//!
//! # Attributes
//!
//! - `name = "..."` - Type name used as identifier prefix, defaults to the struct name
//! - `extends = Path` - Mapper type whose schema is inherited
//! - `schema = path` - Function `fn(SchemaBuilder) -> SchemaBuilder` declaring properties
//!
//! # Example
//!
//! ```ignore
//! #[derive(Mapper)]
//! #[mapper(extends = Person, schema = Employee::declare)]
//! pub struct Employee(Instance);
//! ```

#[allow(unused_extern_crates)]
extern crate self as loveseat_macros;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Fields, Index, LitStr, Path, parse_macro_input, spanned::Spanned};

#[derive(Default)]
struct MapperArgs {
    name: Option<LitStr>,
    extends: Option<Path>,
    schema: Option<Path>,
}

impl MapperArgs {
    fn parse(input: &DeriveInput) -> syn::Result<Self> {
        let mut args = Self::default();

        for attr in input.attrs.iter().filter(|attr| attr.path().is_ident("mapper")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    args.name = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("extends") {
                    args.extends = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("schema") {
                    args.schema = Some(meta.value()?.parse()?);
                } else {
                    return Err(meta.error("expected `name`, `extends` or `schema`"));
                }
                Ok(())
            })?;
        }

        Ok(args)
    }
}

/// How the wrapped instance is reached: `self.0` or `self.field`.
enum InstanceField {
    Unnamed,
    Named(syn::Ident),
}

fn instance_field(input: &DeriveInput) -> syn::Result<InstanceField> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new(input.span(), "Mapper can only be derived for structs"));
    };

    match &data.fields {
        Fields::Unnamed(fields) if fields.unnamed.len() == 1 => Ok(InstanceField::Unnamed),
        Fields::Named(fields) if fields.named.len() == 1 => fields
            .named
            .first()
            .and_then(|field| field.ident.clone())
            .map(InstanceField::Named)
            .ok_or_else(|| syn::Error::new(fields.span(), "expected a named field")),
        fields => Err(syn::Error::new(
            fields.span(),
            "Mapper requires exactly one field holding the Instance",
        )),
    }
}

fn expand_mapper(input: DeriveInput) -> syn::Result<TokenStream2> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new(
            input.generics.span(),
            "Mapper cannot be derived for generic types",
        ));
    }

    let args = MapperArgs::parse(&input)?;
    let field = instance_field(&input)?;
    let ident = &input.ident;
    let type_name = args
        .name
        .map(|name| name.value())
        .unwrap_or_else(|| ident.to_string());

    let base = match &args.extends {
        Some(parent) => quote! {
            ::loveseat::mapper::SchemaBuilder::extending(
                <#parent as ::loveseat::mapper::Mapper>::schema(),
            )
        },
        None => quote! { ::loveseat::mapper::SchemaBuilder::new() },
    };
    let declare = match &args.schema {
        Some(schema) => quote! { (#schema)(#base) },
        None => base,
    };

    let (construct, access) = match field {
        InstanceField::Unnamed => {
            let index = Index::from(0);
            (quote! { Self(instance) }, quote! { #index })
        }
        InstanceField::Named(name) => (quote! { Self { #name: instance } }, quote! { #name }),
    };

    Ok(quote! {
        impl ::loveseat::mapper::Mapper for #ident {
            fn type_name() -> &'static str {
                #type_name
            }

            fn schema() -> &'static ::loveseat::mapper::Schema {
                static SCHEMA: ::std::sync::OnceLock<::loveseat::mapper::Schema> =
                    ::std::sync::OnceLock::new();
                SCHEMA.get_or_init(|| #declare.build())
            }

            fn from_instance(instance: ::loveseat::mapper::Instance) -> Self {
                #construct
            }

            fn instance(&self) -> &::loveseat::mapper::Instance {
                &self.#access
            }

            fn instance_mut(&mut self) -> &mut ::loveseat::mapper::Instance {
                &mut self.#access
            }
        }
    })
}

#[proc_macro_derive(Mapper, attributes(mapper))]
pub fn derive_mapper(input: TokenStream) -> TokenStream {
    expand_mapper(parse_macro_input!(input as DeriveInput))
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
