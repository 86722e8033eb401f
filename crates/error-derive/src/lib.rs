//! `#[derive(Error)]` for plain error enums
//!
//! Every variant needs a `#[msg = "..."]` attribute, which becomes its [Display](std::fmt::Display)
//! output. Variants may either be unit variants or wrap exactly one value. Wrapped values are
//! reported through [Error::source](std::error::Error::source) and get a `From` implementation,
//! unless the variant is marked with `#[no_from]` (useful when two variants wrap the same type).

use proc_macro::TokenStream;
use quote::quote;

#[proc_macro_derive(Error, attributes(msg, no_from))]
pub fn derive_error(input: TokenStream) -> TokenStream {
    let item: syn::ItemEnum = syn::parse(input).expect("Could not parse input as enum");

    let name = item.ident;
    let (impl_generics, type_generics, where_clause) = item.generics.split_for_impl();

    let mut variant_displays = vec![];
    let mut from_impls = vec![];
    let mut variant_sources = vec![];

    for variant in &item.variants {
        let ident = &variant.ident;

        let display_attribute = variant
            .attrs
            .iter()
            .flat_map(|attr| match &attr.meta {
                syn::Meta::NameValue(name_value) => Some(name_value),
                _ => None,
            })
            .find(|name_value| name_value.path.is_ident("msg"))
            .map(|name_value| &name_value.value);

        let Some(display_value) = display_attribute else {
            panic!("variant {ident} needs a #[msg = \"...\"] attribute");
        };

        let generate_from = !variant
            .attrs
            .iter()
            .any(|attr| attr.path().is_ident("no_from"));

        match &variant.fields {
            syn::Fields::Unit => {
                variant_displays.push(
                    quote!(Self::#ident => ::std::fmt::Display::fmt(&(#display_value), f)),
                );
            },
            syn::Fields::Unnamed(unnamed_fields) => {
                if unnamed_fields.unnamed.len() != 1 {
                    panic!("variant {ident} must wrap exactly one value");
                }

                let ty = &unnamed_fields.unnamed[0].ty;

                if generate_from {
                    from_impls.push(quote!(
                        #[automatically_derived]
                        impl #impl_generics ::std::convert::From<#ty> for #name #type_generics #where_clause {
                            fn from(value: #ty) -> Self {
                                Self::#ident(value)
                            }
                        }
                    ));
                }

                variant_displays.push(
                    quote!(Self::#ident(_) => ::std::fmt::Display::fmt(&(#display_value), f)),
                );
                variant_sources.push(quote!(Self::#ident(value) => ::std::option::Option::Some(value)));
            },
            syn::Fields::Named(_) => panic!("named fields are not allowed"),
        }
    }

    quote!(
        #[automatically_derived]
        impl #impl_generics ::std::fmt::Display for #name #type_generics #where_clause {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    #(
                        #variant_displays,
                    )*
                }
            }
        }

        #(
            #from_impls
        )*

        #[automatically_derived]
        impl #impl_generics ::std::error::Error for #name #type_generics #where_clause {
            #[allow(unreachable_patterns)]
            fn source(&self) -> ::std::option::Option<&(dyn ::std::error::Error + 'static)> {
                match self {
                    #(
                        #variant_sources,
                    )*
                    _ => ::std::option::Option::None,
                }
            }
        }
    )
    .into()
}
