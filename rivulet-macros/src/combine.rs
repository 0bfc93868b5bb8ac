//! `#[derive(Combine)]`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, parse_macro_input};

/// Implementation of `#[derive(Combine)]`.
pub fn derive_combine_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(expanded) => TokenStream::from(expanded),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "Combine can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "Combine can only be derived for structs",
            ));
        }
    };

    let Some(first) = fields.first().and_then(|f| f.ident.as_ref()) else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Combine needs at least one field",
        ));
    };

    let idents: Vec<_> = fields.iter().filter_map(|f| f.ident.as_ref()).collect();
    let types: Vec<_> = fields.iter().map(|f| &f.ty).collect();
    let handles: Vec<_> = idents
        .iter()
        .map(|ident| format_ident!("__rivulet_{}", ident))
        .collect();
    let doc = format!(
        "Combine one store per field into a store of `{name}`, recomputed whenever a field store changes."
    );

    Ok(quote! {
        impl #impl_generics #name #ty_generics #where_clause {
            #[doc = #doc]
            pub fn combine(
                #( #idents: &::rivulet::Store<#types> ),*
            ) -> ::rivulet::Store<Self> {
                let __rivulet_kernel = ::rivulet::Unit::kernel(#first).clone();
                let __rivulet_units: ::std::vec::Vec<&dyn ::rivulet::Unit> =
                    ::std::vec![ #( #idents as &dyn ::rivulet::Unit ),* ];
                #( let #handles = #idents.clone(); )*
                __rivulet_kernel.combine(&__rivulet_units, move || Self {
                    #( #idents: #handles.get_state() ),*
                })
            }
        }
    })
}
