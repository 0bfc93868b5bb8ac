//! # rivulet-macros
//!
//! Procedural macros for Rivulet.
//!
//! - `#[derive(Combine)]` - Typed object combination over one store per field

use proc_macro::TokenStream;

mod combine;

/// Derive macro generating `Self::combine`, which builds a store of `Self`
/// from one store per field.
///
/// ```rust,ignore
/// #[derive(Clone, PartialEq, Combine)]
/// struct Profile {
///     name: String,
///     age: u32,
/// }
///
/// let name = kernel.create_store(String::from("Ada"));
/// let age = kernel.create_store(36);
/// let profile: Store<Profile> = Profile::combine(&name, &age);
/// ```
///
/// The combined store is recomputed once per transaction in which any field
/// store changed. It is skipped while a field store holds a failure that its
/// fail channel observed, until that store takes a new value.
#[proc_macro_derive(Combine)]
pub fn derive_combine(input: TokenStream) -> TokenStream {
    combine::derive_combine_impl(input)
}
