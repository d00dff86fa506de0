//! Implementation of the `#[derive(NativeType)]` macro.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Fields, parse_macro_input};

use crate::attrs::{FieldAttrs, TypeAttrs};

pub fn derive_native_type_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive_native_type_inner(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn derive_native_type_inner(input: &DeriveInput) -> syn::Result<TokenStream2> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "NativeType cannot be derived for generic types",
        ));
    }

    let name = &input.ident;
    let attrs = TypeAttrs::from_attrs(&input.attrs)?;
    let exposed = attrs.name.clone().unwrap_or_else(|| name.to_string());

    let native_type_impl = generate_native_type_impl(name, &exposed);
    let casters = if attrs.clone {
        generate_casters(name)
    } else {
        TokenStream2::new()
    };
    let fields = generate_field_properties(input)?;

    Ok(quote! {
        #native_type_impl
        #casters
        #fields
    })
}

/// Generate the `NativeType` implementation.
fn generate_native_type_impl(name: &syn::Ident, exposed: &str) -> TokenStream2 {
    quote! {
        impl ::bindery_core::NativeType for #name {
            fn type_hash() -> ::bindery_core::TypeHash {
                ::bindery_core::TypeHash::from_name(#exposed)
            }

            fn type_name() -> ::std::borrow::Cow<'static, str> {
                ::std::borrow::Cow::Borrowed(#exposed)
            }
        }
    }
}

/// Generate by-value `FromDynamic` / `ToDynamic`.
fn generate_casters(name: &syn::Ident) -> TokenStream2 {
    quote! {
        impl ::bindery_core::FromDynamic for #name {
            fn from_dynamic(
                value: &::bindery_core::Dynamic,
            ) -> ::std::result::Result<Self, ::bindery_core::ConversionError> {
                ::bindery_core::clone_object::<#name>(value)
            }
        }

        impl ::bindery_core::ToDynamic for #name {
            fn to_dynamic(
                self,
                cx: &::bindery_core::CastContext<'_>,
            ) -> ::std::result::Result<::bindery_core::Dynamic, ::bindery_core::NativeError> {
                cx.wrap_owned(self)
            }
        }
    }
}

/// Generate `FieldProperties` from fields marked `get` / `set`.
fn generate_field_properties(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let mut properties = Vec::new();

    if let Data::Struct(data) = &input.data
        && let Fields::Named(fields) = &data.fields
    {
        for field in &fields.named {
            let field_attrs = FieldAttrs::from_attrs(&field.attrs)?;
            if !field_attrs.is_exposed() {
                continue;
            }

            let Some(field_name) = field.ident.as_ref() else {
                continue;
            };
            let prop_name = field_attrs
                .name
                .clone()
                .unwrap_or_else(|| field_name.to_string());
            let field_ty = &field.ty;

            // set implies get; there are no write-only properties
            properties.push(if field_attrs.set {
                quote! {
                    .property(
                        #prop_name,
                        |this: &#name| ::std::clone::Clone::clone(&this.#field_name),
                        |this: &mut #name, value: #field_ty| this.#field_name = value,
                    )
                }
            } else {
                quote! {
                    .readonly(
                        #prop_name,
                        |this: &#name| ::std::clone::Clone::clone(&this.#field_name),
                    )
                }
            });
        }
    }

    if properties.is_empty() {
        return Ok(TokenStream2::new());
    }

    Ok(quote! {
        impl ::bindery_module::FieldProperties for #name {
            fn bind_fields<'m>(
                class: ::bindery_module::ClassBuilder<'m, Self>,
            ) -> ::bindery_module::ClassBuilder<'m, Self> {
                class #(#properties)*
            }
        }
    })
}
