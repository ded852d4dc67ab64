use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DeriveInput, Field, Fields};

use crate::type_helpers::{arc_inner, unwrap_generic};

pub(crate) fn derive_injectable_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            name,
            "Injectable can only be derived for structs",
        ));
    };

    let construction = match &data.fields {
        Fields::Named(fields) => {
            let values = fields
                .named
                .iter()
                .map(|field| {
                    let ident = &field.ident;
                    let value = field_value(field)?;
                    Ok(quote! { #ident: #value })
                })
                .collect::<syn::Result<Vec<_>>>()?;
            quote! { Self { #(#values),* } }
        }
        Fields::Unnamed(fields) => {
            let bindings = (0..fields.unnamed.len())
                .map(|i| format_ident!("__field{}", i))
                .collect::<Vec<_>>();
            let values = fields
                .unnamed
                .iter()
                .map(field_value)
                .collect::<syn::Result<Vec<_>>>()?;
            quote! {{
                #(let #bindings = #values;)*
                Self(#(#bindings),*)
            }}
        }
        Fields::Unit => quote! { Self },
    };

    Ok(quote! {
        impl #impl_generics ::autodi_core::Injectable for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn construct(
                provider: &::autodi_core::ServiceProvider,
            ) -> ::autodi_core::ContainerResult<Self> {
                ::core::result::Result::Ok(#construction)
            }
        }
    })
}

/// 字段的构造表达式
///
/// `#[inject]` 字段从 provider 解析：`Arc<T>` 必需，`Option<Arc<T>>` 可选，
/// `Vec<Arc<T>>` 取全部注册。其他字段使用 `Default`。
fn field_value(field: &Field) -> syn::Result<proc_macro2::TokenStream> {
    let injected = field.attrs.iter().any(|attr| attr.path().is_ident("inject"));
    if !injected {
        return Ok(quote! { ::core::default::Default::default() });
    }

    let ty = &field.ty;

    if let Some(service) = arc_inner(ty) {
        return Ok(quote! { provider.get_required::<#service>()? });
    }

    if let Some(service) = unwrap_generic(ty, "Option").and_then(arc_inner) {
        return Ok(quote! { provider.get::<#service>()? });
    }

    if let Some(service) = unwrap_generic(ty, "Vec").and_then(arc_inner) {
        return Ok(quote! { provider.get_all::<#service>()? });
    }

    Err(syn::Error::new_spanned(
        ty,
        "#[inject] fields must be Arc<T>, Option<Arc<T>> or Vec<Arc<T>>",
    ))
}
