//! `#[registration_functions]` 属性宏实现
//!
//! 扫描 impl 块中的关联函数，把签名为 `fn(&mut ServiceCollection)` 或
//! `fn(&mut ServiceCollection, &RegistrationDescriptor)` 的函数收集成注册函数表。

use proc_macro::TokenStream;
use proc_macro_error::abort;
use quote::quote;
use syn::spanned::Spanned;
use syn::{FnArg, ImplItem, ImplItemFn, ItemImpl, ReturnType, Type, Visibility};

use crate::attribute_helpers::lit;
use crate::type_helpers::reference_target_name;

pub(crate) fn registration_functions_impl(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(item as ItemImpl);

    let self_ty = &input.self_ty;

    if let Some((_, path, _)) = &input.trait_ {
        abort!(
            path.span(),
            "#[registration_functions] must be placed on an inherent impl block";
            help = "move the registration functions into `impl {} {{ ... }}`",
            quote!(#self_ty).to_string()
        );
    }

    if !input.generics.params.is_empty() {
        abort!(
            input.generics.span(),
            "#[registration_functions] does not support generic impl blocks"
        );
    }

    let entries = input.items.iter().filter_map(|item| match item {
        ImplItem::Fn(method) => registration_entry(self_ty, method),
        _ => None,
    });

    let expanded = quote! {
        #input

        impl ::autodi_core::RegistrationFunctions for #self_ty {
            fn registration_functions() -> ::std::vec::Vec<::autodi_core::RegistrationFunction> {
                ::std::vec![#(#entries),*]
            }
        }
    };

    TokenStream::from(expanded)
}

/// 不符合注册函数签名的关联函数返回 `None`，保持为普通函数
fn registration_entry(self_ty: &syn::Type, method: &ImplItemFn) -> Option<proc_macro2::TokenStream> {
    let sig = &method.sig;
    if sig.asyncness.is_some() || !sig.generics.params.is_empty() {
        return None;
    }

    let params = sig
        .inputs
        .iter()
        .map(|arg| match arg {
            FnArg::Typed(pat) => Some(pat.ty.as_ref()),
            FnArg::Receiver(_) => None,
        })
        .collect::<Option<Vec<_>>>()?;

    let is_collection = |ty: &syn::Type| {
        reference_target_name(ty, true).is_some_and(|name| name == "ServiceCollection")
    };
    let is_descriptor = |ty: &syn::Type| {
        reference_target_name(ty, false).is_some_and(|name| name == "RegistrationDescriptor")
    };

    let registration_shape = match params.as_slice() {
        [first] => is_collection(first),
        [first, second] => is_collection(first) && is_descriptor(second),
        _ => false,
    };

    if registration_shape && !is_supported_return(&sig.output) {
        abort!(
            sig.output.span(),
            "registration function `{}` must return `()` or `Result<(), E>`",
            sig.ident;
            help = "register through the `services` argument instead of returning the collection"
        );
    }

    let ident = &sig.ident;
    let name = lit(&ident.to_string());
    let visibility = match method.vis {
        Visibility::Public(_) => quote! { ::autodi_core::Visibility::Public },
        _ => quote! { ::autodi_core::Visibility::Private },
    };

    let function = match params.as_slice() {
        [first] if is_collection(first) => quote! {
            ::autodi_core::RegistrationFn::Collection(
                |services: &mut ::autodi_core::ServiceCollection| {
                    ::autodi_core::IntoRegistrationResult::into_registration_result(
                        <#self_ty>::#ident(services),
                    )
                },
            )
        },
        [first, second] if is_collection(first) && is_descriptor(second) => quote! {
            ::autodi_core::RegistrationFn::WithDescriptor(
                |services: &mut ::autodi_core::ServiceCollection,
                 descriptor: &::autodi_core::RegistrationDescriptor| {
                    ::autodi_core::IntoRegistrationResult::into_registration_result(
                        <#self_ty>::#ident(services, descriptor),
                    )
                },
            )
        },
        _ => return None,
    };

    Some(quote! {
        ::autodi_core::RegistrationFunction::new(#name, #visibility, #function)
    })
}

/// 注册函数只允许返回 `()` 或 `Result<(), E>`（含 `anyhow::Result<()>` 这类别名）
fn is_supported_return(output: &ReturnType) -> bool {
    let ReturnType::Type(_, ty) = output else {
        return true;
    };

    match ty.as_ref() {
        Type::Tuple(tuple) => tuple.elems.is_empty(),
        Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "Result"),
        _ => false,
    }
}
