use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

use crate::attribute_helpers::{filters_tokens, parse_descriptor, parse_marker, DescriptorAttr, Kind};

pub(crate) fn derive_auto_register_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "AutoRegister cannot be derived for generic types, register each instantiation by hand",
        ));
    }

    let mut descriptors: Vec<DescriptorAttr> = Vec::new();
    let mut hosted = Vec::new();
    let mut hosted_singleton = Vec::new();

    for attr in &input.attrs {
        if attr.path().is_ident("autodi") {
            descriptors.push(parse_descriptor(attr)?);
        } else if attr.path().is_ident("autodi_hosted") {
            hosted.push(parse_marker(attr)?);
        } else if attr.path().is_ident("autodi_hosted_singleton") {
            hosted_singleton.push(parse_marker(attr)?);
        }
    }

    let needs_constructor = descriptors.iter().any(|d| d.kind != Kind::Custom)
        || !hosted.is_empty()
        || !hosted_singleton.is_empty();
    let has_markers = !hosted.is_empty() || !hosted_singleton.is_empty();
    let has_custom = descriptors.iter().any(|d| d.kind == Kind::Custom);

    let constructor = if needs_constructor {
        quote! { .with_constructor(::autodi_core::service::constructor_of::<#name>()) }
    } else {
        quote! {}
    };

    let hosted_capable = if has_markers {
        quote! { .hosted_capable::<#name>() }
    } else {
        quote! {}
    };

    let descriptor_tokens = descriptors.iter().map(|descriptor| {
        let base = match (descriptor.kind, &descriptor.function) {
            (Kind::Singleton, _) => quote! { ::autodi_core::RegistrationDescriptor::singleton() },
            (Kind::Transient, _) => quote! { ::autodi_core::RegistrationDescriptor::transient() },
            (Kind::Scoped, _) => quote! { ::autodi_core::RegistrationDescriptor::scoped() },
            (Kind::Custom, Some(function)) => {
                quote! { ::autodi_core::RegistrationDescriptor::custom(#function) }
            }
            (Kind::Custom, None) => quote! { ::autodi_core::RegistrationDescriptor::custom_default() },
        };

        let interface = match &descriptor.interface {
            Some(ty) => quote! { .with_interface(::autodi_core::interface_binding!(#name => #ty)) },
            None => quote! {},
        };

        let filters = filters_tokens(&descriptor.filters);

        quote! { .with_descriptor(#base #interface #filters) }
    });

    let hosted_tokens = hosted.iter().map(|marker| {
        let filters = filters_tokens(&marker.filters);
        quote! { .with_hosted_marker(::autodi_core::HostedMarker::new() #filters) }
    });

    let hosted_singleton_tokens = hosted_singleton.iter().map(|marker| {
        let filters = filters_tokens(&marker.filters);
        quote! { .with_hosted_singleton_marker(::autodi_core::HostedMarker::new() #filters) }
    });

    let functions = if has_custom {
        quote! {
            .with_functions(<#name as ::autodi_core::RegistrationFunctions>::registration_functions())
        }
    } else {
        quote! {}
    };

    Ok(quote! {
        impl ::autodi_core::AutoRegister for #name {
            fn metadata() -> ::autodi_core::TypeMetadata {
                ::autodi_core::TypeMetadata::of::<#name>()
                    #constructor
                    #hosted_capable
                    #(#descriptor_tokens)*
                    #(#hosted_tokens)*
                    #(#hosted_singleton_tokens)*
                    #functions
            }
        }

        ::autodi_core::inventory::submit! {
            ::autodi_core::module::TypeEntry {
                module: ::core::module_path!(),
                type_name: ::core::stringify!(#name),
                metadata: <#name as ::autodi_core::AutoRegister>::metadata,
            }
        }
    })
}
