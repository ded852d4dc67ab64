use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::{Attribute, LitStr, Meta, Type};

/// 描述符声明的注册方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    Singleton,
    Transient,
    Scoped,
    Custom,
}

/// 解析后的 `#[autodi(...)]`
pub(crate) struct DescriptorAttr {
    pub kind: Kind,
    pub interface: Option<Type>,
    pub function: Option<LitStr>,
    pub filters: Option<LitStr>,
}

/// 解析后的 `#[autodi_hosted(...)]` / `#[autodi_hosted_singleton(...)]`
pub(crate) struct MarkerAttr {
    pub filters: Option<LitStr>,
}

/// 解析 `#[autodi(kind, interface = dyn Trait, filters = "a,!b")]`
///
/// kind 为 `singleton`、`transient`、`scoped`、`custom` 或 `custom = "fn_name"`
pub(crate) fn parse_descriptor(attr: &Attribute) -> syn::Result<DescriptorAttr> {
    if !matches!(attr.meta, Meta::List(_)) {
        return Err(syn::Error::new_spanned(
            attr,
            "expected #[autodi(singleton | transient | scoped | custom, ...)]",
        ));
    }

    let mut kind: Option<Kind> = None;
    let mut interface = None;
    let mut function = None;
    let mut filters = None;

    attr.parse_nested_meta(|meta| {
        let declared = if meta.path.is_ident("singleton") {
            Some(Kind::Singleton)
        } else if meta.path.is_ident("transient") {
            Some(Kind::Transient)
        } else if meta.path.is_ident("scoped") {
            Some(Kind::Scoped)
        } else if meta.path.is_ident("custom") {
            if meta.input.peek(syn::Token![=]) {
                function = Some(meta.value()?.parse::<LitStr>()?);
            }
            Some(Kind::Custom)
        } else {
            None
        };

        if let Some(declared) = declared {
            if kind.replace(declared).is_some() {
                return Err(meta.error("registration kind is declared more than once"));
            }
            return Ok(());
        }

        if meta.path.is_ident("interface") {
            interface = Some(meta.value()?.parse::<Type>()?);
            Ok(())
        } else if meta.path.is_ident("filters") {
            filters = Some(meta.value()?.parse::<LitStr>()?);
            Ok(())
        } else {
            Err(meta.error(
                "unsupported autodi option, expected singleton, transient, scoped, custom, interface or filters",
            ))
        }
    })?;

    let kind = kind.ok_or_else(|| {
        syn::Error::new_spanned(attr, "missing registration kind: singleton, transient, scoped or custom")
    })?;

    if kind == Kind::Custom && interface.is_some() {
        return Err(syn::Error::new_spanned(
            attr,
            "custom registration cannot declare an interface",
        ));
    }

    if let Some(name) = &function {
        if name.value().trim().is_empty() {
            return Err(syn::Error::new(name.span(), "registration function name cannot be empty"));
        }
    }

    Ok(DescriptorAttr {
        kind,
        interface,
        function,
        filters,
    })
}

/// 解析 `#[autodi_hosted]` 或 `#[autodi_hosted(filters = "...")]`
pub(crate) fn parse_marker(attr: &Attribute) -> syn::Result<MarkerAttr> {
    let mut filters = None;

    if let Meta::List(_) = attr.meta {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("filters") {
                filters = Some(meta.value()?.parse::<LitStr>()?);
                Ok(())
            } else {
                Err(meta.error("unsupported option, expected filters"))
            }
        })?;
    }

    Ok(MarkerAttr { filters })
}

/// 生成 `.with_filters("...")`，没有过滤标签时为空
pub(crate) fn filters_tokens(filters: &Option<LitStr>) -> TokenStream {
    match filters {
        Some(filters) => quote! { .with_filters(#filters) },
        None => quote! {},
    }
}

/// 把字符串转换成调用点的字面量
pub(crate) fn lit(value: &str) -> LitStr {
    LitStr::new(value, Span::call_site())
}
