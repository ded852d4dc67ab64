use syn::{GenericArgument, PathArguments, Type};

/// 若类型的最后一段为 `wrapper<T>`，返回 `T`
///
/// 例如 `Option<Arc<Db>>` 配合 `"Option"` 返回 `Arc<Db>`
pub(crate) fn unwrap_generic<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };

    let segment = type_path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }

    match &segment.arguments {
        PathArguments::AngleBracketed(args) => match args.args.first() {
            Some(GenericArgument::Type(inner)) => Some(inner),
            _ => None,
        },
        _ => None,
    }
}

/// `Arc<T>` 中的 `T`
pub(crate) fn arc_inner(ty: &Type) -> Option<&Type> {
    unwrap_generic(ty, "Arc")
}

/// 引用类型的最后一段路径名，例如 `&mut autodi_core::ServiceCollection` -> `ServiceCollection`
pub(crate) fn reference_target_name(ty: &Type, mutable: bool) -> Option<String> {
    let Type::Reference(reference) = ty else {
        return None;
    };

    if reference.mutability.is_some() != mutable {
        return None;
    }

    match reference.elem.as_ref() {
        Type::Path(path) => path.path.segments.last().map(|s| s.ident.to_string()),
        _ => None,
    }
}
