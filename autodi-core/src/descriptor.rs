use std::fmt;

use crate::constants::DEFAULT_REGISTRATION_FUNCTION;
use crate::filter::FilterSet;
use crate::service::{CastFn, ErasedInstance, ServiceKey};
use crate::{ContainerError, ContainerResult, Lifetime, RegistrationKind};

/// 接口绑定 - 把实现类型注册到一个抽象服务标识下
///
/// Rust 无法在泛型代码里把 `Arc<T>` 转成 `Arc<dyn Trait>`，
/// 转换函数由 [`interface_binding!`](crate::interface_binding) 或派生宏在编译期生成。
#[derive(Clone, Copy)]
pub struct InterfaceBinding {
    key: ServiceKey,
    cast: CastFn,
}

impl InterfaceBinding {
    pub fn new(key: ServiceKey, cast: CastFn) -> Self {
        Self { key, cast }
    }

    pub fn key(&self) -> ServiceKey {
        self.key
    }

    pub fn apply(&self, instance: ErasedInstance) -> ContainerResult<ErasedInstance> {
        (self.cast)(instance)
    }
}

impl fmt::Debug for InterfaceBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InterfaceBinding").field(&self.key.name()).finish()
    }
}

/// 生成 `InterfaceBinding`
///
/// ```ignore
/// let binding = autodi_core::interface_binding!(EnglishGreeter => dyn Greeter);
/// ```
#[macro_export]
macro_rules! interface_binding {
    ($implementation:ty => $service:ty) => {
        $crate::InterfaceBinding::new(
            $crate::ServiceKey::of::<$service>(),
            |instance: $crate::ErasedInstance| -> $crate::ContainerResult<$crate::ErasedInstance> {
                let concrete: ::std::sync::Arc<$implementation> =
                    instance.downcast_required::<$implementation>()?;
                let service: ::std::sync::Arc<$service> = concrete;
                ::std::result::Result::Ok($crate::ErasedInstance::new(service))
            },
        )
    };
}

/// 注册描述符
///
/// 不变式：`custom_function` 当且仅当 `kind == Custom` 时存在。
/// 构造函数保证这一点，通过 [`RegistrationDescriptor::from_parts`]
/// 组装的描述符在扫描时由 [`validate`](Self::validate) 检查。
#[derive(Debug, Clone)]
pub struct RegistrationDescriptor {
    kind: RegistrationKind,
    interface: Option<InterfaceBinding>,
    custom_function: Option<String>,
    filters: FilterSet,
}

impl RegistrationDescriptor {
    /// 按生命周期注册
    pub fn lifetime(lifetime: Lifetime) -> Self {
        let kind = match lifetime {
            Lifetime::Singleton => RegistrationKind::Singleton,
            Lifetime::Scoped => RegistrationKind::Scoped,
            Lifetime::Transient => RegistrationKind::Transient,
        };
        Self::from_parts(kind, None, None, FilterSet::new())
    }

    pub fn singleton() -> Self {
        Self::lifetime(Lifetime::Singleton)
    }

    pub fn transient() -> Self {
        Self::lifetime(Lifetime::Transient)
    }

    pub fn scoped() -> Self {
        Self::lifetime(Lifetime::Scoped)
    }

    /// 通过类型上名为 `function` 的静态注册函数注册
    pub fn custom(function: impl Into<String>) -> Self {
        Self::from_parts(
            RegistrationKind::Custom,
            None,
            Some(function.into()),
            FilterSet::new(),
        )
    }

    /// 使用默认函数名 `register_di`
    pub fn custom_default() -> Self {
        Self::custom(DEFAULT_REGISTRATION_FUNCTION)
    }

    /// 直接组装，不检查不变式
    pub fn from_parts(
        kind: RegistrationKind,
        interface: Option<InterfaceBinding>,
        custom_function: Option<String>,
        filters: FilterSet,
    ) -> Self {
        Self {
            kind,
            interface,
            custom_function,
            filters,
        }
    }

    pub fn with_interface(mut self, binding: InterfaceBinding) -> Self {
        self.interface = Some(binding);
        self
    }

    pub fn with_filters(mut self, filters: impl Into<FilterSet>) -> Self {
        self.filters = filters.into();
        self
    }

    pub fn kind(&self) -> RegistrationKind {
        self.kind
    }

    pub fn interface(&self) -> Option<&InterfaceBinding> {
        self.interface.as_ref()
    }

    pub fn custom_function(&self) -> Option<&str> {
        self.custom_function.as_deref()
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn is_eligible(&self, active: &FilterSet) -> bool {
        self.filters.is_match(active)
    }

    pub fn validate(&self, type_name: &str) -> ContainerResult<()> {
        match (self.kind, self.custom_function.as_deref()) {
            (RegistrationKind::Custom, None) => Err(ContainerError::invalid_descriptor(
                type_name,
                "custom registration requires a function name",
            )),
            (RegistrationKind::Custom, Some(name)) if name.trim().is_empty() => Err(
                ContainerError::invalid_descriptor(type_name, "registration function name cannot be empty"),
            ),
            (RegistrationKind::Custom, Some(_)) if self.interface.is_some() => Err(
                ContainerError::invalid_descriptor(
                    type_name,
                    "custom registration cannot declare an interface",
                ),
            ),
            (kind, Some(name)) if kind != RegistrationKind::Custom => {
                Err(ContainerError::invalid_descriptor(
                    type_name,
                    format!("registration function '{}' is only valid for custom registration, found {}", name, kind),
                ))
            }
            _ => Ok(()),
        }
    }
}

/// 托管服务标记（`Hosted` 与 `HostedSingleton` 共用）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostedMarker {
    filters: FilterSet,
}

impl HostedMarker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filters(mut self, filters: impl Into<FilterSet>) -> Self {
        self.filters = filters.into();
        self
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn is_eligible(&self, active: &FilterSet) -> bool {
        self.filters.is_match(active)
    }
}
