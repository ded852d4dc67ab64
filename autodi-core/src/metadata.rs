use std::fmt;
use std::sync::Arc;

use crate::descriptor::{HostedMarker, RegistrationDescriptor};
use crate::error::BoxError;
use crate::hosting::HostedService;
use crate::service::{constructor_of, CastFn, Constructor, ErasedInstance, ServiceKey};
use crate::{ContainerResult, Injectable, ServiceCollection};

/// 注册函数的可见性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

/// 静态注册函数的两种签名
#[derive(Clone, Copy)]
pub enum RegistrationFn {
    /// `fn(&mut ServiceCollection)`
    Collection(fn(&mut ServiceCollection) -> Result<(), BoxError>),

    /// `fn(&mut ServiceCollection, &RegistrationDescriptor)`
    WithDescriptor(fn(&mut ServiceCollection, &RegistrationDescriptor) -> Result<(), BoxError>),
}

impl RegistrationFn {
    pub fn arity(&self) -> usize {
        match self {
            RegistrationFn::Collection(_) => 1,
            RegistrationFn::WithDescriptor(_) => 2,
        }
    }

    pub fn invoke(
        &self,
        services: &mut ServiceCollection,
        descriptor: &RegistrationDescriptor,
    ) -> Result<(), BoxError> {
        match self {
            RegistrationFn::Collection(f) => f(services),
            RegistrationFn::WithDescriptor(f) => f(services, descriptor),
        }
    }
}

/// 函数表中的一项，由 `#[registration_functions]` 生成
#[derive(Clone, Copy)]
pub struct RegistrationFunction {
    name: &'static str,
    visibility: Visibility,
    function: RegistrationFn,
}

impl RegistrationFunction {
    pub fn new(name: &'static str, visibility: Visibility, function: RegistrationFn) -> Self {
        Self {
            name,
            visibility,
            function,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn function(&self) -> &RegistrationFn {
        &self.function
    }

    // 两参数优先于单参数，公开优先于非公开
    fn rank(&self) -> u8 {
        match (self.function.arity(), self.visibility) {
            (2, Visibility::Public) => 0,
            (2, Visibility::Private) => 1,
            (_, Visibility::Public) => 2,
            (_, Visibility::Private) => 3,
        }
    }
}

impl fmt::Debug for RegistrationFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationFunction")
            .field("name", &self.name)
            .field("visibility", &self.visibility)
            .field("arity", &self.function.arity())
            .finish()
    }
}

/// 按名称查找注册函数，同名时按
/// 两参数公开 > 两参数非公开 > 单参数公开 > 单参数非公开 选择
pub fn resolve_registration_function<'a>(
    functions: &'a [RegistrationFunction],
    name: &str,
) -> Option<&'a RegistrationFunction> {
    functions
        .iter()
        .filter(|f| f.name == name)
        .min_by_key(|f| f.rank())
}

/// 注册函数的返回值，允许 `()` 和 `Result<(), E>`
pub trait IntoRegistrationResult {
    fn into_registration_result(self) -> Result<(), BoxError>;
}

impl IntoRegistrationResult for () {
    fn into_registration_result(self) -> Result<(), BoxError> {
        Ok(())
    }
}

impl<E: Into<BoxError>> IntoRegistrationResult for Result<(), E> {
    fn into_registration_result(self) -> Result<(), BoxError> {
        self.map_err(Into::into)
    }
}

/// 类型的静态注册函数表
pub trait RegistrationFunctions {
    fn registration_functions() -> Vec<RegistrationFunction>;
}

/// 携带注册元数据的类型，通过 `#[derive(AutoRegister)]` 实现
pub trait AutoRegister: 'static {
    fn metadata() -> TypeMetadata;
}

fn hosted_cast<T: HostedService>(instance: ErasedInstance) -> ContainerResult<ErasedInstance> {
    let concrete = instance.downcast_required::<T>()?;
    let service: Arc<dyn HostedService> = concrete;
    Ok(ErasedInstance::new(service))
}

/// 一个类型的全部注册元数据
#[derive(Clone)]
pub struct TypeMetadata {
    key: ServiceKey,
    is_abstract: bool,
    constructor: Option<Constructor>,
    hosted_cast: Option<CastFn>,
    descriptors: Vec<RegistrationDescriptor>,
    hosted_markers: Vec<HostedMarker>,
    hosted_singleton_markers: Vec<HostedMarker>,
    functions: Vec<RegistrationFunction>,
}

impl TypeMetadata {
    /// 只有类型身份的元数据
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            key: ServiceKey::of::<T>(),
            is_abstract: false,
            constructor: None,
            hosted_cast: None,
            descriptors: Vec::new(),
            hosted_markers: Vec::new(),
            hosted_singleton_markers: Vec::new(),
            functions: Vec::new(),
        }
    }

    /// 带构造器的元数据
    pub fn injectable<T: Injectable>() -> Self {
        Self::of::<T>().with_constructor(constructor_of::<T>())
    }

    /// 标记为抽象类型，扫描时跳过
    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn with_constructor(mut self, constructor: Constructor) -> Self {
        self.constructor = Some(constructor);
        self
    }

    /// 声明类型满足 `HostedService` 约定，`T` 必须是本类型
    pub fn hosted_capable<T: HostedService>(mut self) -> Self {
        self.hosted_cast = Some(hosted_cast::<T>);
        self
    }

    pub fn with_descriptor(mut self, descriptor: RegistrationDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    pub fn with_hosted_marker(mut self, marker: HostedMarker) -> Self {
        self.hosted_markers.push(marker);
        self
    }

    pub fn with_hosted_singleton_marker(mut self, marker: HostedMarker) -> Self {
        self.hosted_singleton_markers.push(marker);
        self
    }

    pub fn with_function(mut self, function: RegistrationFunction) -> Self {
        self.functions.push(function);
        self
    }

    pub fn with_functions(mut self, functions: Vec<RegistrationFunction>) -> Self {
        self.functions.extend(functions);
        self
    }

    pub fn key(&self) -> ServiceKey {
        self.key
    }

    pub fn type_name(&self) -> &'static str {
        self.key.name()
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn constructor(&self) -> Option<Constructor> {
        self.constructor
    }

    pub fn hosted_cast(&self) -> Option<CastFn> {
        self.hosted_cast
    }

    pub fn descriptors(&self) -> &[RegistrationDescriptor] {
        &self.descriptors
    }

    pub fn hosted_markers(&self) -> &[HostedMarker] {
        &self.hosted_markers
    }

    pub fn hosted_singleton_markers(&self) -> &[HostedMarker] {
        &self.hosted_singleton_markers
    }

    pub fn functions(&self) -> &[RegistrationFunction] {
        &self.functions
    }

    /// 是否声明了任何描述符或标记
    pub fn has_registration(&self) -> bool {
        !self.descriptors.is_empty()
            || !self.hosted_markers.is_empty()
            || !self.hosted_singleton_markers.is_empty()
    }
}

impl fmt::Debug for TypeMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeMetadata")
            .field("type_name", &self.key.name())
            .field("is_abstract", &self.is_abstract)
            .field("constructible", &self.constructor.is_some())
            .field("hosted_capable", &self.hosted_cast.is_some())
            .field("descriptors", &self.descriptors)
            .field("hosted_markers", &self.hosted_markers)
            .field("hosted_singleton_markers", &self.hosted_singleton_markers)
            .field("functions", &self.functions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut ServiceCollection) -> Result<(), BoxError> {
        Ok(())
    }

    fn noop_with_descriptor(
        _: &mut ServiceCollection,
        _: &RegistrationDescriptor,
    ) -> Result<(), BoxError> {
        Ok(())
    }

    fn table() -> Vec<RegistrationFunction> {
        vec![
            RegistrationFunction::new("register_di", Visibility::Private, RegistrationFn::Collection(noop)),
            RegistrationFunction::new("register_di", Visibility::Public, RegistrationFn::Collection(noop)),
            RegistrationFunction::new(
                "register_di",
                Visibility::Private,
                RegistrationFn::WithDescriptor(noop_with_descriptor),
            ),
            RegistrationFunction::new(
                "register_di",
                Visibility::Public,
                RegistrationFn::WithDescriptor(noop_with_descriptor),
            ),
            RegistrationFunction::new("other", Visibility::Public, RegistrationFn::Collection(noop)),
        ]
    }

    #[test]
    fn test_resolution_order() {
        let mut functions = table();

        let picked = resolve_registration_function(&functions, "register_di").unwrap();
        assert_eq!((picked.function().arity(), picked.visibility()), (2, Visibility::Public));

        functions.remove(3);
        let picked = resolve_registration_function(&functions, "register_di").unwrap();
        assert_eq!((picked.function().arity(), picked.visibility()), (2, Visibility::Private));

        functions.remove(2);
        let picked = resolve_registration_function(&functions, "register_di").unwrap();
        assert_eq!((picked.function().arity(), picked.visibility()), (1, Visibility::Public));

        functions.remove(1);
        let picked = resolve_registration_function(&functions, "register_di").unwrap();
        assert_eq!((picked.function().arity(), picked.visibility()), (1, Visibility::Private));
    }

    #[test]
    fn test_unknown_function_is_not_resolved() {
        assert!(resolve_registration_function(&table(), "missing").is_none());
    }

    #[test]
    fn test_into_registration_result() {
        assert!(().into_registration_result().is_ok());
        assert!(Ok::<(), std::io::Error>(()).into_registration_result().is_ok());

        let failed: Result<(), anyhow::Error> = Err(anyhow::anyhow!("boom"));
        let error = failed.into_registration_result().unwrap_err();
        assert_eq!(error.to_string(), "boom");
    }

    #[test]
    fn test_has_registration() {
        struct Plain;

        assert!(!TypeMetadata::of::<Plain>().has_registration());
        assert!(TypeMetadata::of::<Plain>()
            .with_hosted_marker(HostedMarker::new())
            .has_registration());
        assert!(TypeMetadata::of::<Plain>()
            .with_descriptor(RegistrationDescriptor::transient())
            .has_registration());
    }
}
