use std::sync::Arc;

use crate::descriptor::InterfaceBinding;
use crate::hosting::HostedService;
use crate::service::{constructor_of, ErasedInstance, ServiceDescriptor, ServiceKey};
use crate::{ContainerResult, Injectable, Lifetime, ServiceProvider};

/// 服务集合 - 注册阶段的容器
///
/// 只追加，不修改已有注册；同一个服务标识可以注册多次，
/// 解析单个服务时以最后一次注册为准。
#[derive(Debug, Clone, Default)]
pub struct ServiceCollection {
    descriptors: Vec<ServiceDescriptor>,
}

impl ServiceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条注册记录
    pub fn add(&mut self, descriptor: ServiceDescriptor) -> &mut Self {
        tracing::trace!(
            "Adding service: key='{}', implementation='{}', lifetime={}",
            descriptor.key(),
            descriptor.implementation(),
            descriptor.lifetime()
        );
        self.descriptors.push(descriptor);
        self
    }

    fn add_type<T: Injectable>(&mut self, lifetime: Lifetime) -> &mut Self {
        let constructor = constructor_of::<T>();
        self.add(ServiceDescriptor::new(
            ServiceKey::of::<T>(),
            std::any::type_name::<T>(),
            lifetime,
            move |provider| constructor(provider),
        ))
    }

    pub fn add_singleton<T: Injectable>(&mut self) -> &mut Self {
        self.add_type::<T>(Lifetime::Singleton)
    }

    pub fn add_scoped<T: Injectable>(&mut self) -> &mut Self {
        self.add_type::<T>(Lifetime::Scoped)
    }

    pub fn add_transient<T: Injectable>(&mut self) -> &mut Self {
        self.add_type::<T>(Lifetime::Transient)
    }

    /// 以接口身份注册 `T`，绑定通常由 [`interface_binding!`](crate::interface_binding) 生成
    pub fn add_as<T: Injectable>(&mut self, lifetime: Lifetime, binding: InterfaceBinding) -> &mut Self {
        let constructor = constructor_of::<T>();
        self.add(ServiceDescriptor::new(
            binding.key(),
            std::any::type_name::<T>(),
            lifetime,
            move |provider| binding.apply(constructor(provider)?),
        ))
    }

    pub fn add_singleton_as<T: Injectable>(&mut self, binding: InterfaceBinding) -> &mut Self {
        self.add_as::<T>(Lifetime::Singleton, binding)
    }

    pub fn add_scoped_as<T: Injectable>(&mut self, binding: InterfaceBinding) -> &mut Self {
        self.add_as::<T>(Lifetime::Scoped, binding)
    }

    pub fn add_transient_as<T: Injectable>(&mut self, binding: InterfaceBinding) -> &mut Self {
        self.add_as::<T>(Lifetime::Transient, binding)
    }

    /// 通过工厂注册服务 `S`（可以是 `dyn Trait`）
    pub fn add_factory<S, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> ContainerResult<Arc<S>> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::new(
            ServiceKey::of::<S>(),
            std::any::type_name::<F>(),
            lifetime,
            move |provider| factory(provider).map(ErasedInstance::new),
        ))
    }

    pub fn add_singleton_factory<S, F>(&mut self, factory: F) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> ContainerResult<Arc<S>> + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Singleton, factory)
    }

    pub fn add_scoped_factory<S, F>(&mut self, factory: F) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> ContainerResult<Arc<S>> + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Scoped, factory)
    }

    pub fn add_transient_factory<S, F>(&mut self, factory: F) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> ContainerResult<Arc<S>> + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Transient, factory)
    }

    /// 注册现成的实例
    pub fn add_instance<S: ?Sized + Send + Sync + 'static>(&mut self, instance: Arc<S>) -> &mut Self {
        let erased = ErasedInstance::new(instance);
        self.add(ServiceDescriptor::new(
            ServiceKey::of::<S>(),
            std::any::type_name::<S>(),
            Lifetime::Singleton,
            move |_| Ok(erased.clone()),
        ))
    }

    /// 注册托管服务
    pub fn add_hosted_service<T: Injectable + HostedService>(&mut self) -> &mut Self {
        self.add_hosted_service_factory(|provider| {
            let service: Arc<dyn HostedService> = Arc::new(T::construct(provider)?);
            Ok(service)
        })
    }

    pub fn add_hosted_service_factory<F>(&mut self, factory: F) -> &mut Self
    where
        F: Fn(&ServiceProvider) -> ContainerResult<Arc<dyn HostedService>> + Send + Sync + 'static,
    {
        self.add_factory::<dyn HostedService, _>(Lifetime::Singleton, factory)
    }

    pub fn contains<S: ?Sized + 'static>(&self) -> bool {
        self.contains_key(ServiceKey::of::<S>())
    }

    pub fn contains_key(&self, key: ServiceKey) -> bool {
        self.descriptors.iter().any(|d| d.key() == key)
    }

    /// 某个服务标识的注册次数
    pub fn count_of<S: ?Sized + 'static>(&self) -> usize {
        let key = ServiceKey::of::<S>();
        self.descriptors.iter().filter(|d| d.key() == key).count()
    }

    pub fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// 构建解析用的 provider，集合本身保持不变
    pub fn build_provider(&self) -> ServiceProvider {
        tracing::debug!("Building service provider with {} registration(s)", self.descriptors.len());
        ServiceProvider::new(self.descriptors.clone())
    }
}
