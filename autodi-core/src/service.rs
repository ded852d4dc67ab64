use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::{ContainerError, ContainerResult, Lifetime, ServiceProvider};

/// 服务标识 - 具体类型或抽象服务（如 `dyn Trait`）的身份
#[derive(Clone, Copy)]
pub struct ServiceKey {
    id: TypeId,
    name: &'static str,
}

impl ServiceKey {
    pub fn of<S: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<S>(),
            name: std::any::type_name::<S>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ServiceKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ServiceKey {}

impl Hash for ServiceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceKey({})", self.name)
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// 类型擦除后的服务实例
///
/// 内部保存的是 `Arc<S>`，`S` 可以是具体类型也可以是 trait object，
/// 克隆只增加引用计数。
#[derive(Clone)]
pub struct ErasedInstance {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl ErasedInstance {
    pub fn new<S: ?Sized + Send + Sync + 'static>(service: Arc<S>) -> Self {
        Self {
            inner: Arc::new(service),
            type_name: std::any::type_name::<S>(),
        }
    }

    pub fn downcast<S: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<S>> {
        self.inner.downcast_ref::<Arc<S>>().cloned()
    }

    pub fn downcast_required<S: ?Sized + Send + Sync + 'static>(&self) -> ContainerResult<Arc<S>> {
        self.downcast::<S>().ok_or_else(|| ContainerError::TypeMismatch {
            expected: std::any::type_name::<S>().to_string(),
            found: self.type_name.to_string(),
        })
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for ErasedInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedInstance")
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// 可由容器构造的类型（相当于"拥有可用的构造器"）
///
/// 通常通过 `#[derive(Injectable)]` 生成
pub trait Injectable: Sized + Send + Sync + 'static {
    fn construct(provider: &ServiceProvider) -> ContainerResult<Self>;
}

/// 类型擦除的构造器
pub type Constructor = fn(&ServiceProvider) -> ContainerResult<ErasedInstance>;

/// 类型擦除的实例转换（具体类型 -> 抽象服务）
pub type CastFn = fn(ErasedInstance) -> ContainerResult<ErasedInstance>;

fn construct_erased<T: Injectable>(provider: &ServiceProvider) -> ContainerResult<ErasedInstance> {
    T::construct(provider).map(|instance| ErasedInstance::new(Arc::new(instance)))
}

/// 获取 `T` 的类型擦除构造器
pub fn constructor_of<T: Injectable>() -> Constructor {
    construct_erased::<T>
}

/// 服务工厂
pub type ServiceFactory =
    Arc<dyn Fn(&ServiceProvider) -> ContainerResult<ErasedInstance> + Send + Sync>;

/// 服务描述 - 容器中的一条注册记录
#[derive(Clone)]
pub struct ServiceDescriptor {
    key: ServiceKey,
    implementation: &'static str,
    lifetime: Lifetime,
    factory: ServiceFactory,
}

impl ServiceDescriptor {
    pub fn new<F>(key: ServiceKey, implementation: &'static str, lifetime: Lifetime, factory: F) -> Self
    where
        F: Fn(&ServiceProvider) -> ContainerResult<ErasedInstance> + Send + Sync + 'static,
    {
        Self {
            key,
            implementation,
            lifetime,
            factory: Arc::new(factory),
        }
    }

    pub fn key(&self) -> ServiceKey {
        self.key
    }

    /// 实现类型的名称
    pub fn implementation(&self) -> &'static str {
        self.implementation
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub(crate) fn create(&self, provider: &ServiceProvider) -> ContainerResult<ErasedInstance> {
        (self.factory)(provider)
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("key", &self.key.name())
            .field("implementation", &self.implementation)
            .field("lifetime", &self.lifetime)
            .finish()
    }
}
