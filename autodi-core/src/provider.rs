use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::service::{ErasedInstance, ServiceDescriptor, ServiceKey};
use crate::utils::dependency::ResolutionGuard;
use crate::{ContainerError, ContainerResult, Lifetime};

static NEXT_PROVIDER_ID: AtomicUsize = AtomicUsize::new(1);

/// provider 与其所有 scope 共享的部分
struct ProviderCore {
    id: usize,
    descriptors: Vec<ServiceDescriptor>,

    /// 服务标识 -> 注册下标（按注册顺序）
    index: HashMap<ServiceKey, Vec<usize>>,

    /// 单例缓存，每条注册一个槽位
    singletons: Vec<Mutex<Option<ErasedInstance>>>,
}

/// 服务解析器
///
/// 根 provider 本身也充当一个 scope；`create_scope` 得到的 provider
/// 共享单例，拥有独立的作用域缓存。
#[derive(Clone)]
pub struct ServiceProvider {
    core: Arc<ProviderCore>,
    scoped: Arc<Mutex<HashMap<usize, ErasedInstance>>>,
}

impl ServiceProvider {
    pub(crate) fn new(descriptors: Vec<ServiceDescriptor>) -> Self {
        let mut index: HashMap<ServiceKey, Vec<usize>> = HashMap::new();
        for (idx, descriptor) in descriptors.iter().enumerate() {
            index.entry(descriptor.key()).or_default().push(idx);
        }

        let singletons = descriptors.iter().map(|_| Mutex::new(None)).collect();

        Self {
            core: Arc::new(ProviderCore {
                id: NEXT_PROVIDER_ID.fetch_add(1, Ordering::Relaxed),
                descriptors,
                index,
                singletons,
            }),
            scoped: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// 创建新的 scope
    pub fn create_scope(&self) -> ServiceProvider {
        tracing::trace!("Creating service scope");
        ServiceProvider {
            core: Arc::clone(&self.core),
            scoped: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// 解析服务，未注册时返回 `None`
    pub fn get<S: ?Sized + Send + Sync + 'static>(&self) -> ContainerResult<Option<Arc<S>>> {
        match self.get_erased(ServiceKey::of::<S>())? {
            Some(instance) => instance.downcast_required::<S>().map(Some),
            None => Ok(None),
        }
    }

    /// 解析必需的服务
    pub fn get_required<S: ?Sized + Send + Sync + 'static>(&self) -> ContainerResult<Arc<S>> {
        self.get::<S>()?.ok_or_else(|| {
            tracing::debug!("Service '{}' not found in provider", std::any::type_name::<S>());
            ContainerError::ServiceNotFound(std::any::type_name::<S>().to_string())
        })
    }

    /// 按注册顺序解析某个服务标识的全部注册
    pub fn get_all<S: ?Sized + Send + Sync + 'static>(&self) -> ContainerResult<Vec<Arc<S>>> {
        let Some(indices) = self.core.index.get(&ServiceKey::of::<S>()) else {
            return Ok(Vec::new());
        };

        indices
            .iter()
            .map(|&idx| self.resolve(idx)?.downcast_required::<S>())
            .collect()
    }

    /// 按服务标识解析，取最后一次注册
    pub fn get_erased(&self, key: ServiceKey) -> ContainerResult<Option<ErasedInstance>> {
        match self.core.index.get(&key).and_then(|indices| indices.last()) {
            Some(&idx) => self.resolve(idx).map(Some),
            None => Ok(None),
        }
    }

    pub fn contains<S: ?Sized + 'static>(&self) -> bool {
        self.core.index.contains_key(&ServiceKey::of::<S>())
    }

    pub fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.core.descriptors
    }

    fn resolve(&self, idx: usize) -> ContainerResult<ErasedInstance> {
        let descriptor = &self.core.descriptors[idx];
        let _guard = ResolutionGuard::enter(self.core.id, idx, descriptor.implementation())?;

        match descriptor.lifetime() {
            Lifetime::Singleton => {
                // 构造期间持有槽位锁，保证每个 provider 只构造一次
                let mut slot = self.core.singletons[idx].lock();
                if let Some(instance) = slot.as_ref() {
                    return Ok(instance.clone());
                }

                tracing::debug!("Creating singleton instance of '{}'", descriptor.implementation());
                let instance = self.create(descriptor)?;
                *slot = Some(instance.clone());
                Ok(instance)
            }
            Lifetime::Scoped => {
                if let Some(instance) = self.scoped.lock().get(&idx) {
                    return Ok(instance.clone());
                }

                tracing::debug!("Creating scoped instance of '{}'", descriptor.implementation());
                let instance = self.create(descriptor)?;
                let mut scoped = self.scoped.lock();
                Ok(scoped.entry(idx).or_insert(instance).clone())
            }
            Lifetime::Transient => {
                tracing::trace!("Creating transient instance of '{}'", descriptor.implementation());
                self.create(descriptor)
            }
        }
    }

    fn create(&self, descriptor: &ServiceDescriptor) -> ContainerResult<ErasedInstance> {
        descriptor.create(self).map_err(|e| match e {
            // 保留循环依赖错误，不要包装它
            ContainerError::CircularDependency(_) => e,
            _ => ContainerError::ConstructionFailed {
                service: descriptor.implementation().to_string(),
                source: Box::new(e),
            },
        })
    }
}

impl std::fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("id", &self.core.id)
            .field("registrations", &self.core.descriptors.len())
            .finish()
    }
}
