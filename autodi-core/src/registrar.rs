//! 自动注册
//!
//! 读取类型上的注册元数据，把符合条件的类型追加到 [`ServiceCollection`]。
//! 扫描是同步的，遇到第一个错误即中止。

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::constants::DEFAULT_REGISTRATION_FUNCTION;
use crate::descriptor::{HostedMarker, RegistrationDescriptor};
use crate::hosting::HostedService;
use crate::metadata::{resolve_registration_function, AutoRegister, TypeMetadata};
use crate::module::{InventoryModules, Module, ModuleSource};
use crate::service::{Constructor, ServiceDescriptor, ServiceKey};
use crate::settings::{self, Settings};
use crate::{ContainerError, ContainerResult, Lifetime, ServiceCollection};

/// 注册器
///
/// 创建时取一份全局配置的快照，之后对全局配置的修改不影响已创建的注册器。
#[derive(Debug, Clone)]
pub struct Registrar {
    settings: Settings,
}

impl Default for Registrar {
    fn default() -> Self {
        Self::new()
    }
}

impl Registrar {
    /// 使用当前全局配置
    pub fn new() -> Self {
        Self::with_settings(settings::current())
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// 扫描单个模块中的全部类型
    ///
    /// 抽象类型和没有任何描述符的类型会被跳过。
    pub fn scan_module<'a>(
        &self,
        services: &'a mut ServiceCollection,
        module: &Module,
    ) -> ContainerResult<&'a mut ServiceCollection> {
        tracing::debug!(
            "Scanning module '{}' ({} type(s))",
            module.name(),
            module.types().len()
        );

        for metadata in module.types() {
            let type_name = metadata.type_name();
            self.settings.debug(|| format!("Considering type {}", type_name));

            if metadata.is_abstract() {
                self.settings
                    .debug(|| format!("Skipping type {} because it is abstract", type_name));
                continue;
            }

            if !metadata.has_registration() {
                self.settings.debug(|| {
                    format!("Skipping type {} because it is not marked for registration", type_name)
                });
                continue;
            }

            self.register_metadata(services, metadata).map_err(|e| {
                tracing::error!("Failed to register type '{}': {}", type_name, e);
                e
            })?;
        }

        Ok(services)
    }

    /// 从全部已加载模块开始，沿模块引用做传递闭包扫描
    ///
    /// 每个模块最多访问一次（按完整名称）。匹配排除列表的模块不会被扫描，
    /// 也不会被加载。尚未加载的引用模块通过 `source.load` 加载，
    /// 找不到的引用记录警告后跳过，加载失败则中止扫描。
    pub fn scan_all_loaded_modules<'a>(
        &self,
        services: &'a mut ServiceCollection,
        source: &dyn ModuleSource,
    ) -> ContainerResult<&'a mut ServiceCollection> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<Arc<Module>> = VecDeque::new();

        for module in source.loaded_modules() {
            self.enqueue(module, &mut seen, &mut queue);
        }

        let registrations_before = services.len();
        let mut scanned = 0;

        while let Some(module) = queue.pop_front() {
            self.scan_module(services, &module)?;
            scanned += 1;

            for reference in module.references() {
                if seen.contains(reference) {
                    continue;
                }

                if self.settings.is_module_excluded(reference) {
                    seen.insert(reference.clone());
                    self.settings
                        .debug(|| format!("Skipping excluded module {}", reference));
                    continue;
                }

                match source.load(reference) {
                    Ok(Some(loaded)) => {
                        // 来源可能以别名返回模块，引用名同样记为已访问
                        seen.insert(reference.clone());
                        self.enqueue(loaded, &mut seen, &mut queue);
                    }
                    Ok(None) => {
                        seen.insert(reference.clone());
                        tracing::warn!(
                            "Module '{}' referenced by '{}' could not be found, skipping",
                            reference,
                            module.name()
                        );
                    }
                    Err(e) => {
                        tracing::error!("Failed to load module '{}': {}", reference, e);
                        return Err(ContainerError::ModuleLoad {
                            module: reference.clone(),
                            source: Box::new(e),
                        });
                    }
                }
            }
        }

        tracing::info!(
            "Module scan completed: {} module(s) scanned, {} registration(s) added",
            scanned,
            services.len() - registrations_before
        );
        Ok(services)
    }

    /// 扫描链接期通过 `#[derive(AutoRegister)]` 收集的全部模块
    pub fn scan_registered<'a>(
        &self,
        services: &'a mut ServiceCollection,
    ) -> ContainerResult<&'a mut ServiceCollection> {
        self.scan_all_loaded_modules(services, &InventoryModules::collect())
    }

    /// 注册单个类型
    pub fn register<'a, T: AutoRegister>(
        &self,
        services: &'a mut ServiceCollection,
    ) -> ContainerResult<&'a mut ServiceCollection> {
        self.register_type(services, &T::metadata())
    }

    /// 按元数据注册单个类型，没有任何描述符或标记时返回 `NoDescriptor`
    pub fn register_type<'a>(
        &self,
        services: &'a mut ServiceCollection,
        metadata: &TypeMetadata,
    ) -> ContainerResult<&'a mut ServiceCollection> {
        if !metadata.has_registration() {
            return Err(ContainerError::NoDescriptor(metadata.type_name().to_string()));
        }

        self.register_metadata(services, metadata)?;
        Ok(services)
    }

    fn enqueue(&self, module: Arc<Module>, seen: &mut HashSet<String>, queue: &mut VecDeque<Arc<Module>>) {
        if !seen.insert(module.name().to_string()) {
            return;
        }

        if self.settings.is_module_excluded(module.name()) {
            self.settings
                .debug(|| format!("Skipping excluded module {}", module.name()));
            return;
        }

        queue.push_back(module);
    }

    fn register_metadata(
        &self,
        services: &mut ServiceCollection,
        metadata: &TypeMetadata,
    ) -> ContainerResult<()> {
        check_markers(metadata)?;

        let type_name = metadata.type_name();
        let active = self.settings.filters();

        for descriptor in metadata.descriptors() {
            descriptor.validate(type_name)?;

            if !descriptor.is_eligible(active) {
                self.settings.debug(|| {
                    format!(
                        "Skipping {} registration of {}: filters [{}] do not match [{}]",
                        descriptor.kind(),
                        type_name,
                        descriptor.filters(),
                        active
                    )
                });
                continue;
            }

            match descriptor.kind().lifetime() {
                Some(lifetime) => self.add_lifetime(services, metadata, descriptor, lifetime)?,
                None => self.invoke_custom(services, metadata, descriptor)?,
            }
        }

        if let Some(marker) = metadata.hosted_markers().first() {
            if self.is_marker_eligible(marker, type_name, "hosted service") {
                self.add_hosted(services, metadata)?;
            }
        }

        if let Some(marker) = metadata.hosted_singleton_markers().first() {
            if self.is_marker_eligible(marker, type_name, "hosted singleton") {
                self.add_hosted_singleton(services, metadata)?;
            }
        }

        Ok(())
    }

    fn is_marker_eligible(&self, marker: &HostedMarker, type_name: &str, what: &str) -> bool {
        let eligible = marker.is_eligible(self.settings.filters());
        if !eligible {
            self.settings.debug(|| {
                format!(
                    "Skipping {} registration of {}: filters [{}] do not match [{}]",
                    what,
                    type_name,
                    marker.filters(),
                    self.settings.filters()
                )
            });
        }
        eligible
    }

    fn add_lifetime(
        &self,
        services: &mut ServiceCollection,
        metadata: &TypeMetadata,
        descriptor: &RegistrationDescriptor,
        lifetime: Lifetime,
    ) -> ContainerResult<()> {
        let type_name = metadata.type_name();
        let constructor = require_constructor(metadata)?;
        let binding = descriptor.interface().copied();
        let key = binding.map_or(metadata.key(), |b| b.key());

        services.add(ServiceDescriptor::new(key, type_name, lifetime, move |provider| {
            let instance = constructor(provider)?;
            match binding {
                Some(binding) => binding.apply(instance),
                None => Ok(instance),
            }
        }));

        self.settings
            .debug(|| format!("{} registered as {} service {}", type_name, lifetime, key));
        Ok(())
    }

    fn invoke_custom(
        &self,
        services: &mut ServiceCollection,
        metadata: &TypeMetadata,
        descriptor: &RegistrationDescriptor,
    ) -> ContainerResult<()> {
        let type_name = metadata.type_name();
        let name = descriptor
            .custom_function()
            .unwrap_or(DEFAULT_REGISTRATION_FUNCTION);

        let function = resolve_registration_function(metadata.functions(), name).ok_or_else(|| {
            ContainerError::UnresolvedCustomFunction {
                type_name: type_name.to_string(),
                function: name.to_string(),
            }
        })?;

        function.function().invoke(services, descriptor).map_err(|source| {
            ContainerError::CustomFunctionFailure {
                type_name: type_name.to_string(),
                function: name.to_string(),
                source,
            }
        })?;

        self.settings
            .debug(|| format!("{} registered through {}", type_name, name));
        Ok(())
    }

    fn add_hosted(&self, services: &mut ServiceCollection, metadata: &TypeMetadata) -> ContainerResult<()> {
        let type_name = metadata.type_name();
        let constructor = require_constructor(metadata)?;
        let cast = require_hosted_cast(metadata)?;

        services.add(ServiceDescriptor::new(
            ServiceKey::of::<dyn HostedService>(),
            type_name,
            Lifetime::Singleton,
            move |provider| cast(constructor(provider)?),
        ));

        self.settings
            .debug(|| format!("{} registered as hosted service", type_name));
        Ok(())
    }

    /// 注册一次单例，再注册一个解析到同一实例的托管服务
    fn add_hosted_singleton(
        &self,
        services: &mut ServiceCollection,
        metadata: &TypeMetadata,
    ) -> ContainerResult<()> {
        let type_name = metadata.type_name();
        let constructor = require_constructor(metadata)?;
        let cast = require_hosted_cast(metadata)?;
        let own_key = metadata.key();

        services.add(ServiceDescriptor::new(
            own_key,
            type_name,
            Lifetime::Singleton,
            move |provider| constructor(provider),
        ));

        services.add(ServiceDescriptor::new(
            ServiceKey::of::<dyn HostedService>(),
            type_name,
            Lifetime::Singleton,
            move |provider| {
                let instance = provider
                    .get_erased(own_key)?
                    .ok_or_else(|| ContainerError::ServiceNotFound(own_key.name().to_string()))?;
                cast(instance)
            },
        ));

        self.settings
            .debug(|| format!("{} registered as hosted singleton", type_name));
        Ok(())
    }
}

fn check_markers(metadata: &TypeMetadata) -> ContainerResult<()> {
    let hosted = metadata.hosted_markers().len();
    let combined = metadata.hosted_singleton_markers().len();

    let reason = if hosted > 1 {
        "multiple hosted service markers"
    } else if combined > 1 {
        "multiple hosted singleton markers"
    } else if hosted > 0 && combined > 0 {
        "both hosted service and hosted singleton markers are present"
    } else {
        return Ok(());
    };

    Err(ContainerError::ambiguous_markers(metadata.type_name(), reason))
}

fn require_constructor(metadata: &TypeMetadata) -> ContainerResult<Constructor> {
    metadata.constructor().ok_or_else(|| {
        ContainerError::invalid_descriptor(
            metadata.type_name(),
            "type has no constructor, derive or implement Injectable",
        )
    })
}

fn require_hosted_cast(metadata: &TypeMetadata) -> ContainerResult<crate::service::CastFn> {
    metadata.hosted_cast().ok_or_else(|| {
        ContainerError::invalid_descriptor(metadata.type_name(), "type does not implement HostedService")
    })
}

/// `ServiceCollection` 上的自动注册扩展，使用当前全局配置
pub trait AutoRegisterExt {
    /// 注册单个类型
    fn auto_register<T: AutoRegister>(&mut self) -> ContainerResult<&mut Self>;

    /// 扫描单个模块
    fn auto_register_module(&mut self, module: &Module) -> ContainerResult<&mut Self>;

    /// 从给定模块来源做传递闭包扫描
    fn auto_register_from(&mut self, source: &dyn ModuleSource) -> ContainerResult<&mut Self>;

    /// 扫描链接期收集的全部模块
    fn auto_register_all(&mut self) -> ContainerResult<&mut Self>;
}

impl AutoRegisterExt for ServiceCollection {
    fn auto_register<T: AutoRegister>(&mut self) -> ContainerResult<&mut Self> {
        Registrar::new().register::<T>(self)
    }

    fn auto_register_module(&mut self, module: &Module) -> ContainerResult<&mut Self> {
        Registrar::new().scan_module(self, module)
    }

    fn auto_register_from(&mut self, source: &dyn ModuleSource) -> ContainerResult<&mut Self> {
        Registrar::new().scan_all_loaded_modules(self, source)
    }

    fn auto_register_all(&mut self) -> ContainerResult<&mut Self> {
        Registrar::new().scan_registered(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::InterfaceBinding;
    use crate::error::BoxError;
    use crate::filter::FilterSet;
    use crate::metadata::{RegistrationFn, RegistrationFunction, Visibility};
    use crate::module::ModuleCatalog;
    use crate::{Injectable, ServiceProvider};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct EnglishGreeter;

    impl Injectable for EnglishGreeter {
        fn construct(_: &ServiceProvider) -> ContainerResult<Self> {
            Ok(EnglishGreeter)
        }
    }

    impl Greeter for EnglishGreeter {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    struct Worker;

    impl Injectable for Worker {
        fn construct(_: &ServiceProvider) -> ContainerResult<Self> {
            Ok(Worker)
        }
    }

    #[async_trait]
    impl HostedService for Worker {
        async fn start(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn greeter_binding() -> InterfaceBinding {
        crate::interface_binding!(EnglishGreeter => dyn Greeter)
    }

    fn registrar() -> Registrar {
        Registrar::with_settings(Settings::default())
    }

    fn registrar_with_filters(filters: &str) -> Registrar {
        Registrar::with_settings(Settings::default().with_filters(filters))
    }

    #[test]
    fn test_singleton_is_registered_once() {
        let metadata = TypeMetadata::injectable::<EnglishGreeter>()
            .with_descriptor(RegistrationDescriptor::singleton());

        let mut services = ServiceCollection::new();
        registrar().register_type(&mut services, &metadata).unwrap();

        assert_eq!(services.len(), 1);
        assert_eq!(services.count_of::<EnglishGreeter>(), 1);
        assert_eq!(services.descriptors()[0].lifetime(), Lifetime::Singleton);
    }

    #[test]
    fn test_interface_key_is_used() {
        let metadata = TypeMetadata::injectable::<EnglishGreeter>()
            .with_descriptor(RegistrationDescriptor::transient().with_interface(greeter_binding()));

        let mut services = ServiceCollection::new();
        registrar().register_type(&mut services, &metadata).unwrap();

        assert!(services.contains::<dyn Greeter>());
        assert!(!services.contains::<EnglishGreeter>());

        let provider = services.build_provider();
        assert_eq!(provider.get_required::<dyn Greeter>().unwrap().greet(), "hello");
    }

    #[test]
    fn test_lifetime_without_constructor_is_invalid() {
        struct NoConstructor;
        let metadata =
            TypeMetadata::of::<NoConstructor>().with_descriptor(RegistrationDescriptor::scoped());

        let mut services = ServiceCollection::new();
        let result = registrar().register_type(&mut services, &metadata);
        assert!(matches!(result, Err(ContainerError::InvalidDescriptor { .. })));
    }

    static CUSTOM_CALLS: AtomicUsize = AtomicUsize::new(0);

    struct CustomRegistered;

    fn register_custom(services: &mut ServiceCollection) -> Result<(), BoxError> {
        CUSTOM_CALLS.fetch_add(1, Ordering::SeqCst);
        services.add_instance(Arc::new(String::from("custom")));
        Ok(())
    }

    fn register_custom_with_descriptor(
        services: &mut ServiceCollection,
        descriptor: &RegistrationDescriptor,
    ) -> Result<(), BoxError> {
        services.add_instance(Arc::new(descriptor.filters().to_string()));
        Ok(())
    }

    fn failing(_: &mut ServiceCollection) -> Result<(), BoxError> {
        Err("database unavailable".into())
    }

    #[test]
    fn test_custom_function_is_called_once() {
        let metadata = TypeMetadata::of::<CustomRegistered>()
            .with_descriptor(RegistrationDescriptor::custom_default())
            .with_function(RegistrationFunction::new(
                "register_di",
                Visibility::Private,
                RegistrationFn::Collection(register_custom),
            ));

        let before = CUSTOM_CALLS.load(Ordering::SeqCst);
        let mut services = ServiceCollection::new();
        registrar().register_type(&mut services, &metadata).unwrap();

        assert_eq!(CUSTOM_CALLS.load(Ordering::SeqCst) - before, 1);
        assert_eq!(services.count_of::<String>(), 1);
    }

    #[test]
    fn test_custom_function_receives_descriptor() {
        let metadata = TypeMetadata::of::<CustomRegistered>()
            .with_descriptor(RegistrationDescriptor::custom("setup").with_filters("prod"))
            .with_function(RegistrationFunction::new(
                "setup",
                Visibility::Public,
                RegistrationFn::Collection(register_custom),
            ))
            .with_function(RegistrationFunction::new(
                "setup",
                Visibility::Private,
                RegistrationFn::WithDescriptor(register_custom_with_descriptor),
            ));

        let mut services = ServiceCollection::new();
        registrar_with_filters("prod")
            .register_type(&mut services, &metadata)
            .unwrap();

        let provider = services.build_provider();
        assert_eq!(*provider.get_required::<String>().unwrap(), "prod");
    }

    #[test]
    fn test_unresolved_custom_function() {
        let metadata = TypeMetadata::of::<CustomRegistered>()
            .with_descriptor(RegistrationDescriptor::custom("missing"));

        match registrar().register_type(&mut ServiceCollection::new(), &metadata) {
            Err(ContainerError::UnresolvedCustomFunction { function, .. }) => {
                assert_eq!(function, "missing")
            }
            other => panic!("Expected UnresolvedCustomFunction, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_custom_failure_keeps_cause() {
        let metadata = TypeMetadata::of::<CustomRegistered>()
            .with_descriptor(RegistrationDescriptor::custom_default())
            .with_function(RegistrationFunction::new(
                "register_di",
                Visibility::Public,
                RegistrationFn::Collection(failing),
            ));

        let error = registrar()
            .register_type(&mut ServiceCollection::new(), &metadata)
            .unwrap_err();

        assert!(matches!(error, ContainerError::CustomFunctionFailure { .. }));
        let cause = std::error::Error::source(&error).expect("cause should be preserved");
        assert_eq!(cause.to_string(), "database unavailable");
    }

    #[test]
    fn test_singleton_and_custom_are_additive() {
        let metadata = TypeMetadata::injectable::<EnglishGreeter>()
            .with_descriptor(RegistrationDescriptor::singleton())
            .with_descriptor(RegistrationDescriptor::custom_default())
            .with_function(RegistrationFunction::new(
                "register_di",
                Visibility::Public,
                RegistrationFn::Collection(register_custom),
            ));

        let mut services = ServiceCollection::new();
        registrar().register_type(&mut services, &metadata).unwrap();

        assert_eq!(services.count_of::<EnglishGreeter>(), 1);
        assert_eq!(services.count_of::<String>(), 1);
    }

    #[test]
    fn test_filters_decide_eligibility() {
        let metadata = TypeMetadata::injectable::<EnglishGreeter>()
            .with_descriptor(RegistrationDescriptor::singleton().with_filters("a,b"));

        let mut services = ServiceCollection::new();
        registrar_with_filters("b").register_type(&mut services, &metadata).unwrap();
        assert_eq!(services.len(), 1);

        let mut services = ServiceCollection::new();
        registrar_with_filters("!b").register_type(&mut services, &metadata).unwrap();
        assert!(services.is_empty());

        let mut services = ServiceCollection::new();
        registrar().register_type(&mut services, &metadata).unwrap();
        assert_eq!(services.len(), 1);
    }

    #[test]
    fn test_ineligible_invalid_descriptor_still_fails() {
        let metadata = TypeMetadata::of::<CustomRegistered>().with_descriptor(
            RegistrationDescriptor::from_parts(
                crate::RegistrationKind::Custom,
                None,
                None,
                FilterSet::parse("never"),
            ),
        );

        let mut services = ServiceCollection::new();
        let result = registrar_with_filters("prod").register_type(&mut services, &metadata);
        assert!(matches!(result, Err(ContainerError::InvalidDescriptor { .. })));
    }

    #[test]
    fn test_ambiguous_markers() {
        let both = TypeMetadata::injectable::<Worker>()
            .hosted_capable::<Worker>()
            .with_hosted_marker(HostedMarker::new())
            .with_hosted_singleton_marker(HostedMarker::new());

        let mut services = ServiceCollection::new();
        let result = registrar().register_type(&mut services, &both);
        assert!(matches!(result, Err(ContainerError::AmbiguousMarkers { .. })));

        let twice = TypeMetadata::injectable::<Worker>()
            .hosted_capable::<Worker>()
            .with_hosted_marker(HostedMarker::new())
            .with_hosted_marker(HostedMarker::new().with_filters("prod"));

        let mut services = ServiceCollection::new();
        let result = registrar().register_type(&mut services, &twice);
        assert!(matches!(result, Err(ContainerError::AmbiguousMarkers { .. })));
    }

    #[test]
    fn test_hosted_marker_requires_hosted_service() {
        let metadata =
            TypeMetadata::injectable::<EnglishGreeter>().with_hosted_marker(HostedMarker::new());

        let mut services = ServiceCollection::new();
        let result = registrar().register_type(&mut services, &metadata);
        assert!(matches!(result, Err(ContainerError::InvalidDescriptor { .. })));
    }

    #[test]
    fn test_hosted_singleton_shares_instance() {
        let metadata = TypeMetadata::injectable::<Worker>()
            .hosted_capable::<Worker>()
            .with_hosted_singleton_marker(HostedMarker::new());

        let mut services = ServiceCollection::new();
        registrar().register_type(&mut services, &metadata).unwrap();
        assert_eq!(services.count_of::<Worker>(), 1);
        assert_eq!(services.count_of::<dyn HostedService>(), 1);

        let provider = services.build_provider();
        let worker = provider.get_required::<Worker>().unwrap();
        let hosted = provider.get_required::<dyn HostedService>().unwrap();

        let worker_ptr = Arc::as_ptr(&worker) as *const ();
        let hosted_ptr = Arc::as_ptr(&hosted) as *const ();
        assert_eq!(worker_ptr, hosted_ptr);
    }

    #[test]
    fn test_register_without_descriptor() {
        struct Plain;
        let mut services = ServiceCollection::new();
        let result = registrar().register_type(&mut services, &TypeMetadata::of::<Plain>());
        assert!(matches!(result, Err(ContainerError::NoDescriptor(_))));
    }

    #[test]
    fn test_scan_module_skips_abstract_and_unmarked() {
        struct Plain;
        let module = Module::new("app")
            .with_type(TypeMetadata::of::<Plain>())
            .with_type(
                TypeMetadata::of::<dyn Greeter>()
                    .abstract_type()
                    .with_descriptor(RegistrationDescriptor::singleton()),
            )
            .with_type(
                TypeMetadata::injectable::<EnglishGreeter>()
                    .with_descriptor(RegistrationDescriptor::singleton()),
            );

        let mut services = ServiceCollection::new();
        registrar().scan_module(&mut services, &module).unwrap();

        assert_eq!(services.len(), 1);
        assert!(services.contains::<EnglishGreeter>());
    }

    #[test]
    fn test_debug_logging_reports_decisions() {
        let lines = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = {
            let lines = Arc::clone(&lines);
            Arc::new(move |message: &str| lines.lock().push(message.to_string()))
        };
        let settings = Settings::default().with_debug_logging(true).with_log_sink(sink);

        struct Plain;
        let module = Module::new("app")
            .with_type(TypeMetadata::of::<Plain>())
            .with_type(
                TypeMetadata::injectable::<EnglishGreeter>()
                    .with_descriptor(RegistrationDescriptor::singleton()),
            );

        Registrar::with_settings(settings)
            .scan_module(&mut ServiceCollection::new(), &module)
            .unwrap();

        let lines = lines.lock();
        assert!(lines.iter().any(|l| l.starts_with("Considering type") && l.contains("Plain")));
        assert!(lines.iter().any(|l| l.starts_with("Skipping type") && l.contains("Plain")));
        assert!(lines.iter().any(|l| l.contains("EnglishGreeter registered as singleton")));
    }

    fn marked_module(name: &str) -> Module {
        Module::new(name).with_type(
            TypeMetadata::injectable::<EnglishGreeter>()
                .with_descriptor(RegistrationDescriptor::singleton()),
        )
    }

    #[test]
    fn test_cyclic_references_are_visited_once() {
        let mut catalog = ModuleCatalog::new();
        catalog
            .add_loaded(marked_module("app").with_reference("shared"))
            .add_unloaded(marked_module("shared").with_reference("app").with_reference("shared"));

        let mut services = ServiceCollection::new();
        registrar()
            .scan_all_loaded_modules(&mut services, &catalog)
            .unwrap();

        assert_eq!(services.count_of::<EnglishGreeter>(), 2);
        assert_eq!(catalog.load_count(), 1);
    }

    #[test]
    fn test_excluded_and_missing_modules_are_skipped() {
        let mut catalog = ModuleCatalog::new();
        catalog
            .add_loaded(
                marked_module("app")
                    .with_reference("vendor::billing")
                    .with_reference("ghost"),
            )
            .add_loaded(marked_module("std::io"))
            .add_unloaded(marked_module("vendor::billing"));

        let settings = Settings::default().exclude_module("vendor::");
        let mut services = ServiceCollection::new();
        Registrar::with_settings(settings)
            .scan_all_loaded_modules(&mut services, &catalog)
            .unwrap();

        assert_eq!(services.count_of::<EnglishGreeter>(), 1);
        assert_eq!(catalog.load_count(), 0);
        assert!(!catalog.is_loaded("vendor::billing"));
    }

    struct BrokenSource;

    impl ModuleSource for BrokenSource {
        fn loaded_modules(&self) -> Vec<Arc<Module>> {
            vec![Arc::new(Module::new("app").with_reference("plugins"))]
        }

        fn load(&self, name: &str) -> ContainerResult<Option<Arc<Module>>> {
            Err(ContainerError::Config(format!("{} is corrupt", name)))
        }
    }

    #[test]
    fn test_load_failure_aborts_scan() {
        let mut services = ServiceCollection::new();
        let result = registrar().scan_all_loaded_modules(&mut services, &BrokenSource);
        match result {
            Err(ContainerError::ModuleLoad { module, .. }) => assert_eq!(module, "plugins"),
            other => panic!("Expected ModuleLoad, got {:?}", other.map(|_| ())),
        }
    }

    struct AliasingSource {
        loads: AtomicUsize,
    }

    impl ModuleSource for AliasingSource {
        fn loaded_modules(&self) -> Vec<Arc<Module>> {
            vec![
                Arc::new(Module::new("a").with_reference("lib")),
                Arc::new(Module::new("b").with_reference("lib")),
            ]
        }

        fn load(&self, _name: &str) -> ContainerResult<Option<Arc<Module>>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Some(Arc::new(marked_module("lib_v2"))))
        }
    }

    #[test]
    fn test_reference_loaded_under_other_name_is_loaded_once() {
        let source = AliasingSource {
            loads: AtomicUsize::new(0),
        };

        let mut services = ServiceCollection::new();
        registrar().scan_all_loaded_modules(&mut services, &source).unwrap();

        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
        assert_eq!(services.count_of::<EnglishGreeter>(), 1);
    }
}
