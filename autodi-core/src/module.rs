//! 模块目录
//!
//! 模块是扫描的单位：一组类型元数据加上它引用的其他模块。
//! 模块来源可以是链接期通过 inventory 收集的目录，也可以是显式构建的内存目录。

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::metadata::{AutoRegister, TypeMetadata};
use crate::ContainerResult;

/// 一个可扫描的模块
#[derive(Debug, Clone)]
pub struct Module {
    name: String,
    types: Vec<TypeMetadata>,
    references: Vec<String>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: Vec::new(),
            references: Vec::new(),
        }
    }

    pub fn with_type(mut self, metadata: TypeMetadata) -> Self {
        self.types.push(metadata);
        self
    }

    /// 添加一个派生了 `AutoRegister` 的类型
    pub fn with_registered<T: AutoRegister>(self) -> Self {
        self.with_type(T::metadata())
    }

    /// 声明对另一个模块的引用
    pub fn with_reference(mut self, name: impl Into<String>) -> Self {
        self.references.push(name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn types(&self) -> &[TypeMetadata] {
        &self.types
    }

    pub fn references(&self) -> &[String] {
        &self.references
    }
}

/// 模块来源（宿主的模块加载系统）
pub trait ModuleSource {
    /// 当前已加载的模块
    fn loaded_modules(&self) -> Vec<Arc<Module>>;

    /// 按名称加载模块，不存在时返回 `None`
    fn load(&self, name: &str) -> ContainerResult<Option<Arc<Module>>>;
}

/// 显式构建的内存模块目录
///
/// 模块分为已加载和可加载两类，`load` 会把可加载模块标记为已加载并计数。
#[derive(Debug, Default)]
pub struct ModuleCatalog {
    modules: Vec<Arc<Module>>,
    loaded: RwLock<HashSet<String>>,
    load_count: AtomicUsize,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加一个已加载的模块
    pub fn add_loaded(&mut self, module: Module) -> &mut Self {
        self.loaded.get_mut().insert(module.name.clone());
        self.modules.push(Arc::new(module));
        self
    }

    /// 添加一个尚未加载、可按需加载的模块
    pub fn add_unloaded(&mut self, module: Module) -> &mut Self {
        self.modules.push(Arc::new(module));
        self
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.read().contains(name)
    }

    /// `load` 实际加载模块的次数
    pub fn load_count(&self) -> usize {
        self.load_count.load(Ordering::SeqCst)
    }

    fn find(&self, name: &str) -> Option<&Arc<Module>> {
        self.modules.iter().find(|m| m.name == name)
    }
}

impl ModuleSource for ModuleCatalog {
    fn loaded_modules(&self) -> Vec<Arc<Module>> {
        let loaded = self.loaded.read();
        self.modules
            .iter()
            .filter(|m| loaded.contains(&m.name))
            .cloned()
            .collect()
    }

    fn load(&self, name: &str) -> ContainerResult<Option<Arc<Module>>> {
        let Some(module) = self.find(name) else {
            return Ok(None);
        };

        if self.loaded.write().insert(name.to_string()) {
            tracing::debug!("Loading module: {}", name);
            self.load_count.fetch_add(1, Ordering::SeqCst);
        }
        Ok(Some(Arc::clone(module)))
    }
}

/// 类型注册表项 - 由 `#[derive(AutoRegister)]` 提交
pub struct TypeEntry {
    pub module: &'static str,
    pub type_name: &'static str,
    pub metadata: fn() -> TypeMetadata,
}

inventory::collect!(TypeEntry);

/// 模块引用表项 - 由 `module_references!` 提交
pub struct ModuleReferences {
    pub module: &'static str,
    pub references: &'static [&'static str],
}

inventory::collect!(ModuleReferences);

/// 声明当前模块引用的其他模块
///
/// ```ignore
/// autodi_core::module_references!("my_app::storage", "my_app::jobs");
/// ```
#[macro_export]
macro_rules! module_references {
    ($($reference:expr),+ $(,)?) => {
        $crate::inventory::submit! {
            $crate::module::ModuleReferences {
                module: ::core::module_path!(),
                references: &[$($reference),+],
            }
        }
    };
}

/// 链接期收集的模块目录
///
/// 类型按 `module_path!()` 分组，模块与模块内的类型都按名称排序，
/// 使扫描顺序不依赖链接顺序。所有模块在链接期即已加载。
#[derive(Debug, Clone, Default)]
pub struct InventoryModules {
    modules: Vec<Arc<Module>>,
}

impl InventoryModules {
    /// 从 inventory 收集全部模块
    pub fn collect() -> Self {
        let mut grouped: BTreeMap<&'static str, Vec<&TypeEntry>> = BTreeMap::new();
        for entry in inventory::iter::<TypeEntry> {
            grouped.entry(entry.module).or_default().push(entry);
        }

        let mut references: BTreeMap<&'static str, Vec<&'static str>> = BTreeMap::new();
        for entry in inventory::iter::<ModuleReferences> {
            references
                .entry(entry.module)
                .or_default()
                .extend(entry.references.iter().copied());
            grouped.entry(entry.module).or_default();
        }

        let modules = grouped
            .into_iter()
            .map(|(name, mut entries)| {
                entries.sort_by_key(|e| e.type_name);
                let mut module = Module::new(name);
                for entry in entries {
                    module = module.with_type((entry.metadata)());
                }
                for reference in references.remove(name).unwrap_or_default() {
                    module = module.with_reference(reference);
                }
                Arc::new(module)
            })
            .collect::<Vec<_>>();

        tracing::debug!("Collected {} module(s) from link-time registry", modules.len());
        Self { modules }
    }

    pub fn modules(&self) -> &[Arc<Module>] {
        &self.modules
    }

    pub fn module(&self, name: &str) -> Option<&Arc<Module>> {
        self.modules.iter().find(|m| m.name == name)
    }
}

impl ModuleSource for InventoryModules {
    fn loaded_modules(&self) -> Vec<Arc<Module>> {
        self.modules.clone()
    }

    fn load(&self, name: &str) -> ContainerResult<Option<Arc<Module>>> {
        Ok(self.module(name).cloned())
    }
}
