// autodi-core: 基于属性声明的依赖注入自动注册
//
// 类型通过派生宏声明注册方式，注册器扫描这些元数据并追加到服务集合：
// - 单例、作用域、瞬态三种生命周期，以及自定义静态注册函数
// - 以接口（trait object）身份注册
// - 托管服务与"单例 + 托管服务"组合注册
// - 基于标签的过滤和模块排除
// - 按模块引用做传递闭包扫描

// 让宏生成的 `::autodi_core::...` 路径在本 crate 内同样可用
extern crate self as autodi_core;

pub mod collection;
pub mod constants;
pub mod descriptor;
pub mod error;
pub mod filter;
pub mod hosting;
pub mod lifetime;
pub mod logging;
pub mod metadata;
pub mod module;
pub mod provider;
pub mod registrar;
pub mod service;
pub mod settings;
pub mod utils;

// 重新导出常用类型
pub use collection::ServiceCollection;
pub use descriptor::{HostedMarker, InterfaceBinding, RegistrationDescriptor};
pub use error::{BoxError, ContainerError, ContainerResult};
pub use filter::FilterSet;
pub use hosting::{Host, HostedService};
pub use lifetime::{Lifetime, RegistrationKind};
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use metadata::{
    AutoRegister, IntoRegistrationResult, RegistrationFn, RegistrationFunction,
    RegistrationFunctions, TypeMetadata, Visibility,
};
pub use module::{InventoryModules, Module, ModuleCatalog, ModuleSource};
pub use provider::ServiceProvider;
pub use registrar::{AutoRegisterExt, Registrar};
pub use service::{ErasedInstance, Injectable, ServiceDescriptor, ServiceKey};
pub use settings::{LogSink, Settings, TracingLogSink};

// 导出 async_trait 和 inventory，供宏使用
pub use async_trait;
pub use inventory;

/// Prelude 模块，包含常用的 traits 和类型
pub mod prelude {
    pub use crate::descriptor::{HostedMarker, InterfaceBinding, RegistrationDescriptor};
    pub use crate::error::{ContainerError, ContainerResult};
    pub use crate::filter::FilterSet;
    pub use crate::hosting::{Host, HostedService};
    pub use crate::lifetime::Lifetime;
    pub use crate::logging::{LogFormat, LogLevel, LoggingConfig};
    pub use crate::metadata::{AutoRegister, TypeMetadata};
    pub use crate::module::{Module, ModuleCatalog, ModuleSource};
    pub use crate::registrar::{AutoRegisterExt, Registrar};
    pub use crate::service::Injectable;
    pub use crate::settings::{self, Settings};
    pub use crate::{interface_binding, module_references};
    pub use crate::{ServiceCollection, ServiceProvider};
    pub use async_trait::async_trait;
}
