mod attribute_helpers;
mod auto_register_impl;
mod injectable_impl;
mod registration_functions_attr;
mod type_helpers;

use proc_macro::TokenStream;
use proc_macro_error::proc_macro_error;

/// AutoRegister 派生宏
///
/// 生成类型的注册元数据，并在链接期按 `module_path!()` 提交到模块目录。
///
/// 用法：
/// ```ignore
/// #[derive(Injectable, AutoRegister)]
/// #[autodi(singleton)]                                  // 以自身类型注册为单例
/// #[autodi(transient, interface = dyn Greeter)]         // 以接口身份注册
/// #[autodi(scoped, filters = "web,!test")]              // 带过滤标签
/// struct EnglishGreeter;
///
/// #[derive(AutoRegister)]
/// #[autodi(custom)]                                     // 调用 register_di
/// #[autodi(custom = "setup", filters = "prod")]         // 调用指定的注册函数
/// struct Database;
///
/// #[derive(Injectable, AutoRegister)]
/// #[autodi_hosted]                                      // 托管服务
/// struct Poller;
///
/// #[derive(Injectable, AutoRegister)]
/// #[autodi_hosted_singleton(filters = "worker")]        // 单例 + 托管服务，共享同一实例
/// struct Scheduler;
/// ```
///
/// 生命周期注册和托管标记要求类型实现 `Injectable`，托管标记还要求实现
/// `HostedService`；`custom` 要求 impl 块上有 `#[registration_functions]`。
#[proc_macro_derive(AutoRegister, attributes(autodi, autodi_hosted, autodi_hosted_singleton))]
pub fn derive_auto_register(input: TokenStream) -> TokenStream {
    auto_register_impl::derive_auto_register_impl(input)
}

/// Injectable 派生宏
///
/// `#[inject]` 字段从容器解析，其余字段使用 `Default`：
/// ```ignore
/// #[derive(Injectable)]
/// struct ReportService {
///     #[inject]
///     repository: Arc<dyn Repository>,        // 必需
///     #[inject]
///     cache: Option<Arc<Cache>>,              // 可选
///     #[inject]
///     exporters: Vec<Arc<dyn Exporter>>,      // 全部注册
///     generated: AtomicUsize,                 // Default
/// }
/// ```
#[proc_macro_derive(Injectable, attributes(inject))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    injectable_impl::derive_injectable_impl(input)
}

/// 注册函数表属性宏
///
/// 放在类型的 inherent impl 块上，收集签名符合要求的关联函数，
/// 供 `#[autodi(custom)]` 按名称查找：
/// ```ignore
/// #[registration_functions]
/// impl Database {
///     pub fn register_di(services: &mut ServiceCollection) {
///         services.add_instance(Arc::new(Database::connect()));
///     }
///
///     fn setup(
///         services: &mut ServiceCollection,
///         descriptor: &RegistrationDescriptor,
///     ) -> anyhow::Result<()> {
///         // ...
///         Ok(())
///     }
/// }
/// ```
///
/// 返回值可以是 `()` 或 `Result<(), E>`。
#[proc_macro_attribute]
#[proc_macro_error]
pub fn registration_functions(attr: TokenStream, item: TokenStream) -> TokenStream {
    registration_functions_attr::registration_functions_impl(attr, item)
}
