/// 常量定义
///
/// 宏生成的代码和运行时使用同一组名称，避免两边不一致

/// `#[autodi(custom)]` 未指定函数名时调用的静态注册函数
pub const DEFAULT_REGISTRATION_FUNCTION: &str = "register_di";

/// 过滤标签中表示排除的前缀
pub const EXCLUSION_MARKER: char = '!';

/// 默认不扫描的模块前缀
pub const DEFAULT_EXCLUDED_MODULE_PREFIXES: &[&str] = &["std::", "core::", "alloc::"];

/// 诊断日志使用的 tracing target
pub const LOG_TARGET: &str = "autodi";

/// 环境变量名
pub const ENV_DEBUG: &str = "AUTODI_DEBUG";
pub const ENV_FILTERS: &str = "AUTODI_FILTERS";
pub const ENV_EXCLUDED_MODULES: &str = "AUTODI_EXCLUDED_MODULES";
