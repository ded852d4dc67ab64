//! 扫描配置
//!
//! 进程级配置：调试开关、日志输出、模块排除列表和激活的过滤标签。
//! 可以在代码中设置，也可以从 TOML 的 `[autodi]` 表或 `AUTODI_*` 环境变量加载。
//!
//! 宿主负责不在扫描进行时修改全局配置；每个 [`Registrar`](crate::Registrar)
//! 在创建时取一份快照。

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;

use crate::constants::{
    DEFAULT_EXCLUDED_MODULE_PREFIXES, ENV_DEBUG, ENV_EXCLUDED_MODULES, ENV_FILTERS, LOG_TARGET,
};
use crate::filter::FilterSet;
use crate::{ContainerError, ContainerResult};

/// 调试日志输出
pub trait LogSink: Send + Sync {
    fn write(&self, message: &str);
}

impl<F> LogSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn write(&self, message: &str) {
        self(message)
    }
}

/// 默认输出，写到 `autodi` target 的 debug 级别
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn write(&self, message: &str) {
        tracing::debug!(target: LOG_TARGET, "{}", message);
    }
}

fn default_log_sink() -> Arc<dyn LogSink> {
    Arc::new(TracingLogSink)
}

fn default_excluded_modules() -> Vec<String> {
    DEFAULT_EXCLUDED_MODULE_PREFIXES
        .iter()
        .map(|prefix| prefix.to_string())
        .collect()
}

/// 扫描配置
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    debug_logging: bool,

    /// 模块名前缀，匹配的模块不会被扫描
    excluded_modules: Vec<String>,

    /// 激活的过滤标签
    filters: FilterSet,

    #[serde(skip, default = "default_log_sink")]
    log_sink: Arc<dyn LogSink>,
}

#[derive(Deserialize, Default)]
struct SettingsFile {
    #[serde(default)]
    autodi: Settings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug_logging: false,
            excluded_modules: default_excluded_modules(),
            filters: FilterSet::new(),
            log_sink: default_log_sink(),
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("debug_logging", &self.debug_logging)
            .field("excluded_modules", &self.excluded_modules)
            .field("filters", &self.filters)
            .finish_non_exhaustive()
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debug_logging(mut self, enabled: bool) -> Self {
        self.debug_logging = enabled;
        self
    }

    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = sink;
        self
    }

    /// 替换模块排除列表
    pub fn with_excluded_modules<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_modules = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// 追加一个排除前缀
    pub fn exclude_module(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        if !self.excluded_modules.contains(&prefix) {
            self.excluded_modules.push(prefix);
        }
        self
    }

    pub fn with_filters(mut self, filters: impl Into<FilterSet>) -> Self {
        self.filters = filters.into();
        self
    }

    pub fn debug_logging(&self) -> bool {
        self.debug_logging
    }

    pub fn log_sink(&self) -> &Arc<dyn LogSink> {
        &self.log_sink
    }

    pub fn excluded_modules(&self) -> &[String] {
        &self.excluded_modules
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    /// 模块名是否以任一排除前缀开头
    pub fn is_module_excluded(&self, module: &str) -> bool {
        self.excluded_modules
            .iter()
            .any(|prefix| module.starts_with(prefix.as_str()))
    }

    /// 调试开关打开时写入日志
    pub(crate) fn debug(&self, message: impl FnOnce() -> String) {
        if self.debug_logging {
            self.log_sink.write(&message());
        }
    }

    /// 从 TOML 文本的 `[autodi]` 表加载，缺省字段取默认值
    pub fn from_toml_str(content: &str) -> ContainerResult<Self> {
        let file: SettingsFile = toml::from_str(content)
            .map_err(|e| ContainerError::Config(format!("Failed to parse TOML: {}", e)))?;
        Ok(file.autodi)
    }

    /// 从 TOML 文件加载
    pub fn from_toml_file(path: impl AsRef<Path>) -> ContainerResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ContainerError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        tracing::debug!("Loading autodi settings from {:?}", path);
        Self::from_toml_str(&content)
    }

    /// 用环境变量覆盖
    ///
    /// - `AUTODI_DEBUG`：`true/false/1/0/yes/no/on/off`
    /// - `AUTODI_FILTERS`：逗号分隔，替换激活标签
    /// - `AUTODI_EXCLUDED_MODULES`：逗号分隔，追加到排除列表
    pub fn apply_env(self) -> ContainerResult<Self> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// 同 [`apply_env`](Self::apply_env)，变量由 `lookup` 提供
    pub fn apply_env_with<F>(mut self, lookup: F) -> ContainerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_DEBUG) {
            self.debug_logging = parse_bool(&value).ok_or_else(|| {
                ContainerError::Config(format!("Invalid value for {}: '{}'", ENV_DEBUG, value))
            })?;
        }

        if let Some(value) = lookup(ENV_FILTERS) {
            self.filters = FilterSet::parse(&value);
        }

        if let Some(value) = lookup(ENV_EXCLUDED_MODULES) {
            for prefix in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                self = self.exclude_module(prefix);
            }
        }

        Ok(self)
    }

    /// 默认配置加环境变量覆盖
    pub fn from_env() -> ContainerResult<Self> {
        Self::default().apply_env()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

static GLOBAL: RwLock<Option<Settings>> = parking_lot::const_rwlock(None);

fn update<R>(f: impl FnOnce(&mut Settings) -> R) -> R {
    let mut global = GLOBAL.write();
    f(global.get_or_insert_with(Settings::default))
}

/// 当前全局配置的快照
pub fn current() -> Settings {
    GLOBAL.read().clone().unwrap_or_default()
}

/// 替换全局配置
pub fn configure(settings: Settings) {
    tracing::debug!("Configuring autodi settings: {:?}", settings);
    *GLOBAL.write() = Some(settings);
}

/// 恢复默认配置
pub fn reset() {
    *GLOBAL.write() = None;
}

pub fn debug_logging() -> bool {
    GLOBAL.read().as_ref().is_some_and(|s| s.debug_logging)
}

pub fn set_debug_logging(enabled: bool) {
    update(|s| s.debug_logging = enabled);
}

pub fn set_log_sink(sink: Arc<dyn LogSink>) {
    update(|s| s.log_sink = sink);
}

/// 恢复默认的 tracing 输出
pub fn reset_log_sink() {
    update(|s| s.log_sink = default_log_sink());
}

pub fn module_exclusion_list() -> Vec<String> {
    current().excluded_modules
}

pub fn set_module_exclusion_list<I, S>(prefixes: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let prefixes: Vec<String> = prefixes.into_iter().map(Into::into).collect();
    update(|s| s.excluded_modules = prefixes);
}

pub fn add_module_exclusion(prefix: impl Into<String>) {
    let prefix = prefix.into();
    update(|s| {
        if !s.excluded_modules.contains(&prefix) {
            s.excluded_modules.push(prefix);
        }
    });
}

pub fn filter_list() -> FilterSet {
    current().filters
}

pub fn set_filter_list(filters: impl Into<FilterSet>) {
    let filters = filters.into();
    update(|s| s.filters = filters);
}

/// 激活一个过滤标签
pub fn add_filter(tag: &str) {
    update(|s| {
        s.filters.insert(tag);
    });
}

pub fn clear_filters() {
    update(|s| s.filters = FilterSet::new());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();

        assert!(!settings.debug_logging());
        assert!(settings.filters().is_empty());
        assert!(settings.is_module_excluded("std::collections"));
        assert!(settings.is_module_excluded("core::fmt"));
        assert!(!settings.is_module_excluded("my_app::services"));
    }

    #[test]
    fn test_from_toml_str() {
        let toml = r#"
            [autodi]
            debug_logging = true
            excluded_modules = ["vendor::", "legacy"]
            filters = ["Prod", " metrics ", "!test"]
        "#;

        let settings = Settings::from_toml_str(toml).unwrap();

        assert!(settings.debug_logging());
        assert_eq!(settings.excluded_modules(), ["vendor::", "legacy"]);
        assert!(settings.is_module_excluded("legacy_jobs"));
        assert!(!settings.is_module_excluded("std::fmt"));
        assert_eq!(settings.filters(), &FilterSet::parse("prod,metrics,!test"));
    }

    #[test]
    fn test_from_toml_str_comma_separated_filters() {
        let settings = Settings::from_toml_str("[autodi]\nfilters = \"dev,prod\"\n").unwrap();
        assert_eq!(settings.filters(), &FilterSet::parse("dev,prod"));
    }

    #[test]
    fn test_from_toml_str_missing_table() {
        let settings = Settings::from_toml_str("[other]\nkey = 1\n").unwrap();
        assert!(!settings.debug_logging());
        assert!(settings.is_module_excluded("alloc::vec"));
    }

    #[test]
    fn test_from_toml_str_invalid() {
        let result = Settings::from_toml_str("[autodi]\ndebug_logging = \"maybe\"\n");
        assert!(matches!(result, Err(ContainerError::Config(_))));
    }

    #[test]
    fn test_apply_env_with() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("AUTODI_DEBUG", "yes"),
            ("AUTODI_FILTERS", "web, !batch"),
            ("AUTODI_EXCLUDED_MODULES", "generated::, ,tests::"),
        ]);

        let settings = Settings::default()
            .apply_env_with(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert!(settings.debug_logging());
        assert_eq!(settings.filters(), &FilterSet::parse("web,!batch"));
        assert!(settings.is_module_excluded("generated::models"));
        assert!(settings.is_module_excluded("tests::fixtures"));
        assert!(settings.is_module_excluded("std::io"));
    }

    #[test]
    fn test_apply_env_with_invalid_debug_flag() {
        let result = Settings::default().apply_env_with(|key| {
            (key == "AUTODI_DEBUG").then(|| "sometimes".to_string())
        });
        assert!(matches!(result, Err(ContainerError::Config(_))));
    }

    #[test]
    fn test_debug_writes_only_when_enabled() {
        let captured = Arc::new(parking_lot::Mutex::new(Vec::<String>::new()));
        let sink = {
            let captured = Arc::clone(&captured);
            Arc::new(move |message: &str| captured.lock().push(message.to_string()))
        };

        let settings = Settings::default().with_log_sink(sink);
        settings.debug(|| "hidden".to_string());

        let settings = settings.with_debug_logging(true);
        settings.debug(|| "shown".to_string());

        assert_eq!(*captured.lock(), vec!["shown"]);
    }

    #[test]
    fn test_exclude_module_deduplicates() {
        let settings = Settings::default()
            .with_excluded_modules(Vec::<String>::new())
            .exclude_module("a::")
            .exclude_module("a::");
        assert_eq!(settings.excluded_modules(), ["a::"]);
    }

    // 全局配置只在这一个测试里修改，避免并行测试互相干扰
    #[test]
    fn test_global_settings() {
        reset();
        assert!(!debug_logging());

        set_debug_logging(true);
        add_filter("Prod");
        add_module_exclusion("generated::");
        assert!(debug_logging());
        assert!(filter_list().contains("prod"));
        assert!(module_exclusion_list().contains(&"generated::".to_string()));

        set_filter_list("a,b");
        assert_eq!(filter_list().len(), 2);
        clear_filters();
        assert!(filter_list().is_empty());

        set_module_exclusion_list(["only::"]);
        assert_eq!(module_exclusion_list(), vec!["only::"]);

        configure(Settings::default().with_filters("x"));
        assert!(current().filters().contains("x"));
        assert!(!debug_logging());

        reset();
        assert!(current().filters().is_empty());
    }
}
