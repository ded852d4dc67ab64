//! 日志初始化
//!
//! 基于 tracing-subscriber。扫描诊断输出在 `autodi` target 上，
//! 打开 `registrar_debug` 时会为该 target 追加一条 debug 级别的过滤指令。

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, EnvFilter};

use crate::constants::LOG_TARGET;
use crate::{ContainerError, ContainerResult};

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, String> {
        value.parse()
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(name)
    }
}

/// 日志格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum LogFormat {
    /// 紧凑格式（默认）
    #[default]
    Compact,
    /// 完整格式
    Full,
    Json,
    /// 美化格式，适合开发
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "full" => Ok(LogFormat::Full),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}

impl TryFrom<String> for LogFormat {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogFormat::Compact => "compact",
            LogFormat::Full => "full",
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
        };
        f.write_str(name)
    }
}

/// 日志配置，可以从 TOML 的 `[logging]` 表加载
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,

    pub format: LogFormat,

    /// 是否显示目标（模块路径）
    pub show_target: bool,

    pub show_thread_ids: bool,

    /// 为 `autodi` target 打开 debug 输出
    pub registrar_debug: bool,

    /// 自定义过滤指令，例如 `"my_app=debug,hyper=warn"`
    pub filter: Option<String>,
}

#[derive(Deserialize, Default)]
struct LoggingFile {
    #[serde(default)]
    logging: LoggingConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            show_target: false,
            show_thread_ids: false,
            registrar_debug: false,
            filter: None,
        }
    }
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn show_target(mut self, show: bool) -> Self {
        self.show_target = show;
        self
    }

    pub fn show_thread_ids(mut self, show: bool) -> Self {
        self.show_thread_ids = show;
        self
    }

    pub fn registrar_debug(mut self, enabled: bool) -> Self {
        self.registrar_debug = enabled;
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// 从 TOML 文本的 `[logging]` 表加载
    pub fn from_toml_str(content: &str) -> ContainerResult<Self> {
        let file: LoggingFile = toml::from_str(content)
            .map_err(|e| ContainerError::Config(format!("Failed to parse logging config: {}", e)))?;
        Ok(file.logging)
    }

    /// 从环境变量读取：`RUST_LOG`、`AUTODI_LOG_LEVEL`、`AUTODI_LOG_FORMAT`
    ///
    /// 无法解析的值会被忽略。
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(rust_log) = std::env::var("RUST_LOG") {
            config.filter = Some(rust_log);
        }

        if let Some(level) = std::env::var("AUTODI_LOG_LEVEL").ok().and_then(|v| v.parse().ok()) {
            config.level = level;
        }

        if let Some(format) = std::env::var("AUTODI_LOG_FORMAT").ok().and_then(|v| v.parse().ok()) {
            config.format = format;
        }

        config
    }

    /// 过滤指令，自定义指令优先于级别
    pub fn directives(&self) -> String {
        let mut directives = self
            .filter
            .clone()
            .unwrap_or_else(|| self.level.to_string());

        if self.registrar_debug {
            directives.push_str(&format!(",{}=debug", LOG_TARGET));
        }
        directives
    }

    fn env_filter(&self) -> ContainerResult<EnvFilter> {
        EnvFilter::try_new(self.directives()).map_err(|e| {
            ContainerError::LoggingInitFailed(format!("Invalid filter '{}': {}", self.directives(), e))
        })
    }

    /// 安装全局订阅者，重复初始化返回错误
    pub fn init(self) -> ContainerResult<()> {
        let env_filter = self.env_filter()?;
        let builder = subscriber_fmt()
            .with_env_filter(env_filter)
            .with_target(self.show_target)
            .with_thread_ids(self.show_thread_ids);

        let result = match self.format {
            LogFormat::Compact => builder.compact().try_init(),
            LogFormat::Full => builder.try_init(),
            LogFormat::Json => builder.json().try_init(),
            LogFormat::Pretty => builder.pretty().try_init(),
        };

        result.map_err(|e| ContainerError::LoggingInitFailed(e.to_string()))
    }
}
