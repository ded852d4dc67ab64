/// 统一的错误处理类型
///
/// 注册、扫描和解析过程中的所有失败都使用 `ContainerError` 表示。
/// 扫描遇到第一个错误即中止，错误会原样返回给调用者。
use thiserror::Error;

/// 自定义注册函数和模块加载使用的装箱错误
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 容器错误
#[derive(Debug, Error)]
pub enum ContainerError {
    /// 描述符无效（缺少必需字段、种类无法识别、缺少构造器等）
    #[error("Invalid registration descriptor on '{type_name}': {reason}")]
    InvalidDescriptor { type_name: String, reason: String },

    /// 同一类型上的标记互相冲突
    #[error("Conflicting registration markers on '{type_name}': {reason}")]
    AmbiguousMarkers { type_name: String, reason: String },

    /// 类型没有任何注册描述符或标记
    #[error("Type '{0}' carries no registration descriptor")]
    NoDescriptor(String),

    /// 找不到自定义注册函数
    #[error("Registration function '{function}' was not found on '{type_name}'")]
    UnresolvedCustomFunction { type_name: String, function: String },

    /// 自定义注册函数返回了错误
    #[error("Failed to register '{type_name}' through '{function}'")]
    CustomFunctionFailure {
        type_name: String,
        function: String,
        #[source]
        source: BoxError,
    },

    /// 宿主加载模块失败
    #[error("Failed to load module '{module}'")]
    ModuleLoad {
        module: String,
        #[source]
        source: BoxError,
    },

    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    /// 服务实例构造失败
    #[error("Failed to construct service '{service}'")]
    ConstructionFailed {
        service: String,
        #[source]
        source: BoxError,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to initialize logging: {0}")]
    LoggingInitFailed(String),
}

impl ContainerError {
    pub fn invalid_descriptor(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    pub fn ambiguous_markers(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AmbiguousMarkers {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }
}

pub type ContainerResult<T> = std::result::Result<T, ContainerError>;
