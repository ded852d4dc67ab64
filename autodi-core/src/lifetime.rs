use std::fmt;
use std::str::FromStr;

use crate::ContainerError;

/// 服务的生命周期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// 单例 - 每个 provider 只构造一次
    Singleton,

    /// 作用域 - 每个 scope 构造一次
    Scoped,

    /// 瞬态 - 每次解析都构造新实例
    Transient,
}

impl Default for Lifetime {
    fn default() -> Self {
        Lifetime::Singleton
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Singleton => write!(f, "singleton"),
            Lifetime::Scoped => write!(f, "scoped"),
            Lifetime::Transient => write!(f, "transient"),
        }
    }
}

/// 注册描述符声明的注册方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistrationKind {
    Singleton,
    Transient,
    Scoped,

    /// 由类型自己的静态注册函数完成注册
    Custom,
}

impl RegistrationKind {
    /// 对应的容器生命周期，`Custom` 没有生命周期
    pub fn lifetime(self) -> Option<Lifetime> {
        match self {
            RegistrationKind::Singleton => Some(Lifetime::Singleton),
            RegistrationKind::Transient => Some(Lifetime::Transient),
            RegistrationKind::Scoped => Some(Lifetime::Scoped),
            RegistrationKind::Custom => None,
        }
    }
}

/// 从名称解析注册方式（不区分大小写），供按字符串声明描述符的调用方使用，
/// 例如手工组装 [`RegistrationDescriptor::from_parts`](crate::RegistrationDescriptor::from_parts)。
///
/// 无法识别的名称返回 `InvalidDescriptor`。
impl FromStr for RegistrationKind {
    type Err = ContainerError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "singleton" => Ok(RegistrationKind::Singleton),
            "transient" => Ok(RegistrationKind::Transient),
            "scoped" => Ok(RegistrationKind::Scoped),
            "custom" => Ok(RegistrationKind::Custom),
            _ => Err(ContainerError::invalid_descriptor(
                "RegistrationKind",
                format!("undefined registration kind '{}'", s),
            )),
        }
    }
}

impl fmt::Display for RegistrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationKind::Singleton => write!(f, "singleton"),
            RegistrationKind::Transient => write!(f, "transient"),
            RegistrationKind::Scoped => write!(f, "scoped"),
            RegistrationKind::Custom => write!(f, "custom"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_str() {
        assert_eq!("singleton".parse::<RegistrationKind>().unwrap(), RegistrationKind::Singleton);
        assert_eq!("Transient".parse::<RegistrationKind>().unwrap(), RegistrationKind::Transient);
        assert_eq!(" scoped ".parse::<RegistrationKind>().unwrap(), RegistrationKind::Scoped);
        assert_eq!("CUSTOM".parse::<RegistrationKind>().unwrap(), RegistrationKind::Custom);
        assert!(matches!(
            "none".parse::<RegistrationKind>(),
            Err(ContainerError::InvalidDescriptor { .. })
        ));
    }

    #[test]
    fn test_kind_lifetime() {
        assert_eq!(RegistrationKind::Singleton.lifetime(), Some(Lifetime::Singleton));
        assert_eq!(RegistrationKind::Scoped.lifetime(), Some(Lifetime::Scoped));
        assert_eq!(RegistrationKind::Transient.lifetime(), Some(Lifetime::Transient));
        assert_eq!(RegistrationKind::Custom.lifetime(), None);
    }
}
