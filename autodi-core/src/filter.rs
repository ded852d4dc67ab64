//! 过滤标签
//!
//! 描述符和标记可以携带一组过滤标签，扫描时与进程级的激活标签比较，
//! 决定该描述符是否参与注册。以 `!` 开头的标签是排除标签。

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::constants::EXCLUSION_MARKER;

/// 规范化后的标签集合（去空白、小写、去重、保持声明顺序）
///
/// 配置文件中既可以写成数组 `["prod", "!test"]`，也可以写成 `"prod,!test"`。
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "FilterList")]
pub struct FilterSet {
    tags: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FilterList {
    Joined(String),
    Tags(Vec<String>),
}

impl From<FilterList> for FilterSet {
    fn from(list: FilterList) -> Self {
        match list {
            FilterList::Joined(list) => Self::parse(&list),
            FilterList::Tags(tags) => Self::from_tags(tags),
        }
    }
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 解析逗号分隔的标签列表，例如 `"prod, !test"`
    pub fn parse(list: &str) -> Self {
        Self::from_tags(list.split(','))
    }

    pub fn from_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for tag in tags {
            set.insert(tag.as_ref());
        }
        set
    }

    /// 添加一个标签，返回是否为新标签
    pub fn insert(&mut self, tag: &str) -> bool {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() || tag.strip_prefix(EXCLUSION_MARKER) == Some("") || self.tags.contains(&tag) {
            return false;
        }
        self.tags.push(tag);
        true
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    /// 包含标签
    pub fn includes(&self) -> impl Iterator<Item = &str> {
        self.iter().filter(|t| !t.starts_with(EXCLUSION_MARKER))
    }

    /// 排除标签（已去掉 `!` 前缀）
    pub fn excludes(&self) -> impl Iterator<Item = &str> {
        self.iter().filter_map(|t| t.strip_prefix(EXCLUSION_MARKER))
    }

    /// 判断本集合在给定激活标签下是否可用
    ///
    /// 任一方为空时总是可用；任一排除标签被激活时不可用；
    /// 否则至少有一个包含标签被激活才可用。
    pub fn is_match(&self, active: &FilterSet) -> bool {
        if self.is_empty() || active.is_empty() {
            return true;
        }

        if self.excludes().any(|tag| active.contains(tag)) {
            return false;
        }

        self.includes().any(|tag| active.contains(tag))
    }
}

impl From<Vec<String>> for FilterSet {
    fn from(tags: Vec<String>) -> Self {
        Self::from_tags(tags)
    }
}

impl From<&str> for FilterSet {
    fn from(list: &str) -> Self {
        Self::parse(list)
    }
}

impl FromStr for FilterSet {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for FilterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tags.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_tags() {
        let set = FilterSet::parse(" Prod, test ,prod,, !Legacy ");
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["prod", "test", "!legacy"]);
        assert_eq!(set.to_string(), "prod,test,!legacy");
    }

    #[test]
    fn test_empty_list_has_no_tags() {
        assert!(FilterSet::parse("").is_empty());
        assert!(FilterSet::parse(" , ").is_empty());
        assert!(FilterSet::parse("!, ! ").is_empty());
    }

    #[test]
    fn test_overlap_is_eligible() {
        let descriptor = FilterSet::parse("a,b");
        assert!(descriptor.is_match(&FilterSet::parse("b")));
    }

    #[test]
    fn test_active_exclusion_tag_does_not_overlap() {
        let descriptor = FilterSet::parse("a,b");
        assert!(!descriptor.is_match(&FilterSet::parse("!b")));
    }

    #[test]
    fn test_empty_active_filters_accept_everything() {
        let descriptor = FilterSet::parse("a,b");
        assert!(descriptor.is_match(&FilterSet::new()));
    }

    #[test]
    fn test_empty_descriptor_filters_always_match() {
        let descriptor = FilterSet::new();
        assert!(descriptor.is_match(&FilterSet::parse("anything")));
    }

    #[test]
    fn test_exclusion_vetoes_overlap() {
        let descriptor = FilterSet::parse("web,!test");
        assert!(descriptor.is_match(&FilterSet::parse("web")));
        assert!(!descriptor.is_match(&FilterSet::parse("web,test")));
    }

    #[test]
    fn test_no_overlap_is_ineligible() {
        let descriptor = FilterSet::parse("worker");
        assert!(!descriptor.is_match(&FilterSet::parse("web")));
    }

    #[derive(Deserialize)]
    struct Section {
        filters: FilterSet,
    }

    #[test]
    fn test_deserialize_from_array_or_string() {
        let section: Section = toml::from_str(r#"filters = ["Dev", "!prod"]"#).unwrap();
        assert_eq!(section.filters, FilterSet::parse("dev,!prod"));

        let section: Section = toml::from_str(r#"filters = "dev, !prod""#).unwrap();
        assert_eq!(section.filters, FilterSet::parse("dev,!prod"));
    }

    #[test]
    fn test_only_exclusions_require_an_include() {
        let descriptor = FilterSet::parse("!test");
        assert!(!descriptor.is_match(&FilterSet::parse("test")));
        assert!(!descriptor.is_match(&FilterSet::parse("prod")));
    }
}
