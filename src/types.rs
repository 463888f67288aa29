//! 通用类型定义
//!
//! 源码位置、数据类型、链接查询模式以及模式（schema）标签

use serde::{Deserialize, Serialize};
use std::fmt;

/// 源码中的半开区间 `[start, end)`（字节偏移）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// 覆盖两个区间的最小区间
    pub fn to(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// 节点数据类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataType {
    #[default]
    Unknown,
    Void,
    Bool,
    Numeric,
    Date,
    String,
    Table,
    Guid,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Unknown => write!(f, "unknown"),
            DataType::Void => write!(f, "void"),
            DataType::Bool => write!(f, "bool"),
            DataType::Numeric => write!(f, "numeric"),
            DataType::Date => write!(f, "date"),
            DataType::String => write!(f, "string"),
            DataType::Table => write!(f, "table"),
            DataType::Guid => write!(f, "guid"),
        }
    }
}

/// 排序方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    /// 未指定（按升序处理）
    #[default]
    Unknown,
    Ascending,
    Descending,
}

/// 查询模式，由表名和 `mode (...)` 子句共同决定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LinkQueryMode {
    #[default]
    Unknown,
    WorkItems,
    LinksMustContain,
    LinksMayContain,
    LinksDoesNotContain,
    LinksRecursive,
}

impl LinkQueryMode {
    /// 是否为链接查询
    pub fn is_link_query(&self) -> bool {
        matches!(
            self,
            LinkQueryMode::LinksMustContain
                | LinkQueryMode::LinksMayContain
                | LinkQueryMode::LinksDoesNotContain
                | LinkQueryMode::LinksRecursive
        )
    }
}

impl fmt::Display for LinkQueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkQueryMode::Unknown => write!(f, "Unknown"),
            LinkQueryMode::WorkItems => write!(f, "WorkItems"),
            LinkQueryMode::LinksMustContain => write!(f, "LinksMustContain"),
            LinkQueryMode::LinksMayContain => write!(f, "LinksMayContain"),
            LinkQueryMode::LinksDoesNotContain => write!(f, "LinksDoesNotContain"),
            LinkQueryMode::LinksRecursive => write!(f, "LinksRecursive"),
        }
    }
}

/// 服务器端字段类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    String,
    Integer,
    Double,
    DateTime,
    PlainText,
    Html,
    TreePath,
    History,
    Guid,
    Boolean,
}

impl FieldType {
    /// 写入查询文档 `FieldType` 属性的类型编码
    pub fn code(&self) -> u32 {
        match self {
            FieldType::String => 16,
            FieldType::Integer => 32,
            FieldType::DateTime => 48,
            FieldType::PlainText => 64,
            FieldType::Html => 80,
            FieldType::TreePath => 96,
            FieldType::History => 112,
            FieldType::Double => 128,
            FieldType::Guid => 144,
            FieldType::Boolean => 160,
        }
    }

    /// 长文本字段只支持 contains 类条件
    pub fn is_long_text(&self) -> bool {
        matches!(self, FieldType::PlainText | FieldType::Html | FieldType::History)
    }
}

/// 字段用途
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FieldUsage {
    #[default]
    WorkItem,
    WorkItemLink,
}

/// 绑定后附加在字段名节点上的模式标签（字段 ID）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldTag(pub i32);

/// 绑定后附加在变量节点上的模式标签（规范化的变量名）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariableTag(pub String);

impl VariableTag {
    pub fn new(name: impl Into<String>) -> Self {
        VariableTag(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_merge() {
        let a = Span::new(4, 9);
        let b = Span::new(12, 20);
        assert_eq!(a.to(b), Span::new(4, 20));
        assert_eq!(b.to(a), Span::new(4, 20));
        assert_eq!(a.len(), 5);
    }

    #[test]
    fn test_link_query_mode() {
        assert!(!LinkQueryMode::WorkItems.is_link_query());
        assert!(!LinkQueryMode::Unknown.is_link_query());
        assert!(LinkQueryMode::LinksRecursive.is_link_query());
        assert!(LinkQueryMode::LinksMayContain.is_link_query());
    }

    #[test]
    fn test_long_text_field_types() {
        assert!(FieldType::History.is_long_text());
        assert!(FieldType::Html.is_long_text());
        assert!(!FieldType::String.is_long_text());
        assert!(!FieldType::TreePath.is_long_text());
    }
}
