//! 模式模块
//!
//! 编译器通过 `SchemaProvider` 解析字段、表和变量；`Catalog` 描述服务器端的
//! 字段定义、链接类型和区域/迭代层级，`WiqlAdapter` 基于它实现全部校验和改写规则。

pub mod adapter;
pub mod catalog;
pub mod provider;

pub use adapter::{ContextValue, WiqlAdapter};
pub use catalog::{core_fields, Catalog, FieldDefinition, LinkTopology, LinkTypeEnd, TreeKind, TreeNode};
pub use provider::{link_query_mode, table_mode, NodeRef, SchemaProvider, Scope};
