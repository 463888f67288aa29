//! WIQL - 工作项查询语言编译器
//!
//! 将 WIQL 查询文本编译为工作项服务器可执行的查询文档，支持：
//! - 词法和递归下降语法分析，带精确的错误位置
//! - 基于模式目录的绑定、类型检查和语义校验
//! - 查询改写（IN 展开、按天精度、变量内联、常量运算等）
//! - 工作项查询与链接查询文档生成

pub mod cli;
pub mod config;
pub mod error;
pub mod query;
pub mod schema;
pub mod types;

// 重导出常用类型
pub use config::CompilerConfig;
pub use error::{Error, Result, SyntaxError};
pub use query::{parse, tokenize, CompiledQuery, Compiler, Select, XmlElement};
pub use schema::{Catalog, ContextValue, SchemaProvider, WiqlAdapter};
pub use types::{DataType, Direction, FieldTag, FieldType, LinkQueryMode, Span};

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
