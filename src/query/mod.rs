//! WIQL 查询模块
//!
//! 工作项查询语言 (WIQL) 的编译前端：
//! - 词法分析: 名称、方括号名称、`@变量`、数字、字符串、运算符
//! - 递归下降语法分析，生成 `Select` 语法树
//! - 基于 `SchemaProvider` 的绑定、校验和优化改写
//! - 生成服务器可执行的 XML 查询文档

pub mod ast;
pub mod binder;
pub mod datetime;
pub mod document;
pub mod lexer;
pub mod operators;
pub mod parser;

// 导出 AST 类型
pub use ast::{
    ArithmeticNode, ConditionNode, FieldList, FieldListKind, FieldName, ModeItem, ModeList, Node,
    NodeKind, Select, TableName, Variable,
};

// 导出词法和语法分析
pub use lexer::{tokenize, Lexer, Token, TokenKind};
pub use parser::{parse, WiqlParser, MAX_NESTING_DEPTH};

// 导出文档生成
pub use document::{DocumentGenerator, SortField, XmlElement};
pub use operators::{Arithmetic, Condition, Priority};

use crate::config::CompilerConfig;
use crate::error::Result;
use crate::schema::{Catalog, ContextValue, WiqlAdapter};
use indexmap::IndexMap;
use tracing::debug;

/// 编译结果
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    /// 绑定并优化后的语法树
    pub select: Select,
    /// 查询文档
    pub document: XmlElement,
    /// 结果列（引用名）
    pub display_fields: Vec<String>,
    /// 排序列
    pub sort_fields: Vec<SortField>,
}

impl CompiledQuery {
    pub fn is_link_query(&self) -> bool {
        self.select.is_link_query()
    }
}

/// 编译器：串联 词法 → 语法 → 绑定 → 优化 → 文档生成
pub struct Compiler<'a> {
    catalog: &'a Catalog,
    config: &'a CompilerConfig,
    context: IndexMap<String, ContextValue>,
}

impl<'a> Compiler<'a> {
    pub fn new(catalog: &'a Catalog, config: &'a CompilerConfig) -> Self {
        Self {
            catalog,
            config,
            context: IndexMap::new(),
        }
    }

    /// 设置 `@宏` 的取值
    pub fn with_context(mut self, context: IndexMap<String, ContextValue>) -> Self {
        self.context = context;
        self
    }

    pub fn config(&self) -> &CompilerConfig {
        self.config
    }

    /// 基于目录的模式适配器
    pub fn adapter(&self) -> Result<WiqlAdapter<'a>> {
        Ok(WiqlAdapter::new(self.catalog, self.config)?.with_context(self.context.clone()))
    }

    /// 词法分析
    pub fn tokens(&self, query: &str) -> Result<Vec<Token>> {
        let tokens = tokenize(query)?;
        debug!(count = tokens.len(), "tokenized query");
        Ok(tokens)
    }

    /// 语法分析
    pub fn parse(&self, query: &str) -> Result<Select> {
        let select = parse(query)?;
        debug!(query = %select, "parsed query");
        Ok(select)
    }

    /// 语法分析并绑定
    pub fn bind(&self, query: &str) -> Result<Select> {
        let mut select = self.parse(query)?;
        select.bind(&self.adapter()?)?;
        debug!(mode = %select.query_mode(), "bound query");
        Ok(select)
    }

    /// 语法分析、绑定并优化
    pub fn optimize(&self, query: &str) -> Result<Select> {
        let adapter = self.adapter()?;
        let mut select = self.parse(query)?;
        select.bind(&adapter)?;
        let select = select.optimize(&adapter)?;
        debug!(query = %select, "optimized query");
        Ok(select)
    }

    /// 完整编译。启用服务器端宏时生成携带原始 WIQL 和上下文的文档，
    /// 上下文中包含绑定时交给服务器求值的宏。
    pub fn compile(&self, query: &str) -> Result<CompiledQuery> {
        let generator = DocumentGenerator::new(self.catalog, self.config)?;

        let (select, document) = if self.config.server_side_macros {
            let adapter = self.adapter()?;
            let mut select = self.parse(query)?;
            select.bind(&adapter)?;
            debug!("generating raw wiql document");
            let document = generator.raw_wiql(
                query,
                &adapter.raw_context(),
                select.is_link_query(),
                self.config.day_precision,
            );
            (select, document)
        } else {
            let select = self.optimize(query)?;
            let document = generator.document(&select)?;
            (select, document)
        };

        Ok(CompiledQuery {
            display_fields: generator.display_fields(&select),
            sort_fields: generator.sort_fields(&select),
            document,
            select,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldType;

    fn catalog() -> Catalog {
        let mut catalog = Catalog::with_core_fields();
        catalog.current_user = "Jane Doe".to_string();
        catalog.add_field("System.CreatedDate", "Created Date", 32, FieldType::DateTime);
        catalog
    }

    #[test]
    fn test_pipeline_stages() {
        let catalog = catalog();
        let config = CompilerConfig::default();
        let compiler = Compiler::new(&catalog, &config);

        assert_eq!(compiler.tokens("select * from WorkItems").unwrap().len(), 4);
        let parsed = compiler.parse("select * from WorkItems where [Title] = @me").unwrap();
        assert!(parsed.from.as_ref().unwrap().tag.is_none());

        let bound = compiler.bind("select * from WorkItems where [Title] = @me").unwrap();
        assert_eq!(bound.from.as_ref().unwrap().tag, Some(crate::types::LinkQueryMode::WorkItems));

        let optimized = compiler.optimize("select * from WorkItems where [Title] = @me").unwrap();
        assert_eq!(
            optimized.where_clause.unwrap().to_string(),
            "[Title] = 'Jane Doe'"
        );
    }

    #[test]
    fn test_context_values_are_inlined() {
        let catalog = catalog();
        let config = CompilerConfig::default();
        let mut context = IndexMap::new();
        context.insert("state".to_string(), ContextValue::String("Closed".to_string()));
        let compiled = Compiler::new(&catalog, &config)
            .with_context(context)
            .compile("select * from WorkItems where [System.State] = @state")
            .unwrap();
        let expression = compiled.document.child("Expression").unwrap();
        assert_eq!(expression.child("String").unwrap().text.as_deref(), Some("Closed"));
    }

    #[test]
    fn test_server_side_macros_keep_the_text() {
        let catalog = catalog();
        let config = CompilerConfig {
            server_side_macros: true,
            day_precision: true,
            ..Default::default()
        };
        let query = "select * from WorkItems where [System.State] = @currentState";
        let compiled = Compiler::new(&catalog, &config).compile(query).unwrap();
        assert!(!compiled.is_link_query());
        assert_eq!(compiled.document.child("Wiql").unwrap().text.as_deref(), Some(query));
        assert_eq!(
            compiled.document.child("DayPrecision").unwrap().text.as_deref(),
            Some("true")
        );
        let context = compiled.document.child("Context").unwrap();
        assert_eq!(context.attribute("Key"), Some("currentState"));
        assert_eq!(context.attribute("Value"), Some("currentState"));
        assert_eq!(context.attribute("ValueType"), Some("String"));
    }
}
