//! Schema provider interface
//!
//! The compiler core resolves names and asks for rewrites through this trait;
//! it never looks at field definitions directly. [`WiqlAdapter`] is the
//! catalog-backed implementation.
//!
//! [`WiqlAdapter`]: crate::schema::WiqlAdapter

use crate::error::{ensure_syntax, Result, SyntaxError};
use crate::query::ast::{FieldList, FieldName, ModeList, Node, Select, TableName};
use crate::types::{DataType, FieldTag, LinkQueryMode, VariableTag};
use chrono_tz::Tz;

/// Table and field a node is being bound or optimized under
#[derive(Debug, Clone, Copy, Default)]
pub struct Scope<'a> {
    pub table: Option<&'a TableName>,
    /// Left side of the enclosing condition
    pub field: Option<&'a FieldName>,
}

impl<'a> Scope<'a> {
    pub fn new(table: Option<&'a TableName>) -> Self {
        Self { table, field: None }
    }

    pub fn with_field<'b>(&self, field: &'b FieldName) -> Scope<'b>
    where
        'a: 'b,
    {
        Scope {
            table: self.table,
            field: Some(field),
        }
    }

    /// Query mode of the table in scope
    pub fn mode(&self) -> LinkQueryMode {
        self.table.map(TableName::mode).unwrap_or_default()
    }
}

/// Node handed to [`SchemaProvider::verify_node`]
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Expr(&'a Node),
    Field(&'a FieldName),
    Table(&'a TableName),
    FieldList(&'a FieldList),
    Mode(&'a ModeList),
    Select(&'a Select),
}

/// Name resolution and rewrite hooks used by bind and optimize
pub trait SchemaProvider {
    /// Resolve a field name. `Ok(None)` means the field does not exist.
    fn find_field(
        &self,
        name: &str,
        prefix: Option<&str>,
        table: Option<&TableName>,
    ) -> Result<Option<FieldTag>>;

    /// Resolve a table name to its query mode.
    fn find_table(&self, name: &str) -> Result<Option<LinkQueryMode>>;

    fn find_variable(&self, name: &str) -> Option<VariableTag>;

    fn field_data_type(&self, tag: FieldTag) -> DataType;

    fn variable_data_type(&self, tag: &VariableTag) -> DataType;

    /// Canonical prefix for a resolved field in the given table.
    fn field_prefix(&self, field: &FieldName, _table: Option<&TableName>) -> Result<Option<String>> {
        Ok(field.prefix.clone())
    }

    /// Refine the table's query mode with a `mode (...)` clause.
    fn resolve_mode(&self, table: &TableName, mode: &ModeList) -> Result<LinkQueryMode> {
        link_query_mode(&table.name, Some(mode))
    }

    /// Rewrite hook invoked from every node's optimize.
    fn optimize_node(&self, node: Node, _scope: &Scope<'_>) -> Result<Node> {
        Ok(node)
    }

    /// Validation hook invoked from every node's bind.
    fn verify_node(&self, _node: NodeRef<'_>, _scope: &Scope<'_>) -> Result<()> {
        Ok(())
    }

    /// Locale name used for date literals, e.g. `en-US`
    fn locale(&self) -> &str;

    fn time_zone(&self) -> Tz;
}

// ============================================================================
// Query mode resolution
// ============================================================================

/// Query mode implied by a table name alone
pub fn table_mode(name: &str) -> LinkQueryMode {
    const WORK_ITEM_TABLES: &[&str] = &["issue", "issues", "workitem", "WorkItems"];
    const LINK_TABLES: &[&str] = &["links", "WorkItemLinks"];

    if WORK_ITEM_TABLES.iter().any(|t| t.eq_ignore_ascii_case(name)) {
        LinkQueryMode::WorkItems
    } else if LINK_TABLES.iter().any(|t| t.eq_ignore_ascii_case(name)) {
        LinkQueryMode::LinksMustContain
    } else {
        LinkQueryMode::Unknown
    }
}

/// Query mode of a table refined by its mode keywords.
///
/// Keywords combine as a bit mask: none or `MustContain` gives
/// must-contain, `Recursive` may be combined with `MustContain`, every other
/// combination is unknown.
pub fn link_query_mode(table: &str, mode: Option<&ModeList>) -> Result<LinkQueryMode> {
    let base = table_mode(table);
    let Some(mode) = mode else {
        return Ok(base);
    };

    ensure_syntax(base.is_link_query(), SyntaxError::ModeOnWorkItems, Some(mode.span))?;

    let mut mask = 0u32;
    for item in &mode.items {
        let bit = match item.name.to_ascii_lowercase().as_str() {
            "mustcontain" => 1,
            "maycontain" => 2,
            "doesnotcontain" => 4,
            "recursive" => 8,
            _ => return Ok(LinkQueryMode::Unknown),
        };
        mask |= bit;
    }

    Ok(match mask {
        0 | 1 => LinkQueryMode::LinksMustContain,
        2 => LinkQueryMode::LinksMayContain,
        4 => LinkQueryMode::LinksDoesNotContain,
        8 | 9 => LinkQueryMode::LinksRecursive,
        _ => LinkQueryMode::Unknown,
    })
}
