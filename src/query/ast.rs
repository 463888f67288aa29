//! WIQL Abstract Syntax Tree (AST)
//!
//! Expression nodes share one [`Node`] wrapper carrying the source span and
//! whether the expression was written in parentheses. Clause-level pieces of a
//! query (field lists, the table name, the mode list and the select itself)
//! are typed structs held directly by [`Select`].
//!
//! Every node prints back to WIQL through `Display`; printing a parsed query
//! and parsing the result again yields the same text.

use crate::query::operators::{Arithmetic, Condition, Priority};
use crate::types::{DataType, Direction, FieldTag, LinkQueryMode, Span, VariableTag};
use std::fmt;

/// Words that cannot be printed as bare names.
const RESERVED_WORDS: &[&str] = &[
    "select", "from", "where", "group", "order", "by", "asof", "mode", "and", "or", "not",
    "ever", "never", "in", "under", "contains", "words", "asc", "desc", "true", "false",
];

// ============================================================================
// Expression nodes
// ============================================================================

/// Expression node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    /// Written in parentheses in the source
    pub parenthesized: bool,
}

/// Closed set of expression node kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// String literal
    String(String),
    /// Numeric literal, kept in its textual form
    Number(String),
    /// `true` / `false` written in the query
    BoolValue(bool),
    /// Boolean constant produced by optimization
    BoolConst(bool),
    /// `@name`
    Variable(Variable),
    /// Field reference
    FieldName(FieldName),
    /// Right side of `in (...)`
    ValueList(Vec<Node>),
    /// `field <op> value`
    Condition(Box<ConditionNode>),
    /// `value +|- value`
    Arithmetic(Box<ArithmeticNode>),
    And(Vec<Node>),
    Or(Vec<Node>),
    Not(Box<Node>),
    Ever(Box<Node>),
}

/// Variable reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    /// Set by bind
    pub tag: Option<VariableTag>,
    pub data_type: DataType,
}

impl Variable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: None,
            data_type: DataType::Unknown,
        }
    }
}

/// Field reference with optional `Source`/`Target` prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldName {
    pub prefix: Option<String>,
    pub name: String,
    pub direction: Direction,
    /// Set by bind
    pub tag: Option<FieldTag>,
    pub data_type: DataType,
    pub span: Span,
}

impl FieldName {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            prefix: None,
            name: name.into(),
            direction: Direction::Unknown,
            tag: None,
            data_type: DataType::Unknown,
            span,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Prefix, empty for unprefixed fields
    pub fn prefix_str(&self) -> &str {
        self.prefix.as_deref().unwrap_or("")
    }

    /// A copy that refers to the same field, used when a rewrite needs the
    /// field on several new conditions.
    pub fn reference(&self) -> FieldName {
        FieldName {
            direction: Direction::Unknown,
            ..self.clone()
        }
    }
}

/// Field condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionNode {
    pub condition: Condition,
    pub left: FieldName,
    pub right: Node,
}

/// Binary arithmetic over constants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArithmeticNode {
    pub op: Arithmetic,
    pub left: Node,
    pub right: Node,
    /// Resolved by bind from the left operand and the field context
    pub data_type: DataType,
}

impl Node {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Self {
            kind,
            span,
            parenthesized: false,
        }
    }

    pub fn string(value: impl Into<String>, span: Span) -> Self {
        Node::new(NodeKind::String(value.into()), span)
    }

    pub fn number(value: impl Into<String>, span: Span) -> Self {
        Node::new(NodeKind::Number(value.into()), span)
    }

    pub fn bool_const(value: bool, span: Span) -> Self {
        Node::new(NodeKind::BoolConst(value), span)
    }

    pub fn field(field: FieldName) -> Self {
        let span = field.span;
        Node::new(NodeKind::FieldName(field), span)
    }

    pub fn condition(condition: Condition, left: FieldName, right: Node) -> Self {
        let span = left.span.to(right.span);
        Node::new(
            NodeKind::Condition(Box::new(ConditionNode {
                condition: condition.canonical(),
                left,
                right,
            })),
            span,
        )
    }

    pub fn arithmetic(op: Arithmetic, left: Node, right: Node) -> Self {
        let span = left.span.to(right.span);
        Node::new(
            NodeKind::Arithmetic(Box::new(ArithmeticNode {
                op,
                left,
                right,
                data_type: DataType::Unknown,
            })),
            span,
        )
    }

    pub fn and(children: Vec<Node>) -> Self {
        let span = list_span(&children);
        Node::new(NodeKind::And(children), span)
    }

    pub fn or(children: Vec<Node>) -> Self {
        let span = list_span(&children);
        Node::new(NodeKind::Or(children), span)
    }

    pub fn not(child: Node) -> Self {
        let span = child.span;
        Node::new(NodeKind::Not(Box::new(child)), span)
    }

    pub fn ever(child: Node) -> Self {
        let span = child.span;
        Node::new(NodeKind::Ever(Box::new(child)), span)
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    // ========================================================================
    // Node protocol
    // ========================================================================

    /// Data type of the value this node produces
    pub fn data_type(&self) -> DataType {
        match &self.kind {
            NodeKind::String(_) => DataType::String,
            NodeKind::Number(_) => DataType::Numeric,
            NodeKind::BoolValue(_) | NodeKind::BoolConst(_) => DataType::Bool,
            NodeKind::Variable(v) => v.data_type,
            NodeKind::FieldName(f) => f.data_type,
            NodeKind::ValueList(items) => {
                let mut types = items.iter().map(Node::data_type);
                match types.next() {
                    Some(first) if types.all(|t| t == first) => first,
                    _ => DataType::Unknown,
                }
            }
            NodeKind::Arithmetic(a) => a.data_type,
            NodeKind::Condition(_)
            | NodeKind::And(_)
            | NodeKind::Or(_)
            | NodeKind::Not(_)
            | NodeKind::Ever(_) => DataType::Bool,
        }
    }

    /// Value is known without looking at a work item
    pub fn is_const(&self) -> bool {
        match &self.kind {
            NodeKind::String(_)
            | NodeKind::Number(_)
            | NodeKind::BoolValue(_)
            | NodeKind::BoolConst(_)
            | NodeKind::Variable(_) => true,
            NodeKind::Arithmetic(a) => a.left.is_const() && a.right.is_const(),
            NodeKind::ValueList(items) => items.iter().all(Node::is_const),
            _ => false,
        }
    }

    /// Produces a single value (as opposed to a list or a predicate)
    pub fn is_scalar(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::String(_)
                | NodeKind::Number(_)
                | NodeKind::BoolValue(_)
                | NodeKind::BoolConst(_)
                | NodeKind::Variable(_)
                | NodeKind::FieldName(_)
                | NodeKind::Arithmetic(_)
        )
    }

    /// Literal text of a constant leaf
    pub fn const_string_value(&self) -> Option<String> {
        match &self.kind {
            NodeKind::String(s) | NodeKind::Number(s) => Some(s.clone()),
            NodeKind::BoolValue(b) | NodeKind::BoolConst(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn as_bool_const(&self) -> Option<bool> {
        match self.kind {
            NodeKind::BoolConst(b) => Some(b),
            _ => None,
        }
    }

    pub fn priority(&self) -> Priority {
        match &self.kind {
            NodeKind::Arithmetic(_) => Priority::Add,
            NodeKind::Condition(_) => Priority::Conditional,
            NodeKind::Not(_) | NodeKind::Ever(_) => Priority::UnaryBool,
            NodeKind::And(_) => Priority::And,
            NodeKind::Or(_) => Priority::Or,
            NodeKind::ValueList(_) => Priority::Comma,
            _ => Priority::Operand,
        }
    }

    /// Expression children in source order
    pub fn children(&self) -> Vec<&Node> {
        match &self.kind {
            NodeKind::ValueList(items) | NodeKind::And(items) | NodeKind::Or(items) => {
                items.iter().collect()
            }
            NodeKind::Not(child) | NodeKind::Ever(child) => vec![child.as_ref()],
            NodeKind::Condition(c) => vec![&c.right],
            NodeKind::Arithmetic(a) => vec![&a.left, &a.right],
            _ => Vec::new(),
        }
    }

    pub fn child_count(&self) -> usize {
        self.children().len()
    }

    pub fn child(&self, index: usize) -> Option<&Node> {
        self.children().into_iter().nth(index)
    }

    pub fn as_condition(&self) -> Option<&ConditionNode> {
        match &self.kind {
            NodeKind::Condition(c) => Some(c),
            _ => None,
        }
    }
}

fn list_span(children: &[Node]) -> Span {
    match (children.first(), children.last()) {
        (Some(first), Some(last)) => first.span.to(last.span),
        _ => Span::default(),
    }
}

// ============================================================================
// Clause-level nodes
// ============================================================================

/// Table named in `from`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    pub name: String,
    /// Query mode resolved by bind
    pub tag: Option<LinkQueryMode>,
    pub span: Span,
}

impl TableName {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            tag: None,
            span,
        }
    }

    pub fn mode(&self) -> LinkQueryMode {
        self.tag.unwrap_or_default()
    }
}

/// Which clause a field list belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldListKind {
    Select,
    Group,
    Order,
}

/// Comma separated field list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldList {
    pub kind: FieldListKind,
    pub fields: Vec<FieldName>,
    pub span: Span,
}

impl FieldList {
    pub fn new(kind: FieldListKind) -> Self {
        Self {
            kind,
            fields: Vec::new(),
            span: Span::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// `mode (...)` keyword
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeItem {
    pub name: String,
    pub span: Span,
}

/// `mode (...)` clause of a link query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeList {
    pub items: Vec<ModeItem>,
    pub span: Span,
}

/// Whole query
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Select {
    /// `None` for `select *`
    pub fields: Option<FieldList>,
    pub from: Option<TableName>,
    pub where_clause: Option<Node>,
    pub group_by: Option<FieldList>,
    pub order_by: Option<FieldList>,
    pub as_of: Option<Node>,
    pub mode: Option<ModeList>,
    pub span: Span,
}

impl Select {
    /// Query mode of the bound table
    pub fn query_mode(&self) -> LinkQueryMode {
        self.from.as_ref().map(TableName::mode).unwrap_or_default()
    }

    pub fn is_link_query(&self) -> bool {
        self.query_mode().is_link_query()
    }
}

// ============================================================================
// Pretty printing
// ============================================================================

fn needs_brackets(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_ok = chars.next().is_some_and(|c| c.is_alphabetic() || c == '_');
    let rest_ok = name
        .split('.')
        .all(|part| !part.is_empty() && part.chars().all(|c| c.is_alphanumeric() || c == '_'));
    !starts_ok || !rest_ok || RESERVED_WORDS.iter().any(|w| w.eq_ignore_ascii_case(name))
}

fn write_name(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    if needs_brackets(name) {
        write!(f, "[{}]", name)
    } else {
        write!(f, "{}", name)
    }
}

/// Write `child`, parenthesized when it binds weaker than `limit` allows or
/// was parenthesized in the source.
fn write_child(f: &mut fmt::Formatter<'_>, child: &Node, limit: Priority) -> fmt::Result {
    if child.priority() > limit && !child.parenthesized {
        write!(f, "({})", child)
    } else {
        write!(f, "{}", child)
    }
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    items: &[Node],
    separator: &str,
    limit: Priority,
) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", separator)?;
        }
        write_child(f, item, limit)?;
    }
    Ok(())
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parenthesized {
            write!(f, "(")?;
        }
        match &self.kind {
            NodeKind::String(s) => write!(f, "'{}'", s.replace('\'', "''"))?,
            NodeKind::Number(n) => write!(f, "{}", n)?,
            NodeKind::BoolValue(b) | NodeKind::BoolConst(b) => write!(f, "{}", b)?,
            NodeKind::Variable(v) => write!(f, "@{}", v.name)?,
            NodeKind::FieldName(field) => write!(f, "{}", field)?,
            NodeKind::ValueList(items) => write_joined(f, items, ", ", Priority::Add)?,
            NodeKind::Condition(c) => {
                write!(f, "{} {} ", c.left, c.condition)?;
                if c.condition == Condition::In {
                    write!(f, "(")?;
                    write_child(f, &c.right, Priority::Comma)?;
                    write!(f, ")")?;
                } else {
                    write_child(f, &c.right, Priority::Add)?;
                }
            }
            NodeKind::Arithmetic(a) => {
                write_child(f, &a.left, Priority::Add)?;
                write!(f, " {} ", a.op)?;
                write_child(f, &a.right, Priority::Operand)?;
            }
            NodeKind::And(items) => write_joined(f, items, " and ", Priority::And)?,
            NodeKind::Or(items) => write_joined(f, items, " or ", Priority::Or)?,
            NodeKind::Not(child) => {
                write!(f, "not ")?;
                write_child(f, child, Priority::UnaryBool)?;
            }
            NodeKind::Ever(child) => {
                write!(f, "ever ")?;
                write_child(f, child, Priority::UnaryBool)?;
            }
        }
        if self.parenthesized {
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = &self.prefix {
            write_name(f, prefix)?;
            write!(f, ".")?;
        }
        write!(f, "[{}]", self.name)?;
        match self.direction {
            Direction::Ascending => write!(f, " asc"),
            Direction::Descending => write!(f, " desc"),
            Direction::Unknown => Ok(()),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_name(f, &self.name)
    }
}

impl fmt::Display for FieldList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", field)?;
        }
        Ok(())
    }
}

impl fmt::Display for ModeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write_name(f, &item.name)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "select ")?;
        match &self.fields {
            Some(fields) => write!(f, "{}", fields)?,
            None => write!(f, "*")?,
        }
        if let Some(from) = &self.from {
            write!(f, " from {}", from)?;
        }
        if let Some(where_clause) = &self.where_clause {
            write!(f, " where {}", where_clause)?;
        }
        if let Some(group_by) = &self.group_by {
            write!(f, " group by {}", group_by)?;
        }
        if let Some(order_by) = &self.order_by {
            write!(f, " order by {}", order_by)?;
        }
        if let Some(as_of) = &self.as_of {
            write!(f, " asof {}", as_of)?;
        }
        if let Some(mode) = &self.mode {
            write!(f, " mode {}", mode)?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
