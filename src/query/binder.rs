//! Bind and optimize
//!
//! `bind` walks the tree with exclusive access, attaching schema tags and
//! data types and running type checks before handing each node to
//! [`SchemaProvider::verify_node`]. `optimize` consumes the tree and returns
//! the rewritten one; callers always continue with the returned node.

use crate::error::{ensure_syntax, Error, Result, SyntaxError};
use crate::query::ast::*;
use crate::query::datetime;
use crate::query::operators::Condition;
use crate::schema::{NodeRef, SchemaProvider, Scope};
use crate::types::{DataType, LinkQueryMode, Span};
use tracing::trace;

// ============================================================================
// Select
// ============================================================================

impl Select {
    /// Bind the whole query. The table is resolved first so that every field
    /// is bound against the final query mode.
    pub fn bind(&mut self, schema: &dyn SchemaProvider) -> Result<()> {
        let Select {
            fields,
            from,
            where_clause,
            group_by,
            order_by,
            as_of,
            mode,
            span,
        } = self;

        let table = from
            .as_mut()
            .ok_or_else(|| Error::syntax(SyntaxError::ExpectingTableName, Some(*span)))?;
        table.bind(schema)?;

        if let Some(mode) = mode.as_ref() {
            schema.verify_node(NodeRef::Mode(mode), &Scope::new(Some(&*table)))?;
            let resolved = schema.resolve_mode(table, mode)?;
            ensure_syntax(
                resolved != LinkQueryMode::Unknown,
                SyntaxError::UnknownMode,
                Some(mode.span),
            )?;
            table.tag = Some(resolved);
        }

        let scope = Scope::new(Some(&*table));
        if let Some(fields) = fields {
            fields.bind(schema, &scope)?;
        }
        if let Some(where_clause) = where_clause {
            where_clause.bind(schema, &scope)?;
            ensure_syntax(
                where_clause.data_type() == DataType::Bool,
                SyntaxError::ExpectingBoolean,
                Some(where_clause.span),
            )?;
        }
        if let Some(group_by) = group_by {
            group_by.bind(schema, &scope)?;
        }
        if let Some(order_by) = order_by {
            order_by.bind(schema, &scope)?;
        }
        if let Some(as_of) = as_of {
            as_of.bind(schema, &scope)?;
            ensure_syntax(
                as_of.can_cast_to(DataType::Date, schema),
                SyntaxError::InvalidDate,
                Some(as_of.span),
            )?;
        }

        schema.verify_node(NodeRef::Select(self), &Scope::new(self.from.as_ref()))
    }

    /// Optimize the `where` and `asof` expressions.
    pub fn optimize(mut self, schema: &dyn SchemaProvider) -> Result<Select> {
        let scope = Scope::new(self.from.as_ref());
        let where_clause = self
            .where_clause
            .take()
            .map(|node| node.optimize(schema, &scope))
            .transpose()?;
        let as_of = self
            .as_of
            .take()
            .map(|node| node.optimize(schema, &scope))
            .transpose()?;
        self.where_clause = where_clause;
        self.as_of = as_of;
        Ok(self)
    }
}

impl TableName {
    pub fn bind(&mut self, schema: &dyn SchemaProvider) -> Result<()> {
        let mode = schema
            .find_table(&self.name)?
            .ok_or_else(|| Error::syntax(SyntaxError::TableDoesNotExist, Some(self.span)))?;
        self.tag = Some(mode);
        schema.verify_node(NodeRef::Table(self), &Scope::default())
    }
}

impl FieldList {
    pub fn bind(&mut self, schema: &dyn SchemaProvider, scope: &Scope<'_>) -> Result<()> {
        for field in &mut self.fields {
            field.bind(schema, scope)?;
        }
        schema.verify_node(NodeRef::FieldList(self), scope)
    }
}

impl FieldName {
    pub fn bind(&mut self, schema: &dyn SchemaProvider, scope: &Scope<'_>) -> Result<()> {
        let tag = schema
            .find_field(&self.name, self.prefix.as_deref(), scope.table)?
            .ok_or_else(|| Error::syntax(SyntaxError::FieldDoesNotExist, Some(self.span)))?;
        self.tag = Some(tag);
        self.data_type = schema.field_data_type(tag);
        self.prefix = schema.field_prefix(self, scope.table)?;
        schema.verify_node(NodeRef::Field(self), scope)
    }
}

// ============================================================================
// Expressions: bind
// ============================================================================

impl Node {
    pub fn bind(&mut self, schema: &dyn SchemaProvider, scope: &Scope<'_>) -> Result<()> {
        let span = self.span;
        match &mut self.kind {
            NodeKind::String(_)
            | NodeKind::Number(_)
            | NodeKind::BoolValue(_)
            | NodeKind::BoolConst(_) => {}
            NodeKind::Variable(variable) => {
                let tag = schema
                    .find_variable(&variable.name)
                    .ok_or_else(|| Error::syntax(SyntaxError::VariableDoesNotExist, Some(span)))?;
                variable.data_type = schema.variable_data_type(&tag);
                variable.tag = Some(tag);
            }
            NodeKind::FieldName(field) => field.bind(schema, scope)?,
            NodeKind::ValueList(items) => {
                for item in items.iter_mut() {
                    item.bind(schema, scope)?;
                    ensure_syntax(item.is_const(), SyntaxError::ExpectingConst, Some(item.span))?;
                }
            }
            NodeKind::Condition(condition) => bind_condition(condition, schema, scope)?,
            NodeKind::Arithmetic(arithmetic) => {
                arithmetic.left.bind(schema, scope)?;
                arithmetic.right.bind(schema, scope)?;
                ensure_syntax(
                    arithmetic.left.is_const() && arithmetic.right.is_const(),
                    SyntaxError::ExpectingConst,
                    Some(span),
                )?;
                arithmetic.data_type = match scope.field.map(|f| f.data_type) {
                    Some(DataType::Date) => DataType::Date,
                    Some(DataType::Numeric) => DataType::Numeric,
                    _ => arithmetic.left.data_type(),
                };
            }
            NodeKind::And(items) | NodeKind::Or(items) => {
                for item in items.iter_mut() {
                    item.bind(schema, scope)?;
                    ensure_syntax(
                        item.data_type() == DataType::Bool,
                        SyntaxError::ExpectingBoolean,
                        Some(item.span),
                    )?;
                }
            }
            NodeKind::Not(child) | NodeKind::Ever(child) => {
                child.bind(schema, scope)?;
                ensure_syntax(
                    child.data_type() == DataType::Bool,
                    SyntaxError::ExpectingBoolean,
                    Some(child.span),
                )?;
            }
        }
        schema.verify_node(NodeRef::Expr(self), scope)
    }

    /// Whether a constant can be compared with a value of type `target`.
    pub fn can_cast_to(&self, target: DataType, schema: &dyn SchemaProvider) -> bool {
        if target == DataType::Unknown {
            return true;
        }
        match &self.kind {
            NodeKind::String(s) => match target {
                DataType::String => true,
                _ if s.is_empty() => true,
                DataType::Date => datetime::parse_date(s, schema.locale(), schema.time_zone()).is_some(),
                DataType::Numeric => s.trim().parse::<f64>().is_ok(),
                DataType::Guid => uuid::Uuid::parse_str(s.trim()).is_ok(),
                DataType::Bool => s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false"),
                _ => false,
            },
            NodeKind::Number(_) => matches!(target, DataType::Numeric | DataType::String),
            NodeKind::BoolValue(_) | NodeKind::BoolConst(_) => {
                matches!(target, DataType::Bool | DataType::String)
            }
            NodeKind::Variable(variable) => match variable.data_type {
                DataType::Unknown => true,
                DataType::Date | DataType::Numeric => {
                    variable.data_type == target || target == DataType::String
                }
                other => other == target,
            },
            NodeKind::Arithmetic(arithmetic) => arithmetic.data_type == target,
            NodeKind::ValueList(items) => items.iter().all(|item| item.can_cast_to(target, schema)),
            NodeKind::FieldName(field) => field.data_type == target,
            _ => false,
        }
    }
}

fn bind_condition(
    condition: &mut ConditionNode,
    schema: &dyn SchemaProvider,
    scope: &Scope<'_>,
) -> Result<()> {
    let ConditionNode {
        condition: op,
        left,
        right,
    } = condition;

    left.bind(schema, scope)?;
    right.bind(schema, &scope.with_field(left))?;

    match &right.kind {
        NodeKind::FieldName(other) => ensure_syntax(
            other.data_type == left.data_type,
            SyntaxError::IncompatibleConditionPartsType,
            Some(right.span),
        ),
        NodeKind::ValueList(_) => ensure_syntax(
            right.can_cast_to(left.data_type, schema),
            SyntaxError::UnknownOrIncompatibleTypesInTheList,
            Some(right.span),
        ),
        _ => {
            ensure_syntax(right.is_const(), SyntaxError::ExpectingConst, Some(right.span))?;
            // `under` and `in group` compare against names, not field values
            let target = match op {
                Condition::Under | Condition::Group => DataType::String,
                _ => left.data_type,
            };
            ensure_syntax(
                right.can_cast_to(target, schema),
                SyntaxError::IncompatibleRightConst,
                Some(right.span),
            )
        }
    }
}

// ============================================================================
// Expressions: optimize
// ============================================================================

impl Node {
    pub fn optimize(self, schema: &dyn SchemaProvider, scope: &Scope<'_>) -> Result<Node> {
        let Node {
            kind,
            span,
            parenthesized,
        } = self;

        let node = match kind {
            NodeKind::ValueList(items) => {
                let items = items
                    .into_iter()
                    .map(|item| item.optimize(schema, scope))
                    .collect::<Result<Vec<_>>>()?;
                rebuild(NodeKind::ValueList(items), span, parenthesized)
            }
            NodeKind::Condition(condition) => {
                let ConditionNode {
                    condition,
                    left,
                    right,
                } = *condition;
                let right = right.optimize(schema, &scope.with_field(&left))?;
                rebuild(
                    NodeKind::Condition(Box::new(ConditionNode {
                        condition,
                        left,
                        right,
                    })),
                    span,
                    parenthesized,
                )
            }
            NodeKind::Arithmetic(arithmetic) => {
                let ArithmeticNode {
                    op,
                    left,
                    right,
                    data_type,
                } = *arithmetic;
                let left = left.optimize(schema, scope)?;
                let right = right.optimize(schema, scope)?;
                rebuild(
                    NodeKind::Arithmetic(Box::new(ArithmeticNode {
                        op,
                        left,
                        right,
                        data_type,
                    })),
                    span,
                    parenthesized,
                )
            }
            NodeKind::And(items) => {
                match fold_boolean(items, true, schema, scope)? {
                    Folded::Const(value) => Node::bool_const(value, span),
                    Folded::Single(node) => node,
                    Folded::Many(items) => rebuild(NodeKind::And(items), span, parenthesized),
                }
            }
            NodeKind::Or(items) => {
                match fold_boolean(items, false, schema, scope)? {
                    Folded::Const(value) => Node::bool_const(value, span),
                    Folded::Single(node) => node,
                    Folded::Many(items) => rebuild(NodeKind::Or(items), span, parenthesized),
                }
            }
            NodeKind::Not(child) => {
                let child = child.optimize(schema, scope)?;
                match child.kind {
                    NodeKind::Not(inner) => return Ok(*inner),
                    NodeKind::BoolConst(value) => Node::bool_const(!value, span),
                    _ => rebuild(NodeKind::Not(Box::new(child)), span, parenthesized),
                }
            }
            NodeKind::Ever(child) => {
                let child = child.optimize(schema, scope)?;
                match child.kind {
                    NodeKind::Ever(inner) => return Ok(*inner),
                    NodeKind::BoolConst(value) => Node::bool_const(value, span),
                    _ => rebuild(NodeKind::Ever(Box::new(child)), span, parenthesized),
                }
            }
            leaf => rebuild(leaf, span, parenthesized),
        };

        schema.optimize_node(node, scope)
    }
}

fn rebuild(kind: NodeKind, span: Span, parenthesized: bool) -> Node {
    Node {
        kind,
        span,
        parenthesized,
    }
}

enum Folded {
    Const(bool),
    Single(Node),
    Many(Vec<Node>),
}

/// Optimize the operands of an `and` (`identity == true`) or `or`
/// (`identity == false`) and drop or collapse boolean constants.
fn fold_boolean(
    items: Vec<Node>,
    identity: bool,
    schema: &dyn SchemaProvider,
    scope: &Scope<'_>,
) -> Result<Folded> {
    let mut kept = Vec::with_capacity(items.len());
    for item in items {
        let item = item.optimize(schema, scope)?;
        match item.as_bool_const() {
            Some(value) if value == identity => {
                trace!(operand = %item, "dropping identity operand");
            }
            Some(value) => return Ok(Folded::Const(value)),
            None => kept.push(item),
        }
    }
    Ok(match kept.len() {
        0 => Folded::Const(identity),
        1 => Folded::Single(kept.remove(0)),
        _ => Folded::Many(kept),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::parse;
    use crate::types::FieldTag;
    use chrono_tz::Tz;

    /// Knows every field as a string and has no rewrites.
    struct PermissiveSchema;

    impl SchemaProvider for PermissiveSchema {
        fn find_field(&self, name: &str, _: Option<&str>, _: Option<&TableName>) -> Result<Option<FieldTag>> {
            Ok((name != "Missing").then_some(FieldTag(1)))
        }

        fn find_table(&self, _name: &str) -> Result<Option<LinkQueryMode>> {
            Ok(Some(LinkQueryMode::WorkItems))
        }

        fn find_variable(&self, name: &str) -> Option<crate::types::VariableTag> {
            (name == "me").then(|| crate::types::VariableTag::new("me"))
        }

        fn field_data_type(&self, _tag: FieldTag) -> DataType {
            DataType::String
        }

        fn variable_data_type(&self, _tag: &crate::types::VariableTag) -> DataType {
            DataType::String
        }

        fn locale(&self) -> &str {
            "en-US"
        }

        fn time_zone(&self) -> Tz {
            Tz::UTC
        }
    }

    fn bound_where(query: &str) -> Node {
        let mut select = parse(query).unwrap();
        select.bind(&PermissiveSchema).unwrap();
        select.where_clause.unwrap()
    }

    fn optimized(query: &str) -> String {
        let node = bound_where(query);
        let table = TableName::new("X", Span::default());
        node.optimize(&PermissiveSchema, &Scope::new(Some(&table)))
            .unwrap()
            .to_string()
    }

    fn bool_const() -> Node {
        Node::bool_const(true, Span::default())
    }

    #[test]
    fn test_bind_attaches_tags() {
        let node = bound_where("select * from X where a = @me");
        let cond = node.as_condition().unwrap();
        assert_eq!(cond.left.tag, Some(FieldTag(1)));
        assert_eq!(cond.left.data_type, DataType::String);
        assert_eq!(cond.right.data_type(), DataType::String);
    }

    #[test]
    fn test_bind_errors() {
        let bind = |query: &str| {
            let mut select = parse(query).unwrap();
            select.bind(&PermissiveSchema).unwrap_err().syntax_kind()
        };
        assert_eq!(bind("select * from X where Missing = 1"), Some(SyntaxError::FieldDoesNotExist));
        assert_eq!(bind("select * from X where a = @nobody"), Some(SyntaxError::VariableDoesNotExist));
        assert_eq!(bind("select *"), Some(SyntaxError::ExpectingTableName));
        assert_eq!(bind("select * from X where a = 1 + 'x'"), Some(SyntaxError::IncompatibleRightConst));
    }

    #[test]
    fn test_and_or_identity_folding() {
        let x = || {
            let table = TableName::new("X", Span::default());
            bound_where("select * from X where a = 'x'")
                .optimize(&PermissiveSchema, &Scope::new(Some(&table)))
                .unwrap()
        };
        let table = TableName::new("X", Span::default());
        let scope = Scope::new(Some(&table));
        let fold = |node: Node| node.optimize(&PermissiveSchema, &scope).unwrap();

        let t = bool_const();
        let f = Node::bool_const(false, Span::default());

        assert_eq!(fold(Node::and(vec![t.clone(), x()])).to_string(), x().to_string());
        assert_eq!(fold(Node::or(vec![f.clone(), x()])).to_string(), x().to_string());
        assert_eq!(fold(Node::and(vec![f.clone(), x()])).as_bool_const(), Some(false));
        assert_eq!(fold(Node::or(vec![t.clone(), x()])).as_bool_const(), Some(true));
        assert_eq!(fold(Node::and(vec![t.clone(), t])).as_bool_const(), Some(true));
        assert_eq!(fold(Node::or(vec![f.clone(), f])).as_bool_const(), Some(false));
    }

    #[test]
    fn test_double_negation() {
        assert_eq!(optimized("select * from X where not not a = 'x'"), "[a] = 'x'");
        assert_eq!(optimized("select * from X where ever ever a = 'x'"), "[a] = 'x'");
        assert_eq!(optimized("select * from X where not a = 'x'"), "not [a] = 'x'");
    }

    #[test]
    fn test_not_of_constant() {
        let table = TableName::new("X", Span::default());
        let node = Node::not(bool_const())
            .optimize(&PermissiveSchema, &Scope::new(Some(&table)))
            .unwrap();
        assert_eq!(node.as_bool_const(), Some(false));
    }

    #[test]
    fn test_optimize_is_idempotent() {
        let table = TableName::new("X", Span::default());
        let scope = Scope::new(Some(&table));
        let once = bound_where("select * from X where (a = 'x' or not not b = 'y') and c = 'z'")
            .optimize(&PermissiveSchema, &scope)
            .unwrap();
        let twice = once.clone().optimize(&PermissiveSchema, &scope).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_can_cast_to() {
        let schema = PermissiveSchema;
        let s = |text: &str| Node::string(text, Span::default());
        assert!(s("2020-01-01").can_cast_to(DataType::Date, &schema));
        assert!(!s("yesterday").can_cast_to(DataType::Date, &schema));
        assert!(s("").can_cast_to(DataType::Date, &schema));
        assert!(s("12.5").can_cast_to(DataType::Numeric, &schema));
        assert!(s("6f1c2a5e-4b0d-4b2a-9c11-0f5d7e2b9a10").can_cast_to(DataType::Guid, &schema));
        assert!(!Node::number("1", Span::default()).can_cast_to(DataType::Date, &schema));
    }
}
