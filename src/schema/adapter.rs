//! Catalog-backed schema provider
//!
//! [`WiqlAdapter`] resolves names against a [`Catalog`], checks every
//! condition against the server's rules and performs the query-shape
//! rewrites: `in` expansion, empty `contains`, team project to area path,
//! non-nullable fields, day precision, variable inlining and constant
//! arithmetic.

use crate::config::CompilerConfig;
use crate::error::{ensure_syntax, Error, Result, SyntaxError};
use crate::query::ast::*;
use crate::query::datetime;
use crate::query::operators::{Arithmetic, Condition};
use crate::schema::catalog::{core_fields, Catalog, FieldDefinition, LinkTopology, TreeKind};
use crate::schema::provider::{table_mode, NodeRef, SchemaProvider, Scope};
use crate::types::{DataType, FieldTag, FieldType, LinkQueryMode, Span, VariableTag};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use indexmap::{IndexMap, IndexSet};
use std::cell::RefCell;
use std::fmt;
use tracing::trace;

const ME: &str = "me";
const TODAY: &str = "today";

const SOURCE_PREFIX: &str = "Source";
const TARGET_PREFIX: &str = "Target";

/// Value supplied by the caller for a `@name` macro
#[derive(Debug, Clone, PartialEq)]
pub enum ContextValue {
    DateTime(DateTime<Utc>),
    Number(i32),
    Double(f64),
    String(String),
}

impl ContextValue {
    pub fn data_type(&self) -> DataType {
        match self {
            ContextValue::DateTime(_) => DataType::Date,
            ContextValue::Number(_) | ContextValue::Double(_) => DataType::Numeric,
            ContextValue::String(_) => DataType::String,
        }
    }

    /// Type name used in the raw WIQL document
    pub fn value_type(&self) -> &'static str {
        match self {
            ContextValue::DateTime(_) => "DateTime",
            ContextValue::Number(_) => "Number",
            ContextValue::Double(_) => "Double",
            ContextValue::String(_) => "String",
        }
    }
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextValue::DateTime(dt) => write!(f, "{}", datetime::format_round_trip_universal(*dt)),
            ContextValue::Number(n) => write!(f, "{}", n),
            ContextValue::Double(d) => write!(f, "{}", d),
            ContextValue::String(s) => write!(f, "{}", s),
        }
    }
}

/// Schema provider over a [`Catalog`]
pub struct WiqlAdapter<'a> {
    catalog: &'a Catalog,
    config: &'a CompilerConfig,
    time_zone: Tz,
    context: IndexMap<String, ContextValue>,
    /// Unknown macros accepted for evaluation on the server
    server_macros: RefCell<IndexSet<String>>,
}

impl<'a> WiqlAdapter<'a> {
    pub fn new(catalog: &'a Catalog, config: &'a CompilerConfig) -> Result<Self> {
        Ok(Self {
            catalog,
            config,
            time_zone: config.tz()?,
            context: IndexMap::new(),
            server_macros: RefCell::new(IndexSet::new()),
        })
    }

    /// Caller supplied macro values; they take precedence over `@me` and `@today`.
    pub fn with_context(mut self, context: IndexMap<String, ContextValue>) -> Self {
        self.context = context;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        self.catalog
    }

    pub fn config(&self) -> &CompilerConfig {
        self.config
    }

    pub fn context(&self) -> &IndexMap<String, ContextValue> {
        &self.context
    }

    /// Context table sent with a raw WIQL document: the caller's values
    /// followed by every server-evaluated macro bound so far, each mapped to
    /// its own name.
    pub fn raw_context(&self) -> IndexMap<String, ContextValue> {
        let mut context = self.context.clone();
        for name in self.server_macros.borrow().iter() {
            context
                .entry(name.clone())
                .or_insert_with(|| ContextValue::String(name.clone()));
        }
        context
    }

    fn definition(&self, field: &FieldName) -> Result<&FieldDefinition> {
        field
            .tag
            .and_then(|tag| self.catalog.field_by_tag(tag))
            .ok_or_else(|| Error::syntax(SyntaxError::FieldDoesNotExist, Some(field.span)))
    }

    fn parse_date(&self, text: &str, span: Span) -> Result<DateTime<Utc>> {
        datetime::parse_date(text, &self.config.locale, self.time_zone)
            .ok_or_else(|| Error::syntax(SyntaxError::InvalidDate, Some(span)))
    }

    fn local_date_node(&self, dt: DateTime<Utc>, span: Span) -> Node {
        Node::string(datetime::format_round_trip_local(dt, self.time_zone), span)
    }

    // ========================================================================
    // Rewrites
    // ========================================================================

    fn optimize_condition(&self, node: Node, scope: &Scope<'_>) -> Result<Node> {
        let span = node.span;
        let parenthesized = node.parenthesized;
        let NodeKind::Condition(condition) = node.kind else {
            return Ok(node);
        };
        let ConditionNode {
            condition: op,
            left,
            right,
        } = *condition;

        if op == Condition::In {
            let NodeKind::ValueList(items) = right.kind else {
                return Err(Error::syntax(SyntaxError::ExpectingLeftBracket, Some(right.span)));
            };
            trace!(field = %left, count = items.len(), "expanding in list");
            let alternatives = items
                .into_iter()
                .map(|item| Node::condition(Condition::Equals, left.reference(), item))
                .collect();
            let mut or = Node::or(alternatives).with_span(span);
            or.parenthesized = parenthesized;
            return or.optimize(self, scope);
        }

        let right_string = right.const_string_value();

        if matches!(op, Condition::Contains | Condition::ContainsWords)
            && right_string.as_deref() == Some("")
        {
            return Ok(Node::bool_const(true, span));
        }

        let definition = self.definition(&left)?;

        if definition.id == core_fields::TEAM_PROJECT {
            if let Some(project) = right_string.as_deref().filter(|p| !p.is_empty()) {
                let area_path = self.area_path_field(&left)?;
                trace!(project, "rewriting team project to area path");
                let mut rewritten =
                    Node::condition(Condition::Under, area_path, Node::string(project, right.span))
                        .with_span(span);
                if op == Condition::NotEquals {
                    rewritten = Node::not(rewritten);
                }
                rewritten.parenthesized = parenthesized;
                rewritten.bind(self, scope)?;
                return Ok(rewritten);
            }
        }

        if is_non_nullable_field(definition.id)
            && op == Condition::NotEquals
            && right_string.as_deref() == Some("")
        {
            return Ok(Node::bool_const(true, span));
        }

        if self.config.day_precision && left.data_type == DataType::Date {
            if let Some(text) = right_string.as_deref().filter(|s| !s.is_empty()) {
                return self.split_day(op, left, right, text, span, parenthesized, scope);
            }
        }

        let mut node = Node::condition(op, left, right).with_span(span);
        node.parenthesized = parenthesized;
        Ok(node)
    }

    /// `[System.AreaPath]` carrying the prefix of the team project field
    fn area_path_field(&self, team_project: &FieldName) -> Result<FieldName> {
        let area_path = self
            .catalog
            .field_by_id(core_fields::AREA_PATH)
            .ok_or_else(|| Error::syntax(SyntaxError::FieldDoesNotExist, Some(team_project.span)))?;
        let mut field = FieldName::new(area_path.reference_name.clone(), team_project.span);
        field.prefix = team_project.prefix.clone();
        Ok(field)
    }

    /// Rewrite a date comparison so it covers whole days.
    #[allow(clippy::too_many_arguments)]
    fn split_day(
        &self,
        op: Condition,
        left: FieldName,
        right: Node,
        text: &str,
        span: Span,
        parenthesized: bool,
        scope: &Scope<'_>,
    ) -> Result<Node> {
        let date = self.parse_date(text, right.span)?;
        ensure_syntax(
            datetime::is_midnight(date, self.time_zone),
            SyntaxError::NonZeroTime,
            Some(span),
        )?;
        let next = datetime::add_days(date, 1, self.time_zone)
            .ok_or_else(|| Error::syntax(SyntaxError::InvalidDate, Some(right.span)))?;
        let start_day = self.local_date_node(date, right.span);
        let next_day = self.local_date_node(next, right.span);
        trace!(field = %left, "splitting date comparison into whole days");

        let mut node = match op {
            Condition::Equals => {
                let mut and = Node::and(vec![
                    Node::condition(Condition::GreaterOrEquals, left.reference(), start_day),
                    Node::condition(Condition::Less, left.reference(), next_day),
                ]);
                and.bind(self, scope)?;
                and
            }
            Condition::NotEquals => {
                let mut or = Node::or(vec![
                    Node::condition(Condition::Less, left.reference(), start_day),
                    Node::condition(Condition::GreaterOrEquals, left.reference(), next_day),
                ]);
                or.bind(self, scope)?;
                or
            }
            Condition::Less | Condition::GreaterOrEquals => Node::condition(op, left, start_day),
            Condition::Greater => Node::condition(Condition::GreaterOrEquals, left, next_day),
            Condition::LessOrEquals => Node::condition(Condition::Less, left, next_day),
            _ => return Err(Error::syntax(SyntaxError::InvalidConditionalOperator, Some(span))),
        };
        node.span = span;
        node.parenthesized = parenthesized;
        Ok(node)
    }

    fn inline_variable(&self, node: Node) -> Node {
        let span = node.span;
        let NodeKind::Variable(variable) = &node.kind else {
            return node;
        };
        let Some(tag) = variable.tag.as_ref() else {
            return node;
        };
        if let Some(value) = self.context.get(tag.as_str()) {
            return match value {
                ContextValue::Number(_) | ContextValue::Double(_) => {
                    Node::number(value.to_string(), span)
                }
                ContextValue::DateTime(dt) => self.local_date_node(*dt, span),
                ContextValue::String(s) => Node::string(s.clone(), span),
            };
        }
        match tag.as_str() {
            ME => Node::string(self.catalog.current_user.clone(), span),
            TODAY => self.local_date_node(datetime::today(self.time_zone), span),
            _ => node,
        }
    }

    fn fold_arithmetic(&self, node: Node, scope: &Scope<'_>) -> Result<Node> {
        let span = node.span;
        let NodeKind::Arithmetic(arithmetic) = &node.kind else {
            return Ok(node);
        };
        let NodeKind::Number(increment) = &arithmetic.right.kind else {
            return Err(Error::syntax(
                SyntaxError::WrongTypeForArithmeticRightOperand,
                Some(arithmetic.right.span),
            ));
        };
        let sign = match arithmetic.op {
            Arithmetic::Add => 1.0,
            Arithmetic::Subtract => -1.0,
            Arithmetic::None => {
                return Err(Error::syntax(SyntaxError::WrongTypeForArithmetic, Some(span)))
            }
        };

        match scope.field.map(|f| f.data_type) {
            None | Some(DataType::Numeric) => {
                let left = arithmetic
                    .left
                    .const_string_value()
                    .and_then(|s| s.trim().parse::<f64>().ok())
                    .ok_or_else(|| Error::syntax(SyntaxError::WrongTypeForArithmetic, Some(span)))?;
                let increment = parse_increment(increment, arithmetic.right.span)?;
                let value = left + sign * increment;
                ensure_syntax(value.is_finite(), SyntaxError::WrongTypeForArithmetic, Some(span))?;
                Ok(Node::number(value.to_string(), span))
            }
            Some(DataType::Date) => {
                let text = arithmetic
                    .left
                    .const_string_value()
                    .ok_or_else(|| Error::syntax(SyntaxError::WrongTypeForArithmetic, Some(span)))?;
                let date = self.parse_date(&text, arithmetic.left.span)?;
                let shifted = match increment.trim().parse::<i64>() {
                    Ok(days) => match arithmetic.op {
                        Arithmetic::Subtract => days.checked_neg(),
                        _ => Some(days),
                    }
                    .and_then(|days| datetime::add_days(date, days, self.time_zone)),
                    Err(_) => {
                        let days = parse_increment(increment, arithmetic.right.span)?;
                        datetime::add_fractional_days(date, sign * days)
                    }
                }
                .ok_or_else(|| Error::syntax(SyntaxError::InvalidDate, Some(span)))?;
                Ok(self.local_date_node(shifted, span))
            }
            Some(_) => Ok(node),
        }
    }

    // ========================================================================
    // Verification
    // ========================================================================

    fn verify_condition(
        &self,
        left: &FieldName,
        right: &Node,
        op: Condition,
        span: Span,
        mode: LinkQueryMode,
    ) -> Result<()> {
        ensure_syntax(op != Condition::None, SyntaxError::InvalidConditionalOperator, Some(span))?;
        let definition = self.definition(left)?;

        if let NodeKind::FieldName(other) = &right.kind {
            if !self.config.supports_field_comparison {
                return Err(Error::NotSupported(
                    "服务器不支持字段之间的比较".to_string(),
                ));
            }
            if mode.is_link_query() {
                ensure_syntax(
                    left.prefix_str().eq_ignore_ascii_case(other.prefix_str()),
                    SyntaxError::FieldConditionsInLinkQueries,
                    Some(span),
                )?;
            }
            let other_definition = self.definition(other)?;
            ensure_syntax(
                !definition.field_type.is_long_text() && !other_definition.field_type.is_long_text(),
                SyntaxError::InvalidFieldTypeForCondition,
                Some(span),
            )?;
            return Ok(());
        }

        if op == Condition::In {
            if let NodeKind::ValueList(items) = &right.kind {
                for item in items {
                    self.verify_condition(left, item, Condition::Equals, span, mode)?;
                }
            }
            return Ok(());
        }

        if op == Condition::Group && definition.id != core_fields::WORK_ITEM_TYPE {
            if !self.config.supports_in_group {
                return Err(Error::NotSupported(
                    "服务器不支持 'in group'".to_string(),
                ));
            }
            if definition.field_type != FieldType::String {
                return Err(Error::NotSupported(format!(
                    "'in group' 不能用于字段 '{}'，只能用于字符串字段",
                    definition.name
                )));
            }
        }

        let right_string = right.const_string_value();

        if right_string.as_deref() == Some("") {
            ensure_syntax(
                matches!(op, Condition::Equals | Condition::NotEquals),
                SyntaxError::InvalidConditionForEmptyString,
                Some(span),
            )?;
        }

        match definition.field_type {
            FieldType::TreePath => {
                ensure_syntax(
                    matches!(op, Condition::Equals | Condition::NotEquals | Condition::Under),
                    SyntaxError::InvalidConditionForTreeField,
                    Some(span),
                )?;
                ensure_syntax(
                    right.data_type() == DataType::String,
                    SyntaxError::PathMustBeAStringNotStartingWithBackslash,
                    Some(right.span),
                )?;
                if let Some(path) = right_string.as_deref() {
                    if !path.is_empty() || op == Condition::Under {
                        ensure_syntax(
                            !path.starts_with('\\'),
                            SyntaxError::PathMustBeAStringNotStartingWithBackslash,
                            Some(right.span),
                        )?;
                        let kind = if definition.id == core_fields::AREA_PATH {
                            TreeKind::Area
                        } else {
                            TreeKind::Iteration
                        };
                        ensure_syntax(
                            self.catalog.tree_id(path, kind).is_some(),
                            SyntaxError::TreePathIsNotFoundInHierarchy,
                            Some(right.span),
                        )?;
                    }
                }
            }
            field_type if field_type.is_long_text() => {
                if let Some(pattern) = right_string.as_deref() {
                    ensure_syntax(
                        matches!(op, Condition::Contains | Condition::ContainsWords),
                        SyntaxError::InvalidConditionForLongTextField,
                        Some(span),
                    )?;
                    ensure_syntax(
                        !pattern.trim().is_empty(),
                        SyntaxError::InvalidLongTextSearchForWhitespace,
                        Some(span),
                    )?;
                }
            }
            FieldType::String if definition.id == core_fields::TEAM_PROJECT => {
                ensure_syntax(
                    matches!(op, Condition::Equals | Condition::NotEquals),
                    SyntaxError::InvalidConditionForNodeField,
                    Some(span),
                )?;
                if let Some(project) = right_string.as_deref().filter(|p| !p.is_empty()) {
                    ensure_syntax(
                        !project.contains('\\'),
                        SyntaxError::InvalidProjectName,
                        Some(right.span),
                    )?;
                    ensure_syntax(
                        self.catalog.tree_id(project, TreeKind::Area).is_some(),
                        SyntaxError::ProjectNotFound,
                        Some(right.span),
                    )?;
                }
            }
            _ if definition.id == core_fields::LINK_TYPE => {
                ensure_syntax(
                    matches!(op, Condition::Equals | Condition::NotEquals),
                    SyntaxError::InvalidConditionForLinkType,
                    Some(span),
                )?;
                if let Some(name) = right_string.as_deref() {
                    if !(name.is_empty() && op == Condition::NotEquals) {
                        let end = self.catalog.link_type_end(name).ok_or_else(|| {
                            Error::syntax(SyntaxError::InvalidLinkTypeName, Some(right.span))
                        })?;
                        if mode == LinkQueryMode::LinksRecursive {
                            ensure_syntax(
                                end.topology == LinkTopology::Tree && end.is_forward,
                                SyntaxError::InvalidLinkTypeNameRecursive,
                                Some(right.span),
                            )?;
                        }
                    }
                }
            }
            FieldType::Integer => {
                if let Some(value) = right_string.as_deref().filter(|v| !v.is_empty()) {
                    ensure_syntax(
                        is_integer_literal(value),
                        SyntaxError::IncompatibleRightConst,
                        Some(right.span),
                    )?;
                }
            }
            _ => {}
        }

        if op == Condition::Under {
            ensure_syntax(
                definition.field_type == FieldType::TreePath,
                SyntaxError::UnderCanBeUsedForTreePathFieldOnly,
                Some(left.span),
            )?;
        }
        Ok(())
    }

    fn verify_ever(&self, node: &Node) -> Result<()> {
        let NodeKind::Ever(child) = &node.kind else {
            return Ok(());
        };
        let condition = child.as_condition().ok_or_else(|| {
            Error::syntax(SyntaxError::TooComplexEverOperator, Some(node.span))
        })?;
        ensure_syntax(
            matches!(
                condition.condition,
                Condition::Equals | Condition::Contains | Condition::ContainsWords
            ),
            SyntaxError::EverNotEqualOperator,
            Some(child.span),
        )?;
        if condition.left.data_type == DataType::Date && self.config.day_precision {
            ensure_syntax(
                condition.right.const_string_value().as_deref() == Some(""),
                SyntaxError::EverWithDatePrecision,
                Some(child.span),
            )?;
        }
        let definition = self.definition(&condition.left)?;
        ensure_syntax(
            !definition.is_link_field(),
            SyntaxError::EverWithLinkQuery,
            Some(node.span),
        )
    }

    fn verify_field_list(&self, list: &FieldList) -> Result<()> {
        match list.kind {
            FieldListKind::Select => {
                for field in &list.fields {
                    ensure_syntax(
                        self.definition(field)?.queryable,
                        SyntaxError::NonQueryableField,
                        Some(field.span),
                    )?;
                }
            }
            FieldListKind::Order => {
                for (i, field) in list.fields.iter().enumerate() {
                    let definition = self.definition(field)?;
                    ensure_syntax(
                        !list.fields[..i].iter().any(|earlier| earlier.tag == field.tag),
                        SyntaxError::DuplicateOrderByField,
                        Some(field.span),
                    )?;
                    ensure_syntax(
                        !definition.is_link_field(),
                        SyntaxError::OrderByLinkField,
                        Some(field.span),
                    )?;
                    ensure_syntax(
                        definition.sortable,
                        SyntaxError::NonSortableField,
                        Some(field.span),
                    )?;
                }
            }
            FieldListKind::Group => {}
        }
        Ok(())
    }

    fn verify_select(&self, select: &Select) -> Result<()> {
        let table = select
            .from
            .as_ref()
            .filter(|t| t.tag.is_some())
            .ok_or_else(|| Error::syntax(SyntaxError::ExpectingTableName, Some(select.span)))?;
        if let Some(group_by) = &select.group_by {
            return Err(Error::syntax(SyntaxError::GroupByIsNotSupported, Some(group_by.span)));
        }
        if table.mode() == LinkQueryMode::LinksRecursive {
            if let Some(as_of) = &select.as_of {
                return Err(Error::syntax(SyntaxError::NotSupportedTreeQuery, Some(as_of.span)));
            }
        }
        Ok(())
    }
}

impl SchemaProvider for WiqlAdapter<'_> {
    fn find_field(
        &self,
        name: &str,
        _prefix: Option<&str>,
        _table: Option<&TableName>,
    ) -> Result<Option<FieldTag>> {
        Ok(self.catalog.field(name).map(FieldDefinition::tag))
    }

    fn find_table(&self, name: &str) -> Result<Option<LinkQueryMode>> {
        let mode = table_mode(name);
        if mode == LinkQueryMode::Unknown {
            return Ok(None);
        }
        if mode.is_link_query() && !self.config.supports_link_queries {
            return Err(Error::NotSupported(
                "服务器不支持链接查询".to_string(),
            ));
        }
        Ok(Some(mode))
    }

    fn find_variable(&self, name: &str) -> Option<VariableTag> {
        if self.context.contains_key(name) {
            Some(VariableTag::new(name))
        } else if name.eq_ignore_ascii_case(ME) {
            Some(VariableTag::new(ME))
        } else if name.eq_ignore_ascii_case(TODAY) {
            Some(VariableTag::new(TODAY))
        } else if self.config.server_side_macros {
            trace!(name, "leaving macro to the server");
            self.server_macros.borrow_mut().insert(name.to_string());
            Some(VariableTag::new(name))
        } else {
            None
        }
    }

    fn field_data_type(&self, tag: FieldTag) -> DataType {
        self.catalog
            .field_by_tag(tag)
            .map(FieldDefinition::data_type)
            .unwrap_or_default()
    }

    fn variable_data_type(&self, tag: &VariableTag) -> DataType {
        if let Some(value) = self.context.get(tag.as_str()) {
            return value.data_type();
        }
        match tag.as_str() {
            ME => DataType::String,
            TODAY => DataType::Date,
            _ => DataType::Unknown,
        }
    }

    /// Link queries address work item fields through `Source` or `Target`;
    /// unprefixed work item fields belong to the source. Link fields and
    /// work item queries take no prefix.
    fn field_prefix(&self, field: &FieldName, table: Option<&TableName>) -> Result<Option<String>> {
        let mode = table.map(TableName::mode).unwrap_or_default();
        let definition = self.definition(field)?;
        let invalid = || Error::syntax(SyntaxError::InvalidFieldPrefix, Some(field.span));

        if !mode.is_link_query() || definition.is_link_field() {
            return match field.prefix {
                Some(_) => Err(invalid()),
                None => Ok(None),
            };
        }
        match field.prefix.as_deref() {
            None => Ok(Some(SOURCE_PREFIX.to_string())),
            Some(p) if p.eq_ignore_ascii_case(SOURCE_PREFIX) => Ok(Some(SOURCE_PREFIX.to_string())),
            Some(p) if p.eq_ignore_ascii_case(TARGET_PREFIX) => Ok(Some(TARGET_PREFIX.to_string())),
            Some(_) => Err(invalid()),
        }
    }

    fn optimize_node(&self, node: Node, scope: &Scope<'_>) -> Result<Node> {
        match node.kind {
            NodeKind::Condition(_) => self.optimize_condition(node, scope),
            NodeKind::Variable(_) => Ok(self.inline_variable(node)),
            NodeKind::Arithmetic(_) => self.fold_arithmetic(node, scope),
            _ => Ok(node),
        }
    }

    fn verify_node(&self, node: NodeRef<'_>, scope: &Scope<'_>) -> Result<()> {
        match node {
            NodeRef::Expr(expr) => match &expr.kind {
                NodeKind::Condition(condition) => self.verify_condition(
                    &condition.left,
                    &condition.right,
                    condition.condition,
                    expr.span,
                    scope.mode(),
                ),
                NodeKind::Ever(_) => self.verify_ever(expr),
                NodeKind::Arithmetic(arithmetic) => {
                    ensure_syntax(
                        arithmetic.left.can_cast_to(DataType::Date, self)
                            || arithmetic.left.can_cast_to(DataType::Numeric, self),
                        SyntaxError::WrongTypeForArithmetic,
                        Some(expr.span),
                    )?;
                    ensure_syntax(
                        arithmetic.right.data_type() == DataType::Numeric,
                        SyntaxError::WrongTypeForArithmeticRightOperand,
                        Some(expr.span),
                    )
                }
                _ => Ok(()),
            },
            NodeRef::FieldList(list) => self.verify_field_list(list),
            NodeRef::Select(select) => self.verify_select(select),
            NodeRef::Field(_) | NodeRef::Table(_) | NodeRef::Mode(_) => Ok(()),
        }
    }

    fn locale(&self) -> &str {
        &self.config.locale
    }

    fn time_zone(&self) -> Tz {
        self.time_zone
    }
}

/// Fields that always have a value
pub fn is_non_nullable_field(id: i32) -> bool {
    matches!(
        id,
        core_fields::WORK_ITEM_TYPE | core_fields::STATE | core_fields::LINK_TYPE
    )
}

fn is_integer_literal(text: &str) -> bool {
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn parse_increment(text: &str, span: Span) -> Result<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| Error::syntax(SyntaxError::WrongTypeForArithmeticRightOperand, Some(span)))
}
