//! Query document generator
//!
//! Renders a bound, optimized [`Select`] into the XML query document the
//! work item server executes: a `Query` element for work item queries and a
//! `LinksQuery` element with left, link and right sub-queries for link
//! queries. `not` and `ever` never appear as elements; they are folded into
//! the operator of each leaf expression.

use crate::config::CompilerConfig;
use crate::error::{ensure_syntax, Error, Result, SyntaxError};
use crate::query::ast::*;
use crate::query::datetime;
use crate::query::operators::{operator_class, Condition};
use crate::schema::{core_fields, Catalog, ContextValue, FieldDefinition, TreeKind};
use crate::types::{DataType, Direction, FieldType, LinkQueryMode, Span};
use chrono_tz::Tz;
use indexmap::IndexMap;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, trace};

const TARGET_PREFIX: &str = "Target";

// ============================================================================
// XML tree
// ============================================================================

/// Element of a generated document
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct XmlElement {
    pub name: String,
    /// Attributes in insertion order
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    pub text: Option<String>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Element holding only text
    pub fn text_element(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Set an attribute, replacing an earlier value of the same name
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn push(&mut self, child: XmlElement) {
        self.children.push(child);
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.push(child);
        self
    }

    /// First child with the given name
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Render as indented XML text.
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        self.write(&mut writer)?;
        String::from_utf8(writer.into_inner())
            .map_err(|e| Error::XmlError(e.to_string()))
    }

    fn write<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (name, value) in &self.attributes {
            start.push_attribute((name.as_str(), value.as_str()));
        }

        if self.children.is_empty() && self.text.is_none() {
            return write_event(writer, Event::Empty(start));
        }

        write_event(writer, Event::Start(start))?;
        if let Some(text) = &self.text {
            write_event(writer, Event::Text(BytesText::new(text)))?;
        }
        for child in &self.children {
            child.write(writer)?;
        }
        write_event(writer, Event::End(BytesEnd::new(self.name.as_str())))
    }
}

fn write_event<W: std::io::Write>(writer: &mut Writer<W>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| Error::XmlError(e.to_string()))
}

// ============================================================================
// Field lists
// ============================================================================

/// Column of the `order by` list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortField {
    pub reference_name: String,
    pub direction: Direction,
}

// ============================================================================
// Generator
// ============================================================================

/// `where` operands split by the work item they constrain
#[derive(Debug, Default)]
pub struct WhereGroups<'a> {
    pub source: Vec<&'a Node>,
    pub link: Vec<&'a Node>,
    pub target: Vec<&'a Node>,
}

/// Query document generator
pub struct DocumentGenerator<'a> {
    catalog: &'a Catalog,
    product: &'a str,
    locale: &'a str,
    time_zone: Tz,
}

impl<'a> DocumentGenerator<'a> {
    pub fn new(catalog: &'a Catalog, config: &'a CompilerConfig) -> Result<Self> {
        let product = if config.product.is_empty() {
            catalog.product.as_str()
        } else {
            config.product.as_str()
        };
        Ok(Self {
            catalog,
            product,
            locale: &config.locale,
            time_zone: config.tz()?,
        })
    }

    /// Document for any bound query, chosen by its query mode.
    pub fn document(&self, select: &Select) -> Result<XmlElement> {
        if select.is_link_query() {
            self.link_query(select)
        } else {
            self.work_item_query(select)
        }
    }

    /// `Query` document of a work item query
    pub fn work_item_query(&self, select: &Select) -> Result<XmlElement> {
        ensure_syntax(
            select.query_mode() == LinkQueryMode::WorkItems,
            SyntaxError::IncorrectQueryMethod,
            select.from.as_ref().map(|t| t.span),
        )?;

        let mut root = XmlElement::new("Query").with_attribute("Product", self.product);
        let expression = match &select.where_clause {
            Some(node) => self.expression(node, false, false)?,
            None => self.expression(&Node::bool_const(true, select.span), false, false)?,
        };
        root.push(expression);
        self.set_as_of(&mut root, select)?;

        debug!(product = self.product, "generated work item query document");
        Ok(root)
    }

    /// `LinksQuery` document of a link query
    pub fn link_query(&self, select: &Select) -> Result<XmlElement> {
        let mode = select.query_mode();
        let query_type = match mode {
            LinkQueryMode::LinksMustContain => "mustContain",
            LinkQueryMode::LinksMayContain | LinkQueryMode::LinksRecursive => "mayContain",
            LinkQueryMode::LinksDoesNotContain => "doesNotContain",
            _ => {
                return Err(Error::syntax(
                    SyntaxError::IncorrectQueryMethod,
                    select.from.as_ref().map(|t| t.span),
                ))
            }
        };

        let mut root = XmlElement::new("LinksQuery")
            .with_attribute("Product", self.product)
            .with_attribute("Type", query_type);
        let groups = self.where_groups(select)?;

        if !groups.source.is_empty() {
            root.push(XmlElement::new("LeftQuery").with_child(self.group(&groups.source)?));
        }

        if mode == LinkQueryMode::LinksRecursive {
            let link_type = self.recursive_link_type(&groups.link, select.span)?;
            root.set_attribute("Recursive", link_type.to_string());
        } else if !groups.link.is_empty() {
            root.push(XmlElement::new("LinkQuery").with_child(self.group(&groups.link)?));
        }

        if !groups.target.is_empty() {
            root.push(XmlElement::new("RightQuery").with_child(self.group(&groups.target)?));
        }
        self.set_as_of(&mut root, select)?;

        debug!(
            query_type,
            source = groups.source.len(),
            link = groups.link.len(),
            target = groups.target.len(),
            "generated link query document"
        );
        Ok(root)
    }

    /// Document carrying the query text for evaluation on the server
    pub fn raw_wiql(
        &self,
        wiql: &str,
        context: &IndexMap<String, ContextValue>,
        is_link_query: bool,
        day_precision: bool,
    ) -> XmlElement {
        let mut root = XmlElement::new(if is_link_query { "LinksQuery" } else { "Query" })
            .with_attribute("Product", "")
            .with_child(XmlElement::text_element("Wiql", wiql))
            .with_child(XmlElement::text_element(
                "DayPrecision",
                if day_precision { "true" } else { "false" },
            ));
        for (key, value) in context {
            root.push(
                XmlElement::new("Context")
                    .with_attribute("Key", key.as_str())
                    .with_attribute("Value", value.to_string())
                    .with_attribute("ValueType", value.value_type()),
            );
        }
        root
    }

    /// Reference names of the result columns
    pub fn display_fields(&self, select: &Select) -> Vec<String> {
        match &select.fields {
            Some(list) => list
                .fields
                .iter()
                .filter_map(|f| self.definition(f).ok())
                .map(|d| d.reference_name.clone())
                .collect(),
            None if select.is_link_query() => [core_fields::ID, core_fields::LINK_TYPE]
                .iter()
                .filter_map(|id| self.catalog.field_by_id(*id))
                .map(|d| d.reference_name.clone())
                .collect(),
            None => self
                .catalog
                .work_item_fields()
                .map(|d| d.reference_name.clone())
                .collect(),
        }
    }

    /// `order by` columns; an unspecified direction sorts ascending
    pub fn sort_fields(&self, select: &Select) -> Vec<SortField> {
        let Some(list) = &select.order_by else {
            return Vec::new();
        };
        list.fields
            .iter()
            .filter_map(|field| {
                let definition = self.definition(field).ok()?;
                Some(SortField {
                    reference_name: definition.reference_name.clone(),
                    direction: match field.direction {
                        Direction::Descending => Direction::Descending,
                        _ => Direction::Ascending,
                    },
                })
            })
            .collect()
    }

    /// Split the top-level `and` operands of a link query by prefix.
    /// An operand mixing source, target and link fields cannot be split.
    pub fn where_groups<'s>(&self, select: &'s Select) -> Result<WhereGroups<'s>> {
        let mut groups = WhereGroups::default();
        let Some(where_clause) = &select.where_clause else {
            return Ok(groups);
        };
        let operands: Vec<&Node> = match &where_clause.kind {
            NodeKind::And(items) => items.iter().collect(),
            _ => vec![where_clause],
        };

        for operand in operands {
            let mut prefixes = BTreeSet::new();
            collect_prefixes(operand, &mut prefixes);
            ensure_syntax(prefixes.len() <= 1, SyntaxError::MixedPrefixes, Some(operand.span))?;
            match prefixes.into_iter().next() {
                Some(p) if p.is_empty() => groups.link.push(operand),
                Some(p) if p.eq_ignore_ascii_case(TARGET_PREFIX) => groups.target.push(operand),
                _ => groups.source.push(operand),
            }
        }
        Ok(groups)
    }

    /// Link type ends a link-scope condition admits, `None` when it does not
    /// constrain the link type.
    pub fn link_types(&self, node: &Node) -> Result<Option<BTreeSet<i32>>> {
        match &node.kind {
            NodeKind::Condition(condition) => {
                let definition = self.definition(&condition.left)?;
                if definition.id != core_fields::LINK_TYPE {
                    return Ok(None);
                }
                let id = self.link_type_id(&condition.right)?;
                match condition.condition {
                    Condition::Equals => Ok(Some(BTreeSet::from([id]))),
                    Condition::NotEquals => Ok(Some(self.all_link_types_except(&BTreeSet::from([id])))),
                    _ => Err(Error::syntax(SyntaxError::InvalidConditionForLinkType, Some(node.span))),
                }
            }
            NodeKind::And(items) => self.intersect_link_types(items.iter()),
            NodeKind::Not(child) => Ok(self
                .link_types(child)?
                .map(|inner| self.all_link_types_except(&inner))),
            _ => Err(Error::syntax(SyntaxError::InvalidConditionForLinkType, Some(node.span))),
        }
    }

    fn intersect_link_types<'n>(
        &self,
        nodes: impl Iterator<Item = &'n Node>,
    ) -> Result<Option<BTreeSet<i32>>> {
        let mut result: Option<BTreeSet<i32>> = None;
        for node in nodes {
            if let Some(types) = self.link_types(node)? {
                result = Some(match result {
                    Some(current) => current.intersection(&types).copied().collect(),
                    None => types,
                });
            }
        }
        Ok(result)
    }

    fn all_link_types_except(&self, excluded: &BTreeSet<i32>) -> BTreeSet<i32> {
        self.catalog
            .link_types
            .iter()
            .map(|end| end.id)
            .filter(|id| !excluded.contains(id))
            .collect()
    }

    fn recursive_link_type(&self, link_group: &[&Node], span: Span) -> Result<i32> {
        let types = self.intersect_link_types(link_group.iter().copied())?;
        match types {
            Some(types) if types.len() == 1 => types
                .into_iter()
                .next()
                .ok_or_else(|| Error::syntax(SyntaxError::TreeQueryNeedsOneLinkType, Some(span))),
            _ => Err(Error::syntax(SyntaxError::TreeQueryNeedsOneLinkType, Some(span))),
        }
    }

    fn link_type_id(&self, value: &Node) -> Result<i32> {
        value
            .const_string_value()
            .and_then(|name| self.catalog.link_type_end(&name))
            .map(|end| end.id)
            .ok_or_else(|| Error::syntax(SyntaxError::InvalidLinkTypeName, Some(value.span)))
    }

    fn definition(&self, field: &FieldName) -> Result<&'a FieldDefinition> {
        field
            .tag
            .and_then(|tag| self.catalog.field_by_tag(tag))
            .ok_or_else(|| Error::syntax(SyntaxError::FieldDoesNotExist, Some(field.span)))
    }

    fn set_as_of(&self, root: &mut XmlElement, select: &Select) -> Result<()> {
        let Some(as_of) = &select.as_of else {
            return Ok(());
        };
        let date = as_of
            .const_string_value()
            .and_then(|text| datetime::parse_date(&text, self.locale, self.time_zone))
            .ok_or_else(|| Error::syntax(SyntaxError::InvalidDate, Some(as_of.span)))?;
        root.set_attribute("AsOf", datetime::format_round_trip_universal(date));
        Ok(())
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    /// Operands of one where group, joined by `and`
    fn group(&self, nodes: &[&Node]) -> Result<XmlElement> {
        if let [node] = nodes {
            return self.expression(node, false, false);
        }
        let mut group = XmlElement::new("Group").with_attribute("GroupOperator", "and");
        for node in nodes {
            group.push(self.expression(node, false, false)?);
        }
        Ok(group)
    }

    fn expression(&self, node: &Node, not: bool, ever: bool) -> Result<XmlElement> {
        match &node.kind {
            NodeKind::And(items) | NodeKind::Or(items) => {
                let is_or = matches!(node.kind, NodeKind::Or(_));
                let operator = if is_or == not { "and" } else { "or" };
                let mut group = XmlElement::new("Group").with_attribute("GroupOperator", operator);
                for item in items {
                    group.push(self.expression(item, not, ever)?);
                }
                Ok(group)
            }
            NodeKind::Not(child) => self.expression(child, !not, ever),
            NodeKind::Ever(child) => self.expression(child, not, true),
            NodeKind::BoolConst(value) => {
                let operator = if *value == not { "equals" } else { "notEquals" };
                Ok(XmlElement::new("Expression")
                    .with_attribute("Column", "System.Id")
                    .with_attribute("Operator", operator)
                    .with_child(XmlElement::text_element("Number", "0")))
            }
            NodeKind::Condition(condition) => self.condition(condition, node.span, not, ever),
            _ => Err(Error::syntax(SyntaxError::InvalidNodeType, Some(node.span))),
        }
    }

    fn condition(
        &self,
        condition: &ConditionNode,
        span: Span,
        not: bool,
        mut ever: bool,
    ) -> Result<XmlElement> {
        let left = &condition.left;
        let original = self.definition(left)?;
        let mut column = original;
        let mut right = condition.right.clone();

        match original.id {
            core_fields::AREA_PATH => {
                column = self.core_field(core_fields::AREA_ID, left.span)?;
                right = self.tree_id_value(right, TreeKind::Area)?;
            }
            core_fields::ITERATION_PATH => {
                column = self.core_field(core_fields::ITERATION_ID, left.span)?;
                right = self.tree_id_value(right, TreeKind::Iteration)?;
            }
            core_fields::LINK_TYPE => {
                let id = self.link_type_id(&right)?;
                right = Node::number(id.to_string(), right.span);
            }
            _ => {}
        }

        let op = condition.condition;
        if matches!(op, Condition::Contains | Condition::ContainsWords)
            && column.id == core_fields::HISTORY
        {
            ever = true;
        }
        let operator = operator_class(op, not, ever)
            .ok_or_else(|| Error::syntax(SyntaxError::InvalidConditionalOperator, Some(span)))?;

        let mut element = XmlElement::new("Expression")
            .with_attribute("Column", column.reference_name.as_str())
            .with_attribute("FieldType", original.field_type.code().to_string())
            .with_attribute("Operator", operator);

        match op {
            Condition::Contains | Condition::ContainsWords => {
                element.push(XmlElement::text_element("String", self.const_text(&right)?));
            }
            Condition::Group => {
                element.set_attribute("ExpandConstant", "true");
                element.push(XmlElement::text_element("String", self.const_text(&right)?));
            }
            _ => {
                let value = if let NodeKind::FieldName(field) = &right.kind {
                    let other = self.definition(field)?;
                    XmlElement::text_element("Column", other.reference_name.as_str())
                } else if left.data_type == DataType::Date {
                    let text = self.const_text(&right)?;
                    let text = if text.is_empty() {
                        text
                    } else {
                        let date = datetime::parse_date(&text, self.locale, self.time_zone)
                            .ok_or_else(|| Error::syntax(SyntaxError::InvalidDate, Some(right.span)))?;
                        datetime::format_round_trip_universal(date)
                    };
                    XmlElement::text_element("DateTime", text)
                } else if left.data_type == DataType::Guid {
                    XmlElement::text_element("Guid", self.const_text(&right)?)
                } else {
                    self.value(&right, column.field_type == FieldType::Integer)?
                };
                element.push(value);
            }
        }
        Ok(element)
    }

    fn core_field(&self, id: i32, span: Span) -> Result<&'a FieldDefinition> {
        self.catalog
            .field_by_id(id)
            .ok_or_else(|| Error::syntax(SyntaxError::FieldDoesNotExist, Some(span)))
    }

    /// Replace a non-empty tree path by the id of its node.
    fn tree_id_value(&self, right: Node, kind: TreeKind) -> Result<Node> {
        let path = self.const_text(&right)?;
        if path.is_empty() {
            return Ok(right);
        }
        let id = self
            .catalog
            .tree_id(&path, kind)
            .ok_or_else(|| Error::syntax(SyntaxError::TreePathIsNotFoundInHierarchy, Some(right.span)))?;
        trace!(path = path.as_str(), id, "resolved tree path");
        Ok(Node::number(id.to_string(), right.span))
    }

    fn const_text(&self, node: &Node) -> Result<String> {
        node.const_string_value()
            .ok_or_else(|| Error::syntax(SyntaxError::ExpectingValue, Some(node.span)))
    }

    /// Typed constant; numbers are `Number` only for integer columns.
    fn value(&self, node: &Node, integer_column: bool) -> Result<XmlElement> {
        match &node.kind {
            NodeKind::String(s) => Ok(XmlElement::text_element("String", s.as_str())),
            NodeKind::Number(n) => Ok(XmlElement::text_element(
                if integer_column { "Number" } else { "String" },
                n.as_str(),
            )),
            NodeKind::BoolValue(b) => {
                Ok(XmlElement::text_element("Number", if *b { "1" } else { "0" }))
            }
            NodeKind::FieldName(field) => Ok(XmlElement::text_element(
                "Column",
                self.definition(field)?.reference_name.as_str(),
            )),
            _ => Err(Error::syntax(SyntaxError::InvalidNodeType, Some(node.span))),
        }
    }
}

/// Prefixes of every field under `node`; link fields contribute `""`.
fn collect_prefixes(node: &Node, prefixes: &mut BTreeSet<String>) {
    match &node.kind {
        NodeKind::FieldName(field) => {
            prefixes.insert(field.prefix_str().to_string());
        }
        NodeKind::Condition(condition) => {
            prefixes.insert(condition.left.prefix_str().to_string());
            collect_prefixes(&condition.right, prefixes);
        }
        _ => {
            for child in node.children() {
                collect_prefixes(child, prefixes);
            }
        }
    }
}
