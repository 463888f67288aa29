//! WIQL Parser
//!
//! Recursive-descent parser over the token stream produced by the lexer.
//!
//! ```text
//! select     := 'select' ('*' | fieldList) clause*
//! clause     := 'from' tableName
//!             | 'where' orExpr
//!             | 'group' 'by' fieldList
//!             | 'order' 'by' fieldList(withDirection)
//!             | 'asof' value
//!             | 'mode' '(' name (',' name)* ')'
//! orExpr     := andExpr (('or'|'||') andExpr)*
//! andExpr    := notExpr (('and'|'&&') notExpr)*
//! notExpr    := ('not'|'!') notExpr | 'ever' notExpr | 'never' notExpr | condition
//! condition  := '(' orExpr ')' | fieldName (not|ever|never)* comparisonOp rhs
//! expression := value (('+'|'-') value)*
//! ```
//!
//! The first mismatch aborts the parse; errors carry the span of the token at
//! the failure position, or no span at end of input.

use crate::error::{Error, Result, SyntaxError};
use crate::query::ast::*;
use crate::query::lexer::{tokenize, Token, TokenKind};
use crate::query::operators::{Arithmetic, Condition};
use crate::types::{Direction, Span};
use smallvec::SmallVec;

/// Nesting limit for parentheses, prefix operators and arithmetic chains.
pub const MAX_NESTING_DEPTH: usize = 128;

/// WIQL Parser
pub struct WiqlParser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl WiqlParser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    /// Parse a whole `select` statement and require the input to be consumed.
    pub fn parse(&mut self) -> Result<Select> {
        let select = self.parse_select()?;
        self.check_tail()?;
        Ok(select)
    }

    /// Fail unless every token has been consumed.
    pub fn check_tail(&self) -> Result<()> {
        match self.peek() {
            Some(token) if !(token.kind == TokenKind::Operation && token.value.is_empty()) => {
                Err(self.error(SyntaxError::ExpectingEndOfString))
            }
            _ => Ok(()),
        }
    }

    // ========================================================================
    // Select Statement
    // ========================================================================

    fn parse_select(&mut self) -> Result<Select> {
        let select_token = self.expect_keyword("select", SyntaxError::ExpectingSelect)?;
        let mut select = Select::default();

        if self.try_operation("*").is_none() {
            select.fields = Some(self.parse_field_list(FieldListKind::Select)?);
        }

        loop {
            if self.try_keyword("from").is_some() {
                self.reject_duplicate(select.from.is_some(), SyntaxError::DuplicateFrom)?;
                select.from = Some(self.parse_table_name()?);
            } else if self.try_keyword("where").is_some() {
                self.reject_duplicate(select.where_clause.is_some(), SyntaxError::DuplicateWhere)?;
                select.where_clause = Some(self.parse_or()?);
            } else if self.try_keyword("group").is_some() {
                self.expect_keyword("by", SyntaxError::ExpectingBy)?;
                self.reject_duplicate(select.group_by.is_some(), SyntaxError::DuplicateGroupBy)?;
                select.group_by = Some(self.parse_field_list(FieldListKind::Group)?);
            } else if self.try_keyword("order").is_some() {
                self.expect_keyword("by", SyntaxError::ExpectingBy)?;
                self.reject_duplicate(select.order_by.is_some(), SyntaxError::DuplicateOrderBy)?;
                select.order_by = Some(self.parse_field_list(FieldListKind::Order)?);
            } else if self.try_keyword("asof").is_some() {
                self.reject_duplicate(select.as_of.is_some(), SyntaxError::DuplicateAsOf)?;
                select.as_of = Some(self.parse_value()?);
            } else if self.try_keyword("mode").is_some() {
                self.reject_duplicate(select.mode.is_some(), SyntaxError::DuplicateMode)?;
                select.mode = Some(self.parse_mode()?);
            } else {
                break;
            }
        }

        let end = self.tokens.last().map(|t| t.span).unwrap_or(select_token.span);
        select.span = select_token.span.to(end);
        Ok(select)
    }

    /// A repeated clause is reported at its keyword.
    fn reject_duplicate(&mut self, seen: bool, kind: SyntaxError) -> Result<()> {
        if seen {
            self.pos -= 1;
            return Err(self.error(kind));
        }
        Ok(())
    }

    fn parse_table_name(&mut self) -> Result<TableName> {
        match self.peek() {
            Some(token) if token.is_name() => {
                let table = TableName::new(token.value.clone(), token.span);
                self.pos += 1;
                Ok(table)
            }
            _ => Err(self.error(SyntaxError::ExpectingTableName)),
        }
    }

    fn parse_field_list(&mut self, kind: FieldListKind) -> Result<FieldList> {
        let mut list = FieldList::new(kind);
        loop {
            let mut field = self.parse_field_name()?;
            if kind == FieldListKind::Order {
                if let Some(token) = self.try_keyword("asc") {
                    field.direction = Direction::Ascending;
                    field.span = field.span.to(token.span);
                } else if let Some(token) = self.try_keyword("desc") {
                    field.direction = Direction::Descending;
                    field.span = field.span.to(token.span);
                }
            }
            list.fields.push(field);
            if self.try_operation(",").is_none() {
                break;
            }
        }
        if let (Some(first), Some(last)) = (list.fields.first(), list.fields.last()) {
            list.span = first.span.to(last.span);
        }
        Ok(list)
    }

    fn parse_mode(&mut self) -> Result<ModeList> {
        let open = self.expect_operation("(", SyntaxError::ExpectingLeftBracket)?;
        let mut items = Vec::new();
        loop {
            match self.peek() {
                Some(token) if token.is_name() => {
                    items.push(ModeItem {
                        name: token.value.clone(),
                        span: token.span,
                    });
                    self.pos += 1;
                }
                _ => return Err(self.error(SyntaxError::ExpectingMode)),
            }
            if self.try_operation(",").is_none() {
                break;
            }
        }
        let close = self.expect_operation(")", SyntaxError::ExpectingRightBracket)?;
        Ok(ModeList {
            items,
            span: open.span.to(close.span),
        })
    }

    // ========================================================================
    // Where Clause
    // ========================================================================

    fn parse_or(&mut self) -> Result<Node> {
        let first = self.parse_and()?;
        let mut items = vec![first];
        while self.try_keyword("or").is_some() || self.try_operation("||").is_some() {
            items.push(self.parse_and()?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Node::or(items)
        })
    }

    fn parse_and(&mut self) -> Result<Node> {
        let first = self.parse_not()?;
        let mut items = vec![first];
        while self.try_keyword("and").is_some() || self.try_operation("&&").is_some() {
            items.push(self.parse_not()?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Node::and(items)
        })
    }

    fn parse_not(&mut self) -> Result<Node> {
        let prefix = self
            .try_keyword("not")
            .or_else(|| self.try_operation("!"))
            .map(|t| (t.span, PrefixKind::Not))
            .or_else(|| self.try_keyword("ever").map(|t| (t.span, PrefixKind::Ever)))
            .or_else(|| self.try_keyword("never").map(|t| (t.span, PrefixKind::Never)));

        let Some((span, kind)) = prefix else {
            return self.parse_condition();
        };

        self.enter()?;
        let inner = self.parse_not()?;
        self.leave();

        let span = span.to(inner.span);
        let node = match kind {
            PrefixKind::Not => Node::not(inner),
            PrefixKind::Ever => Node::ever(inner),
            PrefixKind::Never => Node::not(Node::ever(inner)),
        };
        Ok(wrap_span(node, span))
    }

    fn parse_condition(&mut self) -> Result<Node> {
        if let Some(open) = self.try_operation("(") {
            self.enter()?;
            let mut inner = self.parse_or()?;
            self.leave();
            let close = self.expect_operation(")", SyntaxError::ExpectingRightBracket)?;
            inner.span = open.span.to(close.span);
            inner.parenthesized = true;
            return Ok(inner);
        }

        let left = self
            .try_field_name()
            .ok_or_else(|| self.error(SyntaxError::ExpectingCondition))?;

        // prefix operators written between the field and the operator
        let mut prefixes: SmallVec<[PrefixKind; 4]> = SmallVec::new();
        loop {
            if self.try_keyword("not").is_some() {
                prefixes.push(PrefixKind::Not);
            } else if self.try_keyword("ever").is_some() {
                prefixes.push(PrefixKind::Ever);
            } else if self.try_keyword("never").is_some() {
                prefixes.push(PrefixKind::Never);
            } else {
                break;
            }
            if prefixes.len() > MAX_NESTING_DEPTH {
                return Err(self.error(SyntaxError::TooComplexExpression));
            }
        }

        let condition = self.parse_condition_operator(!prefixes.is_empty());
        if condition == Condition::None {
            return Err(self.error(SyntaxError::ExpectingComparisonOperator));
        }

        let right = match condition {
            Condition::Group | Condition::Under => self.parse_value()?,
            Condition::In => {
                let open = self.expect_operation("(", SyntaxError::ExpectingLeftBracket)?;
                let mut items = Vec::new();
                loop {
                    items.push(self.parse_expression()?);
                    if self.try_operation(",").is_none() {
                        break;
                    }
                }
                let close = self.expect_operation(")", SyntaxError::ExpectingRightBracket)?;
                Node::new(NodeKind::ValueList(items), open.span.to(close.span))
            }
            _ => match self.try_field_name() {
                Some(field) => Node::field(field),
                None => self
                    .try_expression()?
                    .ok_or_else(|| self.error(SyntaxError::ExpectingFieldOrExpression))?,
            },
        };

        let mut node = Node::condition(condition, left, right);
        let span = node.span;
        for prefix in prefixes.into_iter().rev() {
            node = match prefix {
                PrefixKind::Not => Node::not(node),
                PrefixKind::Ever => Node::ever(node),
                PrefixKind::Never => Node::not(Node::ever(node)),
            };
        }
        Ok(wrap_span(node, span))
    }

    /// Read a comparison operator. After `not`/`ever`/`never` only word
    /// operators are accepted and a missing operator means `=`.
    fn parse_condition_operator(&mut self, after_prefix: bool) -> Condition {
        let start = self.pos;
        if let Some(token) = self.next_token() {
            let accepted = token.kind == TokenKind::Name
                || (token.kind == TokenKind::Operation && !after_prefix);
            if accepted {
                let mut condition = Condition::find(&token.value);
                if condition == Condition::In && self.try_keyword("group").is_some() {
                    condition = Condition::Group;
                } else if condition == Condition::Contains && self.try_keyword("words").is_some() {
                    condition = Condition::ContainsWords;
                }
                if condition != Condition::None {
                    return condition;
                }
            }
        }
        self.pos = start;
        if after_prefix {
            Condition::Equals
        } else {
            Condition::None
        }
    }

    // ========================================================================
    // Values and Field Names
    // ========================================================================

    fn parse_field_name(&mut self) -> Result<FieldName> {
        self.try_field_name()
            .ok_or_else(|| self.error(SyntaxError::ExpectingFieldName))
    }

    /// `name` or `prefix.name`
    fn try_field_name(&mut self) -> Option<FieldName> {
        let start = self.pos;
        let first = self.peek().filter(|t| t.is_name())?.clone();
        self.pos += 1;
        if self.try_operation(".").is_none() {
            return Some(FieldName::new(first.value, first.span));
        }
        match self.next_token().filter(|t| t.is_name()).cloned() {
            Some(second) => {
                Some(FieldName::new(second.value, first.span.to(second.span)).with_prefix(first.value))
            }
            None => {
                self.pos = start;
                None
            }
        }
    }

    fn parse_value(&mut self) -> Result<Node> {
        self.try_single_value()
            .ok_or_else(|| self.error(SyntaxError::ExpectingValue))
    }

    fn parse_expression(&mut self) -> Result<Node> {
        self.try_expression()?
            .ok_or_else(|| self.error(SyntaxError::ExpectingValue))
    }

    /// `value (('+'|'-') value)*`, folded to the left. A signed number such
    /// as `-1` following a value is read as an operator and its operand.
    fn try_expression(&mut self) -> Result<Option<Node>> {
        let Some(mut node) = self.try_single_value() else {
            return Ok(None);
        };
        let mut chain = 0;
        loop {
            let start = self.pos;
            let Some(token) = self.next_token().cloned() else {
                break;
            };
            let operand = match token.kind {
                TokenKind::Number => {
                    let sign = token.value.get(..1).map(Arithmetic::find).unwrap_or(Arithmetic::None);
                    (sign != Arithmetic::None).then(|| {
                        let span = Span::new(token.span.start + 1, token.span.end);
                        (sign, Node::number(&token.value[1..], span))
                    })
                }
                TokenKind::Operation => match Arithmetic::find(&token.value) {
                    Arithmetic::None => None,
                    op => self.try_single_value().map(|value| (op, value)),
                },
                _ => None,
            };
            let Some((op, right)) = operand else {
                self.pos = start;
                break;
            };
            chain += 1;
            if chain > MAX_NESTING_DEPTH {
                return Err(self.error(SyntaxError::TooComplexExpression));
            }
            node = Node::arithmetic(op, node, right);
        }
        Ok(Some(node))
    }

    fn try_single_value(&mut self) -> Option<Node> {
        let token = self.peek()?.clone();
        let node = match token.kind {
            TokenKind::Number => Node::number(token.value, token.span),
            TokenKind::String => Node::string(token.value, token.span),
            TokenKind::Variable => Node::new(NodeKind::Variable(Variable::new(token.value)), token.span),
            TokenKind::BoolValue => Node::new(
                NodeKind::BoolValue(token.value.eq_ignore_ascii_case("true")),
                token.span,
            ),
            _ => return None,
        };
        self.pos += 1;
        Some(node)
    }

    // ========================================================================
    // Helper Methods
    // ========================================================================

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(self.error(SyntaxError::TooComplexExpression));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next_token(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    fn try_keyword(&mut self, keyword: &str) -> Option<Token> {
        let token = self.peek().filter(|t| t.is_keyword(keyword))?.clone();
        self.pos += 1;
        Some(token)
    }

    fn expect_keyword(&mut self, keyword: &str, kind: SyntaxError) -> Result<Token> {
        self.try_keyword(keyword).ok_or_else(|| self.error(kind))
    }

    fn try_operation(&mut self, op: &str) -> Option<Token> {
        let token = self.peek().filter(|t| t.is_operation(op))?.clone();
        self.pos += 1;
        Some(token)
    }

    fn expect_operation(&mut self, op: &str, kind: SyntaxError) -> Result<Token> {
        self.try_operation(op).ok_or_else(|| self.error(kind))
    }

    /// Error at the current token, or at end of input
    fn error(&self, kind: SyntaxError) -> Error {
        Error::syntax(kind, self.peek().map(|t| t.span))
    }
}

#[derive(Debug, Clone, Copy)]
enum PrefixKind {
    Not,
    Ever,
    Never,
}

/// Give the outermost node of a prefix chain the span of the whole chain.
fn wrap_span(mut node: Node, span: Span) -> Node {
    node.span = node.span.to(span);
    node
}

/// Convenience function to parse a WIQL query
pub fn parse(query: &str) -> Result<Select> {
    let tokens = tokenize(query)?;
    WiqlParser::new(tokens).parse()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn where_of(query: &str) -> Node {
        parse(query).unwrap().where_clause.unwrap()
    }

    fn syntax_kind(query: &str) -> Option<SyntaxError> {
        parse(query).unwrap_err().syntax_kind()
    }

    #[test]
    fn test_parse_simple_select() {
        let select = parse("select [System.Id], [System.Title] from WorkItems").unwrap();
        assert_eq!(select.fields.as_ref().unwrap().len(), 2);
        assert_eq!(select.from.as_ref().unwrap().name, "WorkItems");
        assert!(select.where_clause.is_none());
    }

    #[test]
    fn test_parse_select_star() {
        let select = parse("SELECT * FROM issues").unwrap();
        assert!(select.fields.is_none());
    }

    #[test]
    fn test_parse_where_precedence() {
        let node = where_of("select * from X where a = 1 or b = 2 and c = 3");
        match &node.kind {
            NodeKind::Or(items) => {
                assert_eq!(items.len(), 2);
                assert!(matches!(items[1].kind, NodeKind::And(_)));
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_parse_symbolic_boolean_operators() {
        let node = where_of("select * from X where a = 1 && b = 2 || ! c = 3");
        assert_eq!(node.to_string(), "[a] = 1 and [b] = 2 or not [c] = 3");
    }

    #[test]
    fn test_parse_parenthesized() {
        let node = where_of("select * from X where (a = 1 or b = 2) and c = 3");
        let NodeKind::And(items) = &node.kind else {
            panic!("expected and");
        };
        assert!(items[0].parenthesized);
        assert_eq!(node.to_string(), "([a] = 1 or [b] = 2) and [c] = 3");
    }

    #[test]
    fn test_parse_never_and_infix_prefixes() {
        let node = where_of("select * from X where never a = 1");
        assert_eq!(node.to_string(), "not ever [a] = 1");

        let node = where_of("select * from X where [System.Tags] not contains 'x'");
        assert_eq!(node.to_string(), "not [System.Tags] contains 'x'");

        // operator defaults to equals after a prefix
        let node = where_of("select * from X where a ever 'x'");
        assert_eq!(node.to_string(), "ever [a] = 'x'");
    }

    #[test]
    fn test_parse_in_group_and_contains_words() {
        let node = where_of("select * from X where a in group 'G'");
        assert_eq!(node.as_condition().unwrap().condition, Condition::Group);
        let node = where_of("select * from X where a contains words 'w'");
        assert_eq!(node.as_condition().unwrap().condition, Condition::ContainsWords);
    }

    #[test]
    fn test_parse_in_list() {
        let node = where_of("select * from X where a in (1, 2, 3)");
        let cond = node.as_condition().unwrap();
        assert_eq!(cond.condition, Condition::In);
        assert_eq!(cond.right.child_count(), 3);
    }

    #[test]
    fn test_parse_prefixed_field() {
        let node = where_of("select * from links where Source.[System.Id] = Target.[System.Id]");
        let cond = node.as_condition().unwrap();
        assert_eq!(cond.left.prefix.as_deref(), Some("Source"));
        assert!(matches!(cond.right.kind, NodeKind::FieldName(_)));
    }

    #[test]
    fn test_parse_arithmetic() {
        let node = where_of("select * from X where d > @today - 7");
        let cond = node.as_condition().unwrap();
        assert!(matches!(cond.right.kind, NodeKind::Arithmetic(_)));
        assert_eq!(node.to_string(), "[d] > @today - 7");

        // a signed number right after a value is an operator and operand
        let node = where_of("select * from X where d > @today-7");
        assert_eq!(node.to_string(), "[d] > @today - 7");
    }

    #[test]
    fn test_parse_order_by_direction() {
        let select = parse("select * from X order by a desc, b asc, c").unwrap();
        let order = select.order_by.unwrap();
        assert_eq!(order.fields[0].direction, Direction::Descending);
        assert_eq!(order.fields[1].direction, Direction::Ascending);
        assert_eq!(order.fields[2].direction, Direction::Unknown);
    }

    #[test]
    fn test_parse_mode() {
        let select = parse("select * from links mode (Recursive, MustContain)").unwrap();
        assert_eq!(select.mode.unwrap().items.len(), 2);
        assert_eq!(syntax_kind("select * from links mode Recursive"), Some(SyntaxError::ExpectingLeftBracket));
        assert_eq!(syntax_kind("select * from links mode (1)"), Some(SyntaxError::ExpectingMode));
    }

    #[test]
    fn test_duplicate_clauses() {
        let err = parse("select * from X where a=1 where b=2").unwrap_err();
        assert_eq!(err.syntax_kind(), Some(SyntaxError::DuplicateWhere));
        assert_eq!(err.span(), Some(Span::new(26, 31)));

        assert_eq!(syntax_kind("select * from X from Y"), Some(SyntaxError::DuplicateFrom));
        assert_eq!(syntax_kind("select * from X order by a order by b"), Some(SyntaxError::DuplicateOrderBy));
        assert_eq!(syntax_kind("select * from X asof '2020-01-01' asof '2020-01-02'"), Some(SyntaxError::DuplicateAsOf));
        assert_eq!(syntax_kind("select * from X group by a group by b"), Some(SyntaxError::DuplicateGroupBy));
    }

    #[test]
    fn test_grammar_errors() {
        assert_eq!(syntax_kind("from X"), Some(SyntaxError::ExpectingSelect));
        assert_eq!(syntax_kind("select * from"), Some(SyntaxError::ExpectingTableName));
        assert_eq!(syntax_kind("select * from X order a"), Some(SyntaxError::ExpectingBy));
        assert_eq!(syntax_kind("select * from X where a 1"), Some(SyntaxError::ExpectingComparisonOperator));
        assert_eq!(syntax_kind("select * from X where a = "), Some(SyntaxError::ExpectingFieldOrExpression));
        assert_eq!(syntax_kind("select * from X where (a = 1"), Some(SyntaxError::ExpectingRightBracket));
        assert_eq!(syntax_kind("select * from X where a in 1"), Some(SyntaxError::ExpectingLeftBracket));
        assert_eq!(syntax_kind("select * from X where a under"), Some(SyntaxError::ExpectingValue));
        assert_eq!(syntax_kind("select * from X )"), Some(SyntaxError::ExpectingEndOfString));
        assert_eq!(syntax_kind("select * from X where"), Some(SyntaxError::ExpectingCondition));
        assert_eq!(syntax_kind("select * from X where a = 1 and 2 = a"), Some(SyntaxError::ExpectingCondition));
        assert_eq!(syntax_kind("select * from X order by 1"), Some(SyntaxError::ExpectingFieldName));
    }

    #[test]
    fn test_error_at_end_of_input_has_no_span() {
        let err = parse("select * from").unwrap_err();
        assert_eq!(err.span(), None);
    }

    #[test]
    fn test_bracketed_keyword_is_a_name() {
        let select = parse("select [from] from [where]").unwrap();
        assert_eq!(select.fields.unwrap().fields[0].name, "from");
        assert_eq!(select.from.unwrap().name, "where");
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let depth = MAX_NESTING_DEPTH + 10;
        let query = format!(
            "select * from X where {}a = 1{}",
            "(".repeat(depth),
            ")".repeat(depth)
        );
        assert_eq!(syntax_kind(&query), Some(SyntaxError::TooComplexExpression));

        let query = format!("select * from X where {}a = 1", "not ".repeat(depth));
        assert_eq!(syntax_kind(&query), Some(SyntaxError::TooComplexExpression));
    }

    #[test]
    fn test_round_trip() {
        let queries = [
            "select [System.Id], [System.Title] from WorkItems where [System.State] = 'Active' and ([a] = 1 or [b] <> 'x''y') order by [System.Id] desc",
            "select * from links where Source.[System.Id] in (1, 2, 3) and not ever [c] contains words 'w' mode (MustContain)",
            "select * from WorkItems where [d] >= @today - 3 asof '2020-01-01T00:00:00.000Z'",
        ];
        for query in queries {
            let printed = parse(query).unwrap().to_string();
            let reprinted = parse(&printed).unwrap().to_string();
            assert_eq!(printed, reprinted);
        }
    }

    #[test]
    fn test_alias_canonicalized_on_reprint() {
        let select = parse("select * from X where a == 1 and b != 2").unwrap();
        assert_eq!(select.where_clause.unwrap().to_string(), "[a] = 1 and [b] <> 2");
    }
}
