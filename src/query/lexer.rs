//! WIQL Lexer
//!
//! Converts raw query text into an ordered token sequence. Whitespace is
//! skipped; every other character ends up in exactly one token.

use crate::error::{Error, Result, SyntaxError};
use crate::types::Span;
use std::fmt;

/// Two-character operators recognised as a single token.
const TWO_CHAR_OPERATORS: &[&str] = &["<=", "<>", ">=", "!=", "==", "=<", "=>", "&&", "||"];

/// Lexical token kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Unbracketed name (keywords are names too)
    Name,
    /// `[name]`
    BracketedName,
    /// `@name`, the value excludes the `@`
    Variable,
    /// Numeric literal, sign included
    Number,
    /// Quoted string, quotes removed and doubled quotes un-escaped
    String,
    /// `true` / `false`
    BoolValue,
    /// Operator or punctuation
    Operation,
}

/// Lexical token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            value: value.into(),
            span,
        }
    }

    /// Either kind of name
    pub fn is_name(&self) -> bool {
        matches!(self.kind, TokenKind::Name | TokenKind::BracketedName)
    }

    /// Unbracketed name matching `keyword` case-insensitively
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Name && self.value.eq_ignore_ascii_case(keyword)
    }

    pub fn is_operation(&self, op: &str) -> bool {
        self.kind == TokenKind::Operation && self.value == op
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::BracketedName => write!(f, "[{}]", self.value),
            TokenKind::Variable => write!(f, "@{}", self.value),
            TokenKind::String => write!(f, "'{}'", self.value.replace('\'', "''")),
            _ => write!(f, "{}", self.value),
        }
    }
}

/// WIQL Lexer
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Tokenize the whole input.
    pub fn tokenize(self) -> Result<Vec<Token>> {
        match self.tokenize_partial() {
            (tokens, None) => Ok(tokens),
            (_, Some(error)) => Err(error),
        }
    }

    /// Tokenize up to the first lexical error. The tokens read so far are
    /// returned alongside the error; an unterminated string is emitted as a
    /// partial string token before its EXPECTING_CLOSING_QUOTE error.
    pub fn tokenize_partial(mut self) -> (Vec<Token>, Option<Error>) {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let Some(c) = self.peek_char() else {
                return (tokens, None);
            };
            let token = if c.is_alphabetic() || c == '_' {
                self.read_name()
            } else if c == '@' {
                self.read_variable()
            } else if c == '[' {
                match self.read_bracketed_name() {
                    Ok(token) => token,
                    Err(error) => return (tokens, Some(error)),
                }
            } else if c.is_ascii_digit() || ((c == '+' || c == '-') && self.next_is_digit()) {
                self.read_number()
            } else if c == '\'' || c == '"' {
                let (token, error) = self.read_string(c);
                tokens.push(token);
                if error.is_some() {
                    return (tokens, error);
                }
                continue;
            } else {
                self.read_operation()
            };
            tokens.push(token);
        }
    }

    // ========================================================================
    // Token readers
    // ========================================================================

    fn read_name(&mut self) -> Token {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if is_name_char(c) {
                self.pos += c.len_utf8();
            } else if c == '.' && self.char_at(self.pos + 1).is_some_and(is_name_char) {
                // interior dot; a trailing dot is left for the next token
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = &self.input[start..self.pos];
        let span = Span::new(start, self.pos);
        if text.eq_ignore_ascii_case("true") || text.eq_ignore_ascii_case("false") {
            Token::new(TokenKind::BoolValue, text, span)
        } else {
            Token::new(TokenKind::Name, text, span)
        }
    }

    fn read_variable(&mut self) -> Token {
        let start = self.pos;
        self.pos += 1;
        let name_start = self.pos;
        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        Token::new(
            TokenKind::Variable,
            &self.input[name_start..self.pos],
            Span::new(start, self.pos),
        )
    }

    fn read_bracketed_name(&mut self) -> Result<Token> {
        let start = self.pos;
        self.pos += 1;
        let name_start = self.pos;
        while let Some(c) = self.peek_char() {
            if c == ']' {
                let name = self.input[name_start..self.pos].trim();
                self.pos += 1;
                let span = Span::new(start, self.pos);
                if name.is_empty() {
                    return Err(Error::syntax(SyntaxError::EmptyName, Some(span)));
                }
                return Ok(Token::new(TokenKind::BracketedName, name, span));
            }
            self.pos += c.len_utf8();
        }
        Err(Error::syntax(
            SyntaxError::ExpectingClosingSquareBracket,
            Some(Span::new(start, self.pos)),
        ))
    }

    fn read_number(&mut self) -> Token {
        let start = self.pos;
        if matches!(self.peek_char(), Some('+') | Some('-')) {
            self.pos += 1;
        }
        self.skip_digits();
        if self.peek_char() == Some('.') && self.next_is_digit() {
            self.pos += 1;
            self.skip_digits();
        }
        if matches!(self.peek_char(), Some('e') | Some('E')) {
            let mark = self.pos;
            self.pos += 1;
            if matches!(self.peek_char(), Some('+') | Some('-')) {
                self.pos += 1;
            }
            if self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                self.skip_digits();
            } else {
                self.pos = mark;
            }
        }
        Token::new(
            TokenKind::Number,
            &self.input[start..self.pos],
            Span::new(start, self.pos),
        )
    }

    /// String literal; an unterminated string still yields its partial token.
    fn read_string(&mut self, quote: char) -> (Token, Option<Error>) {
        let start = self.pos;
        self.pos += 1;
        let mut value = String::new();
        while let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
            if c == quote {
                if self.peek_char() == Some(quote) {
                    // doubled quote is a literal quote
                    value.push(quote);
                    self.pos += 1;
                    continue;
                }
                return (Token::new(TokenKind::String, value, Span::new(start, self.pos)), None);
            }
            value.push(c);
        }
        let span = Span::new(start, self.pos);
        (
            Token::new(TokenKind::String, value, span),
            Some(Error::syntax(SyntaxError::ExpectingClosingQuote, Some(span))),
        )
    }

    fn read_operation(&mut self) -> Token {
        let start = self.pos;
        let rest = &self.input[self.pos..];
        if let Some(op) = TWO_CHAR_OPERATORS.iter().find(|op| rest.starts_with(**op)) {
            self.pos += op.len();
        } else if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
        Token::new(
            TokenKind::Operation,
            &self.input[start..self.pos],
            Span::new(start, self.pos),
        )
    }

    // ========================================================================
    // Helper Methods
    // ========================================================================

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    fn skip_digits(&mut self) {
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn char_at(&self, pos: usize) -> Option<char> {
        self.input.get(pos..).and_then(|s| s.chars().next())
    }

    fn next_is_digit(&self) -> bool {
        self.input[self.pos..]
            .chars()
            .nth(1)
            .map(|c| c.is_ascii_digit())
            .unwrap_or(false)
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Convenience function to tokenize a WIQL query
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    Lexer::new(input).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).unwrap().iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_bracketed_name() {
        let tokens = tokenize("select [a b] from X").unwrap();
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[1].kind, TokenKind::BracketedName);
        assert_eq!(tokens[1].value, "a b");
        assert_eq!(tokens[1].span, Span::new(7, 12));
    }

    #[test]
    fn test_signed_number_with_exponent() {
        let tokens = tokenize("-3.5e2").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].value, "-3.5e2");
    }

    #[test]
    fn test_unterminated_bracket() {
        let err = tokenize("select [name").unwrap_err();
        assert_eq!(
            err.syntax_kind(),
            Some(SyntaxError::ExpectingClosingSquareBracket)
        );
        assert_eq!(err.span(), Some(Span::new(7, 12)));
    }

    #[test]
    fn test_empty_bracket() {
        let err = tokenize("[]").unwrap_err();
        assert_eq!(err.syntax_kind(), Some(SyntaxError::EmptyName));
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("a = 'abc").unwrap_err();
        assert_eq!(err.syntax_kind(), Some(SyntaxError::ExpectingClosingQuote));
        assert_eq!(err.span(), Some(Span::new(4, 8)));

        let (tokens, err) = Lexer::new("a = 'abc").tokenize_partial();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[2].kind, TokenKind::String);
        assert_eq!(tokens[2].value, "abc");
        assert_eq!(tokens[2].span, Span::new(4, 8));
        assert_eq!(err.and_then(|e| e.syntax_kind()), Some(SyntaxError::ExpectingClosingQuote));
    }

    #[test]
    fn test_doubled_quote_escape() {
        let tokens = tokenize("'it''s' \"say \"\"hi\"\"\"").unwrap();
        assert_eq!(tokens[0].value, "it's");
        assert_eq!(tokens[1].value, "say \"hi\"");
        assert_eq!(tokens[1].kind, TokenKind::String);
    }

    #[test]
    fn test_name_with_interior_dots() {
        let tokens = tokenize("System.Id Source.[System.Id] abc.").unwrap();
        let values: Vec<&str> = tokens.iter().map(|t| t.value.as_str()).collect();
        assert_eq!(values, vec!["System.Id", "Source", ".", "System.Id", "abc", "."]);
    }

    #[test]
    fn test_bool_literals() {
        assert_eq!(
            kinds("TRUE false truex"),
            vec![TokenKind::BoolValue, TokenKind::BoolValue, TokenKind::Name]
        );
    }

    #[test]
    fn test_variable() {
        let tokens = tokenize("@Me").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Variable);
        assert_eq!(tokens[0].value, "Me");
        assert_eq!(tokens[0].span, Span::new(0, 3));
    }

    #[test]
    fn test_operators() {
        let tokens = tokenize("a<=b<>c>=d!=e==f=<g=>h&&i||j<k").unwrap();
        let ops: Vec<&str> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Operation)
            .map(|t| t.value.as_str())
            .collect();
        assert_eq!(ops, vec!["<=", "<>", ">=", "!=", "==", "=<", "=>", "&&", "||", "<"]);
    }

    #[test]
    fn test_minus_without_digit_is_operator() {
        assert_eq!(
            kinds("@today - 1"),
            vec![TokenKind::Variable, TokenKind::Operation, TokenKind::Number]
        );
        assert_eq!(kinds("@today-1"), vec![TokenKind::Variable, TokenKind::Number]);
    }

    #[test]
    fn test_exponent_without_digits_is_not_consumed() {
        let tokens = tokenize("12e").unwrap();
        assert_eq!(tokens[0].value, "12");
        assert_eq!(tokens[1].value, "e");
    }

    #[test]
    fn test_empty_input() {
        assert!(tokenize("   ").unwrap().is_empty());
    }
}
