//! Operator and priority tables
//!
//! Immutable lookup data shared by the parser, the pretty printer and the
//! document generator.

use std::fmt;

/// Binding strength of a node kind, weakest last.
///
/// Used to decide when a child has to be parenthesized on output and to
/// order boolean folding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Operand,
    Add,
    Conditional,
    UnaryBool,
    And,
    Or,
    Comma,
    Select,
}

/// Comparison operator of a field condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    None,
    Equals,
    NotEquals,
    Less,
    Greater,
    LessOrEquals,
    GreaterOrEquals,
    Under,
    In,
    Contains,
    ContainsWords,
    Group,
    /// `==`, canonicalized by [`Condition::find`]
    EqualsAlias,
    /// `!=`, canonicalized by [`Condition::find`]
    NotEqualsAlias,
}

/// Textual spellings of every comparison operator.
const CONDITION_SPELLINGS: &[(&str, Condition)] = &[
    ("=", Condition::Equals),
    ("==", Condition::EqualsAlias),
    ("<>", Condition::NotEquals),
    ("!=", Condition::NotEqualsAlias),
    ("<", Condition::Less),
    (">", Condition::Greater),
    ("<=", Condition::LessOrEquals),
    ("=<", Condition::LessOrEquals),
    (">=", Condition::GreaterOrEquals),
    ("=>", Condition::GreaterOrEquals),
    ("under", Condition::Under),
    ("in", Condition::In),
    ("contains", Condition::Contains),
];

impl Condition {
    /// Look up an operator spelling. Aliases are canonicalized here so no
    /// caller ever sees [`Condition::EqualsAlias`] or
    /// [`Condition::NotEqualsAlias`].
    pub fn find(text: &str) -> Condition {
        let found = CONDITION_SPELLINGS
            .iter()
            .find(|(spelling, _)| spelling.eq_ignore_ascii_case(text))
            .map(|(_, condition)| *condition)
            .unwrap_or(Condition::None);
        found.canonical()
    }

    pub fn canonical(self) -> Condition {
        match self {
            Condition::EqualsAlias => Condition::Equals,
            Condition::NotEqualsAlias => Condition::NotEquals,
            other => other,
        }
    }

    /// Ordinal used to index the operator class table.
    pub fn ordinal(&self) -> usize {
        match self.canonical() {
            Condition::None => 0,
            Condition::Equals => 1,
            Condition::NotEquals => 2,
            Condition::Less => 3,
            Condition::Greater => 4,
            Condition::LessOrEquals => 5,
            Condition::GreaterOrEquals => 6,
            Condition::Under => 7,
            Condition::In => 8,
            Condition::Contains => 9,
            Condition::ContainsWords => 10,
            Condition::Group => 11,
            Condition::EqualsAlias | Condition::NotEqualsAlias => 0,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.canonical() {
            Condition::None => Ok(()),
            Condition::Equals => write!(f, "="),
            Condition::NotEquals => write!(f, "<>"),
            Condition::Less => write!(f, "<"),
            Condition::Greater => write!(f, ">"),
            Condition::LessOrEquals => write!(f, "<="),
            Condition::GreaterOrEquals => write!(f, ">="),
            Condition::Under => write!(f, "under"),
            Condition::In => write!(f, "in"),
            Condition::Contains => write!(f, "contains"),
            Condition::ContainsWords => write!(f, "contains words"),
            Condition::Group => write!(f, "in group"),
            Condition::EqualsAlias | Condition::NotEqualsAlias => Ok(()),
        }
    }
}

/// Arithmetic operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arithmetic {
    None,
    Add,
    Subtract,
}

impl Arithmetic {
    pub fn find(text: &str) -> Arithmetic {
        match text {
            "+" => Arithmetic::Add,
            "-" => Arithmetic::Subtract,
            _ => Arithmetic::None,
        }
    }
}

impl fmt::Display for Arithmetic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arithmetic::None => Ok(()),
            Arithmetic::Add => write!(f, "+"),
            Arithmetic::Subtract => write!(f, "-"),
        }
    }
}

// ============================================================================
// Operator classes (query document operators)
// ============================================================================

/// Document operators per condition ordinal.
///
/// Each row lists the plain, `not`, `ever` and `not ever` variant of one
/// operator class; `None` marks a combination the server cannot express.
const OPERATOR_CLASSES: [[Option<&str>; 4]; 12] = [
    [None, None, None, None],
    [Some("equals"), Some("notEquals"), Some("ever"), None],
    [Some("notEquals"), Some("equals"), None, Some("ever")],
    [Some("less"), Some("equalsGreater"), None, None],
    [Some("greater"), Some("equalsLess"), None, None],
    [Some("equalsLess"), Some("greater"), None, None],
    [Some("equalsGreater"), Some("less"), None, None],
    [Some("under"), Some("notUnder"), None, None],
    [None, None, None, None],
    [
        Some("contains"),
        Some("notContains"),
        Some("everContains"),
        Some("neverContains"),
    ],
    [
        Some("containsWords"),
        Some("notContainsWords"),
        Some("everContainsWords"),
        Some("neverContainsWords"),
    ],
    [Some("equals"), Some("notequals"), None, None],
];

/// Document operator for a condition under the accumulated `not`/`ever` flags.
pub fn operator_class(condition: Condition, not: bool, ever: bool) -> Option<&'static str> {
    let variant = (if ever { 2 } else { 0 }) + (if not { 1 } else { 0 });
    OPERATOR_CLASSES
        .get(condition.ordinal())
        .and_then(|row| row[variant])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        assert!(Priority::Operand < Priority::Add);
        assert!(Priority::Add < Priority::Conditional);
        assert!(Priority::Conditional < Priority::UnaryBool);
        assert!(Priority::UnaryBool < Priority::And);
        assert!(Priority::And < Priority::Or);
        assert!(Priority::Or < Priority::Comma);
        assert!(Priority::Comma < Priority::Select);
    }

    #[test]
    fn test_aliases_are_canonicalized() {
        assert_eq!(Condition::find("=="), Condition::Equals);
        assert_eq!(Condition::find("!="), Condition::NotEquals);
        assert_eq!(Condition::find("=<"), Condition::LessOrEquals);
        assert_eq!(Condition::find("UNDER"), Condition::Under);
        assert_eq!(Condition::find("like"), Condition::None);
    }

    #[test]
    fn test_operator_class() {
        assert_eq!(operator_class(Condition::Equals, false, false), Some("equals"));
        assert_eq!(operator_class(Condition::Equals, true, false), Some("notEquals"));
        assert_eq!(operator_class(Condition::Equals, false, true), Some("ever"));
        assert_eq!(operator_class(Condition::Equals, true, true), None);
        assert_eq!(operator_class(Condition::NotEquals, true, true), Some("ever"));
        assert_eq!(operator_class(Condition::Less, true, false), Some("equalsGreater"));
        assert_eq!(
            operator_class(Condition::Contains, true, true),
            Some("neverContains")
        );
        assert_eq!(operator_class(Condition::In, false, false), None);
        assert_eq!(operator_class(Condition::Group, true, false), Some("notequals"));
    }

    #[test]
    fn test_display() {
        assert_eq!(Condition::ContainsWords.to_string(), "contains words");
        assert_eq!(Condition::Group.to_string(), "in group");
        assert_eq!(Arithmetic::Subtract.to_string(), "-");
    }
}
