//! 错误类型定义
//!
//! 词法、语法、绑定、优化和文档生成阶段的所有失败都通过同一个 `Error`
//! 通道返回；`SyntaxError` 是封闭的错误种类枚举，调用方可以按种类分支处理。

use crate::types::Span;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("语法错误: {kind}{}", span_suffix(.span))]
    Syntax {
        kind: SyntaxError,
        span: Option<Span>,
    },

    #[error("不支持的操作: {0}")]
    NotSupported(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("XML 输出错误: {0}")]
    XmlError(String),
}

fn span_suffix(span: &Option<Span>) -> String {
    match span {
        Some(span) => format!(" (位置 {}..{})", span.start, span.end),
        None => " (位于输入末尾)".to_string(),
    }
}

impl Error {
    /// 构造一个语法错误
    pub fn syntax(kind: SyntaxError, span: Option<Span>) -> Self {
        Error::Syntax { kind, span }
    }

    /// 语法错误种类，其他错误返回 None
    pub fn syntax_kind(&self) -> Option<SyntaxError> {
        match self {
            Error::Syntax { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// 出错位置，输入末尾或非语法错误返回 None
    pub fn span(&self) -> Option<Span> {
        match self {
            Error::Syntax { span, .. } => *span,
            _ => None,
        }
    }
}

/// 条件不满足时返回语法错误
pub fn ensure_syntax(condition: bool, kind: SyntaxError, span: Option<Span>) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(Error::syntax(kind, span))
    }
}

/// WIQL 错误种类（封闭集合）
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxError {
    // Lexical
    #[error("方括号中的名称为空")]
    EmptyName,
    #[error("缺少结束引号")]
    ExpectingClosingQuote,
    #[error("缺少右方括号 ']'")]
    ExpectingClosingSquareBracket,

    // Grammar
    #[error("应为 'select'")]
    ExpectingSelect,
    #[error("应为字段名")]
    ExpectingFieldName,
    #[error("应为表名")]
    ExpectingTableName,
    #[error("应为条件")]
    ExpectingCondition,
    #[error("应为比较运算符")]
    ExpectingComparisonOperator,
    #[error("应为值")]
    ExpectingValue,
    #[error("应为常量")]
    ExpectingConst,
    #[error("应为布尔表达式")]
    ExpectingBoolean,
    #[error("应为查询结尾")]
    ExpectingEndOfString,
    #[error("应为 '('")]
    ExpectingLeftBracket,
    #[error("应为 ')'")]
    ExpectingRightBracket,
    #[error("应为 'by'")]
    ExpectingBy,
    #[error("应为字段名或表达式")]
    ExpectingFieldOrExpression,
    #[error("应为模式关键字")]
    ExpectingMode,
    #[error("表达式嵌套过深")]
    TooComplexExpression,

    // Duplicate clauses
    #[error("重复的 'from' 子句")]
    DuplicateFrom,
    #[error("重复的 'where' 子句")]
    DuplicateWhere,
    #[error("重复的 'group by' 子句")]
    DuplicateGroupBy,
    #[error("重复的 'order by' 子句")]
    DuplicateOrderBy,
    #[error("重复的 'asof' 子句")]
    DuplicateAsOf,
    #[error("重复的 'mode' 子句")]
    DuplicateMode,
    #[error("字段在 'order by' 中出现多次")]
    DuplicateOrderByField,

    // Name resolution
    #[error("字段不存在")]
    FieldDoesNotExist,
    #[error("表不存在")]
    TableDoesNotExist,
    #[error("变量不存在")]
    VariableDoesNotExist,
    #[error("无效的字段前缀")]
    InvalidFieldPrefix,
    #[error("同一条件中混用了源、目标和链接字段")]
    MixedPrefixes,

    // Typing
    #[error("条件两侧类型不兼容")]
    IncompatibleConditionPartsType,
    #[error("常量与字段类型不兼容")]
    IncompatibleRightConst,
    #[error("列表中存在未知或不兼容的类型")]
    UnknownOrIncompatibleTypesInTheList,
    #[error("算术运算的类型错误")]
    WrongTypeForArithmetic,
    #[error("算术运算的右操作数必须是数字")]
    WrongTypeForArithmeticRightOperand,
    #[error("无效的日期")]
    InvalidDate,

    // Query shape
    #[error("查询方法与查询类型不符")]
    IncorrectQueryMethod,
    #[error("无效的节点类型")]
    InvalidNodeType,
    #[error("不支持 'group by'")]
    GroupByIsNotSupported,
    #[error("'mode' 只能用于链接查询")]
    ModeOnWorkItems,
    #[error("未知的模式")]
    UnknownMode,
    #[error("字段不可查询")]
    NonQueryableField,
    #[error("字段不可排序")]
    NonSortableField,
    #[error("链接字段不能用于 'order by'")]
    OrderByLinkField,
    #[error("树查询不支持 'asof'")]
    NotSupportedTreeQuery,
    #[error("树查询必须恰好指定一种链接类型")]
    TreeQueryNeedsOneLinkType,

    // Conditions
    #[error("无效的条件运算符")]
    InvalidConditionalOperator,
    #[error("空字符串只能与 '=' 或 '<>' 一起使用")]
    InvalidConditionForEmptyString,
    #[error("链接类型字段的条件无效")]
    InvalidConditionForLinkType,
    #[error("长文本字段的条件无效")]
    InvalidConditionForLongTextField,
    #[error("节点字段的条件无效")]
    InvalidConditionForNodeField,
    #[error("树路径字段的条件无效")]
    InvalidConditionForTreeField,
    #[error("该字段类型不能用于字段比较")]
    InvalidFieldTypeForCondition,
    #[error("无效的链接类型名称")]
    InvalidLinkTypeName,
    #[error("该链接类型不能用于递归查询")]
    InvalidLinkTypeNameRecursive,
    #[error("长文本搜索内容不能为空白")]
    InvalidLongTextSearchForWhitespace,
    #[error("无效的项目名称")]
    InvalidProjectName,
    #[error("项目不存在")]
    ProjectNotFound,
    #[error("路径必须是不以反斜杠开头的字符串")]
    PathMustBeAStringNotStartingWithBackslash,
    #[error("层次结构中找不到该树路径")]
    TreePathIsNotFoundInHierarchy,
    #[error("'under' 只能用于树路径字段")]
    UnderCanBeUsedForTreePathFieldOnly,
    #[error("链接查询中的字段比较必须使用相同前缀")]
    FieldConditionsInLinkQueries,
    #[error("日期常量的时间部分不为零")]
    NonZeroTime,

    // Ever
    #[error("'ever' 只能包含简单条件")]
    TooComplexEverOperator,
    #[error("'ever' 只能与 '=' 或 'contains' 一起使用")]
    EverNotEqualOperator,
    #[error("按天精度时不能使用 'ever'")]
    EverWithDatePrecision,
    #[error("'ever' 不能用于链接字段")]
    EverWithLinkQuery,
}

impl SyntaxError {
    /// Stable identifier of the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            SyntaxError::EmptyName => "EMPTY_NAME",
            SyntaxError::ExpectingClosingQuote => "EXPECTING_CLOSING_QUOTE",
            SyntaxError::ExpectingClosingSquareBracket => "EXPECTING_CLOSING_SQUARE_BRACKET",
            SyntaxError::ExpectingSelect => "EXPECTING_SELECT",
            SyntaxError::ExpectingFieldName => "EXPECTING_FIELD_NAME",
            SyntaxError::ExpectingTableName => "EXPECTING_TABLE_NAME",
            SyntaxError::ExpectingCondition => "EXPECTING_CONDITION",
            SyntaxError::ExpectingComparisonOperator => "EXPECTING_COMPARISON_OPERATOR",
            SyntaxError::ExpectingValue => "EXPECTING_VALUE",
            SyntaxError::ExpectingConst => "EXPECTING_CONST",
            SyntaxError::ExpectingBoolean => "EXPECTING_BOOLEAN",
            SyntaxError::ExpectingEndOfString => "EXPECTING_END_OF_STRING",
            SyntaxError::ExpectingLeftBracket => "EXPECTING_LEFT_BRACKET",
            SyntaxError::ExpectingRightBracket => "EXPECTING_RIGHT_BRACKET",
            SyntaxError::ExpectingBy => "EXPECTING_BY",
            SyntaxError::ExpectingFieldOrExpression => "EXPECTING_FIELD_OR_EXPRESSION",
            SyntaxError::ExpectingMode => "EXPECTING_MODE",
            SyntaxError::TooComplexExpression => "TOO_COMPLEX_EXPRESSION",
            SyntaxError::DuplicateFrom => "DUPLICATE_FROM",
            SyntaxError::DuplicateWhere => "DUPLICATE_WHERE",
            SyntaxError::DuplicateGroupBy => "DUPLICATE_GROUP_BY",
            SyntaxError::DuplicateOrderBy => "DUPLICATE_ORDER_BY",
            SyntaxError::DuplicateAsOf => "DUPLICATE_AS_OF",
            SyntaxError::DuplicateMode => "DUPLICATE_MODE",
            SyntaxError::DuplicateOrderByField => "DUPLICATE_ORDER_BY_FIELD",
            SyntaxError::FieldDoesNotExist => "FIELD_DOES_NOT_EXIST",
            SyntaxError::TableDoesNotExist => "TABLE_DOES_NOT_EXIST",
            SyntaxError::VariableDoesNotExist => "VARIABLE_DOES_NOT_EXIST",
            SyntaxError::InvalidFieldPrefix => "INVALID_FIELD_PREFIX",
            SyntaxError::MixedPrefixes => "MIXED_PREFIXES",
            SyntaxError::IncompatibleConditionPartsType => "INCOMPATIBLE_CONDITION_PARTS_TYPE",
            SyntaxError::IncompatibleRightConst => "INCOMPATIBLE_RIGHT_CONST",
            SyntaxError::UnknownOrIncompatibleTypesInTheList => {
                "UNKNOWN_OR_INCOMPATIBLE_TYPES_IN_THE_LIST"
            }
            SyntaxError::WrongTypeForArithmetic => "WRONG_TYPE_FOR_ARITHMETIC",
            SyntaxError::WrongTypeForArithmeticRightOperand => {
                "WRONG_TYPE_FOR_ARITHMETIC_RIGHT_OPERAND"
            }
            SyntaxError::InvalidDate => "INVALID_DATE",
            SyntaxError::IncorrectQueryMethod => "INCORRECT_QUERY_METHOD",
            SyntaxError::InvalidNodeType => "INVALID_NODE_TYPE",
            SyntaxError::GroupByIsNotSupported => "GROUP_BY_IS_NOT_SUPPORTED",
            SyntaxError::ModeOnWorkItems => "MODE_ON_WORK_ITEMS",
            SyntaxError::UnknownMode => "UNKNOWN_MODE",
            SyntaxError::NonQueryableField => "NON_QUERYABLE_FIELD",
            SyntaxError::NonSortableField => "NON_SORTABLE_FIELD",
            SyntaxError::OrderByLinkField => "ORDER_BY_LINK_FIELD",
            SyntaxError::NotSupportedTreeQuery => "NOT_SUPPORTED_TREE_QUERY",
            SyntaxError::TreeQueryNeedsOneLinkType => "TREE_QUERY_NEEDS_ONE_LINK_TYPE",
            SyntaxError::InvalidConditionalOperator => "INVALID_CONDITIONAL_OPERATOR",
            SyntaxError::InvalidConditionForEmptyString => "INVALID_CONDITION_FOR_EMPTY_STRING",
            SyntaxError::InvalidConditionForLinkType => "INVALID_CONDITION_FOR_LINK_TYPE",
            SyntaxError::InvalidConditionForLongTextField => {
                "INVALID_CONDITION_FOR_LONG_TEXT_FIELD"
            }
            SyntaxError::InvalidConditionForNodeField => "INVALID_CONDITION_FOR_NODE_FIELD",
            SyntaxError::InvalidConditionForTreeField => "INVALID_CONDITION_FOR_TREE_FIELD",
            SyntaxError::InvalidFieldTypeForCondition => "INVALID_FIELD_TYPE_FOR_CONDITION",
            SyntaxError::InvalidLinkTypeName => "INVALID_LINK_TYPE_NAME",
            SyntaxError::InvalidLinkTypeNameRecursive => "INVALID_LINK_TYPE_NAME_RECURSIVE",
            SyntaxError::InvalidLongTextSearchForWhitespace => {
                "INVALID_LONG_TEXT_SEARCH_FOR_WHITESPACE"
            }
            SyntaxError::InvalidProjectName => "INVALID_PROJECT_NAME",
            SyntaxError::ProjectNotFound => "PROJECT_NOT_FOUND",
            SyntaxError::PathMustBeAStringNotStartingWithBackslash => {
                "PATH_MUST_BE_A_STRING_NOT_STARTING_WITH_BACKSLASH"
            }
            SyntaxError::TreePathIsNotFoundInHierarchy => "TREE_PATH_IS_NOT_FOUND_IN_HIERARCHY",
            SyntaxError::UnderCanBeUsedForTreePathFieldOnly => {
                "UNDER_CAN_BE_USED_FOR_TREE_PATH_FIELD_ONLY"
            }
            SyntaxError::FieldConditionsInLinkQueries => "FIELD_CONDITIONS_IN_LINK_QUERIES",
            SyntaxError::NonZeroTime => "NON_ZERO_TIME",
            SyntaxError::TooComplexEverOperator => "TOO_COMPLEX_EVER_OPERATOR",
            SyntaxError::EverNotEqualOperator => "EVER_NOT_EQUAL_OPERATOR",
            SyntaxError::EverWithDatePrecision => "EVER_WITH_DATE_PRECISION",
            SyntaxError::EverWithLinkQuery => "EVER_WITH_LINK_QUERY",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_kind_roundtrip() {
        let err = Error::syntax(SyntaxError::DuplicateWhere, Some(Span::new(3, 8)));
        assert_eq!(err.syntax_kind(), Some(SyntaxError::DuplicateWhere));
        assert_eq!(err.span(), Some(Span::new(3, 8)));
        assert_eq!(SyntaxError::DuplicateWhere.code(), "DUPLICATE_WHERE");
    }

    #[test]
    fn test_ensure_syntax() {
        assert!(ensure_syntax(true, SyntaxError::NonZeroTime, None).is_ok());
        let err = ensure_syntax(false, SyntaxError::NonZeroTime, None).unwrap_err();
        assert_eq!(err.syntax_kind(), Some(SyntaxError::NonZeroTime));
        assert!(err.to_string().contains("时间部分不为零"));
    }

    #[test]
    fn test_non_syntax_error_has_no_kind() {
        let err = Error::Config("bad zone".to_string());
        assert_eq!(err.syntax_kind(), None);
        assert_eq!(err.span(), None);
    }
}
