//! 结果打印器
//!
//! 提供词法单元表格、字段列表、查询文档和带定位符的错误诊断输出

use colored::Colorize;
use prettytable::{format, row, Cell, Row, Table};

use crate::error::Error;
use crate::query::{SortField, Token, TokenKind};
use crate::types::Direction;

/// 结果打印器
#[derive(Default)]
pub struct Printer {
    /// 禁用颜色（写入文件或非终端时）
    plain: bool,
}

impl Printer {
    pub fn new(plain: bool) -> Self {
        Self { plain }
    }

    /// 词法单元表格
    pub fn format_tokens(&self, tokens: &[Token]) -> String {
        if tokens.is_empty() {
            return "Empty input\n".to_string();
        }

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_BOX_CHARS);
        table.set_titles(row!["#", "Kind", "Value", "Span"]);
        for (i, token) in tokens.iter().enumerate() {
            table.add_row(Row::new(vec![
                Cell::new(&(i + 1).to_string()),
                Cell::new(token_kind_name(token.kind)),
                Cell::new(&token.value),
                Cell::new(&token.span.to_string()),
            ]));
        }

        format!("{}{} token(s)\n", table, tokens.len())
    }

    /// 结果列和排序列
    pub fn format_fields(&self, display_fields: &[String], sort_fields: &[SortField]) -> String {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_BOX_CHARS);
        table.set_titles(row!["Column", "Sort"]);

        for field in display_fields {
            let sort = sort_fields
                .iter()
                .find(|s| &s.reference_name == field)
                .map(|s| direction_name(s.direction))
                .unwrap_or("");
            table.add_row(row![field, sort]);
        }
        for sort in sort_fields
            .iter()
            .filter(|s| !display_fields.contains(&s.reference_name))
        {
            table.add_row(row![format!("({})", sort.reference_name), direction_name(sort.direction)]);
        }

        table.to_string()
    }

    /// 带定位符的错误诊断
    pub fn format_error(&self, query: &str, error: &Error) -> String {
        let mut output = String::new();
        let headline = match error.syntax_kind() {
            Some(kind) => format!("error[{}]: {}", kind.code(), kind),
            None => format!("error: {}", error),
        };
        output.push_str(&self.paint_error(&headline));
        output.push('\n');

        if let Error::Syntax { span, .. } = error {
            let (start, len) = match span {
                Some(span) => (span.start.min(query.len()), span.len().max(1)),
                None => (query.len(), 1),
            };
            let prefix = query.get(..start).unwrap_or(query);
            let column = prefix.chars().count();
            output.push_str(&format!("  {}\n", query));
            output.push_str(&format!(
                "  {}{}\n",
                " ".repeat(column),
                self.paint_error(&"^".repeat(len))
            ));
        }
        output
    }

    fn paint_error(&self, text: &str) -> String {
        if self.plain {
            text.to_string()
        } else {
            text.red().bold().to_string()
        }
    }

    /// 打印帮助信息
    pub fn print_help() -> String {
        r#"
═══════════════════════════════════════════════════════════════
                      wiql-cli 命令帮助
═══════════════════════════════════════════════════════════════

直接输入 WIQL 查询，按当前阶段 (:stage) 输出结果：
  tokens     词法单元表格
  parse      语法树（重新打印为 WIQL）
  bind       绑定后的查询模式和语法树
  optimize   优化改写后的语法树
  compile    查询文档 XML、结果列和排序列（默认）

示例:
  select [System.Id], [System.Title] from WorkItems
    where [System.AssignedTo] = @me and [System.State] <> 'Closed'
    order by [System.Id] desc

  select * from WorkItemLinks
    where [System.Links.LinkType] = 'Child' mode (Recursive)

  :set project 'Fabrikam'
  select * from WorkItems where [System.TeamProject] = @project

═══════════════════════════════════════════════════════════════
控制台命令 (以 : 开头)，输入 :help 查看
═══════════════════════════════════════════════════════════════
"#
        .to_string()
    }
}

fn token_kind_name(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Name => "name",
        TokenKind::BracketedName => "bracketed name",
        TokenKind::Variable => "variable",
        TokenKind::Number => "number",
        TokenKind::String => "string",
        TokenKind::BoolValue => "bool",
        TokenKind::Operation => "operation",
    }
}

fn direction_name(direction: Direction) -> &'static str {
    match direction {
        Direction::Descending => "desc",
        _ => "asc",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyntaxError;
    use crate::query::tokenize;
    use crate::types::Span;

    #[test]
    fn test_format_tokens() {
        let tokens = tokenize("select [a b] from X").unwrap();
        let output = Printer::new(true).format_tokens(&tokens);
        assert!(output.contains("bracketed name"));
        assert!(output.contains("a b"));
        assert!(output.ends_with("4 token(s)\n"));
    }

    #[test]
    fn test_caret_under_span() {
        let query = "select * from X where a=1 where b=2";
        let error = Error::syntax(SyntaxError::DuplicateWhere, Some(Span::new(26, 31)));
        let output = Printer::new(true).format_error(query, &error);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "error[DUPLICATE_WHERE]: ".to_string() + &SyntaxError::DuplicateWhere.to_string());
        assert_eq!(lines[1], format!("  {}", query));
        assert_eq!(lines[2], format!("  {}^^^^^", " ".repeat(26)));
    }

    #[test]
    fn test_caret_at_end_of_input() {
        let query = "select * from";
        let error = Error::syntax(SyntaxError::ExpectingTableName, None);
        let output = Printer::new(true).format_error(query, &error);
        assert!(output.lines().nth(2).unwrap().ends_with(&format!("{}^", " ".repeat(query.len()))));
    }

    #[test]
    fn test_format_fields() {
        let output = Printer::new(true).format_fields(
            &["System.Id".to_string(), "System.Title".to_string()],
            &[SortField {
                reference_name: "System.Id".to_string(),
                direction: Direction::Descending,
            }],
        );
        assert!(output.contains("System.Title"));
        assert!(output.contains("desc"));
    }
}
