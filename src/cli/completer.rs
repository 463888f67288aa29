//! WIQL 关键字补全器
//!
//! 基于 rustyline 实现 Tab 补全功能，支持关键字和 `[字段引用名]`

use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};

/// WIQL 关键字列表
const WIQL_KEYWORDS: &[&str] = &[
    // 子句
    "SELECT", "FROM", "WHERE", "ORDER", "GROUP", "BY", "ASOF", "MODE", "ASC", "DESC",
    // 布尔运算
    "AND", "OR", "NOT", "EVER", "NEVER",
    // 条件运算
    "IN", "UNDER", "CONTAINS", "WORDS",
    // 常量
    "TRUE", "FALSE",
    // 宏
    "@ME", "@TODAY",
];

/// 后续关键字映射
fn get_sub_commands(keyword: &str) -> Option<&'static [&'static str]> {
    match keyword {
        "FROM" => Some(&["WorkItems", "WorkItemLinks"]),
        "ORDER" | "GROUP" => Some(&["BY"]),
        "CONTAINS" => Some(&["WORDS"]),
        "IN" => Some(&["GROUP"]),
        "MODE" => Some(&["(MustContain)", "(MayContain)", "(DoesNotContain)", "(Recursive)"]),
        _ => None,
    }
}

/// 控制台命令列表
const CONSOLE_COMMANDS: &[&str] = &[
    ":help", ":h",
    ":quit", ":q",
    ":exit", ":e",
    ":stage",
    ":set",
    ":unset",
    ":context",
    ":tee",
    ":notee",
    ":clear",
];

fn pairs<'a>(candidates: impl Iterator<Item = &'a str>) -> Vec<Pair> {
    candidates
        .map(|c| Pair {
            display: c.to_string(),
            replacement: c.to_string(),
        })
        .collect()
}

/// wiql-cli 补全器
#[derive(Default)]
pub struct WiqlCompleter {
    /// 目录中的字段引用名
    fields: Vec<String>,
}

impl WiqlCompleter {
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }
}

impl Completer for WiqlCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line_to_cursor = &line[..pos];

        // 检查是否是控制台命令
        if line_to_cursor.starts_with(':') {
            let completions = pairs(
                CONSOLE_COMMANDS
                    .iter()
                    .copied()
                    .filter(|cmd| cmd.starts_with(line_to_cursor)),
            );
            return Ok((0, completions));
        }

        // 字段名补全: 光标前最后一个未闭合的 '['
        if let Some(open) = line_to_cursor.rfind('[') {
            if !line_to_cursor[open..].contains(']') {
                let typed = line_to_cursor[open + 1..].to_lowercase();
                let completions: Vec<Pair> = self
                    .fields
                    .iter()
                    .filter(|f| f.to_lowercase().starts_with(&typed))
                    .map(|f| Pair {
                        display: f.clone(),
                        replacement: format!("[{}]", f),
                    })
                    .collect();
                return Ok((open, completions));
            }
        }

        // 分割成单词
        let words: Vec<&str> = line_to_cursor.split_whitespace().collect();
        let Some(last) = words.last() else {
            return Ok((0, vec![]));
        };

        // 检查光标是否在单词末尾
        let at_word_end = !line_to_cursor.ends_with(' ');

        if at_word_end {
            // 补全当前正在输入的单词
            let current_word = last.to_uppercase();
            let start_pos = pos - last.len();

            // 检查前一个单词是否有后续关键字
            if words.len() > 1 {
                let prev_word = words[words.len() - 2].to_uppercase();
                if let Some(sub_cmds) = get_sub_commands(&prev_word) {
                    let completions = pairs(
                        sub_cmds
                            .iter()
                            .copied()
                            .filter(|kw| kw.to_uppercase().starts_with(&current_word)),
                    );
                    if !completions.is_empty() {
                        return Ok((start_pos, completions));
                    }
                }
            }

            // 普通关键字补全
            let completions = pairs(
                WIQL_KEYWORDS
                    .iter()
                    .copied()
                    .filter(|kw| kw.starts_with(&current_word)),
            );
            Ok((start_pos, completions))
        } else {
            // 在空格后，提供后续关键字建议
            match get_sub_commands(&last.to_uppercase()) {
                Some(sub_cmds) => Ok((pos, pairs(sub_cmds.iter().copied()))),
                None => Ok((pos, vec![])),
            }
        }
    }
}

impl Hinter for WiqlCompleter {
    type Hint = String;
}

impl Highlighter for WiqlCompleter {}

impl Validator for WiqlCompleter {}

impl Helper for WiqlCompleter {}
