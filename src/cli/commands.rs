//! 控制台命令处理
//!
//! 处理以 : 开头的控制台命令

use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::schema::ContextValue;

/// 控制台命令执行结果
pub enum CommandResult {
    /// 继续运行
    Continue,
    /// 退出程序
    Exit,
    /// 显示消息
    Message(String),
    /// 错误
    Error(String),
}

/// 输入查询后执行到哪个阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    Tokens,
    Parse,
    Bind,
    Optimize,
    #[default]
    Compile,
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tokens" | "lex" => Ok(Stage::Tokens),
            "parse" => Ok(Stage::Parse),
            "bind" => Ok(Stage::Bind),
            "optimize" | "opt" => Ok(Stage::Optimize),
            "compile" | "xml" => Ok(Stage::Compile),
            other => Err(format!("Unknown stage: {}", other)),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Tokens => "tokens",
            Stage::Parse => "parse",
            Stage::Bind => "bind",
            Stage::Optimize => "optimize",
            Stage::Compile => "compile",
        };
        write!(f, "{}", name)
    }
}

/// 控制台状态
#[derive(Default)]
pub struct ConsoleState {
    /// 当前执行阶段
    pub stage: Stage,
    /// `@宏` 取值
    pub context: IndexMap<String, ContextValue>,
    /// 输出到文件
    pub tee_file: Option<File>,
}

impl ConsoleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入输出（同时写入 stdout 和 tee 文件）
    pub fn write_output(&mut self, content: &str) {
        print!("{}", content);
        if let Some(ref mut file) = self.tee_file {
            let _ = file.write_all(content.as_bytes());
        }
    }
}

/// 按字面形式推断上下文值的类型：整数、小数、RFC 3339 时间，否则为字符串
pub fn parse_context_value(text: &str) -> ContextValue {
    if let Ok(n) = text.parse::<i32>() {
        ContextValue::Number(n)
    } else if let Ok(d) = text.parse::<f64>() {
        ContextValue::Double(d)
    } else if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        ContextValue::DateTime(dt.with_timezone(&Utc))
    } else {
        let unquoted = text
            .strip_prefix('\'')
            .and_then(|t| t.strip_suffix('\''))
            .unwrap_or(text);
        ContextValue::String(unquoted.to_string())
    }
}

/// 解析并执行控制台命令
pub fn execute_console_command(input: &str, state: &mut ConsoleState) -> CommandResult {
    let input = input.trim();
    let cmd_line = input.strip_prefix(':').unwrap_or(input);

    let parts: Vec<&str> = cmd_line.splitn(2, ' ').collect();
    let cmd = parts[0].to_lowercase();
    let args = parts.get(1).copied().unwrap_or("").trim();

    match cmd.as_str() {
        "help" | "h" => CommandResult::Message(get_help_text()),

        "quit" | "q" | "exit" | "e" => CommandResult::Exit,

        "stage" => {
            if args.is_empty() {
                return CommandResult::Message(format!("Current stage: {}", state.stage));
            }
            match args.parse::<Stage>() {
                Ok(stage) => {
                    state.stage = stage;
                    CommandResult::Message(format!("Stage set to {}", stage))
                }
                Err(e) => CommandResult::Error(e),
            }
        }

        "set" => match args.split_once(char::is_whitespace) {
            Some((key, value)) => {
                let key = key.trim_start_matches('@').to_string();
                let value = parse_context_value(value.trim());
                let message = format!("@{} = {} ({})", key, value, value.value_type());
                state.context.insert(key, value);
                CommandResult::Message(message)
            }
            None => CommandResult::Error("Usage: :set <name> <value>".to_string()),
        },

        "unset" => {
            let key = args.trim_start_matches('@');
            if state.context.shift_remove(key).is_some() {
                CommandResult::Message(format!("Removed @{}", key))
            } else {
                CommandResult::Error(format!("No such macro: @{}", key))
            }
        }

        "context" => {
            if state.context.is_empty() {
                return CommandResult::Message("Context is empty".to_string());
            }
            let lines: Vec<String> = state
                .context
                .iter()
                .map(|(k, v)| format!("@{} = {} ({})", k, v, v.value_type()))
                .collect();
            CommandResult::Message(lines.join("\n"))
        }

        "tee" => {
            let args_parts: Vec<&str> = args.split_whitespace().collect();
            let (overwrite, filename) = if args_parts.first() == Some(&"-o") {
                (true, args_parts.get(1).copied())
            } else {
                (false, args_parts.first().copied())
            };

            if let Some(filename) = filename {
                let path = PathBuf::from(filename);
                let file = if overwrite {
                    File::create(&path)
                } else {
                    File::options().create(true).append(true).open(&path)
                };

                match file {
                    Ok(f) => {
                        state.tee_file = Some(f);
                        CommandResult::Message(format!("Logging to {}", filename))
                    }
                    Err(e) => CommandResult::Error(format!("Cannot open file: {}", e)),
                }
            } else {
                CommandResult::Error("Usage: :tee [-o] <filename>".to_string())
            }
        }

        "notee" => {
            if state.tee_file.take().is_some() {
                CommandResult::Message("Stopped logging".to_string())
            } else {
                CommandResult::Message("No active logging".to_string())
            }
        }

        "clear" => {
            print!("\x1B[2J\x1B[1;1H");
            CommandResult::Continue
        }

        _ => CommandResult::Error(format!("Unknown command: {}. Type :help for help.", cmd)),
    }
}

/// 检查输入是否是控制台命令
pub fn is_console_command(input: &str) -> bool {
    input.trim().starts_with(':')
}

fn get_help_text() -> String {
    r#"
╔═══════════════════════════════════════════════════════════════╗
║                    Console Commands                           ║
╠═══════════════════════════════════════════════════════════════╣
║ :help, :h                  Show this help                     ║
║ :quit, :q, :exit, :e       Exit the program                   ║
║ :stage [name]              tokens | parse | bind | optimize   ║
║                            | compile (default)                ║
║ :set <name> <value>        Set the value of @name             ║
║ :unset <name>              Remove @name                       ║
║ :context                   List macro values                  ║
║ :tee [-o] <filename>       Log output to file (-o: overwrite) ║
║ :notee                     Stop logging to file               ║
║ :clear                     Clear the screen                   ║
╚═══════════════════════════════════════════════════════════════╝
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_command() {
        let mut state = ConsoleState::new();
        assert_eq!(state.stage, Stage::Compile);
        assert!(matches!(
            execute_console_command(":stage tokens", &mut state),
            CommandResult::Message(_)
        ));
        assert_eq!(state.stage, Stage::Tokens);
        assert!(matches!(
            execute_console_command(":stage sideways", &mut state),
            CommandResult::Error(_)
        ));
        assert_eq!(state.stage, Stage::Tokens);
    }

    #[test]
    fn test_context_commands() {
        let mut state = ConsoleState::new();
        execute_console_command(":set @project 'Fabrikam'", &mut state);
        execute_console_command(":set limit 5", &mut state);
        execute_console_command(":set ratio 0.5", &mut state);
        assert_eq!(
            state.context.get("project"),
            Some(&ContextValue::String("Fabrikam".to_string()))
        );
        assert_eq!(state.context.get("limit"), Some(&ContextValue::Number(5)));
        assert_eq!(state.context.get("ratio"), Some(&ContextValue::Double(0.5)));

        assert!(matches!(
            execute_console_command(":unset limit", &mut state),
            CommandResult::Message(_)
        ));
        assert!(matches!(
            execute_console_command(":unset limit", &mut state),
            CommandResult::Error(_)
        ));
    }

    #[test]
    fn test_datetime_context_value() {
        assert!(matches!(
            parse_context_value("2020-01-01T00:00:00Z"),
            ContextValue::DateTime(_)
        ));
    }

    #[test]
    fn test_tee_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.log");
        let mut state = ConsoleState::new();
        let command = format!(":tee -o {}", path.display());
        assert!(matches!(
            execute_console_command(&command, &mut state),
            CommandResult::Message(_)
        ));
        state.write_output("select * from WorkItems\n");
        execute_console_command(":notee", &mut state);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "select * from WorkItems\n"
        );
    }

    #[test]
    fn test_unknown_command() {
        let mut state = ConsoleState::new();
        assert!(is_console_command("  :help"));
        assert!(!is_console_command("select * from WorkItems"));
        assert!(matches!(
            execute_console_command(":frobnicate", &mut state),
            CommandResult::Error(_)
        ));
    }
}
