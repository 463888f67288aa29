//! 命令行工具支持
//!
//! `wiql-cli` 使用的补全器、控制台命令和输出格式化

pub mod commands;
pub mod completer;
pub mod printer;

pub use commands::{execute_console_command, is_console_command, CommandResult, ConsoleState, Stage};
pub use completer::WiqlCompleter;
pub use printer::Printer;
