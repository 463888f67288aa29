//! wiql-cli 工具
//!
//! 交互式 WIQL 编译检查工具：查看词法单元、语法树、绑定和优化结果以及查询文档

use anyhow::Context;
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use wiql::cli::{
    execute_console_command, is_console_command, CommandResult, ConsoleState, Printer, Stage,
    WiqlCompleter,
};
use wiql::query::Lexer;
use wiql::{Catalog, Compiler, CompilerConfig};

#[derive(Parser, Debug)]
#[command(name = "wiql-cli")]
#[command(about = "WIQL 查询编译检查工具")]
#[command(version = wiql::VERSION)]
struct Args {
    /// 模式目录文件 (JSON)，缺省时只包含系统核心字段
    #[arg(short, long)]
    catalog: Option<String>,

    /// 编译器配置文件 (JSON)
    #[arg(long)]
    config: Option<String>,

    /// 执行单个查询后退出
    #[arg(short = 'e', long)]
    execute: Option<String>,

    /// 执行阶段: tokens, parse, bind, optimize, compile
    #[arg(short, long, default_value = "compile")]
    stage: String,

    /// 日志级别，可被 RUST_LOG 覆盖
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// 不使用颜色输出
    #[arg(long)]
    plain: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let catalog = match &args.catalog {
        Some(path) => Catalog::from_json_file(path)
            .with_context(|| format!("无法加载模式目录 {}", path))?,
        None => Catalog::with_core_fields(),
    };
    let config = match &args.config {
        Some(path) => CompilerConfig::from_json_file(path)?,
        None => CompilerConfig::default(),
    };
    config.validate()?;

    let printer = Printer::new(args.plain);
    let mut state = ConsoleState::new();
    state.stage = args.stage.parse::<Stage>().map_err(anyhow::Error::msg)?;

    // 单个查询模式
    if let Some(query) = &args.execute {
        let (output, ok) = run_query(&catalog, &config, &state, &printer, query);
        print!("{}", output);
        if !ok {
            std::process::exit(1);
        }
        return Ok(());
    }

    println!("wiql-cli {} - WIQL 查询编译检查工具", wiql::VERSION);
    println!("=============================================");
    println!("字段数: {}", catalog.fields.len());
    println!("链接类型数: {}", catalog.link_types.len());
    println!("\n输入 'help' 查看帮助，':help' 查看控制台命令，':quit' 退出\n");

    let fields: Vec<String> = catalog.fields.keys().cloned().collect();
    let mut editor: Editor<WiqlCompleter, DefaultHistory> = Editor::new()?;
    editor.set_helper(Some(WiqlCompleter::new(fields)));

    loop {
        let prompt = format!("wiql:{}> ", state.stage);
        let line = match editor.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(line);

        if is_console_command(line) {
            match execute_console_command(line, &mut state) {
                CommandResult::Exit => break,
                CommandResult::Continue => {}
                CommandResult::Message(msg) => state.write_output(&format!("{}\n", msg)),
                CommandResult::Error(msg) => eprintln!("错误: {}", msg),
            }
            continue;
        }

        match line.to_lowercase().as_str() {
            "quit" | "exit" | "q" => break,
            "help" | "h" | "?" => {
                println!("{}", Printer::print_help());
                continue;
            }
            _ => {}
        }

        let (output, _) = run_query(&catalog, &config, &state, &printer, line);
        state.write_output(&output);
    }

    println!("再见！");
    Ok(())
}

/// 按当前阶段处理一条查询，返回输出文本以及是否成功
fn run_query(
    catalog: &Catalog,
    config: &CompilerConfig,
    state: &ConsoleState,
    printer: &Printer,
    query: &str,
) -> (String, bool) {
    // 词法阶段出错时仍显示已读出的词法单元
    if state.stage == Stage::Tokens {
        let (tokens, error) = Lexer::new(query).tokenize_partial();
        let mut output = printer.format_tokens(&tokens);
        if let Some(e) = &error {
            output.push_str(&printer.format_error(query, e));
        }
        return (output, error.is_none());
    }

    let compiler = Compiler::new(catalog, config).with_context(state.context.clone());
    let result = match state.stage {
        Stage::Tokens | Stage::Parse => compiler.parse(query).map(|select| format!("{}\n", select)),
        Stage::Bind => compiler
            .bind(query)
            .map(|select| format!("mode: {}\n{}\n", select.query_mode(), select)),
        Stage::Optimize => compiler.optimize(query).map(|select| format!("{}\n", select)),
        Stage::Compile => compiler.compile(query).and_then(|compiled| {
            let xml = compiled.document.to_xml()?;
            Ok(format!(
                "{}\n{}",
                xml,
                printer.format_fields(&compiled.display_fields, &compiled.sort_fields)
            ))
        }),
    };

    match result {
        Ok(output) => (output, true),
        Err(e) => (printer.format_error(query, &e), false),
    }
}
