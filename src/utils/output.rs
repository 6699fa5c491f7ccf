//! # 美化输出工具
//!
//! 提供统一的终端输出样式。
//!
//! ## 依赖关系
//! - 被所有 `commands/` 模块使用
//! - 使用 `colored` crate

use castep_parser::ExitStatus;
use colored::{ColoredString, Colorize};

/// 打印成功消息
pub fn print_success(msg: &str) {
    println!("{} {}", "[OK]".green().bold(), msg);
}

/// 打印错误消息
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "[ERR]".red().bold(), msg);
}

/// 打印警告消息
pub fn print_warning(msg: &str) {
    println!("{} {}", "[WARN]".yellow().bold(), msg);
}

/// 打印信息消息
pub fn print_info(msg: &str) {
    println!("{} {}", "[*]".blue().bold(), msg);
}

/// 打印标题栏
pub fn print_header(title: &str) {
    let line = "─".repeat(60);
    println!("\n{}", line.dimmed());
    println!("  {}", title.bold());
    println!("{}\n", line.dimmed());
}

/// 打印分隔线
pub fn print_separator() {
    println!("{}", "─".repeat(60).dimmed());
}

/// 打印对齐的键值对
pub fn print_field(label: &str, value: &str) {
    println!("  {:<24} {}", label.dimmed(), value);
}

/// 按退出状态着色
pub fn colorize_status(status: ExitStatus) -> ColoredString {
    let text = status.name();
    match status {
        ExitStatus::CalcFinished => text.green().bold(),
        ExitStatus::ErrorNoEndOfCalculation | ExitStatus::ErrorTimelimitReached => {
            text.yellow().bold()
        }
        _ => text.red().bold(),
    }
}
