//! # parse 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/parse.rs`

use super::ConfigArgs;
use clap::Args;
use std::path::PathBuf;

/// parse 子命令参数
#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Calculation directory or <seed>.castep file
    pub path: PathBuf,

    /// Write the full parsed result as JSON
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print every warning found in the log
    #[arg(long, default_value_t = false)]
    pub show_warnings: bool,

    #[command(flatten)]
    pub config: ConfigArgs,
}
