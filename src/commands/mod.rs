//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `batch/`, `utils/` 以及库中的 `artifacts`
//! - 子模块: parse, status

pub mod parse;
pub mod status;

use crate::cli::Commands;
use castep_parser::error::Result;

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Parse(args) => parse::execute(args),
        Commands::Status(args) => status::execute(args),
    }
}
