//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `parse`: 解析单个 CASTEP 计算
//! - `status`: 批量汇总目录中各计算的退出状态
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: parse, status

pub mod parse;
pub mod status;

use castep_parser::config::ParserConfig;
use castep_parser::error::Result;
use castep_parser::units::Codata;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// castep-parser - CASTEP 计算输出解析工具
#[derive(Parser)]
#[command(name = "castep-parser")]
#[command(version)]
#[command(about = "Parse CASTEP outputs into structured records", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Parse one calculation (directory or .castep file) and print a summary
    Parse(parse::ParseArgs),

    /// Summarise the exit status of every calculation under a directory
    Status(status::StatusArgs),
}

// ─────────────────────────────────────────────────────────────
// 共用的解析配置参数
// ─────────────────────────────────────────────────────────────

/// 两个子命令共用的配置参数
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// JSON file with parser settings (missing fields use defaults)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// CODATA revision for unit conversion (2002, 2006, 2010)
    #[arg(long)]
    pub codata: Option<Codata>,

    /// Take bands from the .castep_bin checkpoint instead of the .bands file
    #[arg(long, default_value_t = false)]
    pub scf_only: bool,
}

impl ConfigArgs {
    /// 合并配置文件与命令行参数，命令行优先
    pub fn load(&self) -> Result<ParserConfig> {
        let mut config = match &self.config {
            Some(path) => ParserConfig::from_json_file(path)?,
            None => ParserConfig::default(),
        };
        if let Some(codata) = self.codata {
            config.codata = codata;
        }
        config.validate()?;
        Ok(config)
    }
}
