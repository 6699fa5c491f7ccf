//! # status 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/status.rs`

use super::ConfigArgs;
use clap::Args;
use std::path::PathBuf;

/// status 子命令参数
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Root directory containing CASTEP calculations
    pub dir: PathBuf,

    /// Glob pattern for log files (comma separated for several)
    #[arg(long, default_value = "*.castep")]
    pub pattern: String,

    /// Recurse into subdirectories
    #[arg(long, default_value_t = false)]
    pub recursive: bool,

    /// Number of parallel jobs (0 = auto)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Write the summary table as CSV
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Only list calculations that did not finish cleanly
    #[arg(long, default_value_t = false)]
    pub failed_only: bool,

    #[command(flatten)]
    pub config: ConfigArgs,
}
