//! # status 命令实现
//!
//! 并行解析目录中的全部计算，汇总退出状态。
//!
//! ## 功能
//! - 收集 .castep 文件（可递归）
//! - 并行解析并判定退出状态
//! - 生成终端表格和 CSV 输出
//!
//! ## 依赖关系
//! - 使用 `cli/status.rs` 定义的参数
//! - 使用 `batch/` 收集与并行执行
//! - 使用 `utils/output.rs`

use crate::batch::{BatchRunner, FileCollector};
use crate::cli::status::StatusArgs;
use crate::utils::output;
use castep_parser::artifacts::SeedFiles;
use castep_parser::error::{CastepError, Result};
use castep_parser::models::RunSummary;

use std::path::Path;
use tabled::{Table, Tabled};

/// 汇总表格行
#[derive(Debug, Clone, Tabled)]
struct StatusRow {
    #[tabled(rename = "Seed")]
    seed: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Code")]
    code: u32,
    #[tabled(rename = "Energy (eV)")]
    energy: String,
    #[tabled(rename = "Steps")]
    steps: usize,
    #[tabled(rename = "Warnings")]
    warnings: usize,
}

impl From<&RunSummary> for StatusRow {
    fn from(s: &RunSummary) -> Self {
        StatusRow {
            seed: s.seed.clone(),
            status: s.status.clone(),
            code: s.code,
            energy: s
                .total_energy
                .map(|e| format!("{:.6}", e))
                .unwrap_or_else(|| "-".to_string()),
            steps: s.steps,
            warnings: s.warnings,
        }
    }
}

/// 执行 status 命令
pub fn execute(args: StatusArgs) -> Result<()> {
    output::print_header("CASTEP Calculation Status");

    if !args.dir.exists() {
        return Err(CastepError::DirectoryNotFound {
            path: args.dir.display().to_string(),
        });
    }

    let config = args.config.load()?;
    let scf_only = args.config.scf_only;

    let files = FileCollector::new(args.dir.clone())
        .with_pattern(&args.pattern)?
        .recursive(args.recursive)
        .collect();
    if files.is_empty() {
        return Err(CastepError::NoFilesFound {
            pattern: args.pattern.clone(),
        });
    }

    let runner = BatchRunner::new(args.jobs);
    output::print_info(&format!(
        "Parsing {} calculations with {} jobs...",
        files.len(),
        runner.jobs()
    ));

    let result = runner.run(files, |path| {
        let seed_files = SeedFiles::locate(path)?;
        let run = seed_files.parse(&config, scf_only)?;
        Ok(RunSummary::from_run(seed_files.seed.clone(), &run))
    })?;

    let finished = result.outputs.iter().filter(|s| s.is_finished()).count();
    let rows: Vec<StatusRow> = result
        .outputs
        .iter()
        .filter(|s| !args.failed_only || !s.is_finished())
        .map(StatusRow::from)
        .collect();

    if !rows.is_empty() {
        println!("{}", Table::new(&rows));
    }

    output::print_info(&format!(
        "{} finished, {} with errors, {} unreadable",
        finished,
        result.success() - finished,
        result.failed()
    ));
    for (path, err) in &result.failures {
        output::print_error(&format!("{}: {}", path, err));
    }

    if let Some(path) = &args.csv {
        save_summary_csv(&result.outputs, path)?;
        output::print_success(&format!("Summary saved to '{}'", path.display()));
    }

    Ok(())
}

/// 保存汇总到 CSV
fn save_summary_csv(summaries: &[RunSummary], output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;
    for summary in summaries {
        wtr.serialize(summary)?;
    }
    wtr.flush().map_err(|e| CastepError::FileWriteError {
        path: output_path.display().to_string(),
        source: e,
    })?;
    Ok(())
}
