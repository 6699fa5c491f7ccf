//! # parse 命令实现
//!
//! 解析单个计算并打印摘要，可选写出完整 JSON。
//!
//! ## 依赖关系
//! - 使用 `cli/parse.rs` 定义的参数
//! - 使用 `artifacts.rs`, `raw_parser.rs`
//! - 使用 `utils/output.rs`

use crate::cli::parse::ParseArgs;
use crate::utils::output;
use castep_parser::artifacts::SeedFiles;
use castep_parser::error::{CastepError, Result};
use castep_parser::models::RunSummary;
use castep_parser::ParsedRun;

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// 执行 parse 命令
pub fn execute(args: ParseArgs) -> Result<()> {
    let config = args.config.load()?;
    let files = SeedFiles::locate(&args.path)?;

    output::print_header(&format!("Parsing CASTEP run '{}'", files.seed));
    output::print_info(&format!("Log: {}", files.castep.display()));
    for (label, path) in [
        ("Trajectory", &files.trajectory),
        ("Bands", &files.bands),
        ("Checkpoint", &files.checkpoint),
    ] {
        if let Some(p) = path {
            output::print_info(&format!("{}: {}", label, p.display()));
        }
    }
    if !files.error_files.is_empty() {
        output::print_warning(&format!("{} error file(s) found", files.error_files.len()));
    }

    let run = files.parse(&config, args.config.scf_only)?;
    print_summary(&files.seed, &run, args.show_warnings);

    if let Some(path) = &args.output {
        write_json(&run, path)?;
        output::print_success(&format!("Parsed result saved to '{}'", path.display()));
    }

    Ok(())
}

fn print_summary(seed: &str, run: &ParsedRun, show_warnings: bool) {
    let summary = RunSummary::from_run(seed, run);

    output::print_separator();
    output::print_field("Exit status", &output::colorize_status(run.exit_status).to_string());
    output::print_field("Code", &summary.code.to_string());
    output::print_field("Message", run.exit_status.message());
    if let Some(e) = summary.total_energy {
        output::print_field("Total energy (eV)", &format!("{:.8}", e));
    }
    if let Some(e) = summary.energy_per_atom() {
        output::print_field("Energy per atom (eV)", &format!("{:.8}", e));
    }
    if let Some(h) = summary.enthalpy {
        output::print_field("Enthalpy (eV)", &format!("{:.8}", h));
    }
    output::print_field("Trajectory steps", &summary.steps.to_string());
    if let Some(bands) = &run.bands {
        output::print_field(
            "Bands",
            &format!(
                "{} spin(s), {} k-points, {} bands",
                bands.nspins(),
                bands.nkpts(),
                bands.nbands()
            ),
        );
    }
    if let Some(t) = summary.total_time {
        output::print_field("Total time (s)", &format!("{:.2}", t));
    }
    output::print_field("Warnings", &summary.warnings.to_string());
    output::print_separator();

    if show_warnings {
        for w in run.record.warnings() {
            output::print_warning(w);
        }
    }
}

fn write_json(run: &ParsedRun, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| CastepError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_json::to_writer_pretty(BufWriter::new(file), run)?;
    Ok(())
}
