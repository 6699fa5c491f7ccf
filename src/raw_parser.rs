//! # 解析流程编排
//!
//! 把一次 CASTEP 计算的各个输出合并为一份结果：
//!
//! 1. 扫描主日志，得到标量记录、逐步序列和警告
//! 2. 若提供了 .geom/.md，用其中的序列覆盖日志中的同名序列
//! 3. 记录 .err 文件内容，按合并后的全部键清理单位字段
//! 4. 按需读取能带（检查点或 .bands）
//! 5. 最后判定退出状态
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 使用 `parsers/`, `classify.rs`, `config.rs`

use crate::classify::{classify, Evidence};
use crate::config::ParserConfig;
use crate::error::Result;
use crate::models::{BandsData, ExitStatus, ScalarRecord, Trajectory};
use crate::parsers::{parse_bands, parse_geom, CastepBin, CastepLogScanner, LogPatterns};
use serde::Serialize;
use std::io::Read;

/// 解析结果
#[derive(Debug, Clone, Serialize)]
pub struct ParsedRun {
    pub record: ScalarRecord,
    pub trajectory: Trajectory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bands: Option<BandsData>,
    pub exit_status: ExitStatus,
}

/// 解析器，输入通过 `with_*` 方法逐项提供
pub struct RawParser<'a> {
    config: ParserConfig,
    patterns: LogPatterns,
    trajectory: Option<(String, Vec<String>)>,
    bands: Option<Vec<String>>,
    checkpoint: Option<(Box<dyn Read + 'a>, bool)>,
    error_files: Option<String>,
}

impl<'a> RawParser<'a> {
    pub fn new(config: ParserConfig) -> Self {
        RawParser {
            config,
            patterns: LogPatterns::new(),
            trajectory: None,
            bands: None,
            checkpoint: None,
            error_files: None,
        }
    }

    /// .geom 或 .md 文件内容
    pub fn with_trajectory<S: AsRef<str>>(mut self, name: impl Into<String>, lines: &[S]) -> Self {
        self.trajectory = Some((name.into(), to_owned_lines(lines)));
        self
    }

    /// .bands 文件内容
    pub fn with_bands<S: AsRef<str>>(mut self, lines: &[S]) -> Self {
        self.bands = Some(to_owned_lines(lines));
        self
    }

    /// .castep_bin 读取器；`scf_only` 为真时能带取自检查点
    pub fn with_checkpoint(mut self, reader: impl Read + 'a, scf_only: bool) -> Self {
        self.checkpoint = Some((Box::new(reader), scf_only));
        self
    }

    /// 是否存在 .err 文件及其合并内容
    pub fn with_error_files(mut self, present: bool, text: impl Into<String>) -> Self {
        self.error_files = if present { Some(text.into()) } else { None };
        self
    }

    /// 执行解析
    pub fn parse<S: AsRef<str>>(self, log_lines: &[S]) -> Result<ParsedRun> {
        let RawParser {
            config,
            patterns,
            trajectory: geom_input,
            bands: bands_input,
            checkpoint,
            error_files,
        } = self;
        let units = config.units();

        let scan = CastepLogScanner::new(&patterns, &config).scan(log_lines);
        let mut record = scan.record;
        let mut trajectory = scan.trajectory;

        if let Some((name, lines)) = geom_input {
            let geom = parse_geom(&name, &lines, &units)?;
            log::debug!("{}: overriding {} series", name, geom.keys().len());
            trajectory.overlay(geom);
        }

        if let Some(text) = &error_files {
            record.insert("error_messages", text.clone());
        }

        let pruned = record.prune_units(trajectory.keys());
        if !pruned.is_empty() {
            log::debug!("Pruned unit fields after merge: {:?}", pruned);
        }

        let bands = match checkpoint {
            Some((reader, true)) => {
                let bin = CastepBin::read(reader, &units)?;
                if trajectory.symbols.is_empty() {
                    trajectory.symbols = bin.symbols();
                }
                Some(bin.to_bands(config.kpoint_tolerance)?)
            }
            other => {
                if other.is_some() {
                    log::debug!("Checkpoint supplied without scf_only, using .bands instead");
                }
                match &bands_input {
                    Some(lines) => Some(parse_bands(lines, &units)?),
                    None => None,
                }
            }
        };

        let exit_status = classify(&Evidence {
            warnings: record.warnings(),
            error_artifact: error_files.is_some(),
            finished: scan.finished,
        });
        log::info!("Exit status: {}", exit_status);

        Ok(ParsedRun {
            record,
            trajectory,
            bands,
            exit_status,
        })
    }
}

fn to_owned_lines<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    lines.iter().map(|l| l.as_ref().to_string()).collect()
}
