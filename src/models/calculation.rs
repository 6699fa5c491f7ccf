//! # 计算结果摘要
//!
//! 从完整的解析结果中抽取一行摘要，供 `status` 命令汇总显示和导出 CSV。
//!
//! ## 依赖关系
//! - 被 `commands/status.rs` 使用
//! - 使用 `raw_parser.rs` 的 `ParsedRun`

use crate::models::status::ExitStatus;
use crate::raw_parser::ParsedRun;
use serde::Serialize;

/// 单个计算的摘要
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// 计算名称（seed）
    pub seed: String,

    /// 退出状态名
    pub status: String,

    /// 退出状态代码
    pub code: u32,

    /// 最终能量 (eV)
    pub total_energy: Option<f64>,

    /// 最终焓 (eV)
    pub enthalpy: Option<f64>,

    /// 原子数
    pub num_ions: Option<i64>,

    /// 轨迹步数
    pub steps: usize,

    /// 警告条数
    pub warnings: usize,

    /// 总耗时 (s)
    pub total_time: Option<f64>,
}

impl RunSummary {
    pub fn from_run(seed: impl Into<String>, run: &ParsedRun) -> Self {
        let record = &run.record;
        RunSummary {
            seed: seed.into(),
            status: run.exit_status.name().to_string(),
            code: run.exit_status.code(),
            total_energy: record.get_f64("total_energy"),
            enthalpy: record.get_f64("enthalpy"),
            num_ions: record.get_i64("num_ions"),
            steps: run.trajectory.num_steps(),
            warnings: record.warnings().len(),
            total_time: record.get_f64("total_time"),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.code == ExitStatus::CalcFinished.code()
    }

    /// 计算每原子能量
    pub fn energy_per_atom(&self) -> Option<f64> {
        match (self.total_energy, self.num_ions) {
            (Some(e), Some(n)) if n > 0 => Some(e / n as f64),
            _ => None,
        }
    }
}
