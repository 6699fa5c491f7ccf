//! # CASTEP .castep 输出解析器
//!
//! 逐行扫描 CASTEP 主输出文件，提取头部标量、每次迭代的能量序列、
//! 力与应力表格、警告标记，以及尾部的计时信息。
//!
//! ## 扫描阶段
//! ```text
//! HEADER ──"MEMORY AND SCRATCH DISK ESTIMATES"──> BODY
//! TAIL: 对最后 N 行的独立扫描（不是阶段切换，截断文件的尾部可能与主体重叠）
//! ```
//!
//! ## 依赖关系
//! - 被 `raw_parser.rs` 使用
//! - 使用 `parsers/matchers.rs`, `models/`

use crate::config::ParserConfig;
use crate::models::{
    Matrix3, RowSeries, ScalarRecord, ScalarSeries, TensorSeries, Trajectory, TrajectoryBuilder,
    Value,
};
use crate::parsers::matchers::{Conversion, LineMatcher, MatcherSet, FLOAT};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

/// 主体开始的标志行
pub const BODY_MARKER: &str = "MEMORY AND SCRATCH DISK ESTIMATES";

/// 计算正常结束的标志
pub const COMPLETION_MARKER: &str = "Total time";

/// SCF 未收敛
pub const SCF_FAILURE_MESSAGE: &str =
    "SCF cycles performed but system has not reached the groundstate";
/// 用户通过 STOP 关键字请求停止
pub const STOP_MESSAGE: &str = "STOP keyword detected in parameter file. Stop execution.";
/// 剩余时间不足以再迭代一次
pub const TIMELIMIT_MESSAGE: &str = "Insufficient time for another iteration";
/// 几何优化达到最大步数仍未收敛
pub const GEOM_FAILURE_MESSAGE: &str = "Maximum geometry optimization cycle has been reached";

/// 应力表格的最大前瞻行数
const STRESS_WINDOW: usize = 20;

/// 力表格在原子数之外的额外前瞻行数
const FORCES_EXTRA_LINES: usize = 10;

// ─────────────────────────────────────────────────────────────
// 警告标记
// ─────────────────────────────────────────────────────────────

/// 警告级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    Critical,
    Minor,
}

/// 警告标记：`message` 为 `None` 时，消息取自匹配行开始的若干行
struct WarningMarker {
    marker: &'static str,
    kind: WarningKind,
    message: Option<&'static str>,
}

const WARNING_MARKERS: &[WarningMarker] = &[
    WarningMarker {
        marker: "SCF cycles performed but system has not reached the groundstate",
        kind: WarningKind::Critical,
        message: Some(SCF_FAILURE_MESSAGE),
    },
    WarningMarker {
        marker: "STOP keyword detected in parameter file",
        kind: WarningKind::Critical,
        message: Some(STOP_MESSAGE),
    },
    WarningMarker {
        marker: "Insufficient time for another iteration",
        kind: WarningKind::Critical,
        message: Some(TIMELIMIT_MESSAGE),
    },
    WarningMarker {
        marker: "Geometry optimization failed to converge",
        kind: WarningKind::Critical,
        message: Some(GEOM_FAILURE_MESSAGE),
    },
    WarningMarker {
        marker: "Warning",
        kind: WarningKind::Minor,
        message: None,
    },
];

/// 扫描到的一条警告
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WarningSignal {
    pub kind: WarningKind,
    /// 匹配行在整个文件中的行号（从 0 开始）
    pub line: usize,
    pub text: String,
}

// ─────────────────────────────────────────────────────────────
// 主体中的逐次迭代标量
// ─────────────────────────────────────────────────────────────

/// 主体中可识别的标量行，按匹配优先级排列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyQuantity {
    FreeEnergy,
    TotalEnergy,
    TotalEnergyNoEntropy,
    ZeroKEnergy,
    SpinDensity,
    AbsSpinDensity,
    Enthalpy,
}

impl BodyQuantity {
    pub const ALL: [BodyQuantity; 7] = [
        BodyQuantity::FreeEnergy,
        BodyQuantity::TotalEnergy,
        BodyQuantity::TotalEnergyNoEntropy,
        BodyQuantity::ZeroKEnergy,
        BodyQuantity::SpinDensity,
        BodyQuantity::AbsSpinDensity,
        BodyQuantity::Enthalpy,
    ];

    /// 两个捕获组：数值与单位
    fn pattern(self) -> String {
        let head = match self {
            BodyQuantity::FreeEnergy => r"^\s*Final free energy \(E-TS\)\s*=",
            BodyQuantity::TotalEnergy => r"^\s*Final energy, E\s*=",
            BodyQuantity::TotalEnergyNoEntropy => r"^\s*Final energy\s*=",
            BodyQuantity::ZeroKEnergy => r"^\s*NB est\. 0K energy \(E-0\.5TS\)\s*=",
            BodyQuantity::SpinDensity => r"^\s*Integrated Spin Density\s*=",
            BodyQuantity::AbsSpinDensity => r"^\s*Integrated \|Spin Density\|\s*=",
            BodyQuantity::Enthalpy => r"^\s*\w+:\s*finished iteration\s+\d+\s+with enthalpy\s*=",
        };
        format!(r"{}\s*({})\s+(\S+)", head, FLOAT)
    }

    /// 同一序列可能由多个模式填充
    pub fn series(self) -> ScalarSeries {
        match self {
            BodyQuantity::FreeEnergy => ScalarSeries::FreeEnergy,
            BodyQuantity::TotalEnergy | BodyQuantity::TotalEnergyNoEntropy => {
                ScalarSeries::TotalEnergy
            }
            BodyQuantity::ZeroKEnergy => ScalarSeries::ZeroKEnergy,
            BodyQuantity::SpinDensity => ScalarSeries::SpinDensity,
            BodyQuantity::AbsSpinDensity => ScalarSeries::AbsSpinDensity,
            BodyQuantity::Enthalpy => ScalarSeries::Enthalpy,
        }
    }
}

// ─────────────────────────────────────────────────────────────
// 预编译的正则表达式
// ─────────────────────────────────────────────────────────────

/// 扫描 .castep 文件所需的全部模式，构造一次后重复使用
#[derive(Debug, Clone)]
pub struct LogPatterns {
    header: MatcherSet<&'static str>,
    output_unit: Regex,
    pseudo_start: Regex,
    separator: Regex,
    body: MatcherSet<BodyQuantity>,
    parallel: LineMatcher<&'static str>,
    stress_open: Regex,
    stress_row: Regex,
    pressure: Regex,
    forces_open: Regex,
    forces_row: Regex,
    box_close: Regex,
    timing: Regex,
    efficiency: LineMatcher<&'static str>,
    peak_memory: LineMatcher<&'static str>,
}

impl LogPatterns {
    pub fn new() -> Self {
        let header = MatcherSet::new(vec![
            LineMatcher::new(r"CASTEP version:?\s*(\d+(?:\.\d+)*)", "castep_version")
                .conversion(Conversion::Text),
            LineMatcher::new(r"Total number of ions in cell\s*=\s*(\d+)", "num_ions")
                .conversion(Conversion::Int),
            LineMatcher::new(r"Point group of crystal\s*=\s*(.+?)\s*$", "point_group")
                .conversion(Conversion::Text),
            LineMatcher::new(r"Space group of crystal\s*=\s*(.+?)\s*$", "space_group")
                .conversion(Conversion::Text),
            LineMatcher::new(r"Cell constraints are:\s*(.+?)\s*$", "cell_constraints")
                .conversion(Conversion::Text),
            LineMatcher::new(r"Number of kpoints used\s*=\s*(\d+)", "n_kpoints")
                .conversion(Conversion::Int),
            LineMatcher::new(r"Calculation parallelised over\s+(\d+)\s+process", "parallel_procs")
                .conversion(Conversion::Int),
        ]);

        let body = MatcherSet::new(
            BodyQuantity::ALL
                .iter()
                .map(|q| LineMatcher::with_unit(&q.pattern(), *q))
                .collect(),
        );

        LogPatterns {
            header,
            output_unit: Regex::new(r"^\s*output\s+(\w+)\s+unit\s*:\s*(\S+)").unwrap(),
            pseudo_start: Regex::new(r"Files used for pseudopotentials:").unwrap(),
            separator: Regex::new(r"^\s*(?:-{3,}|\*{3,}|={3,})\s*$").unwrap(),
            body,
            parallel: LineMatcher::new(
                r"Calculation parallelised over\s+(\d+)\s+process",
                "parallel_procs",
            )
            .conversion(Conversion::Int),
            stress_open: Regex::new(r"^\s*\*+\s*([\w ]*Stress Tensor)\s*\*+\s*$").unwrap(),
            stress_row: Regex::new(&format!(
                r"^\s*\*\s+([xyz])\s+({f})\s+({f})\s+({f})\s*\*",
                f = FLOAT
            ))
            .unwrap(),
            pressure: Regex::new(&format!(r"Pressure:\s*({})", FLOAT)).unwrap(),
            forces_open: Regex::new(r"^\s*\*+\s*([\w ]*Forces)\s*\*+\s*$").unwrap(),
            forces_row: Regex::new(&format!(
                r"^\s*\*\s+(\S+)\s+(\d+)\s+({f})\s+({f})\s+({f})\s*\*",
                f = FLOAT
            ))
            .unwrap(),
            box_close: Regex::new(r"^\s*\*+\s*$").unwrap(),
            timing: Regex::new(&format!(r"^\s*(\w+) time\s*=\s*({})\s*s", FLOAT)).unwrap(),
            efficiency: LineMatcher::new(
                r"Overall parallel efficiency rating:.*?\((\d+)%\)",
                "parallel_efficiency",
            )
            .conversion(Conversion::Int),
            peak_memory: LineMatcher::new(r"Peak Memory Use\s*=\s*(\d+)\s*kB", "peak_memory_kb")
                .conversion(Conversion::Int),
        }
    }
}

impl Default for LogPatterns {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────
// 扫描器
// ─────────────────────────────────────────────────────────────

/// 扫描结果
#[derive(Debug, Clone, Default)]
pub struct LogScan {
    pub record: ScalarRecord,
    pub trajectory: Trajectory,
    pub signals: Vec<WarningSignal>,
    /// 最后若干行中是否出现完成标志
    pub finished: bool,
}

/// .castep 文件扫描器
pub struct CastepLogScanner<'a> {
    patterns: &'a LogPatterns,
    config: &'a ParserConfig,
}

impl<'a> CastepLogScanner<'a> {
    pub fn new(patterns: &'a LogPatterns, config: &'a ParserConfig) -> Self {
        CastepLogScanner { patterns, config }
    }

    /// 扫描完整的输出文件
    pub fn scan<S: AsRef<str>>(&self, lines: &[S]) -> LogScan {
        let mut record = ScalarRecord::new();
        let mut builder = TrajectoryBuilder::new();
        let mut signals = Vec::new();

        let body_start = lines
            .iter()
            .position(|l| l.as_ref().contains(BODY_MARKER));

        let (header, body_offset) = match body_start {
            Some(pos) => (&lines[..pos], pos + 1),
            None => {
                log::warn!("Body marker '{}' not found, scanning header only", BODY_MARKER);
                (lines, lines.len())
            }
        };

        self.scan_header(header, &mut record);
        self.scan_body(lines, body_offset, &mut record, &mut builder, &mut signals);
        self.scan_tail(lines, &mut record);

        for signal in &signals {
            record.push_warning(signal.text.clone());
        }

        let geom_unconverged = record
            .warnings()
            .iter()
            .any(|w| w == GEOM_FAILURE_MESSAGE);
        record.insert("geom_unconverged", geom_unconverged);

        let trajectory = builder.build();
        let pruned = record.prune_units(trajectory.keys());
        if !pruned.is_empty() {
            log::debug!("Pruned unused unit fields: {:?}", pruned);
        }

        let finished = self.is_finished(lines);

        LogScan {
            record,
            trajectory,
            signals,
            finished,
        }
    }

    /// 完成标志只在最后若干行中查找
    pub fn is_finished<S: AsRef<str>>(&self, lines: &[S]) -> bool {
        lines
            .iter()
            .rev()
            .take(self.config.completion_window)
            .any(|l| l.as_ref().contains(COMPLETION_MARKER))
    }

    fn scan_header<S: AsRef<str>>(&self, header: &[S], record: &mut ScalarRecord) {
        let p = self.patterns;
        let mut i = 0;
        while i < header.len() {
            let line = header[i].as_ref();

            if let Some(caps) = p.output_unit.captures(line) {
                let quantity = &caps[1];
                let key = format!("unit_{}", quantity);
                record.insert_first(key, caps[2].to_string());
            } else if p.pseudo_start.is_match(line) {
                let (table, consumed) = self.read_pseudo_table(&header[i + 1..]);
                if !record.contains_key("pseudo_pots") {
                    record.insert("pseudo_pots", Value::TextMap(table));
                }
                i += consumed;
            } else if let Some(hit) = p.header.first_match(line) {
                record.insert_first(hit.tag, hit.value);
            }

            i += 1;
        }
    }

    /// 读取赝势文件表，直到空行或分隔线；返回表和消耗的行数
    fn read_pseudo_table<S: AsRef<str>>(&self, lines: &[S]) -> (BTreeMap<String, String>, usize) {
        let mut table = BTreeMap::new();
        let mut consumed = 0;
        for line in lines {
            let line = line.as_ref();
            if line.trim().is_empty() || self.patterns.separator.is_match(line) {
                break;
            }
            consumed += 1;
            let mut parts = line.split_whitespace();
            if let (Some(species), Some(file)) = (parts.next(), parts.next()) {
                table.insert(species.to_string(), file.to_string());
            }
        }
        (table, consumed)
    }

    fn scan_body<S: AsRef<str>>(
        &self,
        lines: &[S],
        start: usize,
        record: &mut ScalarRecord,
        builder: &mut TrajectoryBuilder,
        signals: &mut Vec<WarningSignal>,
    ) {
        let p = self.patterns;
        let num_ions = record.get_i64("num_ions").unwrap_or(0).max(0) as usize;

        let mut i = start;
        while i < lines.len() {
            let line = lines[i].as_ref();

            // 1. 逐次迭代标量
            if let Some(hit) = p.body.first_match(line) {
                if let Some(value) = hit.value.as_f64() {
                    let series = hit.tag.series();
                    builder.push_scalar(series, value);
                    record.insert(series.name(), value);
                    if let Some(unit) = hit.unit {
                        record.insert_unit(series.name(), unit);
                    }
                }
                i += 1;
                continue;
            }

            // 2. 并行核数
            if let Some(hit) = p.parallel.try_match(line) {
                record.insert(hit.tag, hit.value);
                i += 1;
                continue;
            }

            // 3. 应力张量
            if let Some(caps) = p.stress_open.captures(line) {
                let symmetrised = caps[1].contains("Symmetrised");
                let end = (i + 1 + STRESS_WINDOW).min(lines.len());
                let (tensor, pressure, consumed) = self.read_stress(&lines[i + 1..end]);
                let (stress_key, pressure_key) = if symmetrised {
                    (TensorSeries::SymmStress, ScalarSeries::SymmPressure)
                } else {
                    (TensorSeries::Stress, ScalarSeries::Pressure)
                };
                match tensor {
                    Some(tensor) => builder.push_tensor(stress_key, tensor),
                    None => log::warn!("Incomplete stress tensor block at line {}", i + 1),
                }
                if let Some(pressure) = pressure {
                    builder.push_scalar(pressure_key, pressure);
                }
                i += 1 + consumed;
                continue;
            }

            // 4. 力
            if let Some(caps) = p.forces_open.captures(line) {
                let constrained = caps[1].contains("Constrained");
                let end = (i + 1 + num_ions + FORCES_EXTRA_LINES).min(lines.len());
                let (forces, consumed) = self.read_forces(&lines[i + 1..end]);
                if forces.is_empty() {
                    log::warn!(
                        "Forces block '{}' at line {} contains no rows",
                        caps[1].trim(),
                        i + 1
                    );
                } else {
                    let key = if constrained {
                        RowSeries::ConsForces
                    } else {
                        RowSeries::Forces
                    };
                    builder.push_rows(key, forces);
                }
                i += 1 + consumed;
                continue;
            }

            // 5. 警告
            if let Some(signal) = self.match_warning(lines, i) {
                signals.push(signal);
            }

            i += 1;
        }
    }

    /// 读取应力框，返回 (张量, 压强, 消耗行数)
    fn read_stress<S: AsRef<str>>(&self, window: &[S]) -> (Option<Matrix3>, Option<f64>, usize) {
        let p = self.patterns;
        let mut tensor = [[0.0; 3]; 3];
        let mut seen = [false; 3];
        let mut pressure = None;
        let mut consumed = window.len();

        for (j, line) in window.iter().enumerate() {
            let line = line.as_ref();
            if let Some(caps) = p.stress_row.captures(line) {
                let row = match &caps[1] {
                    "x" => 0,
                    "y" => 1,
                    _ => 2,
                };
                for col in 0..3 {
                    tensor[row][col] = caps[col + 2].parse().unwrap_or(0.0);
                }
                seen[row] = true;
            } else if let Some(caps) = p.pressure.captures(line) {
                pressure = caps[1].parse().ok();
            } else if p.box_close.is_match(line) {
                consumed = j + 1;
                break;
            }
        }

        let tensor = if seen.iter().all(|s| *s) {
            Some(tensor)
        } else {
            None
        };
        (tensor, pressure, consumed)
    }

    /// 读取力框，返回 (每原子力, 消耗行数)
    fn read_forces<S: AsRef<str>>(&self, window: &[S]) -> (Vec<[f64; 3]>, usize) {
        let p = self.patterns;
        let mut forces = Vec::new();
        let mut consumed = window.len();

        for (j, line) in window.iter().enumerate() {
            let line = line.as_ref().replace("(cons'd)", "");
            if let Some(caps) = p.forces_row.captures(&line) {
                let parsed: Option<Vec<f64>> =
                    (3..6).map(|k| caps[k].parse::<f64>().ok()).collect();
                if let Some(v) = parsed {
                    forces.push([v[0], v[1], v[2]]);
                }
            } else if p.box_close.is_match(&line) {
                consumed = j + 1;
                break;
            }
        }

        (forces, consumed)
    }

    fn match_warning<S: AsRef<str>>(&self, lines: &[S], i: usize) -> Option<WarningSignal> {
        let line = lines[i].as_ref();
        let marker = WARNING_MARKERS.iter().find(|m| line.contains(m.marker))?;
        let text = match marker.message {
            Some(message) => message.to_string(),
            None => {
                let end = (i + self.config.warning_snippet_lines).min(lines.len());
                lines[i..end]
                    .iter()
                    .map(|l| l.as_ref())
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        };
        Some(WarningSignal {
            kind: marker.kind,
            line: i,
            text,
        })
    }

    fn scan_tail<S: AsRef<str>>(&self, lines: &[S], record: &mut ScalarRecord) {
        let p = self.patterns;
        let start = lines.len().saturating_sub(self.config.tail_lines);

        for line in &lines[start..] {
            let line = line.as_ref();
            if let Some(caps) = p.timing.captures(line) {
                if let Ok(seconds) = caps[2].parse::<f64>() {
                    let key = format!("{}_time", caps[1].to_lowercase());
                    record.insert(key, seconds);
                }
            } else if let Some(hit) = p.efficiency.try_match(line) {
                record.insert(hit.tag, hit.value);
            } else if let Some(hit) = p.peak_memory.try_match(line) {
                record.insert(hit.tag, hit.value);
            }
        }
    }
}
