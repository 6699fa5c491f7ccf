//! # CASTEP .geom / .md 轨迹解析器
//!
//! ## 格式说明
//! ```text
//!  BEGIN header
//!  END header
//!
//!                   0                                   T   T   T   T     (.geom: 步号与收敛标志)
//!                   0.00000000E+000                                       (.md: 时间)
//!   -8.40E+000   -8.40E+000   [动能]                    <-- E
//!    5.13E+000    0.00E+000    0.00E+000                <-- h   (3 行晶格)
//!   -1.23E-004    0.00E+000    0.00E+000                <-- S   (3 行应力)
//!    1.00E-003                                          <-- T
//!    1.00E-005                                          <-- P
//!  Si    1   0.00E+000   0.00E+000   0.00E+000          <-- R
//!  Si    1   0.00E+000   0.00E+000   0.00E+000          <-- V
//!  Si    1   0.00E+000   0.00E+000   0.00E+000          <-- F
//!                                                        (空行结束一帧)
//! ```
//! 文件中所有量均为原子单位，输出换算为 Å、eV、eV/Å、Å/ps、K、GPa、ps。
//!
//! ## 依赖关系
//! - 被 `raw_parser.rs` 使用
//! - 使用 `models/trajectory.rs`, `units.rs`

use crate::error::{CastepError, Result};
use crate::models::{Matrix3, RowSeries, ScalarSeries, TensorSeries, Trajectory, TrajectoryBuilder};
use crate::units::UnitTable;

/// 一帧内的累积量
#[derive(Debug, Default)]
struct Frame {
    time: Option<f64>,
    energies: Option<(f64, f64, Option<f64>)>,
    temperature: Option<f64>,
    pressure: Option<f64>,
    cell: Vec<[f64; 3]>,
    stress: Vec<[f64; 3]>,
    symbols: Vec<String>,
    positions: Vec<[f64; 3]>,
    forces: Vec<[f64; 3]>,
    velocities: Vec<[f64; 3]>,
}

impl Frame {
    /// 文件末尾未以空行结束的帧只有在数据完整时才保留
    fn is_complete(&self) -> bool {
        self.cell.len() == 3
            && !self.positions.is_empty()
            && self.forces.len() == self.positions.len()
    }
}

/// 各序列的累积器（单位已换算）
#[derive(Debug, Default)]
struct Accumulator {
    cells: Vec<Matrix3>,
    positions: Vec<Vec<[f64; 3]>>,
    forces: Vec<Vec<[f64; 3]>>,
    velocities: Vec<Vec<[f64; 3]>>,
    stresses: Vec<Matrix3>,
    geom_energy: Vec<f64>,
    geom_h: Vec<f64>,
    kinetic_energy: Vec<f64>,
    temperatures: Vec<f64>,
    pressures: Vec<f64>,
    times: Vec<f64>,
    symbols: Vec<String>,
}

impl Accumulator {
    fn close_frame(&mut self, frame: Frame, units: &UnitTable) {
        let length = units.a0;
        let force = units.force();
        let stress = units.pressure_gpa();

        self.cells.push(to_matrix(&frame.cell, length));
        self.positions.push(scale_rows(&frame.positions, length));
        self.forces.push(scale_rows(&frame.forces, force));
        if !frame.velocities.is_empty() {
            self.velocities
                .push(scale_rows(&frame.velocities, units.velocity()));
        }
        if frame.stress.len() == 3 {
            self.stresses.push(to_matrix(&frame.stress, stress));
        }
        if let Some((energy, h, kinetic)) = frame.energies {
            self.geom_energy.push(energy * units.eh);
            self.geom_h.push(h * units.eh);
            if let Some(k) = kinetic {
                self.kinetic_energy.push(k * units.eh);
            }
        }
        if let Some(t) = frame.temperature {
            self.temperatures.push(t * units.temperature());
        }
        if let Some(p) = frame.pressure {
            self.pressures.push(p * units.pressure_gpa());
        }
        if let Some(t) = frame.time {
            self.times.push(t * units.time_ps());
        }
        self.symbols = frame.symbols;
    }

    fn into_trajectory(self) -> Trajectory {
        let mut builder = TrajectoryBuilder::new();
        builder.set_symbols(self.symbols);
        builder.set_tensors(TensorSeries::Cells, self.cells);
        builder.set_rows(RowSeries::Positions, self.positions);
        builder.set_rows(RowSeries::Forces, self.forces);
        builder.set_rows(RowSeries::Velocities, self.velocities);
        builder.set_tensors(TensorSeries::GeomStress, self.stresses);
        builder.set_scalars(ScalarSeries::GeomEnergy, self.geom_energy);
        builder.set_scalars(ScalarSeries::GeomH, self.geom_h);
        builder.set_scalars(ScalarSeries::KineticEnergy, self.kinetic_energy);
        builder.set_scalars(ScalarSeries::Temperatures, self.temperatures);
        builder.set_scalars(ScalarSeries::Pressures, self.pressures);
        builder.set_scalars(ScalarSeries::Times, self.times);
        builder.build()
    }
}

/// 解析 .geom 或 .md 文件内容
///
/// `filename` 仅用于错误信息。
pub fn parse_geom<S: AsRef<str>>(
    filename: &str,
    lines: &[S],
    units: &UnitTable,
) -> Result<Trajectory> {
    let body_start = skip_header(lines);

    let mut acc = Accumulator::default();
    let mut frame = Frame::default();
    let mut nframes = 0usize;

    for line in &lines[body_start..] {
        let line = line.as_ref();

        if line.trim().is_empty() {
            if !frame.cell.is_empty() {
                acc.close_frame(std::mem::take(&mut frame), units);
                nframes += 1;
            }
            continue;
        }

        match line.rsplit_once("<--") {
            Some((data, tag)) => parse_tagged(data, tag.trim(), &mut frame),
            None => {
                let tokens: Vec<&str> = line.split_whitespace().collect();
                if tokens.len() == 1 {
                    if let Ok(t) = tokens[0].parse::<f64>() {
                        frame.time = Some(t);
                    }
                }
            }
        }
    }

    if !frame.cell.is_empty() {
        if frame.is_complete() {
            acc.close_frame(frame, units);
            nframes += 1;
        } else {
            log::warn!("{}: dropping incomplete trailing frame", filename);
        }
    }

    if nframes == 0 {
        return Err(CastepError::NoFrames {
            file: filename.to_string(),
        });
    }

    log::debug!("{}: parsed {} frames", filename, nframes);
    Ok(acc.into_trajectory())
}

/// 返回正文第一行的位置（跳过 BEGIN header … END header）
fn skip_header<S: AsRef<str>>(lines: &[S]) -> usize {
    let begin = lines
        .iter()
        .position(|l| l.as_ref().trim().eq_ignore_ascii_case("BEGIN header"));
    match begin {
        Some(b) => lines[b..]
            .iter()
            .position(|l| l.as_ref().trim().eq_ignore_ascii_case("END header"))
            .map(|e| b + e + 1)
            .unwrap_or(lines.len()),
        None => 0,
    }
}

fn parse_tagged(data: &str, tag: &str, frame: &mut Frame) {
    let tokens: Vec<&str> = data.split_whitespace().collect();
    let numbers: Vec<f64> = tokens.iter().filter_map(|t| t.parse().ok()).collect();

    match tag {
        "E" => {
            // 含标记共 5 个记号时为 MD：总能、哈密顿量、动能
            let total_tokens = tokens.len() + 2;
            if numbers.len() >= 2 {
                let kinetic = if total_tokens == 5 {
                    numbers.get(2).copied()
                } else {
                    None
                };
                frame.energies = Some((numbers[0], numbers[1], kinetic));
            }
        }
        "h" => {
            if let Some(row) = vec3(&numbers) {
                frame.cell.push(row);
            }
        }
        "S" => {
            if let Some(row) = vec3(&numbers) {
                frame.stress.push(row);
            }
        }
        "R" | "F" | "V" => {
            // 元素  序号  x  y  z
            if tokens.len() >= 5 {
                let coords: Vec<f64> = tokens[2..5].iter().filter_map(|t| t.parse().ok()).collect();
                if let Some(row) = vec3(&coords) {
                    match tag {
                        "R" => {
                            frame.symbols.push(tokens[0].to_string());
                            frame.positions.push(row);
                        }
                        "F" => frame.forces.push(row),
                        _ => frame.velocities.push(row),
                    }
                }
            }
        }
        "T" => frame.temperature = numbers.first().copied(),
        "P" => frame.pressure = numbers.first().copied(),
        _ => {}
    }
}

fn vec3(values: &[f64]) -> Option<[f64; 3]> {
    if values.len() >= 3 {
        Some([values[0], values[1], values[2]])
    } else {
        None
    }
}

fn scale_rows(rows: &[[f64; 3]], factor: f64) -> Vec<[f64; 3]> {
    rows.iter()
        .map(|r| [r[0] * factor, r[1] * factor, r[2] * factor])
        .collect()
}

fn to_matrix(rows: &[[f64; 3]], factor: f64) -> Matrix3 {
    let mut m = [[0.0; 3]; 3];
    for (i, row) in rows.iter().take(3).enumerate() {
        m[i] = [row[0] * factor, row[1] * factor, row[2] * factor];
    }
    m
}
