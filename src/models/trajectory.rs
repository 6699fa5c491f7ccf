//! # 轨迹序列
//!
//! 每一步一个值的时间序列。序列名是封闭的枚举，按值的形状分为三类：
//! 标量、每原子三维向量（N×3 矩阵）、3×3 张量。
//! `TrajectoryBuilder` 只接受这些已知的键，不会悄悄收下拼错的名字。
//!
//! ## 依赖关系
//! - 被 `parsers/castep_log.rs`, `parsers/geom.rs`, `raw_parser.rs` 使用

use serde::Serialize;
use std::collections::BTreeMap;

/// 3×3 矩阵（行向量）
pub type Matrix3 = [[f64; 3]; 3];

/// 标量序列
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarSeries {
    FreeEnergy,
    TotalEnergy,
    #[serde(rename = "zero_K_energy")]
    ZeroKEnergy,
    SpinDensity,
    AbsSpinDensity,
    Enthalpy,
    Pressure,
    SymmPressure,
    GeomEnergy,
    GeomH,
    KineticEnergy,
    Temperatures,
    Pressures,
    Times,
}

impl ScalarSeries {
    pub fn name(self) -> &'static str {
        match self {
            ScalarSeries::FreeEnergy => "free_energy",
            ScalarSeries::TotalEnergy => "total_energy",
            ScalarSeries::ZeroKEnergy => "zero_K_energy",
            ScalarSeries::SpinDensity => "spin_density",
            ScalarSeries::AbsSpinDensity => "abs_spin_density",
            ScalarSeries::Enthalpy => "enthalpy",
            ScalarSeries::Pressure => "pressure",
            ScalarSeries::SymmPressure => "symm_pressure",
            ScalarSeries::GeomEnergy => "geom_energy",
            ScalarSeries::GeomH => "geom_h",
            ScalarSeries::KineticEnergy => "kinetic_energy",
            ScalarSeries::Temperatures => "temperatures",
            ScalarSeries::Pressures => "pressures",
            ScalarSeries::Times => "times",
        }
    }
}

/// 每原子 N×3 序列
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowSeries {
    Positions,
    Forces,
    ConsForces,
    Velocities,
}

impl RowSeries {
    pub fn name(self) -> &'static str {
        match self {
            RowSeries::Positions => "positions",
            RowSeries::Forces => "forces",
            RowSeries::ConsForces => "cons_forces",
            RowSeries::Velocities => "velocities",
        }
    }
}

/// 3×3 张量序列
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TensorSeries {
    Cells,
    Stress,
    SymmStress,
    GeomStress,
}

impl TensorSeries {
    pub fn name(self) -> &'static str {
        match self {
            TensorSeries::Cells => "cells",
            TensorSeries::Stress => "stress",
            TensorSeries::SymmStress => "symm_stress",
            TensorSeries::GeomStress => "geom_stress",
        }
    }
}

/// 轨迹数据
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Trajectory {
    /// 元素符号，顺序与 positions/forces/velocities 的原子顺序一致
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub symbols: Vec<String>,

    #[serde(flatten)]
    pub scalars: BTreeMap<ScalarSeries, Vec<f64>>,

    #[serde(flatten)]
    pub rows: BTreeMap<RowSeries, Vec<Vec<[f64; 3]>>>,

    #[serde(flatten)]
    pub tensors: BTreeMap<TensorSeries, Vec<Matrix3>>,
}

impl Trajectory {
    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty() && self.rows.is_empty() && self.tensors.is_empty()
    }

    pub fn scalar(&self, key: ScalarSeries) -> Option<&[f64]> {
        self.scalars.get(&key).map(Vec::as_slice)
    }

    pub fn rows(&self, key: RowSeries) -> Option<&[Vec<[f64; 3]>]> {
        self.rows.get(&key).map(Vec::as_slice)
    }

    pub fn tensor(&self, key: TensorSeries) -> Option<&[Matrix3]> {
        self.tensors.get(&key).map(Vec::as_slice)
    }

    /// 步数：优先以位置序列计，其次是晶胞序列，最后取最长的序列
    pub fn num_steps(&self) -> usize {
        if let Some(p) = self.rows.get(&RowSeries::Positions) {
            return p.len();
        }
        if let Some(c) = self.tensors.get(&TensorSeries::Cells) {
            return c.len();
        }
        self.scalars
            .values()
            .map(Vec::len)
            .chain(self.rows.values().map(Vec::len))
            .chain(self.tensors.values().map(Vec::len))
            .max()
            .unwrap_or(0)
    }

    /// 所有序列名（用于单位字段清理）
    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys: Vec<&'static str> = Vec::new();
        if !self.symbols.is_empty() {
            keys.push("symbols");
        }
        keys.extend(self.scalars.keys().map(|k| k.name()));
        keys.extend(self.rows.keys().map(|k| k.name()));
        keys.extend(self.tensors.keys().map(|k| k.name()));
        keys
    }

    /// 用 `other` 中的序列覆盖同名序列
    pub fn overlay(&mut self, other: Trajectory) {
        if !other.symbols.is_empty() {
            self.symbols = other.symbols;
        }
        self.scalars.extend(other.scalars);
        self.rows.extend(other.rows);
        self.tensors.extend(other.tensors);
    }
}

/// 轨迹构建器
#[derive(Debug, Default)]
pub struct TrajectoryBuilder {
    inner: Trajectory,
}

impl TrajectoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_scalar(&mut self, key: ScalarSeries, value: f64) {
        self.inner.scalars.entry(key).or_default().push(value);
    }

    pub fn push_rows(&mut self, key: RowSeries, rows: Vec<[f64; 3]>) {
        self.inner.rows.entry(key).or_default().push(rows);
    }

    pub fn push_tensor(&mut self, key: TensorSeries, tensor: Matrix3) {
        self.inner.tensors.entry(key).or_default().push(tensor);
    }

    /// 整体写入一条标量序列（空序列不写入）
    pub fn set_scalars(&mut self, key: ScalarSeries, values: Vec<f64>) {
        if !values.is_empty() {
            self.inner.scalars.insert(key, values);
        }
    }

    pub fn set_rows(&mut self, key: RowSeries, frames: Vec<Vec<[f64; 3]>>) {
        if !frames.is_empty() {
            self.inner.rows.insert(key, frames);
        }
    }

    pub fn set_tensors(&mut self, key: TensorSeries, frames: Vec<Matrix3>) {
        if !frames.is_empty() {
            self.inner.tensors.insert(key, frames);
        }
    }

    pub fn set_symbols(&mut self, symbols: Vec<String>) {
        self.inner.symbols = symbols;
    }

    pub fn build(self) -> Trajectory {
        self.inner
    }
}
