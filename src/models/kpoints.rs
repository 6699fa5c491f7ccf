//! # k 点集合
//!
//! 同一次计算的 k 点可能以不同顺序出现在 .castep_bin、.bands 和输入列表中。
//! 两个集合之间只能按坐标匹配（绝对容差），不能按序号匹配。
//!
//! ## 依赖关系
//! - 被 `parsers/castep_bin.rs`, `models/bands.rs` 使用

use crate::error::{CastepError, Result};
use serde::Serialize;

/// 单个 k 点
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Kpoint {
    pub index: usize,
    pub coords: [f64; 3],
    pub weight: f64,
}

/// 有序 k 点集合
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct KpointSet {
    points: Vec<Kpoint>,
}

impl KpointSet {
    pub fn new(points: Vec<Kpoint>) -> Self {
        KpointSet { points }
    }

    /// 由坐标和权重构造，序号按出现顺序从 0 开始
    pub fn from_coords(coords: &[[f64; 3]], weights: &[f64]) -> Self {
        let points = coords
            .iter()
            .enumerate()
            .map(|(i, c)| Kpoint {
                index: i,
                coords: *c,
                weight: weights.get(i).copied().unwrap_or(0.0),
            })
            .collect();
        KpointSet { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Kpoint] {
        &self.points
    }

    pub fn coords(&self) -> Vec<[f64; 3]> {
        self.points.iter().map(|k| k.coords).collect()
    }

    pub fn weights(&self) -> Vec<f64> {
        self.points.iter().map(|k| k.weight).collect()
    }

    /// 在本集合中查找与 `coords` 三个分量都在容差内的第一个 k 点位置
    pub fn position_of(&self, coords: &[f64; 3], tolerance: f64) -> Option<usize> {
        self.points.iter().position(|k| {
            k.coords
                .iter()
                .zip(coords.iter())
                .all(|(a, b)| (a - b).abs() <= tolerance)
        })
    }

    /// 对 `other` 中的每个 k 点，给出它在本集合中的位置
    ///
    /// 两个集合应互为置换；任何一个找不到匹配都视为硬失败。
    pub fn match_indices(&self, other: &KpointSet, tolerance: f64) -> Result<Vec<usize>> {
        other
            .points
            .iter()
            .enumerate()
            .map(|(i, k)| {
                self.position_of(&k.coords, tolerance)
                    .ok_or(CastepError::UnmatchedKpoint {
                        index: i,
                        kx: k.coords[0],
                        ky: k.coords[1],
                        kz: k.coords[2],
                    })
            })
            .collect()
    }
}
