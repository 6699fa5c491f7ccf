//! # 能带数据
//!
//! `eigenvalues[spin][kpoint][band]`，能量单位 eV，晶胞单位 Å。
//! 可以来自 .bands 文本文件，也可以来自 .castep_bin 二进制检查点。
//!
//! ## 依赖关系
//! - 被 `parsers/bands.rs`, `parsers/castep_bin.rs`, `raw_parser.rs` 使用
//! - 使用 `models/kpoints.rs`

use crate::error::Result;
use crate::models::kpoints::KpointSet;
use crate::models::trajectory::Matrix3;
use serde::Serialize;

/// 能带数据的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BandsSource {
    BandsFile,
    Checkpoint,
}

/// 能带数据
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandsData {
    pub source: BandsSource,
    pub kpoints: KpointSet,
    /// [spin][kpoint][band] (eV)
    pub eigenvalues: Vec<Vec<Vec<f64>>>,
    /// [spin][kpoint][band]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupations: Option<Vec<Vec<Vec<f64>>>>,
    /// 费米能 (eV)，自旋极化计算时有两个
    pub fermi_energies: Vec<f64>,
    /// 实空间晶胞 (Å)
    pub cell: Matrix3,
    /// 每个自旋通道的电子数（仅 .bands 提供）
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nelecs: Vec<f64>,
}

impl BandsData {
    pub fn nspins(&self) -> usize {
        self.eigenvalues.len()
    }

    pub fn nkpts(&self) -> usize {
        self.kpoints.len()
    }

    pub fn nbands(&self) -> usize {
        self.eigenvalues
            .first()
            .and_then(|s| s.first())
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// 按参考 k 点列表的顺序重排（坐标匹配）
    pub fn reorder_to(&self, reference: &KpointSet, tolerance: f64) -> Result<BandsData> {
        // order[i] = 参考列表第 i 个 k 点在本数据中的位置
        let order = self.kpoints.match_indices(reference, tolerance)?;

        let permute = |data: &Vec<Vec<Vec<f64>>>| -> Vec<Vec<Vec<f64>>> {
            data.iter()
                .map(|spin| order.iter().map(|&k| spin[k].clone()).collect())
                .collect()
        };

        let points = order
            .iter()
            .map(|&k| self.kpoints.points()[k])
            .collect::<Vec<_>>();

        Ok(BandsData {
            source: self.source,
            kpoints: KpointSet::new(points),
            eigenvalues: permute(&self.eigenvalues),
            occupations: self.occupations.as_ref().map(permute),
            fermi_energies: self.fermi_energies.clone(),
            cell: self.cell,
            nelecs: self.nelecs.clone(),
        })
    }
}
