//! # CASTEP .castep_bin 检查点读取器
//!
//! 检查点是一串带标签的 Fortran 记录：标签记录之后紧跟若干数据记录。
//! 这里只解码能带、k 点、晶胞、离子位置与受力相关的记录，其余记录跳过。
//!
//! 原始数据保持磁盘上的排列（原子按元素分组，能带按 (band, kpoint, spin)），
//! 由 `CastepBin` 的访问方法在读取时完成重排和单位换算。
//!
//! ## 依赖关系
//! - 被 `raw_parser.rs` 使用
//! - 使用 `parsers/fortran.rs`, `models/`, `units.rs`

use crate::error::{CastepError, Result};
use crate::models::{BandsData, BandsSource, KpointSet, Matrix3};
use crate::parsers::fortran::{decode_str, FortranReader};
use crate::units::UnitTable;
use std::io::Read;

/// 能带块（磁盘排列）
#[derive(Debug, Clone, Default)]
struct EigenBlock {
    nkpts: usize,
    nspins: usize,
    nbands: usize,
    kpoints: Vec<[f64; 3]>,
    /// 下标 band + nbands * (kpoint + nkpts * spin)
    occupancies: Vec<f64>,
    eigenvalues: Vec<f64>,
}

impl EigenBlock {
    fn offset(&self, band: usize, kpoint: usize, spin: usize) -> usize {
        band + self.nbands * (kpoint + self.nkpts * spin)
    }

    /// (band, kpoint, spin) → [spin][kpoint][band]
    fn reorder(&self, flat: &[f64], factor: f64) -> Vec<Vec<Vec<f64>>> {
        (0..self.nspins)
            .map(|s| {
                (0..self.nkpts)
                    .map(|k| {
                        (0..self.nbands)
                            .map(|b| flat[self.offset(b, k, s)] * factor)
                            .collect()
                    })
                    .collect()
            })
            .collect()
    }
}

/// 解码后的原始检查点数据
#[derive(Debug, Clone, Default)]
pub struct RawCheckpoint {
    real_lattice: Vec<f64>,
    num_species: usize,
    max_ions_in_species: usize,
    num_ions_in_species: Vec<usize>,
    species_symbols: Vec<String>,
    ionic_positions: Vec<f64>,
    forces: Vec<f64>,
    nkpts: Option<usize>,
    kpoints: Vec<f64>,
    kpoint_weights: Vec<f64>,
    fermi_energy: Option<f64>,
    fermi_energy_2: Option<f64>,
    eigen: Option<EigenBlock>,
}

impl RawCheckpoint {
    /// 从记录流解码
    pub fn decode<R: Read>(reader: &mut FortranReader<R>) -> Result<RawCheckpoint> {
        let mut raw = RawCheckpoint::default();
        let mut skipped = 0usize;

        while let Some(record) = reader.read_record()? {
            let tag = decode_str(&record);
            match tag.as_str() {
                "CELL%REAL_LATTICE" => {
                    raw.real_lattice = reader.read_f64s(&tag)?;
                    if raw.real_lattice.len() != 9 {
                        return Err(CastepError::BinaryFormat(format!(
                            "{} has {} values, expected 9",
                            tag,
                            raw.real_lattice.len()
                        )));
                    }
                }
                "CELL%NUM_SPECIES" => raw.num_species = to_count(reader.read_i32(&tag)?, &tag)?,
                "CELL%MAX_IONS_IN_SPECIES" => {
                    raw.max_ions_in_species = to_count(reader.read_i32(&tag)?, &tag)?
                }
                "CELL%NUM_IONS_IN_SPECIES" => {
                    raw.num_ions_in_species = reader
                        .read_i32s(&tag)?
                        .into_iter()
                        .map(|n| to_count(n, &tag))
                        .collect::<Result<_>>()?;
                }
                "CELL%SPECIES_SYMBOL" => {
                    let record = reader.expect_record(&tag)?;
                    raw.species_symbols = record.chunks(8).map(decode_str).collect();
                }
                "CELL%IONIC_POSITIONS" => raw.ionic_positions = reader.read_f64s(&tag)?,
                "FORCES" => raw.forces = reader.read_f64s(&tag)?,
                "NKPTS" => raw.nkpts = Some(to_count(reader.read_i32(&tag)?, &tag)?),
                "KPOINTS" => raw.kpoints = reader.read_f64s(&tag)?,
                "KPOINT_WEIGHTS" => raw.kpoint_weights = reader.read_f64s(&tag)?,
                "FERMI_ENERGY" => raw.fermi_energy = Some(reader.read_f64(&tag)?),
                "FERMI_ENERGY_2" => raw.fermi_energy_2 = Some(reader.read_f64(&tag)?),
                "EIGENVALUES" => raw.eigen = Some(read_eigen_block(reader)?),
                "END" => break,
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            log::debug!("castep_bin: skipped {} unrecognised records", skipped);
        }
        Ok(raw)
    }
}

fn read_eigen_block<R: Read>(reader: &mut FortranReader<R>) -> Result<EigenBlock> {
    let dims = reader.read_i32s("EIGENVALUES dimensions")?;
    if dims.len() < 3 {
        return Err(CastepError::BinaryFormat(
            "EIGENVALUES dimension record has fewer than 3 values".to_string(),
        ));
    }
    let nkpts = to_count(dims[0], "nkpts")?;
    let nspins = to_count(dims[1], "nspins")?;
    let nbands = to_count(dims[2], "nbands")?;
    let total = nkpts
        .checked_mul(nspins)
        .and_then(|n| n.checked_mul(nbands))
        .ok_or_else(|| {
            CastepError::BinaryFormat(format!(
                "EIGENVALUES dimensions {} x {} x {} overflow",
                nkpts, nspins, nbands
            ))
        })?;

    // 记录顺序：每个 k 点先是各自旋的占据数，再是各自旋的本征值
    let mut kpoints = Vec::new();
    let mut occ_records = Vec::new();
    let mut eig_records = Vec::new();
    for k in 0..nkpts {
        let coords = reader.read_f64s("EIGENVALUES k-point")?;
        if coords.len() < 3 {
            return Err(CastepError::BinaryFormat(format!(
                "k-point {} coordinate record has {} values",
                k,
                coords.len()
            )));
        }
        kpoints.push([coords[0], coords[1], coords[2]]);

        for _ in 0..nspins {
            occ_records.push(read_bands_record(reader, "occupancies", nbands)?);
        }
        for _ in 0..nspins {
            eig_records.push(read_bands_record(reader, "eigenvalues", nbands)?);
        }
    }

    let mut block = EigenBlock {
        nkpts,
        nspins,
        nbands,
        kpoints,
        occupancies: vec![0.0; total],
        eigenvalues: vec![0.0; total],
    };
    for (i, (occ, eig)) in occ_records.into_iter().zip(eig_records).enumerate() {
        let (k, s) = (i / nspins, i % nspins);
        for (b, (o, e)) in occ.into_iter().zip(eig).enumerate() {
            let at = block.offset(b, k, s);
            block.occupancies[at] = o;
            block.eigenvalues[at] = e;
        }
    }

    Ok(block)
}

fn read_bands_record<R: Read>(
    reader: &mut FortranReader<R>,
    what: &str,
    nbands: usize,
) -> Result<Vec<f64>> {
    let values = reader.read_f64s(what)?;
    if values.len() != nbands {
        return Err(CastepError::BinaryFormat(format!(
            "{} record has {} values, expected {}",
            what,
            values.len(),
            nbands
        )));
    }
    Ok(values)
}

fn to_count(value: i32, what: &str) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| CastepError::BinaryFormat(format!("{} is negative ({})", what, value)))
}

/// 检查点访问器，所有输出均为 eV / Å 与按原子排列
#[derive(Debug, Clone)]
pub struct CastepBin {
    raw: RawCheckpoint,
    units: UnitTable,
}

impl CastepBin {
    /// 读取并解码整个检查点；读取器在返回前被释放
    pub fn read<R: Read>(reader: R, units: &UnitTable) -> Result<CastepBin> {
        let mut records = FortranReader::new(reader);
        let raw = RawCheckpoint::decode(&mut records)?;
        log::debug!("castep_bin: decoded {} records", records.records_read());
        Ok(CastepBin { raw, units: *units })
    }

    pub fn from_raw(raw: RawCheckpoint, units: &UnitTable) -> Self {
        CastepBin { raw, units: *units }
    }

    fn eigen(&self) -> Result<&EigenBlock> {
        self.raw
            .eigen
            .as_ref()
            .ok_or_else(|| CastepError::MissingRecord("EIGENVALUES".to_string()))
    }

    /// [spin][kpoint][band] (eV)
    pub fn eigenvalues(&self) -> Result<Vec<Vec<Vec<f64>>>> {
        let eigen = self.eigen()?;
        Ok(eigen.reorder(&eigen.eigenvalues, self.units.eh))
    }

    /// [spin][kpoint][band]
    pub fn occupancies(&self) -> Result<Vec<Vec<Vec<f64>>>> {
        let eigen = self.eigen()?;
        Ok(eigen.reorder(&eigen.occupancies, 1.0))
    }

    /// 能带块中的 k 点（分数坐标），顺序与 `eigenvalues` 一致
    pub fn kpoints(&self) -> Result<Vec<[f64; 3]>> {
        Ok(self.eigen()?.kpoints.clone())
    }

    /// 当前晶胞的 k 点列表
    fn current_kpoints(&self) -> Result<KpointSet> {
        if self.raw.kpoints.is_empty() {
            return Err(CastepError::MissingRecord("KPOINTS".to_string()));
        }
        let n = self.raw.nkpts.unwrap_or(self.raw.kpoints.len() / 3);
        if self.raw.kpoints.len() < 3 * n {
            return Err(CastepError::BinaryFormat(format!(
                "KPOINTS has {} values, expected {}",
                self.raw.kpoints.len(),
                3 * n
            )));
        }
        // (component, kpoint)
        let coords: Vec<[f64; 3]> = (0..n)
            .map(|k| {
                [
                    self.raw.kpoints[3 * k],
                    self.raw.kpoints[3 * k + 1],
                    self.raw.kpoints[3 * k + 2],
                ]
            })
            .collect();
        Ok(KpointSet::from_coords(&coords, &self.raw.kpoint_weights))
    }

    /// 能带块中第 i 个 k 点在当前晶胞 k 点列表中的位置
    pub fn kpoints_indices(&self, tolerance: f64) -> Result<Vec<usize>> {
        let current = self.current_kpoints()?;
        let eigen = KpointSet::from_coords(&self.kpoints()?, &[]);
        current.match_indices(&eigen, tolerance)
    }

    /// k 点权重，顺序与 `kpoints` 一致
    pub fn kpoint_weights(&self, tolerance: f64) -> Result<Vec<f64>> {
        let indices = self.kpoints_indices(tolerance)?;
        indices
            .iter()
            .map(|&i| {
                self.raw.kpoint_weights.get(i).copied().ok_or_else(|| {
                    CastepError::BinaryFormat(format!("no weight for k-point {}", i))
                })
            })
            .collect()
    }

    /// 按元素分组的数组 → 按原子排列
    fn atom_major(&self, flat: &[f64], what: &str, factor: f64) -> Result<Vec<[f64; 3]>> {
        let max = self.raw.max_ions_in_species;
        let nspecies = self.raw.num_species.max(self.raw.num_ions_in_species.len());
        if flat.len() < 3 * max * nspecies {
            return Err(CastepError::BinaryFormat(format!(
                "{} has {} values, expected {}",
                what,
                flat.len(),
                3 * max * nspecies
            )));
        }

        let mut rows = Vec::new();
        for (s, &count) in self.raw.num_ions_in_species.iter().enumerate() {
            for i in 0..count.min(max) {
                let base = 3 * (i + max * s);
                rows.push([
                    flat[base] * factor,
                    flat[base + 1] * factor,
                    flat[base + 2] * factor,
                ]);
            }
        }
        Ok(rows)
    }

    /// 受力 (eV/Å)，按原子排列
    pub fn forces(&self) -> Result<Vec<[f64; 3]>> {
        if self.raw.forces.is_empty() {
            return Err(CastepError::MissingRecord("FORCES".to_string()));
        }
        self.atom_major(&self.raw.forces, "FORCES", self.units.force())
    }

    /// 分数坐标，按原子排列
    pub fn scaled_positions(&self) -> Result<Vec<[f64; 3]>> {
        if self.raw.ionic_positions.is_empty() {
            return Err(CastepError::MissingRecord("CELL%IONIC_POSITIONS".to_string()));
        }
        self.atom_major(&self.raw.ionic_positions, "CELL%IONIC_POSITIONS", 1.0)
    }

    /// 每个原子的元素符号
    pub fn symbols(&self) -> Vec<String> {
        self.raw
            .num_ions_in_species
            .iter()
            .zip(self.raw.species_symbols.iter())
            .flat_map(|(&n, sym)| std::iter::repeat(sym.clone()).take(n))
            .collect()
    }

    /// 费米能 (eV)，自旋极化时两个
    pub fn fermi_energy(&self) -> Result<Vec<f64>> {
        let first = self
            .raw
            .fermi_energy
            .ok_or_else(|| CastepError::MissingRecord("FERMI_ENERGY".to_string()))?;
        let mut values = vec![first * self.units.eh];
        if let Some(second) = self.raw.fermi_energy_2 {
            values.push(second * self.units.eh);
        }
        Ok(values)
    }

    /// 实空间晶胞 (Å)，行向量
    pub fn cell(&self) -> Result<Matrix3> {
        if self.raw.real_lattice.len() != 9 {
            return Err(CastepError::MissingRecord("CELL%REAL_LATTICE".to_string()));
        }
        let mut m = [[0.0; 3]; 3];
        // (component, vector)
        for (v, row) in m.iter_mut().enumerate() {
            for (c, x) in row.iter_mut().enumerate() {
                *x = self.raw.real_lattice[c + 3 * v] * self.units.a0;
            }
        }
        Ok(m)
    }

    /// 组装为能带数据
    pub fn to_bands(&self, tolerance: f64) -> Result<BandsData> {
        let coords = self.kpoints()?;
        let weights = self.kpoint_weights(tolerance)?;
        Ok(BandsData {
            source: BandsSource::Checkpoint,
            kpoints: KpointSet::from_coords(&coords, &weights),
            eigenvalues: self.eigenvalues()?,
            occupations: Some(self.occupancies()?),
            fermi_energies: self.fermi_energy()?,
            cell: self.cell()?,
            nelecs: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::fortran::FortranWriter;
    use std::io::Cursor;

    const CURRENT_KPOINTS: [[f64; 3]; 3] = [[0.0, 0.0, 0.0], [0.25, 0.0, 0.0], [0.25, 0.25, 0.0]];
    const WEIGHTS: [f64; 3] = [0.2, 0.3, 0.5];
    // 能带块中 k 点顺序与当前列表不同
    const EIGEN_ORDER: [usize; 3] = [2, 0, 1];

    /// 两种元素：Si ×2, O ×1；最大每元素离子数 2
    fn checkpoint_bytes(spin_polarised: bool) -> Vec<u8> {
        let nspins = if spin_polarised { 2 } else { 1 };
        let nbands = 2;
        let mut w = FortranWriter::new(Vec::new());

        w.write_tag("BEGIN_PARAMETERS_DUMP").unwrap();
        w.write_record(b"some unrelated payload").unwrap();

        w.write_tag("CELL%REAL_LATTICE").unwrap();
        w.write_f64s(&[10.0, 0.0, 0.0, 0.0, 11.0, 0.0, 0.0, 0.0, 12.0]).unwrap();
        w.write_tag("CELL%NUM_SPECIES").unwrap();
        w.write_i32s(&[2]).unwrap();
        w.write_tag("CELL%MAX_IONS_IN_SPECIES").unwrap();
        w.write_i32s(&[2]).unwrap();
        w.write_tag("CELL%NUM_IONS_IN_SPECIES").unwrap();
        w.write_i32s(&[2, 1]).unwrap();
        w.write_tag("CELL%SPECIES_SYMBOL").unwrap();
        w.write_record(b"Si      O       ").unwrap();

        // (component, ion, species)，O 的第二个槽位为填充
        let positions = [
            0.0, 0.0, 0.0, 0.5, 0.5, 0.5, // Si
            0.25, 0.25, 0.25, 9.0, 9.0, 9.0, // O
        ];
        w.write_tag("CELL%IONIC_POSITIONS").unwrap();
        w.write_f64s(&positions).unwrap();
        w.write_tag("FORCES").unwrap();
        w.write_f64s(&[0.01, 0.0, 0.0, -0.01, 0.0, 0.0, 0.0, 0.02, 0.0, 7.0, 7.0, 7.0])
            .unwrap();

        w.write_tag("NKPTS").unwrap();
        w.write_i32s(&[3]).unwrap();
        w.write_tag("KPOINTS").unwrap();
        w.write_f64s(&CURRENT_KPOINTS.concat()).unwrap();
        w.write_tag("KPOINT_WEIGHTS").unwrap();
        w.write_f64s(&WEIGHTS).unwrap();

        w.write_tag("FERMI_ENERGY").unwrap();
        w.write_f64s(&[0.2]).unwrap();
        if spin_polarised {
            w.write_tag("FERMI_ENERGY_2").unwrap();
            w.write_f64s(&[0.25]).unwrap();
        }

        w.write_tag("EIGENVALUES").unwrap();
        w.write_i32s(&[3, nspins, nbands]).unwrap();
        for (k, &src) in EIGEN_ORDER.iter().enumerate() {
            w.write_f64s(&CURRENT_KPOINTS[src]).unwrap();
            for _ in 0..nspins {
                w.write_f64s(&[1.0, 0.0]).unwrap();
            }
            for s in 0..nspins {
                // 值编码 (spin, kpoint, band) 便于检查重排
                let base = 0.1 * s as f64 + 0.01 * k as f64;
                w.write_f64s(&[base, base + 0.001]).unwrap();
            }
        }

        w.write_tag("END").unwrap();
        w.into_inner()
    }

    fn read(spin_polarised: bool) -> CastepBin {
        CastepBin::read(Cursor::new(checkpoint_bytes(spin_polarised)), &UnitTable::default())
            .unwrap()
    }

    #[test]
    fn test_eigenvalue_reorder() {
        let bin = read(true);
        let units = UnitTable::default();
        let eig = bin.eigenvalues().unwrap();

        assert_eq!(eig.len(), 2);
        assert_eq!(eig[0].len(), 3);
        assert_eq!(eig[0][0].len(), 2);
        assert!((eig[1][2][1] - (0.1 + 0.02 + 0.001) * units.eh).abs() < 1e-9);
        assert!((eig[0][1][0] - 0.01 * units.eh).abs() < 1e-9);
        assert_eq!(bin.occupancies().unwrap()[1][0], vec![1.0, 0.0]);
    }

    #[test]
    fn test_kpoint_permutation_inverse() {
        let bin = read(false);
        let indices = bin.kpoints_indices(1e-10).unwrap();
        assert_eq!(indices, EIGEN_ORDER.to_vec());

        let eigen_kpoints = bin.kpoints().unwrap();
        for (i, &j) in indices.iter().enumerate() {
            assert_eq!(eigen_kpoints[i], CURRENT_KPOINTS[j]);
        }

        let weights = bin.kpoint_weights(1e-10).unwrap();
        assert_eq!(weights, vec![0.5, 0.2, 0.3]);
    }

    #[test]
    fn test_atom_major_reindex() {
        let bin = read(false);
        let units = UnitTable::default();

        let positions = bin.scaled_positions().unwrap();
        assert_eq!(positions, vec![[0.0, 0.0, 0.0], [0.5, 0.5, 0.5], [0.25, 0.25, 0.25]]);

        let forces = bin.forces().unwrap();
        assert_eq!(forces.len(), 3);
        assert!((forces[2][1] - 0.02 * units.force()).abs() < 1e-12);
        assert_eq!(bin.symbols(), vec!["Si", "Si", "O"]);
    }

    #[test]
    fn test_cell_and_fermi() {
        let units = UnitTable::default();
        let bin = read(true);
        let cell = bin.cell().unwrap();
        assert!((cell[1][1] - 11.0 * units.a0).abs() < 1e-12);
        assert_eq!(cell[0][1], 0.0);

        let fermi = bin.fermi_energy().unwrap();
        assert_eq!(fermi.len(), 2);
        assert!((fermi[1] - 0.25 * units.eh).abs() < 1e-12);
        assert_eq!(read(false).fermi_energy().unwrap().len(), 1);
    }

    #[test]
    fn test_to_bands() {
        let bands = read(false).to_bands(1e-10).unwrap();
        assert_eq!(bands.source, BandsSource::Checkpoint);
        assert_eq!(bands.nspins(), 1);
        assert_eq!(bands.nkpts(), 3);
        assert_eq!(bands.nbands(), 2);
        assert_eq!(bands.kpoints.weights(), vec![0.5, 0.2, 0.3]);
        assert!(bands.occupations.is_some());
    }

    #[test]
    fn test_unmatched_kpoint() {
        let mut raw = RawCheckpoint::decode(&mut FortranReader::new(Cursor::new(
            checkpoint_bytes(false),
        )))
        .unwrap();
        raw.kpoints[3] = 0.3;
        let bin = CastepBin::from_raw(raw, &UnitTable::default());
        assert!(matches!(
            bin.kpoints_indices(1e-10),
            Err(CastepError::UnmatchedKpoint { .. })
        ));
    }

    #[test]
    fn test_missing_eigenvalues() {
        let mut w = FortranWriter::new(Vec::new());
        w.write_tag("END").unwrap();
        let bin = CastepBin::read(Cursor::new(w.into_inner()), &UnitTable::default()).unwrap();
        assert!(matches!(bin.eigenvalues(), Err(CastepError::MissingRecord(_))));
    }

    #[test]
    fn test_truncated_stream_is_error() {
        let mut bytes = checkpoint_bytes(false);
        bytes.truncate(bytes.len() - 50);
        assert!(CastepBin::read(Cursor::new(bytes), &UnitTable::default()).is_err());
    }

    fn eigen_dims_bytes(dims: [i32; 3]) -> Vec<u8> {
        let mut w = FortranWriter::new(Vec::new());
        w.write_tag("EIGENVALUES").unwrap();
        w.write_i32s(&dims).unwrap();
        w.write_tag("END").unwrap();
        w.into_inner()
    }

    #[test]
    fn test_corrupt_eigenvalue_dimensions() {
        let units = UnitTable::default();

        let overflow = CastepBin::read(Cursor::new(eigen_dims_bytes([i32::MAX; 3])), &units);
        assert!(matches!(overflow, Err(CastepError::BinaryFormat(_))));

        // 乘积不溢出但远超实际数据
        let oversized =
            CastepBin::read(Cursor::new(eigen_dims_bytes([1_000_000, 2, 100_000])), &units);
        assert!(matches!(oversized, Err(CastepError::BinaryFormat(_))));
    }
}
