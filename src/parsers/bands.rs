//! # CASTEP .bands 文件解析器
//!
//! ## 格式说明
//! ```text
//! Number of k-points   2
//! Number of spin components 1
//! Number of electrons    8.000
//! Number of eigenvalues      4
//! Fermi energy (in atomic units)     0.204172
//! Unit cell vectors
//!    -5.130000    5.130000    5.130000
//!     5.130000   -5.130000    5.130000
//!     5.130000    5.130000   -5.130000
//! K-point    1  0.25000000  0.25000000  0.25000000  0.50000000
//! Spin component    1
//!   -0.19512345
//!   ...
//! ```
//! 自旋极化时 `Number of electrons`、`Number of eigenvalues` 与
//! `Fermi energies` 各有两个值。能量单位 Hartree、晶胞单位 Bohr，
//! 输出换算为 eV 与 Å。
//!
//! ## 依赖关系
//! - 被 `raw_parser.rs` 使用
//! - 使用 `models/bands.rs`, `models/kpoints.rs`, `units.rs`

use crate::error::{CastepError, Result};
use crate::models::{BandsData, BandsSource, Kpoint, KpointSet, Matrix3};
use crate::units::UnitTable;

/// 头部信息
#[derive(Debug, Default)]
struct BandsHeader {
    nkpts: usize,
    nspins: usize,
    nelecs: Vec<f64>,
    neigns: Vec<usize>,
    fermi: Vec<f64>,
    cell: Matrix3,
}

/// 单个 k 点的原始数据
#[derive(Debug)]
struct KpointBlock {
    point: Kpoint,
    spins: Vec<Vec<f64>>,
}

/// 解析 .bands 文件内容
pub fn parse_bands<S: AsRef<str>>(lines: &[S], units: &UnitTable) -> Result<BandsData> {
    let (header, body_start) = parse_header(lines)?;
    let blocks = parse_body(&lines[body_start..])?;
    check_counts(&header, &blocks)?;

    // [kpoint][spin][band] → [spin][kpoint][band]
    let mut eigenvalues = vec![Vec::with_capacity(header.nkpts); header.nspins];
    for block in &blocks {
        for (spin, values) in block.spins.iter().enumerate() {
            eigenvalues[spin].push(values.iter().map(|e| e * units.eh).collect());
        }
    }

    let cell = header
        .cell
        .map(|row| row.map(|x| x * units.a0));

    Ok(BandsData {
        source: BandsSource::BandsFile,
        kpoints: KpointSet::new(blocks.into_iter().map(|b| b.point).collect()),
        eigenvalues,
        occupations: None,
        fermi_energies: header.fermi.iter().map(|e| e * units.eh).collect(),
        cell,
        nelecs: header.nelecs,
    })
}

fn parse_header<S: AsRef<str>>(lines: &[S]) -> Result<(BandsHeader, usize)> {
    let mut header = BandsHeader::default();

    for (i, line) in lines.iter().enumerate() {
        let line = line.as_ref().trim();
        let values = trailing_numbers(line);

        if line.starts_with("Number of k-points") {
            header.nkpts = first_usize(&values, line)?;
        } else if line.starts_with("Number of spin components") {
            header.nspins = first_usize(&values, line)?;
        } else if line.starts_with("Number of electrons") {
            header.nelecs = values;
        } else if line.starts_with("Number of eigenvalues") {
            header.neigns = values.iter().map(|v| *v as usize).collect();
        } else if line.starts_with("Fermi energ") {
            header.fermi = values;
        } else if line.starts_with("Unit cell") {
            if i + 4 > lines.len() {
                return Err(header_error("unit cell block is truncated"));
            }
            for (k, row) in lines[i + 1..i + 4].iter().enumerate() {
                let nums = trailing_numbers(row.as_ref());
                if nums.len() < 3 {
                    return Err(header_error("unit cell row has fewer than 3 values"));
                }
                header.cell[k] = [nums[0], nums[1], nums[2]];
            }
            if header.neigns.is_empty() {
                return Err(header_error("missing 'Number of eigenvalues'"));
            }
            return Ok((header, i + 4));
        }
    }

    Err(header_error("missing 'Unit cell' block"))
}

fn parse_body<S: AsRef<str>>(lines: &[S]) -> Result<Vec<KpointBlock>> {
    let mut blocks: Vec<KpointBlock> = Vec::new();

    for line in lines {
        let line = line.as_ref().trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("K-point") {
            let nums = trailing_numbers(rest);
            if nums.len() < 5 {
                return Err(CastepError::BandsMismatch(format!(
                    "malformed k-point line '{}'",
                    line
                )));
            }
            blocks.push(KpointBlock {
                point: Kpoint {
                    index: nums[0] as usize,
                    coords: [nums[1], nums[2], nums[3]],
                    weight: nums[4],
                },
                spins: Vec::new(),
            });
        } else if line.starts_with("Spin component") {
            match blocks.last_mut() {
                Some(block) => block.spins.push(Vec::new()),
                None => {
                    return Err(CastepError::BandsMismatch(
                        "spin component before the first k-point".to_string(),
                    ))
                }
            }
        } else {
            let value: f64 = line.parse().map_err(|_| {
                CastepError::BandsMismatch(format!("unexpected line '{}'", line))
            })?;
            match blocks.last_mut().and_then(|b| b.spins.last_mut()) {
                Some(spin) => spin.push(value),
                None => {
                    return Err(CastepError::BandsMismatch(
                        "eigenvalue outside a spin component".to_string(),
                    ))
                }
            }
        }
    }

    Ok(blocks)
}

fn check_counts(header: &BandsHeader, blocks: &[KpointBlock]) -> Result<()> {
    if blocks.len() != header.nkpts {
        return Err(CastepError::BandsMismatch(format!(
            "expected {} k-points, found {}",
            header.nkpts,
            blocks.len()
        )));
    }

    for block in blocks {
        if block.spins.len() != header.nspins {
            return Err(CastepError::BandsMismatch(format!(
                "k-point {} has {} spin components, expected {}",
                block.point.index,
                block.spins.len(),
                header.nspins
            )));
        }
        for (spin, values) in block.spins.iter().enumerate() {
            let expected = header
                .neigns
                .get(spin)
                .or_else(|| header.neigns.first())
                .copied()
                .unwrap_or(0);
            if values.len() != expected {
                return Err(CastepError::BandsMismatch(format!(
                    "k-point {} spin {} has {} eigenvalues, expected {}",
                    block.point.index,
                    spin + 1,
                    values.len(),
                    expected
                )));
            }
        }
    }

    Ok(())
}

/// 行内所有可解析为数字的记号
fn trailing_numbers(line: &str) -> Vec<f64> {
    line.split_whitespace()
        .filter_map(|t| t.parse::<f64>().ok())
        .collect()
}

fn first_usize(values: &[f64], line: &str) -> Result<usize> {
    values
        .first()
        .map(|v| *v as usize)
        .ok_or_else(|| header_error(&format!("no value in '{}'", line)))
}

fn header_error(reason: &str) -> CastepError {
    CastepError::ParseError {
        format: "bands".to_string(),
        path: String::new(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BANDS: &str = r#"Number of k-points   2
Number of spin components 1
Number of electrons    8.000
Number of eigenvalues      3
Fermi energy (in atomic units)     0.200000
Unit cell vectors
   10.000000    0.000000    0.000000
    0.000000   10.000000    0.000000
    0.000000    0.000000   10.000000
K-point    1  0.00000000  0.00000000  0.00000000  0.50000000
Spin component    1
   -0.10000000
    0.10000000
    0.30000000
K-point    2  0.50000000  0.00000000  0.00000000  0.50000000
Spin component    1
   -0.05000000
    0.15000000
    0.35000000
"#;

    const BANDS_SPIN: &str = r#"Number of k-points   1
Number of spin components 2
Number of electrons    4.000    3.000
Number of eigenvalues      2     2
Fermi energies (in atomic units)     0.200000    0.210000
Unit cell vectors
   10.000000    0.000000    0.000000
    0.000000   10.000000    0.000000
    0.000000    0.000000   10.000000
K-point    1  0.00000000  0.00000000  0.00000000  1.00000000
Spin component    1
   -0.10000000
    0.10000000
Spin component    2
   -0.09000000
    0.12000000
"#;

    fn lines(text: &str) -> Vec<&str> {
        text.lines().collect()
    }

    #[test]
    fn test_parse_bands() {
        let units = UnitTable::default();
        let bands = parse_bands(&lines(BANDS), &units).unwrap();

        assert_eq!(bands.nspins(), 1);
        assert_eq!(bands.nkpts(), 2);
        assert_eq!(bands.nbands(), 3);
        assert_eq!(bands.source, BandsSource::BandsFile);
        assert!((bands.eigenvalues[0][1][2] - 0.35 * units.eh).abs() < 1e-9);
        assert!((bands.fermi_energies[0] - 0.2 * units.eh).abs() < 1e-9);
        assert!((bands.cell[1][1] - 10.0 * units.a0).abs() < 1e-9);
        assert_eq!(bands.kpoints.coords()[1], [0.5, 0.0, 0.0]);
        assert_eq!(bands.kpoints.weights(), vec![0.5, 0.5]);
        assert_eq!(bands.nelecs, vec![8.0]);
    }

    #[test]
    fn test_parse_spin_polarised() {
        let bands = parse_bands(&lines(BANDS_SPIN), &UnitTable::default()).unwrap();
        assert_eq!(bands.nspins(), 2);
        assert_eq!(bands.fermi_energies.len(), 2);
        assert_eq!(bands.nelecs, vec![4.0, 3.0]);
        assert_eq!(bands.eigenvalues[1][0].len(), 2);
    }

    #[test]
    fn test_kpoint_count_mismatch() {
        let text = BANDS.replace("Number of k-points   2", "Number of k-points   3");
        let err = parse_bands(&lines(&text), &UnitTable::default()).unwrap_err();
        assert!(matches!(err, CastepError::BandsMismatch(_)));
    }

    #[test]
    fn test_eigenvalue_count_mismatch() {
        let text = BANDS.replace("    0.35000000\n", "");
        let err = parse_bands(&lines(&text), &UnitTable::default()).unwrap_err();
        assert!(matches!(err, CastepError::BandsMismatch(_)));
    }

    #[test]
    fn test_spin_count_mismatch() {
        let text = BANDS.replace("Number of spin components 1", "Number of spin components 2");
        let err = parse_bands(&lines(&text), &UnitTable::default()).unwrap_err();
        assert!(matches!(err, CastepError::BandsMismatch(_)));
    }

    #[test]
    fn test_missing_unit_cell() {
        let err = parse_bands(&lines("Number of k-points 1\n"), &UnitTable::default()).unwrap_err();
        assert!(matches!(err, CastepError::ParseError { .. }));
    }
}
