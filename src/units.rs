//! # 物理常数与单位换算表
//!
//! CASTEP 的 .geom/.md/.bands/.castep_bin 文件使用原子单位。
//! 这里提供三个 CODATA 版本的常数表，运行时只选定其中一个作为换算表，
//! 默认 CODATA 2010（CASTEP 8 之后的版本使用该版本）。
//!
//! 换算表是不可变的值类型，由调用方构造一次后按引用传入各个解析器。
//!
//! ## 依赖关系
//! - 被 `parsers/geom.rs`, `parsers/bands.rs`, `parsers/castep_bin.rs` 使用
//! - 被 `config.rs` 使用
//! - 无外部模块依赖

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// CODATA 版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Codata {
    #[serde(rename = "2002")]
    Codata2002,
    #[serde(rename = "2006")]
    Codata2006,
    #[default]
    #[serde(rename = "2010")]
    Codata2010,
}

impl std::fmt::Display for Codata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Codata::Codata2002 => write!(f, "CODATA2002"),
            Codata::Codata2006 => write!(f, "CODATA2006"),
            Codata::Codata2010 => write!(f, "CODATA2010"),
        }
    }
}

impl std::str::FromStr for Codata {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().trim_start_matches("CODATA") {
            "2002" => Ok(Codata::Codata2002),
            "2006" => Ok(Codata::Codata2006),
            "2010" => Ok(Codata::Codata2010),
            _ => Err(format!(
                "Unknown CODATA revision '{}'. Use 2002, 2006 or 2010",
                s
            )),
        }
    }
}

/// 基础 SI 常数（各 CODATA 版本不同的部分）
struct Fundamentals {
    hplanck: f64,
    e: f64,
    me: f64,
    k: f64,
}

impl Codata {
    fn fundamentals(self) -> Fundamentals {
        match self {
            Codata::Codata2002 => Fundamentals {
                hplanck: 6.6260693e-34,
                e: 1.60217653e-19,
                me: 9.1093826e-31,
                k: 1.3806505e-23,
            },
            Codata::Codata2006 => Fundamentals {
                hplanck: 6.62606896e-34,
                e: 1.602176487e-19,
                me: 9.10938215e-31,
                k: 1.3806504e-23,
            },
            Codata::Codata2010 => Fundamentals {
                hplanck: 6.62606957e-34,
                e: 1.602176565e-19,
                me: 9.10938291e-31,
                k: 1.3806488e-23,
            },
        }
    }
}

/// 光速 (m/s)，在 2019 年之前的所有版本中都是定义值
const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// 单位换算表
///
/// 所有能量以 eV、长度以 Å、时间以 s 为目标单位。
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UnitTable {
    pub revision: Codata,
    /// Hartree → eV
    #[serde(rename = "Eh")]
    pub eh: f64,
    /// Bohr → Å
    pub a0: f64,
    /// Boltzmann 常数 (eV/K)
    #[serde(rename = "kB")]
    pub kb: f64,
    /// 约化 Planck 常数 (eV·s)
    pub hbar: f64,
    /// 元电荷 (C)
    pub e: f64,
    /// 原子时间单位 hbar/Eh (s)
    pub t0: f64,
    /// eV/Å³ → Pa
    #[serde(rename = "Pascal")]
    pub pascal: f64,
}

impl UnitTable {
    /// 按指定 CODATA 版本构造换算表
    pub fn new(revision: Codata) -> Self {
        let Fundamentals { hplanck, e, me, k } = revision.fundamentals();

        let mu0 = 4.0e-7 * PI;
        let eps0 = 1.0 / (mu0 * SPEED_OF_LIGHT * SPEED_OF_LIGHT);
        let hbar_si = hplanck / (2.0 * PI);

        // Bohr 半径 (m → Å) 与 Hartree 能量 (J → eV)
        let a0 = 4.0 * PI * eps0 * hbar_si * hbar_si / (me * e * e) * 1e10;
        let eh = me * e.powi(3) / (16.0 * PI * PI * eps0 * eps0 * hbar_si * hbar_si);

        let hbar = hbar_si / e;

        UnitTable {
            revision,
            eh,
            a0,
            kb: k / e,
            hbar,
            e,
            t0: hbar / eh,
            pascal: e * 1e30,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // 常用复合换算因子
    // ─────────────────────────────────────────────────────────────

    /// Hartree/Bohr → eV/Å
    pub fn force(&self) -> f64 {
        self.eh / self.a0
    }

    /// Hartree/Bohr³ → GPa
    pub fn pressure_gpa(&self) -> f64 {
        self.eh / self.a0.powi(3) * self.pascal * 1e-9
    }

    /// Bohr/t0 → Å/ps
    pub fn velocity(&self) -> f64 {
        self.a0 / (self.t0 * 1e12)
    }

    /// Hartree/kB → K
    pub fn temperature(&self) -> f64 {
        self.eh / self.kb
    }

    /// t0 → ps
    pub fn time_ps(&self) -> f64 {
        self.t0 * 1e12
    }
}

impl Default for UnitTable {
    fn default() -> Self {
        UnitTable::new(Codata::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codata2010_values() {
        let u = UnitTable::new(Codata::Codata2010);
        assert!((u.eh - 27.21138505).abs() < 1e-6);
        assert!((u.a0 - 0.52917721092).abs() < 1e-9);
        assert!((u.kb - 8.6173324e-5).abs() < 1e-11);
        assert!((u.hbar - 6.58211928e-16).abs() < 1e-22);
    }

    #[test]
    fn test_revisions_differ() {
        let u2002 = UnitTable::new(Codata::Codata2002);
        let u2006 = UnitTable::new(Codata::Codata2006);
        assert!((u2002.eh - 27.2113845).abs() < 1e-5);
        assert!((u2006.eh - 27.21138386).abs() < 1e-5);
        assert!(u2002.eh != u2006.eh);
    }

    #[test]
    fn test_derived_constants() {
        let u = UnitTable::default();
        assert_eq!(u.revision, Codata::Codata2010);
        assert!((u.t0 - 2.418884326502e-17).abs() < 1e-24);
        assert!((u.pascal - u.e * 1e30).abs() < 1.0);
        // 1 Eh/Bohr³ ≈ 29421 GPa
        assert!((u.pressure_gpa() - 29421.0).abs() < 1.0);
    }

    #[test]
    fn test_codata_from_str() {
        assert_eq!("2006".parse::<Codata>().unwrap(), Codata::Codata2006);
        assert_eq!("codata2002".parse::<Codata>().unwrap(), Codata::Codata2002);
        assert!("1998".parse::<Codata>().is_err());
    }
}
