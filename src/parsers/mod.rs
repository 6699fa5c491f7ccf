//! # 解析器模块
//!
//! 提供 CASTEP 各输出文件的解析器：
//! 主日志 (.castep)、轨迹 (.geom/.md)、能带 (.bands) 与二进制检查点 (.castep_bin)。
//!
//! 所有解析器都只接受已读入内存的行或字节流，不直接访问文件系统。
//!
//! ## 依赖关系
//! - 被 `raw_parser.rs` 使用
//! - 使用 `models/` 数据模型和 `units.rs`
//! - 子模块: matchers, castep_log, geom, bands, castep_bin, fortran

pub mod bands;
pub mod castep_bin;
pub mod castep_log;
pub mod fortran;
pub mod geom;
pub mod matchers;

pub use bands::parse_bands;
pub use castep_bin::{CastepBin, RawCheckpoint};
pub use castep_log::{CastepLogScanner, LogPatterns, LogScan, WarningKind, WarningSignal};
pub use geom::parse_geom;
pub use matchers::{LineMatcher, MatcherSet};
