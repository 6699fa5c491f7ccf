//! # castep-parser
//!
//! CASTEP 计算输出的解析库：把主日志、轨迹、能带和检查点合并为
//! 一份标量记录、一组逐步序列、可选的能带数据和唯一的退出状态。
//!
//! ## 依赖关系
//! ```text
//! lib.rs
//!   ├── raw_parser.rs  (解析流程编排)
//!   │     ├── parsers/     (各文件格式解析器)
//!   │     ├── classify.rs  (退出状态判定)
//!   │     └── models/      (数据模型)
//!   ├── artifacts.rs   (计算目录中的文件定位)
//!   ├── config.rs      (解析配置)
//!   ├── units.rs       (物理常数与单位换算)
//!   └── error.rs       (错误处理)
//! ```

pub mod artifacts;
pub mod classify;
pub mod config;
pub mod error;
pub mod models;
pub mod parsers;
pub mod raw_parser;
pub mod units;

pub use config::ParserConfig;
pub use error::{CastepError, Result};
pub use models::ExitStatus;
pub use raw_parser::{ParsedRun, RawParser};
pub use units::{Codata, UnitTable};
