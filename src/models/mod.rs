//! # 数据模型模块
//!
//! 定义解析结果的数据模型：标量记录、轨迹序列、k 点、能带与退出状态。
//!
//! ## 依赖关系
//! - 被 `parsers/`、`classify.rs` 和 `raw_parser.rs` 使用
//! - 子模块: record, trajectory, kpoints, bands, status, calculation

pub mod bands;
pub mod calculation;
pub mod kpoints;
pub mod record;
pub mod status;
pub mod trajectory;

pub use bands::{BandsData, BandsSource};
pub use calculation::RunSummary;
pub use kpoints::{Kpoint, KpointSet};
pub use record::{ScalarRecord, Value};
pub use status::ExitStatus;
pub use trajectory::{
    Matrix3, RowSeries, ScalarSeries, TensorSeries, Trajectory, TrajectoryBuilder,
};
