//! # 批量处理模块
//!
//! 为 `status` 命令提供文件收集与并行解析能力。
//!
//! ## 功能
//! - 收集匹配的 .castep 文件
//! - 并行处理
//! - 进度反馈与统计
//!
//! ## 依赖关系
//! - 被 `commands/status.rs` 使用
//! - 使用 `rayon` 进行并行处理
//! - 使用 `indicatif` 显示进度

pub mod collector;
pub mod runner;

pub use collector::FileCollector;
pub use runner::{BatchResult, BatchRunner};
