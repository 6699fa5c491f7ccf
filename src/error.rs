//! # 统一错误处理模块
//!
//! 定义解析引擎的所有错误类型，使用 `thiserror` 派生。
//!
//! 只有"硬失败"（文件自相矛盾、无法继续解析）才会以错误返回；
//! 日志中的警告标记不是错误，它们进入 `warnings` 字段并交给退出状态分类器。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// 解析引擎统一错误类型
#[derive(Error, Debug)]
pub enum CastepError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 解析错误（硬失败）
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {format} file: {path}\nReason: {reason}")]
    ParseError {
        format: String,
        path: String,
        reason: String,
    },

    #[error("Inconsistent .bands file: {0}")]
    BandsMismatch(String),

    #[error("No frames found in trajectory file: {file}")]
    NoFrames { file: String },

    #[error("K-point {index} ({kx}, {ky}, {kz}) has no match in the current cell k-point list")]
    UnmatchedKpoint {
        index: usize,
        kx: f64,
        ky: f64,
        kz: f64,
    },

    #[error("Malformed binary checkpoint: {0}")]
    BinaryFormat(String),

    #[error("Binary checkpoint is missing record '{0}'")]
    MissingRecord(String),

    // ─────────────────────────────────────────────────────────────
    // 参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ─────────────────────────────────────────────────────────────
    // 序列化错误
    // ─────────────────────────────────────────────────────────────
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // 其他
    // ─────────────────────────────────────────────────────────────
    #[error("No matching files found with pattern: {pattern}")]
    NoFilesFound { pattern: String },

    #[error("{0}")]
    Other(String),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, CastepError>;
