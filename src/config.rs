//! # 解析配置
//!
//! `ParserConfig` 汇总了解析过程中所有可调的常量：单位换算表版本、
//! 警告片段长度、尾部扫描窗口等。默认值与 CASTEP 实际输出的布局相匹配，
//! 一般无需修改。
//!
//! ## 依赖关系
//! - 被 `raw_parser.rs` 和各 `parsers/` 使用
//! - 使用 `units.rs`

use crate::error::{CastepError, Result};
use crate::units::{Codata, UnitTable};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 解析配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// 换算表使用的 CODATA 版本
    pub codata: Codata,

    /// "后续内容即消息"类警告截取的行数
    pub warning_snippet_lines: usize,

    /// 尾部计时信息的扫描窗口（行）
    pub tail_lines: usize,

    /// 查找完成标志的窗口（行）
    pub completion_window: usize,

    /// k 点坐标匹配的绝对容差（内部单位）
    pub kpoint_tolerance: f64,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            codata: Codata::default(),
            warning_snippet_lines: 10,
            tail_lines: 50,
            completion_window: 20,
            kpoint_tolerance: 1e-10,
        }
    }
}

impl ParserConfig {
    /// 从 JSON 文件读取配置，缺失的字段取默认值
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| CastepError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: ParserConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// 检查配置是否合理
    pub fn validate(&self) -> Result<()> {
        if self.warning_snippet_lines == 0 {
            return Err(CastepError::InvalidArgument(
                "warning_snippet_lines must be at least 1".to_string(),
            ));
        }
        if !(self.kpoint_tolerance > 0.0) {
            return Err(CastepError::InvalidArgument(format!(
                "kpoint_tolerance must be positive, got {}",
                self.kpoint_tolerance
            )));
        }
        Ok(())
    }

    /// 当前配置对应的换算表
    pub fn units(&self) -> UnitTable {
        UnitTable::new(self.codata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ParserConfig::default();
        assert_eq!(config.warning_snippet_lines, 10);
        assert_eq!(config.tail_lines, 50);
        assert_eq!(config.completion_window, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ParserConfig =
            serde_json::from_str(r#"{"codata": "2006", "tail_lines": 80}"#).unwrap();
        assert_eq!(config.codata, Codata::Codata2006);
        assert_eq!(config.tail_lines, 80);
        assert_eq!(config.completion_window, 20);
    }

    #[test]
    fn test_invalid_tolerance() {
        let config = ParserConfig {
            kpoint_tolerance: 0.0,
            ..ParserConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
