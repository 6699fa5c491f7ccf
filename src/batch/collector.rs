//! # 文件收集器
//!
//! 根据输入路径和模式收集待处理文件列表。
//!
//! ## 功能
//! - 支持单文件和目录输入
//! - glob 模式匹配（逗号分隔多个模式）
//! - 递归目录搜索
//!
//! ## 依赖关系
//! - 被 `commands/status.rs` 调用
//! - 使用 `walkdir` 遍历目录，`glob` 匹配文件名

use castep_parser::error::{CastepError, Result};
use glob::Pattern;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 文件收集器
pub struct FileCollector {
    /// 输入路径
    input: PathBuf,
    /// 匹配模式列表
    patterns: Vec<Pattern>,
    /// 是否递归
    recursive: bool,
}

impl FileCollector {
    /// 创建新的文件收集器，默认匹配 `*.castep`
    pub fn new(input: PathBuf) -> Self {
        Self {
            input,
            patterns: Vec::new(),
            recursive: false,
        }
    }

    /// 设置匹配模式（逗号分隔的多模式）
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self> {
        self.patterns = pattern
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                Pattern::new(s).map_err(|e| {
                    CastepError::InvalidArgument(format!("Invalid pattern '{}': {}", s, e))
                })
            })
            .collect::<Result<_>>()?;
        Ok(self)
    }

    /// 设置是否递归搜索
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// 收集所有匹配的文件，按路径排序
    pub fn collect(&self) -> Vec<PathBuf> {
        if self.input.is_file() {
            return vec![self.input.clone()];
        }

        if !self.input.is_dir() {
            return vec![];
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };

        let mut files: Vec<PathBuf> = WalkDir::new(&self.input)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|entry| self.matches_patterns(entry.path()))
            .map(|e| e.path().to_path_buf())
            .collect();
        files.sort();
        files
    }

    /// 检查文件是否匹配任一模式
    fn matches_patterns(&self, path: &Path) -> bool {
        let filename = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => return false,
        };

        if self.patterns.is_empty() {
            return filename.ends_with(".castep");
        }
        self.patterns.iter().any(|p| p.matches(filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_matching() {
        let collector = FileCollector::new(PathBuf::from("."))
            .with_pattern("*.castep, Si_?.out")
            .unwrap();
        assert!(collector.matches_patterns(Path::new("runs/Si.castep")));
        assert!(collector.matches_patterns(Path::new("Si_1.out")));
        assert!(!collector.matches_patterns(Path::new("Si.castep_bin")));
        assert!(!collector.matches_patterns(Path::new("Si_12.out")));
    }

    #[test]
    fn test_default_pattern() {
        let collector = FileCollector::new(PathBuf::from("."));
        assert!(collector.matches_patterns(Path::new("a.castep")));
        assert!(!collector.matches_patterns(Path::new("a.geom")));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(FileCollector::new(PathBuf::from(".")).with_pattern("[").is_err());
    }
}
