//! # 计算产物定位
//!
//! 在计算目录中按 seed 名查找各输出文件并读入内存：
//! - `<seed>.castep`: 主日志（必需）
//! - `<seed>.geom` 或 `<seed>.md`: 轨迹
//! - `<seed>.bands`: 能带
//! - `<seed>.castep_bin`: 检查点
//! - `<seed>.err` 或 `<seed>.*.err`: 错误文件（可能每个进程一个）
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 使用 `raw_parser.rs`
//! - 使用 `glob` 查找错误文件

use crate::config::ParserConfig;
use crate::error::{CastepError, Result};
use crate::raw_parser::{ParsedRun, RawParser};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// 一次计算的全部产物路径
#[derive(Debug, Clone)]
pub struct SeedFiles {
    pub seed: String,
    pub castep: PathBuf,
    pub trajectory: Option<PathBuf>,
    pub bands: Option<PathBuf>,
    pub checkpoint: Option<PathBuf>,
    pub error_files: Vec<PathBuf>,
}

impl SeedFiles {
    /// 从 .castep 文件路径或计算目录定位
    pub fn locate(path: &Path) -> Result<SeedFiles> {
        let castep = if path.is_dir() {
            find_castep_in(path)?
        } else if path.is_file() {
            path.to_path_buf()
        } else {
            return Err(CastepError::FileNotFound {
                path: path.display().to_string(),
            });
        };

        let seed = castep
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| CastepError::InvalidArgument(format!(
                "Cannot determine seed name from '{}'",
                castep.display()
            )))?
            .to_string();
        let dir = castep
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let sibling = |ext: &str| {
            let p = dir.join(format!("{}.{}", seed, ext));
            if p.is_file() {
                Some(p)
            } else {
                None
            }
        };

        let trajectory = sibling("geom").or_else(|| sibling("md"));
        let bands = sibling("bands");
        let checkpoint = sibling("castep_bin");
        let error_files = find_error_files(&dir, &seed)?;

        Ok(SeedFiles {
            seed,
            castep,
            trajectory,
            bands,
            checkpoint,
            error_files,
        })
    }

    /// 读入所有产物并解析
    pub fn parse(&self, config: &ParserConfig, scf_only: bool) -> Result<ParsedRun> {
        let log_lines = read_lines(&self.castep)?;
        let mut parser = RawParser::new(config.clone());

        if let Some(path) = &self.trajectory {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            parser = parser.with_trajectory(name, &read_lines(path)?);
        }
        if let Some(path) = &self.bands {
            parser = parser.with_bands(&read_lines(path)?);
        }
        if let Some(path) = &self.checkpoint {
            let file = File::open(path).map_err(|e| CastepError::FileReadError {
                path: path.display().to_string(),
                source: e,
            })?;
            parser = parser.with_checkpoint(BufReader::new(file), scf_only);
        }
        if !self.error_files.is_empty() {
            let texts = self
                .error_files
                .iter()
                .map(|p| read_text(p))
                .collect::<Result<Vec<_>>>()?;
            parser = parser.with_error_files(true, texts.join("\n"));
        }

        parser.parse(&log_lines)
    }
}

/// 目录中的 .castep 文件：优先与目录同名者，否则按名称排序取第一个
fn find_castep_in(dir: &Path) -> Result<PathBuf> {
    let pattern = format!("{}/*.castep", glob::Pattern::escape(&dir.to_string_lossy()));
    let mut candidates: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| CastepError::InvalidArgument(e.to_string()))?
        .filter_map(|p| p.ok())
        .collect();
    candidates.sort();

    let dir_name = dir.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if let Some(p) = candidates
        .iter()
        .find(|p| p.file_stem().and_then(|s| s.to_str()) == Some(dir_name))
    {
        return Ok(p.clone());
    }

    match candidates.len() {
        0 => Err(CastepError::NoFilesFound { pattern }),
        1 => Ok(candidates.remove(0)),
        n => {
            log::warn!(
                "{} .castep files in '{}', using '{}'",
                n,
                dir.display(),
                candidates[0].display()
            );
            Ok(candidates.remove(0))
        }
    }
}

/// `<seed>.err` 与每进程的 `<seed>.NNNN.err`；共享前缀的其他 seed 不算
fn find_error_files(dir: &Path, seed: &str) -> Result<Vec<PathBuf>> {
    let escaped_dir = glob::Pattern::escape(&dir.to_string_lossy());
    let escaped_seed = glob::Pattern::escape(seed);
    let mut files = Vec::new();
    for pattern in [
        format!("{}/{}.err", escaped_dir, escaped_seed),
        format!("{}/{}.*.err", escaped_dir, escaped_seed),
    ] {
        files.extend(
            glob::glob(&pattern)
                .map_err(|e| CastepError::InvalidArgument(e.to_string()))?
                .filter_map(|p| p.ok()),
        );
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| CastepError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })
}

/// 读取文本文件的全部行
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    Ok(read_text(path)?.lines().map(String::from).collect())
}
