//! # 行匹配器
//!
//! 每个匹配器由一个正则表达式、一个结果标签和一个数值转换方式组成，
//! 从单行文本中提取 `(标签, 值)`；带单位的匹配器额外捕获行尾的单位，
//! 返回 `(标签, 值, 单位)`。
//!
//! `MatcherSet` 按固定顺序依次尝试，返回第一个命中的结果。
//!
//! ## 依赖关系
//! - 被 `parsers/castep_log.rs` 使用
//! - 使用 `models/record.rs`

use crate::models::Value;
use regex::Regex;

/// 浮点数（含 Fortran 科学计数法）
pub const FLOAT: &str = r"[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?";

/// 捕获值的转换方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    Float,
    Int,
    Text,
}

impl Conversion {
    fn convert(self, raw: &str) -> Option<Value> {
        let raw = raw.trim();
        match self {
            Conversion::Float => raw.parse::<f64>().ok().map(Value::Float),
            Conversion::Int => raw.parse::<i64>().ok().map(Value::Int),
            Conversion::Text => Some(Value::Text(raw.to_string())),
        }
    }
}

/// 一次成功匹配的结果
#[derive(Debug, Clone, PartialEq)]
pub struct Matched<T> {
    pub tag: T,
    pub value: Value,
    pub unit: Option<String>,
}

/// 单个行匹配器
#[derive(Debug, Clone)]
pub struct LineMatcher<T> {
    tag: T,
    regex: Regex,
    conversion: Conversion,
    with_unit: bool,
}

impl<T: Copy> LineMatcher<T> {
    /// 单捕获组，按浮点数转换
    pub fn new(pattern: &str, tag: T) -> Self {
        LineMatcher {
            tag,
            regex: Regex::new(pattern).unwrap(),
            conversion: Conversion::Float,
            with_unit: false,
        }
    }

    /// 第二个捕获组为单位
    pub fn with_unit(pattern: &str, tag: T) -> Self {
        LineMatcher {
            with_unit: true,
            ..LineMatcher::new(pattern, tag)
        }
    }

    pub fn conversion(mut self, conversion: Conversion) -> Self {
        self.conversion = conversion;
        self
    }

    /// 尝试匹配一行；值无法转换时视为未命中
    pub fn try_match(&self, line: &str) -> Option<Matched<T>> {
        let caps = self.regex.captures(line)?;
        let value = self.conversion.convert(caps.get(1)?.as_str())?;
        let unit = if self.with_unit {
            caps.get(2).map(|m| m.as_str().to_string())
        } else {
            None
        };
        Some(Matched {
            tag: self.tag,
            value,
            unit,
        })
    }
}

/// 有序匹配器列表，第一个命中者胜出
#[derive(Debug, Clone)]
pub struct MatcherSet<T> {
    matchers: Vec<LineMatcher<T>>,
}

impl<T: Copy> MatcherSet<T> {
    pub fn new(matchers: Vec<LineMatcher<T>>) -> Self {
        MatcherSet { matchers }
    }

    pub fn first_match(&self, line: &str) -> Option<Matched<T>> {
        self.matchers.iter().find_map(|m| m.try_match(line))
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}
