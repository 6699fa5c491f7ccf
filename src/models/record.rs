//! # 标量记录
//!
//! 字段名到原始值的映射。单位以 `unit_<field>` 的形式与字段并列存放，
//! 合并结束后由 [`ScalarRecord::prune_units`] 删除没有对应字段的单位。
//!
//! ## 依赖关系
//! - 被 `parsers/castep_log.rs`, `raw_parser.rs` 使用

use serde::Serialize;
use std::collections::BTreeMap;

/// 单位字段前缀
pub const UNIT_PREFIX: &str = "unit_";

/// 记录中的值
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    TextList(Vec<String>),
    TextMap(BTreeMap<String, String>),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

/// 标量记录：后出现的值覆盖先出现的值
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ScalarRecord {
    fields: BTreeMap<String, Value>,
}

impl ScalarRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// 仅在字段尚不存在时写入（头部字段只取首次出现）
    pub fn insert_first(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.entry(key.into()).or_insert_with(|| value.into());
    }

    /// 写入 `unit_<field>`
    pub fn insert_unit(&mut self, field: &str, unit: impl Into<String>) {
        self.fields
            .insert(format!("{}{}", UNIT_PREFIX, field), Value::Text(unit.into()));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// 警告列表（不存在时为空）
    pub fn warnings(&self) -> &[String] {
        match self.fields.get("warnings") {
            Some(Value::TextList(list)) => list,
            _ => &[],
        }
    }

    /// 追加一条警告
    pub fn push_warning(&mut self, warning: String) {
        match self
            .fields
            .entry("warnings".to_string())
            .or_insert_with(|| Value::TextList(Vec::new()))
        {
            Value::TextList(list) => list.push(warning),
            other => *other = Value::TextList(vec![warning]),
        }
    }

    /// 删除孤立的单位字段
    ///
    /// `unit_<q>` 仅在其余字段（含 `extra_keys`，通常是轨迹序列名）中
    /// 存在名字包含 `q` 的字段时保留，例如 `unit_energy` 对应 `total_energy`。
    /// 返回被删除的键。
    pub fn prune_units<'a, I>(&mut self, extra_keys: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut referents: Vec<&str> = self
            .fields
            .keys()
            .map(String::as_str)
            .filter(|k| !k.starts_with(UNIT_PREFIX))
            .collect();
        let extra: Vec<&str> = extra_keys.into_iter().collect();
        referents.extend(extra.iter().copied());

        let orphans: Vec<String> = self
            .fields
            .keys()
            .filter_map(|key| {
                let quantity = key.strip_prefix(UNIT_PREFIX)?;
                if referents.iter().any(|r| r.contains(quantity)) {
                    None
                } else {
                    Some(key.clone())
                }
            })
            .collect();

        for key in &orphans {
            self.fields.remove(key);
        }
        orphans
    }
}
