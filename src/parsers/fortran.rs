//! # Fortran 顺序无格式记录
//!
//! 每条记录为 `u32 长度 | 数据 | u32 长度`，大端序。
//! `FortranWriter` 按同样的格式写出，用于生成检查点测试数据。
//!
//! ## 依赖关系
//! - 被 `parsers/castep_bin.rs` 使用

use crate::error::{CastepError, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Read, Write};

/// 记录读取器
pub struct FortranReader<R: Read> {
    inner: R,
    records_read: usize,
}

impl<R: Read> FortranReader<R> {
    pub fn new(inner: R) -> Self {
        FortranReader {
            inner,
            records_read: 0,
        }
    }

    pub fn records_read(&self) -> usize {
        self.records_read
    }

    /// 读取下一条记录，流在记录边界处结束时返回 `None`
    pub fn read_record(&mut self) -> Result<Option<Vec<u8>>> {
        let len = match self.inner.read_u32::<BigEndian>() {
            Ok(n) => n as usize,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        // 按实际读到的字节增长
        let mut payload = Vec::new();
        let read = (&mut self.inner).take(len as u64).read_to_end(&mut payload);
        read.map_err(|e| self.io_error(e))?;
        if payload.len() != len {
            return Err(CastepError::BinaryFormat(format!(
                "record {}: declared length {} but stream ended after {} bytes",
                self.records_read,
                len,
                payload.len()
            )));
        }

        let trailer = self
            .inner
            .read_u32::<BigEndian>()
            .map_err(|e| self.io_error(e))? as usize;
        if trailer != len {
            return Err(CastepError::BinaryFormat(format!(
                "record {}: leading length {} does not match trailing length {}",
                self.records_read, len, trailer
            )));
        }

        self.records_read += 1;
        Ok(Some(payload))
    }

    /// 读取下一条记录，流结束视为错误
    pub fn expect_record(&mut self, what: &str) -> Result<Vec<u8>> {
        self.read_record()?
            .ok_or_else(|| CastepError::BinaryFormat(format!("unexpected end of stream reading {}", what)))
    }

    pub fn read_f64s(&mut self, what: &str) -> Result<Vec<f64>> {
        let record = self.expect_record(what)?;
        decode_f64s(&record, what)
    }

    pub fn read_i32s(&mut self, what: &str) -> Result<Vec<i32>> {
        let record = self.expect_record(what)?;
        decode_i32s(&record, what)
    }

    pub fn read_i32(&mut self, what: &str) -> Result<i32> {
        self.read_i32s(what)?
            .first()
            .copied()
            .ok_or_else(|| CastepError::BinaryFormat(format!("empty record for {}", what)))
    }

    pub fn read_f64(&mut self, what: &str) -> Result<f64> {
        self.read_f64s(what)?
            .first()
            .copied()
            .ok_or_else(|| CastepError::BinaryFormat(format!("empty record for {}", what)))
    }

    fn io_error(&self, e: io::Error) -> CastepError {
        CastepError::BinaryFormat(format!("record {}: {}", self.records_read, e))
    }
}

pub fn decode_f64s(record: &[u8], what: &str) -> Result<Vec<f64>> {
    if record.len() % 8 != 0 {
        return Err(CastepError::BinaryFormat(format!(
            "{}: record length {} is not a multiple of 8",
            what,
            record.len()
        )));
    }
    let mut cursor = Cursor::new(record);
    (0..record.len() / 8)
        .map(|_| {
            cursor
                .read_f64::<BigEndian>()
                .map_err(|e| CastepError::BinaryFormat(format!("{}: {}", what, e)))
        })
        .collect()
}

pub fn decode_i32s(record: &[u8], what: &str) -> Result<Vec<i32>> {
    if record.len() % 4 != 0 {
        return Err(CastepError::BinaryFormat(format!(
            "{}: record length {} is not a multiple of 4",
            what,
            record.len()
        )));
    }
    let mut cursor = Cursor::new(record);
    (0..record.len() / 4)
        .map(|_| {
            cursor
                .read_i32::<BigEndian>()
                .map_err(|e| CastepError::BinaryFormat(format!("{}: {}", what, e)))
        })
        .collect()
}

/// 定长字符串记录，去掉尾部空格与空字符
pub fn decode_str(record: &[u8]) -> String {
    String::from_utf8_lossy(record)
        .trim_end_matches(|c: char| c == ' ' || c == '\0')
        .trim_start()
        .to_string()
}

/// 记录写出器
pub struct FortranWriter<W: Write> {
    inner: W,
}

impl<W: Write> FortranWriter<W> {
    pub fn new(inner: W) -> Self {
        FortranWriter { inner }
    }

    pub fn write_record(&mut self, payload: &[u8]) -> io::Result<()> {
        self.inner.write_u32::<BigEndian>(payload.len() as u32)?;
        self.inner.write_all(payload)?;
        self.inner.write_u32::<BigEndian>(payload.len() as u32)
    }

    /// 标签记录，空格补齐到 30 字节
    pub fn write_tag(&mut self, tag: &str) -> io::Result<()> {
        self.write_record(format!("{:<30}", tag).as_bytes())
    }

    pub fn write_f64s(&mut self, values: &[f64]) -> io::Result<()> {
        let mut bytes = Vec::with_capacity(values.len() * 8);
        for v in values {
            bytes.write_f64::<BigEndian>(*v)?;
        }
        self.write_record(&bytes)
    }

    pub fn write_i32s(&mut self, values: &[i32]) -> io::Result<()> {
        let mut bytes = Vec::with_capacity(values.len() * 4);
        for v in values {
            bytes.write_i32::<BigEndian>(*v)?;
        }
        self.write_record(&bytes)
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
