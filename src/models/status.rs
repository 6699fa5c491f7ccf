//! # 计算退出状态
//!
//! 固定的有序枚举，每个状态带有数值代码与说明。
//! 选择逻辑见 `classify.rs`。
//!
//! ## 依赖关系
//! - 被 `classify.rs`, `raw_parser.rs` 使用

use serde::{Serialize, Serializer};

/// 退出状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitStatus {
    CalcFinished,
    ErrorScfNotConverged,
    ErrorStopRequested,
    ErrorTimelimitReached,
    ErrorCastepError,
    ErrorNoEndOfCalculation,
    UnknownError,
}

impl ExitStatus {
    /// 数值代码
    pub fn code(self) -> u32 {
        match self {
            ExitStatus::CalcFinished => 0,
            ExitStatus::ErrorNoEndOfCalculation => 101,
            ExitStatus::ErrorScfNotConverged => 103,
            ExitStatus::ErrorCastepError => 104,
            ExitStatus::ErrorTimelimitReached => 107,
            ExitStatus::ErrorStopRequested => 108,
            ExitStatus::UnknownError => 200,
        }
    }

    /// 状态名
    pub fn name(self) -> &'static str {
        match self {
            ExitStatus::CalcFinished => "CALC_FINISHED",
            ExitStatus::ErrorScfNotConverged => "ERROR_SCF_NOT_CONVERGED",
            ExitStatus::ErrorStopRequested => "ERROR_STOP_REQUESTED",
            ExitStatus::ErrorTimelimitReached => "ERROR_TIMELIMIT_REACHED",
            ExitStatus::ErrorCastepError => "ERROR_CASTEP_ERROR",
            ExitStatus::ErrorNoEndOfCalculation => "ERROR_NO_END_OF_CALCULATION",
            ExitStatus::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// 说明
    pub fn message(self) -> &'static str {
        match self {
            ExitStatus::CalcFinished => "Calculation terminated gracefully, end found",
            ExitStatus::ErrorScfNotConverged => "SCF cycles failed to converge",
            ExitStatus::ErrorStopRequested => "Calculation terminated by the STOP keyword",
            ExitStatus::ErrorTimelimitReached => "Calculation terminated due to time limit",
            ExitStatus::ErrorCastepError => "An error file (.err) was produced by CASTEP",
            ExitStatus::ErrorNoEndOfCalculation => {
                "CASTEP output does not have the end of calculation marker"
            }
            ExitStatus::UnknownError => "An unknown error has occurred",
        }
    }

    pub fn is_success(self) -> bool {
        self == ExitStatus::CalcFinished
    }
}

impl std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

impl Serialize for ExitStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("ExitStatus", 3)?;
        s.serialize_field("name", self.name())?;
        s.serialize_field("code", &self.code())?;
        s.serialize_field("message", self.message())?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let all = [
            ExitStatus::CalcFinished,
            ExitStatus::ErrorScfNotConverged,
            ExitStatus::ErrorStopRequested,
            ExitStatus::ErrorTimelimitReached,
            ExitStatus::ErrorCastepError,
            ExitStatus::ErrorNoEndOfCalculation,
            ExitStatus::UnknownError,
        ];
        let mut codes: Vec<u32> = all.iter().map(|s| s.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }

    #[test]
    fn test_serialize_exit_status() {
        let json = serde_json::to_value(ExitStatus::ErrorCastepError).unwrap();
        assert_eq!(json["name"], "ERROR_CASTEP_ERROR");
        assert_eq!(json["code"], 104);
    }
}
