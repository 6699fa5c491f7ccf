//! # 退出状态判定
//!
//! 按固定优先级依次检查规则，第一个成立的规则决定退出状态：
//!
//! | 优先级 | 状态 | 条件 |
//! |---|---|---|
//! | 1 | ERROR_SCF_NOT_CONVERGED | 警告中含 SCF 未收敛 |
//! | 2 | ERROR_STOP_REQUESTED | 警告中含 STOP 关键字 |
//! | 3 | ERROR_TIMELIMIT_REACHED | 警告中含时间不足 |
//! | 4 | ERROR_CASTEP_ERROR | 存在 .err 文件 |
//! | 5 | ERROR_NO_END_OF_CALCULATION | 末尾没有完成标志 |
//! | 6 | CALC_FINISHED | 其余情况 |
//!
//! ## 依赖关系
//! - 被 `raw_parser.rs` 使用
//! - 使用 `models/status.rs`, `parsers/castep_log.rs` 的消息常量

use crate::models::ExitStatus;
use crate::parsers::castep_log::{SCF_FAILURE_MESSAGE, STOP_MESSAGE, TIMELIMIT_MESSAGE};

/// 判定所需的全部信息
#[derive(Debug, Clone, Copy)]
pub struct Evidence<'a> {
    pub warnings: &'a [String],
    pub error_artifact: bool,
    pub finished: bool,
}

impl Evidence<'_> {
    fn has_warning(&self, message: &str) -> bool {
        self.warnings.iter().any(|w| w == message)
    }
}

type Rule = fn(&Evidence<'_>) -> bool;

const RULES: &[(ExitStatus, Rule)] = &[
    (ExitStatus::ErrorScfNotConverged, |e| {
        e.has_warning(SCF_FAILURE_MESSAGE)
    }),
    (ExitStatus::ErrorStopRequested, |e| e.has_warning(STOP_MESSAGE)),
    (ExitStatus::ErrorTimelimitReached, |e| {
        e.has_warning(TIMELIMIT_MESSAGE)
    }),
    (ExitStatus::ErrorCastepError, |e| e.error_artifact),
    (ExitStatus::ErrorNoEndOfCalculation, |e| !e.finished),
    (ExitStatus::CalcFinished, |e| e.finished),
];

/// 返回唯一的退出状态
pub fn classify(evidence: &Evidence<'_>) -> ExitStatus {
    RULES
        .iter()
        .find(|(_, rule)| rule(evidence))
        .map(|(status, _)| *status)
        .unwrap_or(ExitStatus::UnknownError)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evidence(warnings: &[String], error_artifact: bool, finished: bool) -> Evidence<'_> {
        Evidence {
            warnings,
            error_artifact,
            finished,
        }
    }

    #[test]
    fn test_clean_run_finishes() {
        assert_eq!(classify(&evidence(&[], false, true)), ExitStatus::CalcFinished);
    }

    #[test]
    fn test_scf_beats_timelimit() {
        let warnings = vec![TIMELIMIT_MESSAGE.to_string(), SCF_FAILURE_MESSAGE.to_string()];
        assert_eq!(
            classify(&evidence(&warnings, true, false)),
            ExitStatus::ErrorScfNotConverged
        );
    }

    #[test]
    fn test_stop_beats_error_artifact() {
        let warnings = vec![STOP_MESSAGE.to_string()];
        assert_eq!(
            classify(&evidence(&warnings, true, true)),
            ExitStatus::ErrorStopRequested
        );
    }

    #[test]
    fn test_error_artifact_beats_missing_end() {
        assert_eq!(classify(&evidence(&[], true, false)), ExitStatus::ErrorCastepError);
    }

    #[test]
    fn test_truncated_run() {
        assert_eq!(
            classify(&evidence(&[], false, false)),
            ExitStatus::ErrorNoEndOfCalculation
        );
    }

    #[test]
    fn test_minor_warnings_ignored() {
        let warnings = vec!["Warning: something harmless".to_string()];
        assert_eq!(classify(&evidence(&warnings, false, true)), ExitStatus::CalcFinished);
    }
}
