//! 逻辑操作符定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 逻辑操作符
///
/// 描述一个条件（或条件组）的结果如何与此前的累积结果合并。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

impl LogicalOperator {
    /// 将本次结果合并进累积值
    ///
    /// 右侧为闭包，仅在需要时才求值：AND 遇到 false、OR 遇到 true 都不会调用。
    pub fn apply<F>(self, accumulator: bool, next: F) -> bool
    where
        F: FnOnce() -> bool,
    {
        match self {
            Self::And => accumulator && next(),
            Self::Or => accumulator || next(),
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}
