//! 规则引擎错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    /// 编写期配置错误：未知的 actionlet / conditionlet / DataType / comparison
    #[error("配置错误: {0}")]
    Configuration(String),

    /// 参数校验失败，`message_key` 为 DataType 的错误消息键
    #[error("参数校验失败: {key} ({message_key}) - {message}")]
    Validation {
        key: String,
        message_key: String,
        message: String,
    },

    #[error("解析失败: {0}")]
    Parse(String),

    /// 针对实时请求上下文执行时的失败
    #[error("执行失败: {0}")]
    Evaluation(String),

    #[error("动作未经校验即执行: {0}")]
    NotValidated(String),

    #[error("规则未找到: {0}")]
    RuleNotFound(String),

    #[error("规则定义加载失败: {0}")]
    Load(String),

    #[error("JSON 序列化错误: {0}")]
    Json(#[from] serde_json::Error),
}

impl RuleError {
    /// 构造参数校验错误
    pub fn validation(
        key: impl Into<String>,
        message_key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Validation {
            key: key.into(),
            message_key: message_key.into(),
            message: message.into(),
        }
    }

    /// 将校验错误归属到指定参数键，其他错误原样返回
    pub fn for_parameter(self, key: &str) -> Self {
        match self {
            Self::Validation {
                message_key,
                message,
                ..
            } => Self::Validation {
                key: key.to_string(),
                message_key,
                message,
            },
            other => other,
        }
    }

    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Parse(_) => "PARSE_ERROR",
            Self::Evaluation(_) => "EVALUATION_FAILURE",
            Self::NotValidated(_) => "NOT_VALIDATED",
            Self::RuleNotFound(_) => "RULE_NOT_FOUND",
            Self::Load(_) => "LOAD_ERROR",
            Self::Json(_) => "JSON_ERROR",
        }
    }

    /// 是否为编写期错误（应在规则上线前暴露，失败即拒绝）
    pub fn is_authoring_error(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::Validation { .. } | Self::Parse(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RuleError>;
