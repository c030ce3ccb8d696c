//! 参数读取
//!
//! 插件在校验阶段通过 [`ParametersExt`] 按 DataType 读取参数，
//! 错误统一归属到对应的参数键。

use crate::datatype::{DataType, ParameterType};
use crate::error::{Result, RuleError};
use crate::models::Parameters;
use serde_json::Value;

/// 缺少必填参数时的错误消息键
pub const REQUIRED_MESSAGE_KEY: &str = "rules.parameter.required";

pub trait ParametersExt {
    /// 原始参数值；空白值视为未提供
    fn raw(&self, key: &str) -> Option<&str>;

    /// 读取必填参数
    fn require<T>(&self, key: &str, data_type: &DataType<T>) -> Result<T>;

    /// 读取可选参数
    fn optional<T>(&self, key: &str, data_type: &DataType<T>) -> Result<Option<T>>;

    /// 读取参数，未提供时使用默认值
    fn or_default<T>(&self, key: &str, data_type: &DataType<T>, default: &str) -> Result<T>;

    /// 按类型擦除的数据类型读取必填参数并转换为 JSON
    fn require_json(&self, key: &str, data_type: &dyn ParameterType) -> Result<Value>;
}

fn missing(key: &str) -> RuleError {
    RuleError::validation(
        key,
        REQUIRED_MESSAGE_KEY,
        format!("缺少必填参数: '{}'", key),
    )
}

impl ParametersExt for Parameters {
    fn raw(&self, key: &str) -> Option<&str> {
        self.get(key)
            .map(|p| p.value.as_str())
            .filter(|v| !v.trim().is_empty())
    }

    fn require<T>(&self, key: &str, data_type: &DataType<T>) -> Result<T> {
        let raw = self.raw(key).ok_or_else(|| missing(key))?;
        data_type
            .parse_valid(raw)
            .map_err(|e| e.for_parameter(key))
    }

    fn optional<T>(&self, key: &str, data_type: &DataType<T>) -> Result<Option<T>> {
        match self.raw(key) {
            Some(raw) => data_type
                .parse_valid(raw)
                .map(Some)
                .map_err(|e| e.for_parameter(key)),
            None => Ok(None),
        }
    }

    fn or_default<T>(&self, key: &str, data_type: &DataType<T>, default: &str) -> Result<T> {
        let raw = self.raw(key).unwrap_or(default);
        data_type
            .parse_valid(raw)
            .map_err(|e| e.for_parameter(key))
    }

    fn require_json(&self, key: &str, data_type: &dyn ParameterType) -> Result<Value> {
        let raw = self.raw(key).ok_or_else(|| missing(key))?;
        data_type.to_json(raw).map_err(|e| e.for_parameter(key))
    }
}
