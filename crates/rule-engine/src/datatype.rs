//! 参数数据类型
//!
//! `DataType<T>` 将原始字符串参数转换为类型化的值，并按注册顺序
//! 执行限制条件（[`Comparison`]）。转换失败为解析错误；任一限制
//! 不满足时返回携带错误消息键的校验错误。

use crate::comparison::Comparison;
use crate::error::{Result, RuleError};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// 内置数据类型标识
pub mod ids {
    pub const TEXT: &str = "text";
    pub const NUMERIC: &str = "numeric";
    pub const BOOLEAN: &str = "boolean";
    pub const DATETIME: &str = "datetime";
}

/// 限制条件：比较谓词及其绑定参数
pub struct Restriction<T> {
    comparison: Arc<dyn Comparison<T>>,
    args: Vec<T>,
}

impl<T> Restriction<T> {
    pub fn comparison_id(&self) -> &str {
        self.comparison.id()
    }

    pub fn args(&self) -> &[T] {
        &self.args
    }

    fn allows(&self, value: &T) -> bool {
        self.comparison.matches(value, &self.args)
    }
}

/// 类型化参数解析器
pub struct DataType<T> {
    id: String,
    error_message_key: String,
    converter: fn(&str) -> Result<T>,
    restrictions: Vec<Restriction<T>>,
}

impl<T> DataType<T> {
    pub fn new(
        id: impl Into<String>,
        error_message_key: impl Into<String>,
        converter: fn(&str) -> Result<T>,
    ) -> Self {
        Self {
            id: id.into(),
            error_message_key: error_message_key.into(),
            converter,
            restrictions: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn error_message_key(&self) -> &str {
        &self.error_message_key
    }

    pub fn restrictions(&self) -> &[Restriction<T>] {
        &self.restrictions
    }

    /// 追加限制条件（构建器风格，可链式声明多个限制）
    pub fn restrict<C>(mut self, comparison: C, args: Vec<T>) -> Self
    where
        C: Comparison<T> + 'static,
    {
        self.restrictions.push(Restriction {
            comparison: Arc::new(comparison),
            args,
        });
        self
    }

    /// 将原始字符串转换为类型化值
    pub fn convert(&self, raw: &str) -> Result<T> {
        (self.converter)(raw)
    }

    /// 转换并执行全部限制条件，返回通过校验的值
    pub fn parse_valid(&self, raw: &str) -> Result<T> {
        let value = self.convert(raw).map_err(|e| {
            RuleError::validation(&self.id, &self.error_message_key, e.to_string())
        })?;

        if let Some(failed) = self.restrictions.iter().find(|r| !r.allows(&value)) {
            return Err(RuleError::validation(
                &self.id,
                &self.error_message_key,
                format!(
                    "值 '{}' 不满足 {} 限制 '{}'",
                    raw,
                    self.id,
                    failed.comparison_id()
                ),
            ));
        }

        Ok(value)
    }

    /// 校验原始字符串，遇到第一个不满足的限制即失败
    pub fn check_valid(&self, raw: &str) -> Result<()> {
        self.parse_valid(raw).map(|_| ())
    }
}

impl<T> fmt::Debug for DataType<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataType")
            .field("id", &self.id)
            .field("error_message_key", &self.error_message_key)
            .field(
                "restrictions",
                &self
                    .restrictions
                    .iter()
                    .map(|r| r.comparison_id())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

fn convert_text(raw: &str) -> Result<String> {
    Ok(raw.to_string())
}

pub(crate) fn convert_numeric(raw: &str) -> Result<f64> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| RuleError::Parse(format!("无法解析数值: '{}'", raw)))?;

    if !value.is_finite() {
        return Err(RuleError::Parse(format!("数值必须为有限值: '{}'", raw)));
    }

    Ok(value)
}

fn convert_boolean(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(RuleError::Parse(format!("无法解析布尔值: '{}'", raw))),
    }
}

fn convert_datetime(raw: &str) -> Result<DateTime<Utc>> {
    let s = raw.trim();

    // ISO 8601 / RFC 3339
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // 纯日期按当天零点（UTC）处理
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc());
    }

    Err(RuleError::Parse(format!("无法解析日期时间: '{}'", raw)))
}

impl DataType<String> {
    pub fn text() -> Self {
        Self::new(ids::TEXT, "rules.datatype.text.invalid", convert_text)
    }
}

impl DataType<f64> {
    pub fn numeric() -> Self {
        Self::new(ids::NUMERIC, "rules.datatype.numeric.invalid", convert_numeric)
    }
}

impl DataType<bool> {
    pub fn boolean() -> Self {
        Self::new(ids::BOOLEAN, "rules.datatype.boolean.invalid", convert_boolean)
    }
}

impl DataType<DateTime<Utc>> {
    pub fn datetime() -> Self {
        Self::new(ids::DATETIME, "rules.datatype.datetime.invalid", convert_datetime)
    }
}

/// 类型擦除后的数据类型视图，供注册表保存异构类型
pub trait ParameterType: Send + Sync {
    fn id(&self) -> &str;

    fn error_message_key(&self) -> &str;

    fn check_valid(&self, raw: &str) -> Result<()>;

    /// 校验并转换为 JSON 值
    fn to_json(&self, raw: &str) -> Result<Value>;
}

impl<T> ParameterType for DataType<T>
where
    T: Serialize + Send + Sync + 'static,
{
    fn id(&self) -> &str {
        DataType::id(self)
    }

    fn error_message_key(&self) -> &str {
        DataType::error_message_key(self)
    }

    fn check_valid(&self, raw: &str) -> Result<()> {
        DataType::check_valid(self, raw)
    }

    fn to_json(&self, raw: &str) -> Result<Value> {
        let value = self.parse_valid(raw)?;
        Ok(serde_json::to_value(value)?)
    }
}
