//! 比较谓词
//!
//! `Comparison<T>` 是针对类型化值与零或多个同类型参数的具名谓词，
//! 既用作 DataType 的限制条件，也被 conditionlet 用来比较请求值。

use crate::datatype::convert_numeric;
use crate::error::{Result, RuleError};
use parking_lot::RwLock;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 内置比较的标识
pub mod ids {
    pub const EXISTS: &str = "exists";
    pub const IS: &str = "is";
    pub const IS_NOT: &str = "isNot";
    pub const STARTS_WITH: &str = "startsWith";
    pub const ENDS_WITH: &str = "endsWith";
    pub const CONTAINS: &str = "contains";
    pub const REGEX: &str = "regex";
    pub const ONE_OF: &str = "oneOf";
    pub const GREATER_THAN: &str = "greaterThan";
    pub const GREATER_THAN_OR_EQUAL: &str = "greaterThanOrEqual";
    pub const LESS_THAN: &str = "lessThan";
    pub const LESS_THAN_OR_EQUAL: &str = "lessThanOrEqual";
    pub const BETWEEN: &str = "between";
}

/// 比较所需的参数个数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Self::Exactly(n) => count == n,
            Self::AtLeast(n) => count >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exactly(n) => write!(f, "{}", n),
            Self::AtLeast(n) => write!(f, "至少 {}", n),
        }
    }
}

/// 比较能力
pub trait Comparison<T>: Send + Sync {
    fn id(&self) -> &str;

    fn arity(&self) -> Arity {
        Arity::Exactly(1)
    }

    fn matches(&self, value: &T, args: &[T]) -> bool;

    /// 被比较的值不存在时的结果
    fn matches_missing(&self) -> bool {
        false
    }

    /// 校验参数（编写期调用）
    fn check_args(&self, args: &[T]) -> Result<()> {
        if self.arity().accepts(args.len()) {
            Ok(())
        } else {
            Err(RuleError::validation(
                "value",
                "rules.comparison.arity",
                format!(
                    "比较 '{}' 需要 {} 个参数, 实际 {}",
                    self.id(),
                    self.arity(),
                    args.len()
                ),
            ))
        }
    }
}

/// 十进制字面量的有效数字是否在 f64 可无损区分的范围内
///
/// 不超过 15 位有效数字的不同十进制数必然对应不同的 f64。
fn within_f64_precision(raw: &str) -> bool {
    let unsigned = raw.trim().trim_start_matches(['+', '-']);
    let mantissa = unsigned.split(['e', 'E']).next().unwrap_or(unsigned);
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let significant = digits.trim_start_matches('0').trim_end_matches('0');
    significant.len() <= f64::DIGITS as usize
}

/// 值存在且非空白
pub struct Exists;

impl Comparison<String> for Exists {
    fn id(&self) -> &str {
        ids::EXISTS
    }

    fn arity(&self) -> Arity {
        Arity::Exactly(0)
    }

    fn matches(&self, value: &String, _args: &[String]) -> bool {
        !value.trim().is_empty()
    }
}

/// 相等（文本比较忽略大小写）
pub struct Is;

impl Comparison<String> for Is {
    fn id(&self) -> &str {
        ids::IS
    }

    fn matches(&self, value: &String, args: &[String]) -> bool {
        args.first().is_some_and(|arg| value.eq_ignore_ascii_case(arg))
    }
}

impl Comparison<f64> for Is {
    fn id(&self) -> &str {
        ids::IS
    }

    fn matches(&self, value: &f64, args: &[f64]) -> bool {
        args.first().is_some_and(|arg| value == arg)
    }
}

/// 不相等；值不存在时视为不相等
pub struct IsNot;

impl Comparison<String> for IsNot {
    fn id(&self) -> &str {
        ids::IS_NOT
    }

    fn matches(&self, value: &String, args: &[String]) -> bool {
        !Is.matches(value, args)
    }

    fn matches_missing(&self) -> bool {
        true
    }
}

impl Comparison<f64> for IsNot {
    fn id(&self) -> &str {
        ids::IS_NOT
    }

    fn matches(&self, value: &f64, args: &[f64]) -> bool {
        !Is.matches(value, args)
    }

    fn matches_missing(&self) -> bool {
        true
    }
}

pub struct StartsWith;

impl Comparison<String> for StartsWith {
    fn id(&self) -> &str {
        ids::STARTS_WITH
    }

    fn matches(&self, value: &String, args: &[String]) -> bool {
        args.first().is_some_and(|arg| value.starts_with(arg.as_str()))
    }
}

pub struct EndsWith;

impl Comparison<String> for EndsWith {
    fn id(&self) -> &str {
        ids::ENDS_WITH
    }

    fn matches(&self, value: &String, args: &[String]) -> bool {
        args.first().is_some_and(|arg| value.ends_with(arg.as_str()))
    }
}

pub struct Contains;

impl Comparison<String> for Contains {
    fn id(&self) -> &str {
        ids::CONTAINS
    }

    fn matches(&self, value: &String, args: &[String]) -> bool {
        args.first().is_some_and(|arg| value.contains(arg.as_str()))
    }
}

/// 正则匹配，编译结果按模式缓存
#[derive(Default)]
pub struct Matches {
    cache: RwLock<HashMap<String, Regex>>,
}

impl Matches {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_match(&self, pattern: &str, value: &str) -> bool {
        if let Some(regex) = self.cache.read().get(pattern) {
            return regex.is_match(value);
        }

        match Regex::new(pattern) {
            Ok(regex) => {
                let matched = regex.is_match(value);
                self.cache.write().insert(pattern.to_string(), regex);
                matched
            }
            // 无效模式在校验阶段即被拒绝，这里按不匹配处理
            Err(_) => false,
        }
    }
}

impl Comparison<String> for Matches {
    fn id(&self) -> &str {
        ids::REGEX
    }

    fn matches(&self, value: &String, args: &[String]) -> bool {
        args.first().is_some_and(|pattern| self.is_match(pattern, value))
    }

    fn check_args(&self, args: &[String]) -> Result<()> {
        if args.len() != 1 {
            return Err(RuleError::validation(
                "value",
                "rules.comparison.arity",
                format!("比较 'regex' 需要 1 个参数, 实际 {}", args.len()),
            ));
        }
        Regex::new(&args[0]).map_err(|e| {
            RuleError::validation(
                "value",
                "rules.comparison.regex.invalid",
                format!("无效的正则表达式 '{}': {}", args[0], e),
            )
        })?;
        Ok(())
    }
}

/// 值属于参数列表之一
pub struct OneOf;

impl Comparison<String> for OneOf {
    fn id(&self) -> &str {
        ids::ONE_OF
    }

    fn arity(&self) -> Arity {
        Arity::AtLeast(1)
    }

    fn matches(&self, value: &String, args: &[String]) -> bool {
        args.iter().any(|arg| value.eq_ignore_ascii_case(arg))
    }
}

impl Comparison<f64> for OneOf {
    fn id(&self) -> &str {
        ids::ONE_OF
    }

    fn arity(&self) -> Arity {
        Arity::AtLeast(1)
    }

    fn matches(&self, value: &f64, args: &[f64]) -> bool {
        args.iter().any(|arg| value == arg)
    }
}

/// 数值大小比较
pub struct NumericCompare {
    id: &'static str,
    cmp: fn(f64, f64) -> bool,
}

impl NumericCompare {
    pub fn greater_than() -> Self {
        Self {
            id: ids::GREATER_THAN,
            cmp: |a, b| a > b,
        }
    }

    pub fn greater_than_or_equal() -> Self {
        Self {
            id: ids::GREATER_THAN_OR_EQUAL,
            cmp: |a, b| a >= b,
        }
    }

    pub fn less_than() -> Self {
        Self {
            id: ids::LESS_THAN,
            cmp: |a, b| a < b,
        }
    }

    pub fn less_than_or_equal() -> Self {
        Self {
            id: ids::LESS_THAN_OR_EQUAL,
            cmp: |a, b| a <= b,
        }
    }
}

impl Comparison<f64> for NumericCompare {
    fn id(&self) -> &str {
        self.id
    }

    fn matches(&self, value: &f64, args: &[f64]) -> bool {
        args.first().is_some_and(|arg| (self.cmp)(*value, *arg))
    }
}

/// 闭区间 [min, max]
pub struct Between;

impl Comparison<f64> for Between {
    fn id(&self) -> &str {
        ids::BETWEEN
    }

    fn arity(&self) -> Arity {
        Arity::Exactly(2)
    }

    fn matches(&self, value: &f64, args: &[f64]) -> bool {
        match args {
            [min, max] => *value >= *min && *value <= *max,
            _ => false,
        }
    }
}

/// 已绑定参数的比较
///
/// 数值版本可用且请求值可解析为有限数字时按数值比较，否则回退到文本比较。
/// 同时存在文本版本时（is / isNot / oneOf），只有两侧都能无损表示为 f64
/// 才按数值比较，超长数字 ID 仍按文本逐字比较。
#[derive(Clone)]
pub struct BoundComparison {
    id: String,
    numeric: Option<(Arc<dyn Comparison<f64>>, Vec<f64>)>,
    text: Option<(Arc<dyn Comparison<String>>, Vec<String>)>,
    lossless_args: bool,
}

impl BoundComparison {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_numeric(&self) -> bool {
        self.numeric.is_some()
    }

    /// 针对请求中的原始值求值
    pub fn matches_raw(&self, value: Option<&str>) -> bool {
        let Some(value) = value else {
            return self
                .text
                .as_ref()
                .map(|(cmp, _)| cmp.matches_missing())
                .or_else(|| self.numeric.as_ref().map(|(cmp, _)| cmp.matches_missing()))
                .unwrap_or(false);
        };

        if let Some((cmp, args)) = &self.numeric
            && let Ok(number) = convert_numeric(value)
            && (self.text.is_none() || (self.lossless_args && within_f64_precision(value)))
        {
            return cmp.matches(&number, args);
        }

        match &self.text {
            Some((cmp, args)) => cmp.matches(&value.to_string(), args),
            None => false,
        }
    }
}

impl fmt::Debug for BoundComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundComparison")
            .field("id", &self.id)
            .field("numeric_args", &self.numeric.as_ref().map(|(_, args)| args))
            .field("text_args", &self.text.as_ref().map(|(_, args)| args))
            .finish()
    }
}

/// 比较目录
///
/// 按标识分别保存文本与数值版本的比较。
#[derive(Clone, Default)]
pub struct ComparisonCatalog {
    text: HashMap<String, Arc<dyn Comparison<String>>>,
    numeric: HashMap<String, Arc<dyn Comparison<f64>>>,
}

impl ComparisonCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 包含全部内置比较的目录
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();

        catalog.register_text(Arc::new(Exists));
        catalog.register_text(Arc::new(Is));
        catalog.register_text(Arc::new(IsNot));
        catalog.register_text(Arc::new(StartsWith));
        catalog.register_text(Arc::new(EndsWith));
        catalog.register_text(Arc::new(Contains));
        catalog.register_text(Arc::new(Matches::new()));
        catalog.register_text(Arc::new(OneOf));

        catalog.register_numeric(Arc::new(Is));
        catalog.register_numeric(Arc::new(IsNot));
        catalog.register_numeric(Arc::new(OneOf));
        catalog.register_numeric(Arc::new(NumericCompare::greater_than()));
        catalog.register_numeric(Arc::new(NumericCompare::greater_than_or_equal()));
        catalog.register_numeric(Arc::new(NumericCompare::less_than()));
        catalog.register_numeric(Arc::new(NumericCompare::less_than_or_equal()));
        catalog.register_numeric(Arc::new(Between));

        catalog
    }

    pub fn register_text(&mut self, comparison: Arc<dyn Comparison<String>>) {
        self.text.insert(comparison.id().to_string(), comparison);
    }

    pub fn register_numeric(&mut self, comparison: Arc<dyn Comparison<f64>>) {
        self.numeric.insert(comparison.id().to_string(), comparison);
    }

    pub fn text(&self, id: &str) -> Option<Arc<dyn Comparison<String>>> {
        self.text.get(id).cloned()
    }

    pub fn numeric(&self, id: &str) -> Option<Arc<dyn Comparison<f64>>> {
        self.numeric.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.text.contains_key(id) || self.numeric.contains_key(id)
    }

    /// 所有已注册的比较标识（排序后）
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .text
            .keys()
            .chain(self.numeric.keys())
            .cloned()
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// 按标识解析比较并绑定参数
    ///
    /// 单参数比较把整个值作为一个参数；多参数比较按逗号拆分。
    pub fn bind(&self, id: &str, raw_value: Option<&str>) -> Result<BoundComparison> {
        let text = self.text.get(id);
        let numeric = self.numeric.get(id);

        let arity = match (text, numeric) {
            (Some(cmp), _) => cmp.arity(),
            (None, Some(cmp)) => cmp.arity(),
            (None, None) => {
                return Err(RuleError::Configuration(format!("未知的比较: '{}'", id)));
            }
        };

        let raw_args = split_args(arity, raw_value);

        let numeric = match numeric {
            Some(cmp) => {
                let parsed: Result<Vec<f64>> =
                    raw_args.iter().map(|arg| convert_numeric(arg)).collect();
                match parsed {
                    Ok(args) => {
                        cmp.check_args(&args)?;
                        Some((cmp.clone(), args))
                    }
                    Err(_) if text.is_some() => None,
                    Err(_) => {
                        return Err(RuleError::validation(
                            "value",
                            "rules.comparison.numeric.invalid",
                            format!("比较 '{}' 需要数值参数: {:?}", id, raw_args),
                        ));
                    }
                }
            }
            None => None,
        };

        let text = match text {
            Some(cmp) => {
                cmp.check_args(&raw_args)?;
                Some((cmp.clone(), raw_args.clone()))
            }
            None => None,
        };

        let lossless_args = raw_args.iter().all(|arg| within_f64_precision(arg));

        Ok(BoundComparison {
            id: id.to_string(),
            numeric,
            text,
            lossless_args,
        })
    }
}

fn split_args(arity: Arity, raw_value: Option<&str>) -> Vec<String> {
    match (arity, raw_value) {
        (Arity::Exactly(0), _) | (_, None) => Vec::new(),
        (Arity::Exactly(1), Some(raw)) => vec![raw.trim().to_string()],
        (_, Some(raw)) => raw
            .split(',')
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect(),
    }
}
