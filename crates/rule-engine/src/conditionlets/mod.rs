//! 内置条件插件

mod persona;
mod request;

pub use persona::VisitorPersonaConditionlet;
pub use request::{
    ComparisonInstance, RequestAttributeConditionlet, RequestHeaderConditionlet,
    RequestParameterConditionlet,
};

use crate::comparison::BoundComparison;
use crate::datatype::DataType;
use crate::error::Result;
use crate::models::Parameters;
use crate::parameters::ParametersExt;
use crate::registry::Registry;

/// 参数键
pub mod keys {
    pub const COMPARISON: &str = "comparison";
    pub const VALUE: &str = "value";
}

/// 读取 `comparison` / `value` 参数并从注册表绑定比较
fn bind_comparison(
    parameters: &Parameters,
    registry: &Registry,
    default_comparison: Option<&str>,
) -> Result<BoundComparison> {
    let text = DataType::text();
    let comparison = match default_comparison {
        Some(default) => parameters.or_default(keys::COMPARISON, &text, default)?,
        None => parameters.require(keys::COMPARISON, &text)?,
    };

    registry
        .comparisons()
        .bind(comparison.trim(), parameters.raw(keys::VALUE))
}
