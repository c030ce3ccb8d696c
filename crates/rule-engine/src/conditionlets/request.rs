use super::bind_comparison;
use crate::comparison::BoundComparison;
use crate::conditionlet::Conditionlet;
use crate::context::RequestContext;
use crate::datatype::DataType;
use crate::error::Result;
use crate::models::Parameters;
use crate::parameters::ParametersExt;
use crate::registry::Registry;
use serde_json::Value;

/// 请求值比较实例：取值位置 + 已绑定的比较
#[derive(Debug, Clone)]
pub struct ComparisonInstance {
    pub subject: String,
    pub comparison: BoundComparison,
}

fn comparison_instance(
    subject_key: &str,
    parameters: &Parameters,
    registry: &Registry,
) -> Result<ComparisonInstance> {
    let subject = parameters.require(subject_key, &DataType::text())?;
    let comparison = bind_comparison(parameters, registry, None)?;
    Ok(ComparisonInstance {
        subject: subject.trim().to_string(),
        comparison,
    })
}

/// 比较请求参数（查询串或表单）
pub struct RequestParameterConditionlet;

impl RequestParameterConditionlet {
    pub const ID: &'static str = "RequestParameter";
}

impl Conditionlet for RequestParameterConditionlet {
    type Instance = ComparisonInstance;

    fn id(&self) -> &str {
        Self::ID
    }

    fn instance_from(&self, parameters: &Parameters, registry: &Registry) -> Result<Self::Instance> {
        comparison_instance("name", parameters, registry)
    }

    fn evaluate(&self, ctx: &RequestContext, instance: &Self::Instance) -> Result<bool> {
        let value = ctx.request().parameter(&instance.subject);
        Ok(instance.comparison.matches_raw(value))
    }
}

/// 比较请求头（名称大小写不敏感）
pub struct RequestHeaderConditionlet;

impl RequestHeaderConditionlet {
    pub const ID: &'static str = "RequestHeader";
}

impl Conditionlet for RequestHeaderConditionlet {
    type Instance = ComparisonInstance;

    fn id(&self) -> &str {
        Self::ID
    }

    fn instance_from(&self, parameters: &Parameters, registry: &Registry) -> Result<Self::Instance> {
        comparison_instance("header", parameters, registry)
    }

    fn evaluate(&self, ctx: &RequestContext, instance: &Self::Instance) -> Result<bool> {
        let value = ctx.request().header(&instance.subject);
        Ok(instance.comparison.matches_raw(value))
    }
}

/// 比较请求属性文档中点号路径指向的值
pub struct RequestAttributeConditionlet;

impl RequestAttributeConditionlet {
    pub const ID: &'static str = "RequestAttribute";
}

/// 标量转为文本参与比较；null 视为不存在
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

impl Conditionlet for RequestAttributeConditionlet {
    type Instance = ComparisonInstance;

    fn id(&self) -> &str {
        Self::ID
    }

    fn instance_from(&self, parameters: &Parameters, registry: &Registry) -> Result<Self::Instance> {
        comparison_instance("path", parameters, registry)
    }

    fn evaluate(&self, ctx: &RequestContext, instance: &Self::Instance) -> Result<bool> {
        let value = ctx.attribute(&instance.subject).and_then(scalar_text);
        Ok(instance.comparison.matches_raw(value.as_deref()))
    }
}
