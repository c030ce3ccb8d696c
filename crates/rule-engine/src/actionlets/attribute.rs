use crate::actionlet::Actionlet;
use crate::context::RequestContext;
use crate::datatype::{ids, DataType};
use crate::error::Result;
use crate::models::Parameters;
use crate::parameters::ParametersExt;
use crate::registry::Registry;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeInstance {
    pub name: String,
    pub value: Value,
}

/// 在请求级临时属性上写入类型化的值
///
/// 参数 `type` 为注册表中的 DataType 标识，缺省为 `text`。
pub struct SetRequestAttributeActionlet;

impl SetRequestAttributeActionlet {
    pub const ID: &'static str = "SetRequestAttribute";
}

impl Actionlet for SetRequestAttributeActionlet {
    type Instance = AttributeInstance;

    fn id(&self) -> &str {
        Self::ID
    }

    fn instance_from(&self, parameters: &Parameters, registry: &Registry) -> Result<AttributeInstance> {
        let text = DataType::text();
        let name = parameters.require("name", &text)?;
        let type_id = parameters.or_default("type", &text, ids::TEXT)?;
        let data_type = registry.data_type(type_id.trim())?;

        Ok(AttributeInstance {
            name: name.trim().to_string(),
            value: parameters.require_json("value", data_type.as_ref())?,
        })
    }

    fn evaluate(&self, ctx: &mut RequestContext, instance: &AttributeInstance) -> Result<bool> {
        ctx.set_attribute(instance.name.clone(), instance.value.clone());
        Ok(true)
    }
}
