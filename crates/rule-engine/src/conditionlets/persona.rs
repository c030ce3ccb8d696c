use super::bind_comparison;
use crate::comparison::{ids, BoundComparison};
use crate::conditionlet::Conditionlet;
use crate::context::RequestContext;
use crate::error::Result;
use crate::models::Parameters;
use crate::registry::Registry;

/// 比较当前访客的画像
///
/// 参数 `value`（或兼容写法 `persona`）为待比较的画像标识，`comparison` 缺省为 `is`。
/// 没有访客或访客没有画像时结果为 false。
pub struct VisitorPersonaConditionlet;

impl VisitorPersonaConditionlet {
    pub const ID: &'static str = "VisitorPersona";
}

impl Conditionlet for VisitorPersonaConditionlet {
    type Instance = BoundComparison;

    fn id(&self) -> &str {
        Self::ID
    }

    fn instance_from(&self, parameters: &Parameters, registry: &Registry) -> Result<Self::Instance> {
        match parameters.get("persona") {
            Some(persona) if !parameters.contains_key("value") => {
                let mut aliased = parameters.clone();
                let mut value = persona.clone();
                value.key = "value".to_string();
                aliased.insert(value.key.clone(), value);
                bind_comparison(&aliased, registry, Some(ids::IS))
            }
            _ => bind_comparison(parameters, registry, Some(ids::IS)),
        }
    }

    fn evaluate(&self, ctx: &RequestContext, instance: &Self::Instance) -> Result<bool> {
        let Some(persona) = ctx.visitor().and_then(|v| v.persona.as_ref()) else {
            return Ok(false);
        };

        let by_id = instance.matches_raw(Some(&persona.id));
        let by_tag = persona
            .key_tag
            .as_deref()
            .is_some_and(|tag| instance.matches_raw(Some(tag)));
        Ok(by_id || by_tag)
    }
}
