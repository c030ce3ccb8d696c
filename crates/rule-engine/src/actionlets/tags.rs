use crate::actionlet::Actionlet;
use crate::context::RequestContext;
use crate::datatype::DataType;
use crate::error::{Result, RuleError};
use crate::models::Parameters;
use crate::parameters::ParametersExt;
use crate::registry::Registry;

/// 为当前访客打标签，参数 `tags` 以逗号分隔
pub struct TagVisitorActionlet;

impl TagVisitorActionlet {
    pub const ID: &'static str = "TagVisitor";
}

impl Actionlet for TagVisitorActionlet {
    type Instance = Vec<String>;

    fn id(&self) -> &str {
        Self::ID
    }

    fn instance_from(&self, parameters: &Parameters, _registry: &Registry) -> Result<Vec<String>> {
        let raw = parameters.require("tags", &DataType::text())?;
        let tags: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect();

        if tags.is_empty() {
            return Err(RuleError::validation(
                "tags",
                "rules.parameter.required",
                "至少需要一个标签",
            ));
        }

        Ok(tags)
    }

    fn evaluate(&self, ctx: &mut RequestContext, tags: &Vec<String>) -> Result<bool> {
        match ctx.visitor_mut() {
            Some(visitor) => {
                visitor.add_tags(tags.iter().cloned());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
