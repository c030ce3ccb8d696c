use crate::actionlet::Actionlet;
use crate::comparison::Matches;
use crate::context::RequestContext;
use crate::datatype::DataType;
use crate::error::Result;
use crate::models::Parameters;
use crate::parameters::ParametersExt;
use crate::registry::Registry;

/// HTTP 头名称允许的字符（RFC 7230 token）
const HEADER_TOKEN: &str = r"^[!#$%&'*+.^_`|~0-9A-Za-z-]+$";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderInstance {
    pub name: String,
    pub value: String,
}

/// 设置响应头
pub struct SetResponseHeaderActionlet {
    header_name: DataType<String>,
}

impl SetResponseHeaderActionlet {
    pub const ID: &'static str = "SetHeader";

    pub fn new() -> Self {
        Self {
            header_name: DataType::text().restrict(Matches::new(), vec![HEADER_TOKEN.to_string()]),
        }
    }
}

impl Default for SetResponseHeaderActionlet {
    fn default() -> Self {
        Self::new()
    }
}

impl Actionlet for SetResponseHeaderActionlet {
    type Instance = HeaderInstance;

    fn id(&self) -> &str {
        Self::ID
    }

    fn instance_from(&self, parameters: &Parameters, _registry: &Registry) -> Result<HeaderInstance> {
        Ok(HeaderInstance {
            name: parameters.require("name", &self.header_name)?,
            value: parameters.require("value", &DataType::text())?,
        })
    }

    fn evaluate(&self, ctx: &mut RequestContext, instance: &HeaderInstance) -> Result<bool> {
        ctx.response_mut()
            .set_header(instance.name.clone(), instance.value.clone());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuleError;
    use crate::models::{parameters_from, ParameterModel};

    fn params(pairs: &[(&str, &str)]) -> Parameters {
        parameters_from(pairs.iter().map(|(k, v)| ParameterModel::new(*k, *v)))
    }

    #[test]
    fn test_sets_header() {
        let registry = Registry::builder().build();
        let actionlet = SetResponseHeaderActionlet::new();
        let instance = actionlet
            .instance_from(&params(&[("name", "X-Test"), ("value", "1")]), &registry)
            .unwrap();

        let mut ctx = RequestContext::default();
        assert!(actionlet.evaluate(&mut ctx, &instance).unwrap());
        assert_eq!(ctx.response().header("X-Test"), Some("1"));
    }

    #[test]
    fn test_rejects_invalid_header_name() {
        let registry = Registry::builder().build();
        let err = SetResponseHeaderActionlet::new()
            .instance_from(&params(&[("name", "X Test"), ("value", "1")]), &registry)
            .unwrap_err();

        match err {
            RuleError::Validation {
                key, message_key, ..
            } => {
                assert_eq!(key, "name");
                assert_eq!(message_key, "rules.datatype.text.invalid");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_value_required() {
        let registry = Registry::builder().build();
        let err = SetResponseHeaderActionlet::new()
            .instance_from(&params(&[("name", "X-Test")]), &registry)
            .unwrap_err();
        assert!(matches!(err, RuleError::Validation { ref key, .. } if key == "value"));
    }
}
