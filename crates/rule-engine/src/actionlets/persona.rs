use crate::actionlet::Actionlet;
use crate::context::{Persona, RequestContext};
use crate::datatype::DataType;
use crate::error::{Result, RuleError};
use crate::models::Parameters;
use crate::parameters::ParametersExt;
use crate::registry::Registry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// 画像目录
///
/// 由宿主提供的外部协作者，按标识查找画像。
#[cfg_attr(test, mockall::automock)]
pub trait PersonaDirectory: Send + Sync {
    /// 查找画像；不存在时返回 `Ok(None)`
    fn find_persona(&self, persona_id: &str) -> anyhow::Result<Option<Persona>>;
}

/// 基于内存映射的画像目录
#[derive(Debug, Clone, Default)]
pub struct StaticPersonaDirectory {
    personas: HashMap<String, Persona>,
}

impl StaticPersonaDirectory {
    pub fn new(personas: impl IntoIterator<Item = Persona>) -> Self {
        Self {
            personas: personas.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}

impl PersonaDirectory for StaticPersonaDirectory {
    fn find_persona(&self, persona_id: &str) -> anyhow::Result<Option<Persona>> {
        Ok(self.personas.get(persona_id).cloned())
    }
}

/// 为当前访客设置画像
pub struct SetPersonaActionlet {
    directory: Arc<dyn PersonaDirectory>,
}

impl SetPersonaActionlet {
    pub const ID: &'static str = "SetPersona";

    pub fn new(directory: Arc<dyn PersonaDirectory>) -> Self {
        Self { directory }
    }
}

impl Actionlet for SetPersonaActionlet {
    type Instance = String;

    fn id(&self) -> &str {
        Self::ID
    }

    fn instance_from(&self, parameters: &Parameters, _registry: &Registry) -> Result<String> {
        let persona_id = parameters.require("personaId", &DataType::text())?;
        Ok(persona_id.trim().to_string())
    }

    fn evaluate(&self, ctx: &mut RequestContext, persona_id: &String) -> Result<bool> {
        let Some(visitor) = ctx.visitor_mut() else {
            debug!(persona_id = %persona_id, "请求中没有访客，跳过画像设置");
            return Ok(false);
        };

        let persona = self
            .directory
            .find_persona(persona_id)
            .map_err(|e| RuleError::Evaluation(format!("画像查询失败 '{}': {}", persona_id, e)))?;

        match persona {
            Some(persona) => {
                visitor.persona = Some(persona);
                Ok(true)
            }
            None => {
                debug!(persona_id = %persona_id, "画像不存在");
                Ok(false)
            }
        }
    }
}
