//! 规则动作的两阶段生命周期
//!
//! [`ActionRun`] 是一次评估内某个规则动作的执行状态：
//! `check_valid` 解析 actionlet 并构建实例，`evaluate` 用该实例执行。
//! 实例只存在于 `ActionRun` 中，不会写回共享的 [`RuleAction`] 定义。

use crate::actionlet::{ActionInstance, ErasedActionlet};
use crate::context::RequestContext;
use crate::error::{Result, RuleError};
use crate::models::RuleAction;
use crate::registry::Registry;
use std::sync::Arc;

/// 生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    Unvalidated,
    Validated,
    ValidationFailed,
    Executed { success: bool },
}

pub struct ActionRun<'a> {
    action: &'a RuleAction,
    resolved: Option<(Arc<dyn ErasedActionlet>, ActionInstance)>,
    state: ActionState,
}

impl<'a> ActionRun<'a> {
    pub fn new(action: &'a RuleAction) -> Self {
        Self {
            action,
            resolved: None,
            state: ActionState::Unvalidated,
        }
    }

    pub fn action(&self) -> &'a RuleAction {
        self.action
    }

    pub fn state(&self) -> ActionState {
        self.state
    }

    pub fn instance(&self) -> Option<&ActionInstance> {
        self.resolved.as_ref().map(|(_, instance)| instance)
    }

    /// 解析 actionlet 并校验参数
    ///
    /// 每次调用都重新构建实例；失败时清除之前的实例。
    pub fn check_valid(&mut self, registry: &Registry) -> Result<()> {
        self.resolved = None;

        let result = registry
            .resolve_actionlet(&self.action.actionlet)
            .and_then(|actionlet| {
                let instance = actionlet.build_instance(&self.action.parameters, registry)?;
                Ok((actionlet, instance))
            });

        match result {
            Ok(resolved) => {
                self.resolved = Some(resolved);
                self.state = ActionState::Validated;
                Ok(())
            }
            Err(e) => {
                self.state = ActionState::ValidationFailed;
                Err(e)
            }
        }
    }

    /// 使用校验阶段构建的实例执行动作
    pub fn evaluate(&mut self, ctx: &mut RequestContext) -> Result<bool> {
        let Some((actionlet, instance)) = &self.resolved else {
            return Err(RuleError::NotValidated(self.action.id.clone()));
        };

        let result = actionlet.execute(ctx, instance);
        self.state = ActionState::Executed {
            success: matches!(result, Ok(true)),
        };
        result
    }
}

impl std::fmt::Debug for ActionRun<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRun")
            .field("action_id", &self.action.id)
            .field("actionlet", &self.action.actionlet)
            .field("state", &self.state)
            .finish()
    }
}
