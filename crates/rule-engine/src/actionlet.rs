//! 动作插件（Actionlet）
//!
//! 插件实现类型化的 [`Actionlet`]：`instance_from` 在校验阶段把参数映射
//! 转换为强类型实例，`evaluate` 在执行阶段使用该实例作用于请求上下文。
//! 注册表只保存类型擦除后的 [`ErasedActionlet`]，实例以 [`ActionInstance`]
//! 在两个阶段之间传递。

use crate::context::RequestContext;
use crate::error::{Result, RuleError};
use crate::models::Parameters;
use crate::registry::Registry;
use std::any::Any;
use std::fmt;

/// 类型化动作插件
pub trait Actionlet: Send + Sync + 'static {
    /// 校验通过的参数视图
    type Instance: Send + Sync + 'static;

    /// 注册键
    fn id(&self) -> &str;

    /// 校验参数并构建实例
    fn instance_from(&self, parameters: &Parameters, registry: &Registry)
    -> Result<Self::Instance>;

    /// 执行动作，返回是否生效
    fn evaluate(&self, ctx: &mut RequestContext, instance: &Self::Instance) -> Result<bool>;
}

/// 校验阶段产出的不透明实例，生命周期为一次评估
pub struct ActionInstance {
    actionlet: String,
    inner: Box<dyn Any + Send + Sync>,
}

impl ActionInstance {
    pub fn new<T: Send + Sync + 'static>(actionlet: impl Into<String>, inner: T) -> Self {
        Self {
            actionlet: actionlet.into(),
            inner: Box::new(inner),
        }
    }

    /// 构建该实例的 actionlet 键
    pub fn actionlet(&self) -> &str {
        &self.actionlet
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl fmt::Debug for ActionInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionInstance")
            .field("actionlet", &self.actionlet)
            .finish_non_exhaustive()
    }
}

/// 类型擦除的动作插件
pub trait ErasedActionlet: Send + Sync {
    fn key(&self) -> &str;

    fn build_instance(&self, parameters: &Parameters, registry: &Registry)
    -> Result<ActionInstance>;

    fn execute(&self, ctx: &mut RequestContext, instance: &ActionInstance) -> Result<bool>;
}

impl<A: Actionlet> ErasedActionlet for A {
    fn key(&self) -> &str {
        Actionlet::id(self)
    }

    fn build_instance(
        &self,
        parameters: &Parameters,
        registry: &Registry,
    ) -> Result<ActionInstance> {
        let instance = self.instance_from(parameters, registry)?;
        Ok(ActionInstance::new(Actionlet::id(self), instance))
    }

    fn execute(&self, ctx: &mut RequestContext, instance: &ActionInstance) -> Result<bool> {
        let typed = instance.downcast_ref::<A::Instance>().ok_or_else(|| {
            RuleError::Evaluation(format!(
                "实例类型不匹配: 由 '{}' 构建, 交给 '{}' 执行",
                instance.actionlet(),
                Actionlet::id(self)
            ))
        })?;
        self.evaluate(ctx, typed)
    }
}
