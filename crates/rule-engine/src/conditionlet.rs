//! 条件插件（Conditionlet）
//!
//! 与 [`Actionlet`](crate::actionlet::Actionlet) 相同的两阶段契约：
//! 先把条件参数校验为类型化实例，再针对请求上下文求值。
//! 条件只读取上下文，不修改它。

use crate::context::RequestContext;
use crate::error::{Result, RuleError};
use crate::models::Parameters;
use crate::registry::Registry;
use std::any::Any;
use std::fmt;

pub trait Conditionlet: Send + Sync + 'static {
    type Instance: Send + Sync + 'static;

    fn id(&self) -> &str;

    fn instance_from(&self, parameters: &Parameters, registry: &Registry)
    -> Result<Self::Instance>;

    fn evaluate(&self, ctx: &RequestContext, instance: &Self::Instance) -> Result<bool>;
}

pub struct ConditionInstance {
    conditionlet: String,
    inner: Box<dyn Any + Send + Sync>,
}

impl ConditionInstance {
    pub fn new<T: Send + Sync + 'static>(conditionlet: impl Into<String>, inner: T) -> Self {
        Self {
            conditionlet: conditionlet.into(),
            inner: Box::new(inner),
        }
    }

    pub fn conditionlet(&self) -> &str {
        &self.conditionlet
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl fmt::Debug for ConditionInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionInstance")
            .field("conditionlet", &self.conditionlet)
            .finish_non_exhaustive()
    }
}

/// 类型擦除的条件插件
pub trait ErasedConditionlet: Send + Sync {
    fn key(&self) -> &str;

    fn build_instance(
        &self,
        parameters: &Parameters,
        registry: &Registry,
    ) -> Result<ConditionInstance>;

    fn test(&self, ctx: &RequestContext, instance: &ConditionInstance) -> Result<bool>;
}

impl<C: Conditionlet> ErasedConditionlet for C {
    fn key(&self) -> &str {
        Conditionlet::id(self)
    }

    fn build_instance(
        &self,
        parameters: &Parameters,
        registry: &Registry,
    ) -> Result<ConditionInstance> {
        let instance = self.instance_from(parameters, registry)?;
        Ok(ConditionInstance::new(Conditionlet::id(self), instance))
    }

    fn test(&self, ctx: &RequestContext, instance: &ConditionInstance) -> Result<bool> {
        let typed = instance.downcast_ref::<C::Instance>().ok_or_else(|| {
            RuleError::Evaluation(format!(
                "实例类型不匹配: 由 '{}' 构建, 交给 '{}' 求值",
                instance.conditionlet(),
                Conditionlet::id(self)
            ))
        })?;
        self.evaluate(ctx, typed)
    }
}
