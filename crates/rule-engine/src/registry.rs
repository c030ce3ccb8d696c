//! 插件注册表
//!
//! 通过 [`RegistryBuilder`] 一次性构建，构建后不可变，以 `Arc` 在评估器、
//! 规则存储与各插件之间共享。不存在任何全局注册表。

use crate::actionlet::{Actionlet, ErasedActionlet};
use crate::actionlets::{
    PersonaDirectory, SetPersonaActionlet, SetRequestAttributeActionlet,
    SetResponseHeaderActionlet, TagVisitorActionlet,
};
use crate::comparison::ComparisonCatalog;
use crate::conditionlet::{Conditionlet, ErasedConditionlet};
use crate::conditionlets::{
    RequestAttributeConditionlet, RequestHeaderConditionlet, RequestParameterConditionlet,
    VisitorPersonaConditionlet,
};
use crate::datatype::{DataType, ParameterType};
use crate::error::{Result, RuleError};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct Registry {
    actionlets: HashMap<String, Arc<dyn ErasedActionlet>>,
    conditionlets: HashMap<String, Arc<dyn ErasedConditionlet>>,
    data_types: HashMap<String, Arc<dyn ParameterType>>,
    comparisons: ComparisonCatalog,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// 注册全部内置插件、数据类型与比较
    pub fn with_defaults(persona_directory: Arc<dyn PersonaDirectory>) -> Self {
        Self::builder()
            .default_data_types()
            .default_comparisons()
            .conditionlet(RequestParameterConditionlet)
            .conditionlet(RequestHeaderConditionlet)
            .conditionlet(RequestAttributeConditionlet)
            .conditionlet(VisitorPersonaConditionlet)
            .actionlet(SetResponseHeaderActionlet::new())
            .actionlet(SetRequestAttributeActionlet)
            .actionlet(SetPersonaActionlet::new(persona_directory))
            .actionlet(TagVisitorActionlet)
            .build()
    }

    /// 按键解析动作插件
    pub fn resolve_actionlet(&self, key: &str) -> Result<Arc<dyn ErasedActionlet>> {
        self.actionlets
            .get(key)
            .cloned()
            .ok_or_else(|| RuleError::Configuration(format!("未知的 actionlet: '{}'", key)))
    }

    /// 按键解析条件插件
    pub fn resolve_conditionlet(&self, key: &str) -> Result<Arc<dyn ErasedConditionlet>> {
        self.conditionlets
            .get(key)
            .cloned()
            .ok_or_else(|| RuleError::Configuration(format!("未知的 conditionlet: '{}'", key)))
    }

    pub fn data_type(&self, id: &str) -> Result<Arc<dyn ParameterType>> {
        self.data_types
            .get(id)
            .cloned()
            .ok_or_else(|| RuleError::Configuration(format!("未知的 DataType: '{}'", id)))
    }

    pub fn comparisons(&self) -> &ComparisonCatalog {
        &self.comparisons
    }

    pub fn actionlet_ids(&self) -> Vec<&str> {
        sorted_keys(&self.actionlets)
    }

    pub fn conditionlet_ids(&self) -> Vec<&str> {
        sorted_keys(&self.conditionlets)
    }

    pub fn data_type_ids(&self) -> Vec<&str> {
        sorted_keys(&self.data_types)
    }
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<&str> {
    let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("actionlets", &self.actionlet_ids())
            .field("conditionlets", &self.conditionlet_ids())
            .field("data_types", &self.data_type_ids())
            .field("comparisons", &self.comparisons.ids())
            .finish()
    }
}

/// 注册表构建器
///
/// 同一键重复注册时后者覆盖前者，并记录警告。
#[derive(Default)]
pub struct RegistryBuilder {
    actionlets: HashMap<String, Arc<dyn ErasedActionlet>>,
    conditionlets: HashMap<String, Arc<dyn ErasedConditionlet>>,
    data_types: HashMap<String, Arc<dyn ParameterType>>,
    comparisons: ComparisonCatalog,
}

impl RegistryBuilder {
    pub fn actionlet<A: Actionlet>(mut self, actionlet: A) -> Self {
        let key = Actionlet::id(&actionlet).to_string();
        if self
            .actionlets
            .insert(key.clone(), Arc::new(actionlet))
            .is_some()
        {
            warn!(actionlet = %key, "actionlet 重复注册，已覆盖");
        }
        self
    }

    pub fn conditionlet<C: Conditionlet>(mut self, conditionlet: C) -> Self {
        let key = Conditionlet::id(&conditionlet).to_string();
        if self
            .conditionlets
            .insert(key.clone(), Arc::new(conditionlet))
            .is_some()
        {
            warn!(conditionlet = %key, "conditionlet 重复注册，已覆盖");
        }
        self
    }

    pub fn data_type<T>(mut self, data_type: DataType<T>) -> Self
    where
        T: Serialize + Send + Sync + 'static,
    {
        let id = data_type.id().to_string();
        if self
            .data_types
            .insert(id.clone(), Arc::new(data_type))
            .is_some()
        {
            warn!(data_type = %id, "DataType 重复注册，已覆盖");
        }
        self
    }

    /// 注册 text / numeric / boolean / datetime
    pub fn default_data_types(self) -> Self {
        self.data_type(DataType::text())
            .data_type(DataType::numeric())
            .data_type(DataType::boolean())
            .data_type(DataType::datetime())
    }

    pub fn comparisons(mut self, comparisons: ComparisonCatalog) -> Self {
        self.comparisons = comparisons;
        self
    }

    pub fn default_comparisons(self) -> Self {
        self.comparisons(ComparisonCatalog::with_defaults())
    }

    pub fn build(self) -> Registry {
        debug!(
            actionlets = self.actionlets.len(),
            conditionlets = self.conditionlets.len(),
            data_types = self.data_types.len(),
            "插件注册表构建完成"
        );

        Registry {
            actionlets: self.actionlets,
            conditionlets: self.conditionlets,
            data_types: self.data_types,
            comparisons: self.comparisons,
        }
    }
}
