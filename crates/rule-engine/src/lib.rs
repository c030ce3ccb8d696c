//! 规则动作引擎
//!
//! 针对单个请求上下文评估业务规则，规则触发时按优先级执行可插拔的动作：
//! - 条件组内 AND/OR 线性左折叠（无运算优先级）
//! - 动作插件与条件插件的两阶段生命周期（校验构建实例，再执行）
//! - DataType / Comparison 参数校验
//! - 稳定的优先级排序
//! - 显式构建、不可变的插件注册表

pub mod actionlet;
pub mod actionlets;
pub mod comparison;
pub mod condition_group;
pub mod conditionlet;
pub mod conditionlets;
pub mod context;
pub mod datatype;
pub mod error;
pub mod evaluator;
pub mod models;
pub mod operators;
pub mod parameters;
pub mod priority;
pub mod registry;
pub mod rule_action;
pub mod store;

pub use actionlet::{ActionInstance, Actionlet, ErasedActionlet};
pub use actionlets::{PersonaDirectory, StaticPersonaDirectory};
pub use comparison::{Comparison, ComparisonCatalog};
pub use condition_group::{fold, ConditionCache, ConditionLoader};
pub use conditionlet::{ConditionInstance, Conditionlet, ErasedConditionlet};
pub use context::{Persona, Request, RequestContext, Response, Visitor};
pub use datatype::{DataType, ParameterType};
pub use error::{Result, RuleError};
pub use evaluator::{ActionOutcome, FireReport, RuleEvaluator, RuleFailure, RuleOutcome};
pub use models::{Condition, ConditionGroup, ParameterModel, Parameters, Rule, RuleAction};
pub use operators::LogicalOperator;
pub use parameters::ParametersExt;
pub use priority::Prioritized;
pub use registry::{Registry, RegistryBuilder};
pub use rule_action::{ActionRun, ActionState};
pub use store::{RuleStore, RuleStoreStats};
