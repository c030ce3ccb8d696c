//! 规则引擎领域模型
//!
//! 规则、条件组、条件与规则动作均为加载后只读的定义对象，
//! 可以跨线程共享；评估期间派生的状态（校验后的实例、访客数据）
//! 每次评估单独分配，从不写回定义对象。

use crate::operators::LogicalOperator;
use crate::priority::Prioritized;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// 参数键到参数值的映射
pub type Parameters = HashMap<String, ParameterModel>;

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_enabled() -> bool {
    true
}

/// 参数值持有者
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterModel {
    #[serde(default)]
    pub id: Option<String>,
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub priority: i32,
}

impl ParameterModel {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: None,
            key: key.into(),
            value: value.into(),
            priority: 0,
        }
    }
}

/// 由参数列表构建参数映射，同名参数后者覆盖前者
pub fn parameters_from(params: impl IntoIterator<Item = ParameterModel>) -> Parameters {
    params.into_iter().map(|p| (p.key.clone(), p)).collect()
}

/// 规则定义
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 所属站点/主机，对引擎不透明
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub condition_groups: Vec<ConditionGroup>,
    #[serde(default)]
    pub actions: Vec<RuleAction>,
    #[serde(default = "Utc::now")]
    pub mod_date: DateTime<Utc>,
}

impl Rule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            priority: 0,
            enabled: true,
            host: None,
            condition_groups: Vec::new(),
            actions: Vec::new(),
            mod_date: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        for group in &mut self.condition_groups {
            group.rule_id = self.id.clone();
        }
        for action in &mut self.actions {
            action.rule_id = self.id.clone();
        }
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// 添加条件组，并将其归属到本规则
    pub fn with_group(mut self, mut group: ConditionGroup) -> Self {
        group.rule_id = self.id.clone();
        self.condition_groups.push(group);
        self
    }

    /// 添加规则动作，并将其归属到本规则
    pub fn with_action(mut self, mut action: RuleAction) -> Self {
        action.rule_id = self.id.clone();
        self.actions.push(action);
        self
    }
}

impl Prioritized for Rule {
    fn priority(&self) -> i32 {
        self.priority
    }
}

/// 条件组
///
/// `conditions` 为 `None` 时表示条件尚未随定义一起加载，
/// 由评估器通过 [`ConditionLoader`](crate::condition_group::ConditionLoader) 解析。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionGroup {
    pub id: String,
    #[serde(default)]
    pub rule_id: String,
    /// 与同级条件组合并时使用的操作符
    #[serde(default)]
    pub operator: LogicalOperator,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub conditions: Option<Vec<Condition>>,
    #[serde(default = "Utc::now")]
    pub mod_date: DateTime<Utc>,
}

impl ConditionGroup {
    pub fn new(operator: LogicalOperator) -> Self {
        Self {
            id: new_id(),
            rule_id: String::new(),
            operator,
            priority: 0,
            conditions: Some(Vec::new()),
            mod_date: Utc::now(),
        }
    }

    pub fn and() -> Self {
        Self::new(LogicalOperator::And)
    }

    pub fn or() -> Self {
        Self::new(LogicalOperator::Or)
    }

    /// 创建条件延迟加载的条件组
    pub fn deferred(id: impl Into<String>, operator: LogicalOperator) -> Self {
        Self {
            id: id.into(),
            conditions: None,
            ..Self::new(operator)
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        if let Some(conditions) = &mut self.conditions {
            for condition in conditions {
                condition.group_id = self.id.clone();
            }
        }
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.add_condition(condition);
        self
    }

    /// 添加条件
    ///
    /// 延迟加载的条件组没有本地条件列表，条件由加载器提供，此时忽略添加，
    /// 返回 false。
    pub fn add_condition(&mut self, mut condition: Condition) -> bool {
        let Some(conditions) = &mut self.conditions else {
            return false;
        };
        condition.group_id = self.id.clone();
        conditions.push(condition);
        true
    }

    /// 条件是否已随定义一起加载
    pub fn is_populated(&self) -> bool {
        self.conditions.is_some()
    }
}

impl Prioritized for ConditionGroup {
    fn priority(&self) -> i32 {
        self.priority
    }
}

/// 条件
///
/// 引用一个 conditionlet 及其参数；`operator` 决定本条件结果如何与
/// 此前条件的累积结果合并（按迭代顺序线性折叠，而非表达式树）。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub id: String,
    #[serde(default)]
    pub group_id: String,
    #[serde(default)]
    pub name: String,
    pub conditionlet: String,
    #[serde(default)]
    pub operator: LogicalOperator,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default = "Utc::now")]
    pub mod_date: DateTime<Utc>,
}

impl Condition {
    pub fn new(conditionlet: impl Into<String>, operator: LogicalOperator) -> Self {
        Self {
            id: new_id(),
            group_id: String::new(),
            name: String::new(),
            conditionlet: conditionlet.into(),
            operator,
            priority: 0,
            parameters: Parameters::new(),
            mod_date: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let parameter = ParameterModel::new(key, value);
        self.parameters.insert(parameter.key.clone(), parameter);
        self
    }
}

impl Prioritized for Condition {
    fn priority(&self) -> i32 {
        self.priority
    }
}

/// 规则动作
///
/// 通过 `actionlet` 键引用动作插件；校验后的实例不保存在定义上，
/// 见 [`ActionRun`](crate::rule_action::ActionRun)。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleAction {
    pub id: String,
    #[serde(default)]
    pub rule_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub priority: i32,
    pub actionlet: String,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default = "Utc::now")]
    pub mod_date: DateTime<Utc>,
}

impl RuleAction {
    pub fn new(actionlet: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            rule_id: String::new(),
            name: String::new(),
            priority: 0,
            actionlet: actionlet.into(),
            parameters: Parameters::new(),
            mod_date: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_parameter(ParameterModel::new(key, value));
        self
    }

    pub fn add_parameter(&mut self, parameter: ParameterModel) {
        self.parameters.insert(parameter.key.clone(), parameter);
    }

    /// 以参数列表整体替换参数映射
    pub fn set_parameters(&mut self, params: impl IntoIterator<Item = ParameterModel>) {
        self.parameters = parameters_from(params);
    }
}

impl Prioritized for RuleAction {
    fn priority(&self) -> i32 {
        self.priority
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_builder_assigns_ownership() {
        let rule = Rule::new("vip_header")
            .with_group(
                ConditionGroup::and()
                    .with_condition(Condition::new("RequestParameter", LogicalOperator::And)),
            )
            .with_action(RuleAction::new("SetHeader"))
            .with_id("rule-001");

        assert_eq!(rule.condition_groups[0].rule_id, "rule-001");
        assert_eq!(rule.actions[0].rule_id, "rule-001");

        let group = &rule.condition_groups[0];
        let conditions = group.conditions.as_ref().unwrap();
        assert_eq!(conditions[0].group_id, group.id);
    }

    #[test]
    fn test_rule_deserialization() {
        let json = r#"
        {
            "id": "rule-001",
            "name": "set_test_header",
            "priority": 10,
            "conditionGroups": [
                {
                    "id": "group-1",
                    "operator": "AND",
                    "conditions": [
                        {
                            "id": "cond-1",
                            "conditionlet": "RequestParameter",
                            "operator": "AND",
                            "parameters": {
                                "name": {"key": "name", "value": "X"},
                                "comparison": {"key": "comparison", "value": "is"},
                                "value": {"key": "value", "value": "5"}
                            }
                        }
                    ]
                },
                {
                    "id": "group-2",
                    "operator": "OR"
                }
            ],
            "actions": [
                {
                    "id": "action-1",
                    "actionlet": "SetHeader",
                    "parameters": {
                        "name": {"key": "name", "value": "X-Test"},
                        "value": {"key": "value", "value": "1"}
                    }
                }
            ]
        }
        "#;

        let rule: Rule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.id, "rule-001");
        assert_eq!(rule.priority, 10);
        assert!(rule.enabled);
        assert!(rule.condition_groups[0].is_populated());
        assert!(!rule.condition_groups[1].is_populated());
        assert_eq!(rule.condition_groups[1].operator, LogicalOperator::Or);
        assert_eq!(rule.actions[0].parameters["name"].value, "X-Test");
    }

    #[test]
    fn test_set_parameters_from_list() {
        let mut action = RuleAction::new("SetHeader");
        action.set_parameters(vec![
            ParameterModel::new("name", "X-Old"),
            ParameterModel::new("value", "1"),
            ParameterModel::new("name", "X-New"),
        ]);

        assert_eq!(action.parameters.len(), 2);
        assert_eq!(action.parameters["name"].value, "X-New");
    }

    #[test]
    fn test_add_condition_to_deferred_group_is_ignored() {
        let mut group = ConditionGroup::deferred("group-9", LogicalOperator::And);
        assert!(!group.is_populated());

        assert!(!group.add_condition(Condition::new("RequestHeader", LogicalOperator::Or)));
        assert!(!group.is_populated());

        let group = group.with_condition(Condition::new("RequestHeader", LogicalOperator::And));
        assert!(group.conditions.is_none());
    }

    #[test]
    fn test_add_condition_to_populated_group() {
        let mut group = ConditionGroup::and().with_id("group-3");
        assert!(group.add_condition(Condition::new("RequestHeader", LogicalOperator::Or)));
        assert_eq!(group.conditions.as_ref().unwrap()[0].group_id, "group-3");
    }
}
