//! 规则评估器
//!
//! 组合根：按优先级排列条件组与规则动作，先完成编写期校验，
//! 再求值条件组，规则触发时依次执行全部动作。
//!
//! - 任一条件或动作的配置/校验错误会在求值开始前中止该规则
//! - 条件或动作在执行时返回的错误被隔离：记录日志和指标后按 false 处理
//! - 动作执行不短路，每个动作的结果都会被收集

use crate::condition_group::{fold, ConditionCache, ConditionLoader};
use crate::conditionlet::{ConditionInstance, ErasedConditionlet};
use crate::context::RequestContext;
use crate::error::Result;
use crate::models::{Condition, Rule};
use crate::operators::LogicalOperator;
use crate::priority::{by_priority, Prioritized};
use crate::registry::Registry;
use crate::rule_action::ActionRun;
use rules_shared::config::EngineConfig;
use rules_shared::observability::metrics;
use serde::Serialize;
use std::borrow::Borrow;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};

/// 单个动作的执行结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    pub action_id: String,
    pub actionlet: String,
    pub priority: i32,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 单条规则的评估结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleOutcome {
    pub rule_id: String,
    pub rule_name: String,
    pub fired: bool,
    pub actions: Vec<ActionOutcome>,
    /// 评估追踪（启用追踪时记录）
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<String>,
    pub elapsed_micros: u64,
}

impl RuleOutcome {
    fn new(rule: &Rule) -> Self {
        Self {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            fired: false,
            actions: Vec::new(),
            trace: Vec::new(),
            elapsed_micros: 0,
        }
    }

    pub fn action(&self, action_id: &str) -> Option<&ActionOutcome> {
        self.actions.iter().find(|a| a.action_id == action_id)
    }

    /// 规则已触发且所有动作都执行成功
    pub fn all_actions_succeeded(&self) -> bool {
        self.fired && self.actions.iter().all(|a| a.success)
    }
}

/// 批量评估中被拒绝的规则
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleFailure {
    pub rule_id: String,
    pub rule_name: String,
    pub code: String,
    pub error: String,
}

/// 批量评估报告
#[derive(Debug, Clone, Default, Serialize)]
pub struct FireReport {
    pub outcomes: Vec<RuleOutcome>,
    pub failures: Vec<RuleFailure>,
}

impl FireReport {
    pub fn fired(&self) -> impl Iterator<Item = &RuleOutcome> {
        self.outcomes.iter().filter(|o| o.fired)
    }

    pub fn fired_count(&self) -> usize {
        self.fired().count()
    }
}

/// 校验完成、可直接求值的条件
struct PreparedCondition {
    id: String,
    operator: LogicalOperator,
    conditionlet: Arc<dyn ErasedConditionlet>,
    instance: ConditionInstance,
}

struct PreparedGroup {
    id: String,
    operator: LogicalOperator,
    conditions: Vec<PreparedCondition>,
}

/// 一次评估内派生的全部状态
struct PreparedRule<'a> {
    groups: Vec<PreparedGroup>,
    actions: Vec<ActionRun<'a>>,
}

/// 规则评估器
pub struct RuleEvaluator {
    registry: Arc<Registry>,
    conditions: ConditionCache,
    /// 是否记录详细评估追踪
    trace_enabled: bool,
}

impl RuleEvaluator {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            conditions: ConditionCache::default(),
            trace_enabled: false,
        }
    }

    /// 为未预填充条件的条件组配置加载器
    pub fn with_loader(mut self, loader: Arc<dyn ConditionLoader>) -> Self {
        self.conditions = ConditionCache::new(Some(loader));
        self
    }

    /// 启用评估追踪
    pub fn with_trace(mut self) -> Self {
        self.trace_enabled = true;
        self
    }

    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.trace_enabled = config.trace_enabled;
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// 丢弃条件组快照，返回是否存在
    pub fn invalidate_group(&self, group_id: &str) -> bool {
        self.conditions.invalidate(group_id)
    }

    pub fn clear_cache(&self) {
        self.conditions.clear();
    }

    /// 仅执行编写期校验：解析所有插件并构建实例
    pub fn check_valid(&self, rule: &Rule) -> Result<()> {
        self.prepare(rule).map(|_| ())
    }

    /// 评估单条规则
    #[instrument(skip(self, rule, ctx), fields(rule_id = %rule.id))]
    pub fn evaluate(&self, rule: &Rule, ctx: &mut RequestContext) -> Result<RuleOutcome> {
        let start = Instant::now();
        let mut outcome = RuleOutcome::new(rule);

        if !rule.enabled {
            if self.trace_enabled {
                outcome.trace.push(format!("rule[{}]: 已禁用，跳过", rule.id));
            }
            outcome.elapsed_micros = start.elapsed().as_micros() as u64;
            metrics::record_rule_evaluation(&rule.id, "disabled", start.elapsed().as_secs_f64());
            return Ok(outcome);
        }

        let mut prepared = match self.prepare(rule) {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!(rule_id = %rule.id, code = e.code(), error = %e, "规则校验失败，拒绝评估");
                metrics::record_rule_evaluation(&rule.id, "invalid", start.elapsed().as_secs_f64());
                return Err(e);
            }
        };

        let mut trace = Vec::new();
        let groups: Vec<&PreparedGroup> = prepared.groups.iter().collect();
        let readonly: &RequestContext = ctx;
        let fired = fold(
            &groups,
            |group| group.operator,
            |group| self.test_group(&rule.id, group, readonly, &mut trace),
        );

        if self.trace_enabled {
            trace.push(format!(
                "rule[{}]: {}",
                rule.id,
                if fired { "FIRED" } else { "NOT_FIRED" }
            ));
        }

        if fired {
            for run in prepared.actions.iter_mut() {
                let action_outcome = self.run_action(&rule.id, run, ctx);
                if self.trace_enabled {
                    trace.push(format!(
                        "action[{}] {} => {}",
                        action_outcome.action_id,
                        action_outcome.actionlet,
                        if action_outcome.success { "OK" } else { "FAILED" }
                    ));
                }
                outcome.actions.push(action_outcome);
            }
        }

        outcome.fired = fired;
        outcome.trace = trace;
        outcome.elapsed_micros = start.elapsed().as_micros() as u64;

        let status = if fired { "fired" } else { "not_fired" };
        metrics::record_rule_evaluation(&rule.id, status, start.elapsed().as_secs_f64());
        debug!(fired, actions = outcome.actions.len(), "规则评估完成");

        Ok(outcome)
    }

    /// 按优先级（稳定）评估多条规则
    ///
    /// 单条规则被拒绝时记录到 `failures`，不影响其他规则。
    #[instrument(skip_all, fields(rules = rules.len()))]
    pub fn fire_rules<R>(&self, rules: &[R], ctx: &mut RequestContext) -> FireReport
    where
        R: Borrow<Rule> + Prioritized,
    {
        let mut report = FireReport::default();

        for rule in by_priority(rules) {
            let rule = <R as Borrow<Rule>>::borrow(rule);
            match self.evaluate(rule, ctx) {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(e) => report.failures.push(RuleFailure {
                    rule_id: rule.id.clone(),
                    rule_name: rule.name.clone(),
                    code: e.code().to_string(),
                    error: e.to_string(),
                }),
            }
        }

        debug!(
            fired = report.fired_count(),
            failures = report.failures.len(),
            "批量规则评估完成"
        );
        report
    }

    /// 解析条件组、构建全部条件与动作实例
    fn prepare<'a>(&self, rule: &'a Rule) -> Result<PreparedRule<'a>> {
        let mut groups = Vec::with_capacity(rule.condition_groups.len());
        for group in by_priority(&rule.condition_groups) {
            let resolved = self.conditions.resolve(group)?;
            let conditions = resolved
                .ordered()
                .into_iter()
                .map(|condition| self.prepare_condition(condition))
                .collect::<Result<Vec<_>>>()?;

            groups.push(PreparedGroup {
                id: group.id.clone(),
                operator: group.operator,
                conditions,
            });
        }

        let mut actions = Vec::with_capacity(rule.actions.len());
        for action in by_priority(&rule.actions) {
            let mut run = ActionRun::new(action);
            run.check_valid(&self.registry)?;
            actions.push(run);
        }

        Ok(PreparedRule { groups, actions })
    }

    fn prepare_condition(&self, condition: &Condition) -> Result<PreparedCondition> {
        let conditionlet = self.registry.resolve_conditionlet(&condition.conditionlet)?;
        let instance = conditionlet.build_instance(&condition.parameters, &self.registry)?;

        Ok(PreparedCondition {
            id: condition.id.clone(),
            operator: condition.operator,
            conditionlet,
            instance,
        })
    }

    fn test_group(
        &self,
        rule_id: &str,
        group: &PreparedGroup,
        ctx: &RequestContext,
        trace: &mut Vec<String>,
    ) -> bool {
        let conditions: Vec<&PreparedCondition> = group.conditions.iter().collect();
        let matched = fold(
            &conditions,
            |condition| condition.operator,
            |condition| self.test_condition(rule_id, &group.id, condition, ctx, trace),
        );

        if self.trace_enabled {
            trace.push(format!(
                "group[{}] {} ({} 个条件) => {}",
                group.id,
                group.operator,
                group.conditions.len(),
                matched
            ));
        }

        matched
    }

    fn test_condition(
        &self,
        rule_id: &str,
        group_id: &str,
        condition: &PreparedCondition,
        ctx: &RequestContext,
        trace: &mut Vec<String>,
    ) -> bool {
        let matched = match condition.conditionlet.test(ctx, &condition.instance) {
            Ok(matched) => matched,
            Err(e) => {
                warn!(
                    rule_id = %rule_id,
                    group_id = %group_id,
                    condition_id = %condition.id,
                    conditionlet = condition.conditionlet.key(),
                    error = %e,
                    "条件求值失败，按 false 处理"
                );
                metrics::record_plugin_failure("condition", condition.conditionlet.key());
                false
            }
        };

        if self.trace_enabled {
            trace.push(format!(
                "condition[{}] {} {} => {}",
                condition.id,
                condition.operator,
                condition.conditionlet.key(),
                if matched { "MATCHED" } else { "NOT_MATCHED" }
            ));
        }

        matched
    }

    fn run_action(
        &self,
        rule_id: &str,
        run: &mut ActionRun<'_>,
        ctx: &mut RequestContext,
    ) -> ActionOutcome {
        let action = run.action();
        let (success, error) = match run.evaluate(ctx) {
            Ok(success) => (success, None),
            Err(e) => {
                warn!(
                    rule_id = %rule_id,
                    action_id = %action.id,
                    actionlet = %action.actionlet,
                    error = %e,
                    "动作执行失败，继续执行后续动作"
                );
                metrics::record_plugin_failure("action", &action.actionlet);
                (false, Some(e.to_string()))
            }
        };

        metrics::record_action_execution(&action.actionlet, success);

        ActionOutcome {
            action_id: action.id.clone(),
            actionlet: action.actionlet.clone(),
            priority: action.priority,
            success,
            error,
        }
    }
}

impl std::fmt::Debug for RuleEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEvaluator")
            .field("registry", &self.registry)
            .field("cached_groups", &self.conditions.len())
            .field("trace_enabled", &self.trace_enabled)
            .finish()
    }
}
