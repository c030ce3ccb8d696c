//! 指标模块
//!
//! 基于 metrics crate 定义规则引擎的指标名称与记录函数。
//! 本仓库不安装导出器；未安装 recorder 时所有记录调用均为空操作。

/// 规则评估次数
pub const RULE_EVALUATIONS_TOTAL: &str = "rule_evaluations_total";
/// 规则评估耗时
pub const RULE_EVALUATION_DURATION_SECONDS: &str = "rule_evaluation_duration_seconds";
/// 规则动作执行次数
pub const RULE_ACTIONS_TOTAL: &str = "rule_actions_total";
/// 被隔离的插件执行失败次数
pub const RULE_PLUGIN_FAILURES_TOTAL: &str = "rule_plugin_failures_total";

/// 注册指标描述
///
/// 这些描述会出现在宿主导出器的 HELP 注释中。
pub fn describe() {
    metrics::describe_counter!(RULE_EVALUATIONS_TOTAL, "Total number of rule evaluations");
    metrics::describe_histogram!(
        RULE_EVALUATION_DURATION_SECONDS,
        "Rule evaluation duration in seconds"
    );
    metrics::describe_counter!(RULE_ACTIONS_TOTAL, "Total number of rule action executions");
    metrics::describe_counter!(
        RULE_PLUGIN_FAILURES_TOTAL,
        "Total number of isolated condition/action failures"
    );
}

// ============================================================================
// 便捷的指标记录函数
// ============================================================================

/// 记录规则评估
///
/// `status` 取值：fired / not_fired / disabled / invalid
#[inline]
pub fn record_rule_evaluation(rule_id: &str, status: &str, duration_secs: f64) {
    metrics::counter!(
        RULE_EVALUATIONS_TOTAL,
        "rule_id" => rule_id.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    metrics::histogram!(
        RULE_EVALUATION_DURATION_SECONDS,
        "rule_id" => rule_id.to_string()
    )
    .record(duration_secs);
}

/// 记录动作执行
#[inline]
pub fn record_action_execution(actionlet: &str, success: bool) {
    metrics::counter!(
        RULE_ACTIONS_TOTAL,
        "actionlet" => actionlet.to_string(),
        "success" => success.to_string()
    )
    .increment(1);
}

/// 记录被隔离的插件失败
///
/// `kind` 取值：condition / action
#[inline]
pub fn record_plugin_failure(kind: &str, plugin: &str) {
    metrics::counter!(
        RULE_PLUGIN_FAILURES_TOTAL,
        "kind" => kind.to_string(),
        "plugin" => plugin.to_string()
    )
    .increment(1);
}
