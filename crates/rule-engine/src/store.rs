//! 规则存储管理
//!
//! 使用 DashMap 提供线程安全的规则定义存储，支持规则的加载、更新、删除和批量操作。
//! 定义以 `Arc<Rule>` 保存，加载后只读，可被多个请求并发评估。

use crate::error::{Result, RuleError};
use crate::evaluator::RuleEvaluator;
use crate::models::Rule;
use crate::priority::sort_by_priority;
use dashmap::DashMap;
use rules_shared::config::EngineConfig;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// 规则存储
#[derive(Clone, Default)]
pub struct RuleStore {
    rules: Arc<DashMap<String, Arc<Rule>>>,
    /// 加载时用于编写期校验；为空时不校验
    validator: Option<Arc<RuleEvaluator>>,
}

impl RuleStore {
    /// 创建不做加载校验的规则存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建加载时校验规则的存储，校验失败的规则不会入库
    pub fn with_validator(evaluator: Arc<RuleEvaluator>) -> Self {
        Self {
            rules: Arc::new(DashMap::new()),
            validator: Some(evaluator),
        }
    }

    /// 按 `engine.validate_on_load` 决定是否校验
    pub fn from_config(evaluator: Arc<RuleEvaluator>, config: &EngineConfig) -> Self {
        if config.validate_on_load {
            Self::with_validator(evaluator)
        } else {
            Self::new()
        }
    }

    /// 获取当前存储的规则数量
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 加载规则（从 Rule 对象），同 ID 的规则会被替换
    #[instrument(skip(self, rule), fields(rule_id = %rule.id, rule_name = %rule.name))]
    pub fn load(&self, rule: Rule) -> Result<()> {
        if let Some(validator) = &self.validator {
            validator.check_valid(&rule)?;
        }

        let rule_id = rule.id.clone();
        self.rules.insert(rule_id.clone(), Arc::new(rule));

        info!("规则已加载: {}", rule_id);
        Ok(())
    }

    /// 加载规则（从 JSON 字符串）
    #[instrument(skip(self, json))]
    pub fn load_from_json(&self, json: &str) -> Result<String> {
        let rule: Rule = serde_json::from_str(json)?;
        let rule_id = rule.id.clone();
        self.load(rule)?;
        Ok(rule_id)
    }

    /// 更新规则
    #[instrument(skip(self, rule), fields(rule_id = %rule.id))]
    pub fn update(&self, rule: Rule) -> Result<()> {
        let rule_id = rule.id.clone();

        if !self.rules.contains_key(&rule_id) {
            warn!("更新不存在的规则: {}", rule_id);
            return Err(RuleError::RuleNotFound(rule_id));
        }

        self.load(rule)
    }

    /// 删除规则
    #[instrument(skip(self))]
    pub fn delete(&self, rule_id: &str) -> Result<()> {
        if self.rules.remove(rule_id).is_some() {
            info!("规则已删除: {}", rule_id);
            Ok(())
        } else {
            warn!("删除不存在的规则: {}", rule_id);
            Err(RuleError::RuleNotFound(rule_id.to_string()))
        }
    }

    pub fn get(&self, rule_id: &str) -> Option<Arc<Rule>> {
        self.rules.get(rule_id).map(|r| Arc::clone(r.value()))
    }

    pub fn contains(&self, rule_id: &str) -> bool {
        self.rules.contains_key(rule_id)
    }

    /// 获取所有规则 ID
    pub fn list_ids(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.key().clone()).collect()
    }

    /// 按优先级升序列出规则，同优先级按 ID 排列
    pub fn list_by_priority(&self) -> Vec<Arc<Rule>> {
        let mut rules: Vec<Arc<Rule>> = self.rules.iter().map(|r| Arc::clone(r.value())).collect();
        rules.sort_by(|a, b| a.id.cmp(&b.id));
        sort_by_priority(&mut rules);
        rules
    }

    /// 批量加载规则，返回成功加载的规则 ID
    #[instrument(skip(self, rules))]
    pub fn load_batch(&self, rules: Vec<Rule>) -> Result<Vec<String>> {
        let mut loaded_ids = Vec::with_capacity(rules.len());
        let mut errors = Vec::new();

        for rule in rules {
            let rule_id = rule.id.clone();
            match self.load(rule) {
                Ok(()) => loaded_ids.push(rule_id),
                Err(e) => errors.push((rule_id, e)),
            }
        }

        if !errors.is_empty() {
            warn!("批量加载部分失败: {:?}", errors);
        }

        info!("批量加载完成: {} 成功, {} 失败", loaded_ids.len(), errors.len());
        Ok(loaded_ids)
    }

    /// 清空所有规则
    #[instrument(skip(self))]
    pub fn clear(&self) {
        let count = self.rules.len();
        self.rules.clear();
        info!("已清空 {} 条规则", count);
    }

    /// 获取规则统计信息
    pub fn stats(&self) -> RuleStoreStats {
        let mut stats = RuleStoreStats::default();

        for rule in self.rules.iter() {
            stats.rules_count += 1;
            if rule.enabled {
                stats.enabled_count += 1;
            }
            stats.total_groups += rule.condition_groups.len();
            stats.total_actions += rule.actions.len();
        }

        if stats.rules_count > 0 {
            stats.avg_actions_per_rule = stats.total_actions as f64 / stats.rules_count as f64;
        }
        stats
    }
}

/// 规则存储统计信息
#[derive(Debug, Clone, Default)]
pub struct RuleStoreStats {
    /// 规则总数
    pub rules_count: usize,
    pub enabled_count: usize,
    /// 所有规则的条件组总数
    pub total_groups: usize,
    pub total_actions: usize,
    /// 平均每条规则的动作数
    pub avg_actions_per_rule: f64,
}
