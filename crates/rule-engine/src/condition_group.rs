//! 条件组求值
//!
//! 条件按优先级排序后做从左到右的线性折叠：每个条件自身的操作符决定
//! 它如何与此前的累积结果合并，不存在括号或运算优先级。
//! 例如 `A AND B OR C` 折叠为 `((true AND A) AND B) OR C`。
//!
//! 未随定义预填充条件的条件组通过 [`ConditionLoader`] 加载，
//! 每个条件组只加载一次并缓存为不可变快照。

use crate::error::{Result, RuleError};
use crate::models::{Condition, ConditionGroup};
use crate::operators::LogicalOperator;
use crate::priority::{by_priority, sort_by_priority};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// 条件加载器
///
/// 由宿主提供，负责从存储中取出条件组的条件。
#[cfg_attr(test, mockall::automock)]
pub trait ConditionLoader: Send + Sync {
    fn load_conditions(&self, group_id: &str) -> anyhow::Result<Vec<Condition>>;
}

/// 线性左折叠
///
/// 累积值初始为 true。AND 在累积值为 false 时、OR 在累积值为 true 时
/// 不会调用 `evaluate`。累积值为 false 且后续已没有 OR 项时立即返回 false，
/// 此时剩余项都不会被求值。
pub fn fold<T, O, F>(items: &[&T], operator: O, mut evaluate: F) -> bool
where
    O: Fn(&T) -> LogicalOperator,
    F: FnMut(&T) -> bool,
{
    let last_or = items
        .iter()
        .rposition(|item| operator(*item) == LogicalOperator::Or);

    let mut accumulator = true;
    for (index, item) in items.iter().enumerate() {
        accumulator = operator(*item).apply(accumulator, || evaluate(*item));

        if !accumulator && last_or.is_none_or(|or_index| or_index <= index) {
            return false;
        }
    }

    accumulator
}

/// 按优先级排列的条件视图
#[derive(Debug)]
pub enum ResolvedConditions<'a> {
    /// 随定义预填充，每次评估重新排序
    Populated(Vec<&'a Condition>),
    /// 加载器产出的快照，加载时已排序
    Snapshot(Arc<[Condition]>),
}

impl ResolvedConditions<'_> {
    pub fn ordered(&self) -> Vec<&Condition> {
        match self {
            Self::Populated(conditions) => conditions.clone(),
            Self::Snapshot(snapshot) => snapshot.iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Populated(conditions) => conditions.len(),
            Self::Snapshot(snapshot) => snapshot.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 条件快照缓存
///
/// 同一条件组并发首次访问时，后到的调用方等待加载完成后看到完整快照，
/// 加载器对每个条件组只调用一次。
///
/// 加载器在 `DashMap` 分片写锁内执行，加载期间同一分片上其他条件组的
/// 查找也会阻塞，因此加载器应当是快速的本地读取。
#[derive(Default)]
pub struct ConditionCache {
    loader: Option<Arc<dyn ConditionLoader>>,
    snapshots: DashMap<String, Arc<[Condition]>>,
}

impl ConditionCache {
    pub fn new(loader: Option<Arc<dyn ConditionLoader>>) -> Self {
        Self {
            loader,
            snapshots: DashMap::new(),
        }
    }

    pub fn has_loader(&self) -> bool {
        self.loader.is_some()
    }

    /// 解析条件组的条件并按优先级排序
    pub fn resolve<'a>(&self, group: &'a ConditionGroup) -> Result<ResolvedConditions<'a>> {
        if let Some(conditions) = &group.conditions {
            return Ok(ResolvedConditions::Populated(by_priority(conditions)));
        }

        if let Some(snapshot) = self.snapshots.get(&group.id) {
            return Ok(ResolvedConditions::Snapshot(Arc::clone(&snapshot)));
        }

        let loader = self.loader.as_ref().ok_or_else(|| {
            RuleError::Load(format!("条件组 '{}' 未预填充且未配置条件加载器", group.id))
        })?;

        let entry = self
            .snapshots
            .entry(group.id.clone())
            .or_try_insert_with(|| {
                let mut conditions = loader
                    .load_conditions(&group.id)
                    .map_err(|e| RuleError::Load(format!("条件组 '{}': {}", group.id, e)))?;
                sort_by_priority(&mut conditions);

                info!(group_id = %group.id, count = conditions.len(), "条件组已加载");
                Ok::<_, RuleError>(Arc::from(conditions))
            })?;

        Ok(ResolvedConditions::Snapshot(Arc::clone(&entry)))
    }

    /// 丢弃单个条件组的快照，下次访问时重新加载
    pub fn invalidate(&self, group_id: &str) -> bool {
        let removed = self.snapshots.remove(group_id).is_some();
        if removed {
            debug!(group_id = %group_id, "条件组快照已失效");
        }
        removed
    }

    pub fn clear(&self) {
        self.snapshots.clear();
        debug!("条件组快照已全部清除");
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
