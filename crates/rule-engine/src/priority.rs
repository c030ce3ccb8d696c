//! 优先级排序
//!
//! 条件组、条件、规则动作以及规则本身都按数值优先级升序排列，
//! 优先级相同时保持原始（插入/加载）顺序。

/// 具有优先级的实体
pub trait Prioritized {
    fn priority(&self) -> i32;
}

impl<T: Prioritized + ?Sized> Prioritized for &T {
    fn priority(&self) -> i32 {
        (**self).priority()
    }
}

impl<T: Prioritized + ?Sized> Prioritized for std::sync::Arc<T> {
    fn priority(&self) -> i32 {
        (**self).priority()
    }
}

/// 原地按优先级排序（稳定排序）
pub fn sort_by_priority<T: Prioritized>(items: &mut [T]) {
    // slice::sort_by_key 是稳定排序，同优先级保持原有顺序
    items.sort_by_key(|item| item.priority());
}

/// 返回按优先级排列的引用视图，不修改原切片
pub fn by_priority<T: Prioritized>(items: &[T]) -> Vec<&T> {
    let mut ordered: Vec<&T> = items.iter().collect();
    sort_by_priority(&mut ordered);
    ordered
}
