//! Chunk Budgeter - 预览长度预算
//!
//! 每次因上下文超限失败后按几何系数缩小截断长度。
//! 序列严格递减且不低于最小可用预览长度；到达下限后返回 `None`，
//! 调用方必须将其视为该文档的致命错误。

/// 预览预算策略
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewBudget {
    /// 首次尝试的截断长度（字符数）
    pub initial_chars: usize,
    /// 每次缩小的比例（0 < ratio < 1）
    pub shrink_ratio: f64,
    /// 最小可用预览长度（字符数）
    pub min_chars: usize,
}

impl Default for PreviewBudget {
    fn default() -> Self {
        Self {
            initial_chars: 400_000,
            shrink_ratio: 0.75,
            min_chars: 12_000,
        }
    }
}

impl PreviewBudget {
    pub fn new(initial_chars: usize, shrink_ratio: f64, min_chars: usize) -> Self {
        Self {
            initial_chars,
            shrink_ratio,
            min_chars,
        }
    }

    /// 第 `attempt` 次尝试（从 0 开始）可使用的最大字符数
    ///
    /// 文本短于首个预算时从全文长度开始缩小，但起点不会低于 `min_chars`。
    pub fn preview_budget(&self, full_len: usize, attempt: u32) -> Option<usize> {
        let mut budget = self.initial_chars.min(full_len.max(self.min_chars));
        for _ in 0..attempt {
            budget = self.shrink(budget)?;
        }
        Some(budget)
    }

    /// 从 `current` 缩小一步；已到下限时返回 `None`
    pub fn shrink(&self, current: usize) -> Option<usize> {
        if current <= self.min_chars {
            return None;
        }
        let mut next = (current as f64 * self.shrink_ratio) as usize;
        if next >= current {
            next = current - 1;
        }
        Some(next.max(self.min_chars))
    }

    /// 从首次预算开始的完整递减序列
    pub fn schedule(&self, full_len: usize) -> impl Iterator<Item = usize> + '_ {
        let first = self.preview_budget(full_len, 0);
        std::iter::successors(first, move |current| self.shrink(*current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_first_budget_is_capped_by_document_length() {
        let budget = PreviewBudget::new(1000, 0.5, 100);
        assert_eq!(budget.preview_budget(5000, 0), Some(1000));
        assert_eq!(budget.preview_budget(400, 0), Some(400));
        assert_eq!(budget.preview_budget(10, 0), Some(100));
    }

    #[test]
    fn test_schedule_reaches_minimum_then_stops() {
        let budget = PreviewBudget::new(1000, 0.5, 100);
        let schedule: Vec<usize> = budget.schedule(5000).collect();
        assert_eq!(schedule, vec![1000, 500, 250, 125, 100]);
        assert_eq!(budget.preview_budget(5000, 4), Some(100));
        assert_eq!(budget.preview_budget(5000, 5), None);
    }

    #[test]
    fn test_ratio_close_to_one_still_decreases() {
        let budget = PreviewBudget::new(10, 0.99, 5);
        let schedule: Vec<usize> = budget.schedule(100).collect();
        assert_eq!(schedule, vec![10, 9, 8, 7, 6, 5]);
    }

    proptest! {
        #[test]
        fn schedule_is_strictly_decreasing_and_bounded(
            initial in 1usize..2_000_000,
            min in 1usize..50_000,
            ratio in 0.05f64..0.99,
            full_len in 0usize..3_000_000,
        ) {
            prop_assume!(min <= initial);
            let budget = PreviewBudget::new(initial, ratio, min);
            let schedule: Vec<usize> = budget.schedule(full_len).take(10_000).collect();
            prop_assert!(!schedule.is_empty());
            for pair in schedule.windows(2) {
                prop_assert!(pair[1] < pair[0]);
            }
            for value in &schedule {
                prop_assert!(*value >= min);
            }
            prop_assert_eq!(*schedule.last().unwrap(), min);
        }
    }
}
