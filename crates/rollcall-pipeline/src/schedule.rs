//! Batch and window partitioning
//!
//! The eligible set is cut into batches of `batch_size` items (the unit of
//! counter checkpointing and progress), and each batch into windows of
//! `concurrent_pages` items (the unit of bounded render concurrency). Only
//! the last batch, and the last window of each batch, may be short.

use rollcall_core::{ConfigError, PipelineConfig};
use std::ops::Range;

/// One batch of the plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// 1-based batch index
    pub index: usize,
    /// Item positions covered by the batch
    pub range: Range<usize>,
    window_size: usize,
}

impl Batch {
    /// Number of items in the batch
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.range.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Item positions of each concurrency window, in order
    pub fn windows(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        let end = self.range.end;
        self.range
            .clone()
            .step_by(self.window_size)
            .map(move |start| start..(start + self.window_size).min(end))
    }

    /// Number of windows in the batch
    #[inline]
    #[must_use]
    pub fn window_count(&self) -> usize {
        self.len().div_ceil(self.window_size)
    }
}

/// Partition of `total` items into batches and windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    total: usize,
    batch_size: usize,
    window_size: usize,
}

impl BatchPlan {
    /// Create plan from validated pipeline settings
    ///
    /// # Errors
    /// - `ConfigError::InvalidValue` if the settings violate their invariants
    pub fn new(total: usize, config: &PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            total,
            batch_size: config.batch_size,
            window_size: config.concurrent_pages,
        })
    }

    /// Items covered by the plan
    #[inline]
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of batches
    #[inline]
    #[must_use]
    pub fn batch_count(&self) -> usize {
        self.total.div_ceil(self.batch_size)
    }

    /// Batches in execution order
    pub fn batches(&self) -> impl Iterator<Item = Batch> + '_ {
        (0..self.total)
            .step_by(self.batch_size)
            .enumerate()
            .map(move |(i, start)| Batch {
                index: i + 1,
                range: start..(start + self.batch_size).min(self.total),
                window_size: self.window_size,
            })
    }

    /// Windows across all batches
    #[must_use]
    pub fn window_count(&self) -> usize {
        self.batches().map(|b| b.window_count()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn plan(total: usize, batch: usize, window: usize) -> BatchPlan {
        let config = PipelineConfig::new()
            .with_batch_size(batch)
            .with_concurrent_pages(window);
        BatchPlan::new(total, &config).unwrap()
    }

    #[test]
    fn fifty_seven_items_make_two_batches_and_twelve_windows() {
        let plan = plan(57, 50, 5);
        let batches: Vec<Batch> = plan.batches().collect();

        assert_eq!(plan.batch_count(), 2);
        assert_eq!(batches[0].len(), 50);
        assert_eq!(batches[1].len(), 7);
        assert_eq!(batches[0].window_count(), 10);
        assert_eq!(
            batches[1].windows().map(|w| w.len()).collect::<Vec<_>>(),
            vec![5, 2]
        );
        assert_eq!(plan.window_count(), 12);
    }

    #[test]
    fn empty_plan_has_no_batches() {
        let plan = plan(0, 50, 5);
        assert_eq!(plan.batch_count(), 0);
        assert_eq!(plan.batches().count(), 0);
    }

    #[test]
    fn batch_indices_are_one_based() {
        let indices: Vec<usize> = plan(120, 50, 5).batches().map(|b| b.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
    }

    #[test]
    fn rejects_window_larger_than_batch() {
        let config = PipelineConfig::new()
            .with_batch_size(4)
            .with_concurrent_pages(5);
        assert!(BatchPlan::new(10, &config).is_err());
    }

    proptest! {
        #[test]
        fn prop_windows_tile_every_item_once(
            total in 0..500usize,
            batch in 1..80usize,
            window_seed in 1..80usize,
        ) {
            let window = window_seed.min(batch);
            let plan = plan(total, batch, window);

            let mut next = 0;
            for b in plan.batches() {
                prop_assert!(b.len() <= batch);
                for w in b.windows() {
                    prop_assert_eq!(w.start, next);
                    prop_assert!(!w.is_empty() && w.len() <= window);
                    next = w.end;
                }
                prop_assert_eq!(next, b.range.end);
            }
            prop_assert_eq!(next, total);
        }

        #[test]
        fn prop_only_last_batch_is_short(total in 1..500usize, batch in 1..80usize) {
            let plan = plan(total, batch, 1);
            let sizes: Vec<usize> = plan.batches().map(|b| b.len()).collect();
            prop_assert_eq!(sizes.len(), plan.batch_count());
            for size in &sizes[..sizes.len() - 1] {
                prop_assert_eq!(*size, batch);
            }
        }
    }
}
