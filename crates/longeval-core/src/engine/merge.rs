//! Merging per-rank stores into the canonical store.
//!
//! Runs on rank 0 only, after the end-of-slice barrier. Precedence: canonical
//! contents first, then each rank store in ascending rank order, last applied
//! wins. The shard partition assigns each key to exactly one rank, so a key
//! appearing in two rank stores means the partition changed between runs
//! (e.g. a different world_size); that is surfaced as a warning, not fixed
//! silently.

use std::collections::BTreeMap;

use crate::errors::StoreError;
use crate::storage::layout::StoreLayout;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Keys contributed by rank stores (not counting pre-existing canonical keys).
    pub merged: usize,
    /// Keys seen in more than one rank store.
    pub collisions: usize,
}

pub struct ShardMerger<'a> {
    layout: &'a StoreLayout,
    world_size: usize,
}

impl<'a> ShardMerger<'a> {
    pub fn new(layout: &'a StoreLayout, world_size: usize) -> Self {
        Self { layout, world_size }
    }

    /// Fold every rank store plus the pre-existing canonical store into the
    /// canonical store, then delete the per-rank artifacts. Deletion failures
    /// are non-fatal: a rank with nothing checkpointed has no artifact.
    pub fn merge(&self) -> Result<MergeReport, StoreError> {
        let canonical = self.layout.canonical();
        let mut merged = canonical.load()?;
        let mut origin: BTreeMap<String, usize> = BTreeMap::new();
        let mut report = MergeReport::default();

        for rank in 0..self.world_size {
            let partial = self.layout.rank_store(rank).load()?;
            for (key, value) in partial {
                if let Some(prev_rank) = origin.insert(key.clone(), rank) {
                    report.collisions += 1;
                    tracing::warn!(
                        key = %key,
                        prev_rank,
                        rank,
                        "shard inconsistency: key checkpointed by two ranks; keeping rank {rank}"
                    );
                } else {
                    report.merged += 1;
                }
                merged.insert(key, value);
            }
        }

        canonical.save(&merged)?;

        for rank in 0..self.world_size {
            let store = self.layout.rank_store(rank);
            if let Err(e) = store.remove() {
                tracing::debug!(rank, error = %e, "could not remove rank store");
            }
        }

        Ok(report)
    }
}
