//! Static work sharding for device-bound backends.
//!
//! Each rank derives its slice purely from (rank, world_size, ordered list) —
//! no coordination messages. Generation is strictly sequential within a rank
//! and progress is checkpointed after every single item: local generation is
//! slow enough that lost work matters more than I/O overhead.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::model::{RunReport, WorkItem};
use crate::providers::llm::TextBackend;
use crate::report::progress::{ProgressEvent, ProgressSink};
use crate::storage::record_store::RecordStore;

/// Order-preserving partition: item `i` belongs to rank `i % world_size`.
/// The union of all rank slices is exactly the original list.
pub fn shard_slice(items: &[WorkItem], rank: usize, world_size: usize) -> Vec<WorkItem> {
    items
        .iter()
        .enumerate()
        .filter(|(i, _)| i % world_size == rank)
        .map(|(_, item)| item.clone())
        .collect()
}

pub struct StaticShardExecutor {
    pub backend: Arc<dyn TextBackend>,
    pub rank: usize,
    pub world_size: usize,
}

impl StaticShardExecutor {
    pub fn new(backend: Arc<dyn TextBackend>, rank: usize, world_size: usize) -> Self {
        assert!(world_size >= 1, "world_size must be at least 1");
        assert!(rank < world_size, "rank {rank} out of range for world_size {world_size}");
        Self {
            backend,
            rank,
            world_size,
        }
    }

    /// Process this rank's slice of `items` sequentially into `store` (the
    /// rank's own store, or the canonical one when `world_size == 1`). Keys
    /// already present in the store are skipped, so an interrupted rank
    /// resumes mid-slice.
    pub async fn run(
        &self,
        items: &[WorkItem],
        store: &RecordStore,
        progress: Option<ProgressSink>,
    ) -> anyhow::Result<RunReport> {
        let slice = shard_slice(items, self.rank, self.world_size);
        let total = slice.len();
        let mut resolved = store.load()?;
        let mut report = RunReport::default();

        tracing::info!(
            rank = self.rank,
            world_size = self.world_size,
            items = total,
            "starting shard pass"
        );

        for (done, item) in slice.iter().enumerate() {
            if !resolved.contains_key(&item.key) {
                match self.backend.generate(&item.prompt).await {
                    Ok(answer) => {
                        let mut update = BTreeMap::new();
                        update.insert(item.key.clone(), answer);
                        resolved = store.merge_save(&update)?;
                        report.completed += 1;
                    }
                    Err(e) => {
                        tracing::debug!(
                            rank = self.rank,
                            key = %item.key,
                            error = %e,
                            "generation failed; leaving key pending"
                        );
                        report.failed += 1;
                    }
                }
            } else {
                report.skipped += 1;
            }

            if let Some(ref sink) = progress {
                sink(ProgressEvent {
                    done: done + 1,
                    total,
                });
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::llm::fake::FakeBackend;
    use std::collections::BTreeSet;

    fn items(n: usize) -> Vec<WorkItem> {
        (0..n)
            .map(|i| WorkItem::new(format!("k{i}"), format!("p{i}")))
            .collect()
    }

    #[test]
    fn shards_are_disjoint_and_complete() {
        for world_size in [1usize, 2, 3, 5] {
            for n in [0usize, 1, 4, 7, 10] {
                let work = items(n);
                let mut union = BTreeSet::new();
                let mut counted = 0;
                for rank in 0..world_size {
                    let slice = shard_slice(&work, rank, world_size);
                    counted += slice.len();
                    for item in &slice {
                        assert!(union.insert(item.key.clone()), "duplicated key");
                    }
                }
                assert_eq!(counted, n);
                assert_eq!(union.len(), n);
            }
        }
    }

    #[test]
    fn shards_preserve_relative_order() {
        let work = items(9);
        let slice = shard_slice(&work, 1, 3);
        let keys: Vec<_> = slice.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, vec!["k1", "k4", "k7"]);
    }

    #[tokio::test]
    async fn rank_processes_only_its_slice() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("rank1.json"));
        let executor = StaticShardExecutor::new(Arc::new(FakeBackend::new("fake").local()), 1, 2);

        let work = vec![
            WorkItem::new("a", "p1"),
            WorkItem::new("b", "p2"),
            WorkItem::new("c", "p3"),
        ];
        let report = executor.run(&work, &store, None).await.unwrap();

        assert_eq!(report.completed, 1);
        let saved = store.load().unwrap();
        assert_eq!(saved.len(), 1);
        assert!(saved.contains_key("b"));
    }

    #[tokio::test]
    async fn interrupted_rank_resumes_without_regenerating() {
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("rank0.json"));
        let work = items(4);

        // First pass crashes after one success.
        let crashing = Arc::new(FakeBackend::new("fake").local().failing_after(1));
        let executor = StaticShardExecutor::new(crashing, 0, 1);
        let report = executor.run(&work, &store, None).await.unwrap();
        assert_eq!(report.completed, 1);
        assert_eq!(store.load().unwrap().len(), 1);

        // Relaunch with a healthy backend: only the missing keys are
        // generated, the surviving checkpoint is reported as skipped.
        let healthy = Arc::new(FakeBackend::new("fake").local());
        let executor = StaticShardExecutor::new(healthy.clone(), 0, 1);
        let report = executor.run(&work, &store, None).await.unwrap();
        assert_eq!(report.completed, 3);
        assert_eq!(report.skipped, 1);
        assert_eq!(healthy.calls(), 3);
        assert_eq!(store.load().unwrap().len(), 4);
    }
}
