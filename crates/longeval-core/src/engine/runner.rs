//! Job coordination: one (model, dataset) pair from pending-set diff to a
//! verified, complete canonical store.
//!
//! The central reliability property is idempotence under resumption: only
//! keys absent from the canonical store are ever submitted, so rerunning
//! after any interruption finishes the remainder without recomputing.

use std::sync::Arc;

use crate::engine::barrier::FileBarrier;
use crate::engine::merge::ShardMerger;
use crate::engine::pool::BoundedWorkerPool;
use crate::engine::shard::StaticShardExecutor;
use crate::errors::EvalError;
use crate::model::{ResultRecord, RunReport, WorkItem};
use crate::providers::llm::TextBackend;
use crate::report::progress::ProgressSink;
use crate::storage::layout::StoreLayout;

const PHASE_SLICE: &str = "slice";
const PHASE_MERGE: &str = "merge";

pub struct JobRunner {
    pub backend: Arc<dyn TextBackend>,
    pub layout: StoreLayout,
    /// This process's ordinal in the sharded path; 0 for single-process runs.
    pub rank: usize,
    pub world_size: usize,
    pub max_concurrency: usize,
    pub checkpoint_every: usize,
    /// Shared by all ranks of one launch, unique across launches; scopes the
    /// barrier directory.
    pub job_id: String,
}

/// Terminal artifact of a completed job.
#[derive(Debug)]
pub struct JobOutcome {
    /// One record per work item, aligned to the original item order.
    pub records: Vec<ResultRecord>,
    pub report: RunReport,
}

impl JobRunner {
    /// Execute the job to completion. Returns `EvalError::IncompleteRun` if
    /// any key is still unresolved afterwards; completed checkpoints are left
    /// intact either way.
    pub async fn run(
        &self,
        items: &[WorkItem],
        progress: Option<ProgressSink>,
    ) -> anyhow::Result<JobOutcome> {
        let canonical = self.layout.canonical();
        let existing = canonical.load()?;
        let pending: Vec<WorkItem> = items
            .iter()
            .filter(|item| !existing.contains_key(&item.key))
            .cloned()
            .collect();

        tracing::info!(
            job = %self.layout.job_key(),
            total = items.len(),
            resolved = items.len() - pending.len(),
            pending = pending.len(),
            "computed pending set"
        );

        let report = if pending.is_empty() {
            RunReport::default()
        } else if self.backend.is_remote() {
            anyhow::ensure!(
                self.world_size == 1,
                "API backends run single-process; launch without sharding"
            );
            BoundedWorkerPool::new(
                self.backend.clone(),
                self.max_concurrency,
                self.checkpoint_every,
            )
            .run(&pending, &canonical, progress)
            .await?
        } else {
            self.run_sharded(&pending, progress).await?
        };

        let resolved = canonical.load()?;
        let missing = items
            .iter()
            .filter(|item| !resolved.contains_key(&item.key))
            .count();
        if missing > 0 {
            tracing::warn!(
                job = %self.layout.job_key(),
                missing,
                completed = report.completed,
                failed = report.failed,
                "run incomplete; scoring skipped"
            );
            return Err(EvalError::IncompleteRun {
                missing,
                total: items.len(),
            }
            .into());
        }

        let records = items
            .iter()
            .map(|item| ResultRecord {
                key: item.key.clone(),
                value: resolved[&item.key].clone(),
            })
            .collect();
        Ok(JobOutcome { records, report })
    }

    async fn run_sharded(
        &self,
        pending: &[WorkItem],
        progress: Option<ProgressSink>,
    ) -> anyhow::Result<RunReport> {
        let executor = StaticShardExecutor::new(self.backend.clone(), self.rank, self.world_size);

        if self.world_size == 1 {
            // Degenerate case: sequential full pass straight into the
            // canonical store, no rendezvous needed.
            return executor.run(pending, &self.layout.canonical(), progress).await;
        }

        let store = self.layout.rank_store(self.rank);
        let report = executor.run(pending, &store, progress).await?;

        let barrier = FileBarrier::new(
            self.layout.barrier_dir(&self.job_id),
            self.world_size,
        );
        barrier.wait(PHASE_SLICE, self.rank).await?;

        if self.rank == 0 {
            let merge_report = ShardMerger::new(&self.layout, self.world_size).merge()?;
            tracing::info!(
                merged = merge_report.merged,
                collisions = merge_report.collisions,
                "merged rank stores into canonical store"
            );
        }

        // Second rendezvous so no rank races ahead of the merge commit.
        barrier.wait(PHASE_MERGE, self.rank).await?;
        Ok(report)
    }
}
