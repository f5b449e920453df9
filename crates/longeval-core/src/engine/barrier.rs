//! Filesystem rendezvous for the sharded path.
//!
//! The shared work directory is the one medium the launch contract already
//! guarantees, so the barrier is a marker file per (phase, rank) in a
//! launch-scoped directory. A rank arrives by writing its marker and proceeds
//! once all `world_size` markers for the phase exist. Markers are never
//! deleted: the launch id scopes the directory, and a marker that already
//! exists on arrival means the launch id was reused, which fails the rank
//! rather than letting it rendezvous against a dead launch. There is no
//! timeout; a hung peer stalls the job, which is inherent to static-rank
//! designs.

use std::path::PathBuf;
use std::time::Duration;

use crate::errors::StoreError;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct FileBarrier {
    dir: PathBuf,
    world_size: usize,
}

impl FileBarrier {
    pub fn new(dir: impl Into<PathBuf>, world_size: usize) -> Self {
        Self {
            dir: dir.into(),
            world_size,
        }
    }

    /// Arrive at `phase` as `rank` and wait for all peers. Fails if this
    /// rank's marker already exists: that means the launch id was reused
    /// after a failed launch, and merging against its leftover markers could
    /// release rank 0 while a peer is still mid-slice.
    pub async fn wait(&self, phase: &str, rank: usize) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        let marker = self.dir.join(format!("{phase}.r{rank}"));
        anyhow::ensure!(
            !marker.exists(),
            "stale barrier marker {} from a previous launch; rerun with a fresh job id",
            marker.display()
        );
        std::fs::write(&marker, b"").map_err(|e| StoreError::io(&marker, e))?;

        tracing::debug!(phase, rank, "arrived at barrier");
        loop {
            if self.arrived(phase)? >= self.world_size {
                tracing::debug!(phase, rank, "barrier released");
                return Ok(());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    fn arrived(&self, phase: &str) -> Result<usize, StoreError> {
        let prefix = format!("{phase}.r");
        let entries = std::fs::read_dir(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        let mut count = 0;
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.dir, e))?;
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                count += 1;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn single_rank_barrier_releases_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let barrier = FileBarrier::new(dir.path().join("b"), 1);
        barrier.wait("slice", 0).await.unwrap();
    }

    #[tokio::test]
    async fn all_ranks_must_arrive_before_any_proceeds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b");

        let b0 = FileBarrier::new(&path, 2);
        let b1 = FileBarrier::new(&path, 2);

        let first = tokio::spawn(async move { b0.wait("slice", 0).await });
        // Give rank 0 time to arrive; it must still be blocked.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!first.is_finished());

        b1.wait("slice", 1).await.unwrap();
        first.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn reused_launch_id_fails_instead_of_joining_stale_markers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b");

        FileBarrier::new(&path, 1).wait("slice", 0).await.unwrap();

        // Same directory again, as a relaunch with the same job id would see.
        let err = FileBarrier::new(&path, 2)
            .wait("slice", 0)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("fresh job id"));
    }

    #[tokio::test]
    async fn phases_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b");
        let barrier = FileBarrier::new(&path, 1);

        barrier.wait("slice", 0).await.unwrap();
        // A second phase requires fresh arrivals; a released first phase does
        // not satisfy it (distinct marker names).
        let b2 = FileBarrier::new(&path, 2);
        let pending = tokio::spawn(async move { b2.wait("merge", 0).await });
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!pending.is_finished());
        pending.abort();
    }
}
