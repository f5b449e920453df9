//! Path conventions for one (model, dataset) job inside a work directory.
//!
//! Canonical store: `{model}_{dataset}.json`; transient per-rank stores:
//! `{model}_{dataset}_{rank}.json`; predictions table:
//! `{model}_{dataset}_meta.json`; shared score ledger: `results.json`.

use std::path::{Path, PathBuf};

use crate::storage::record_store::RecordStore;

#[derive(Debug, Clone)]
pub struct StoreLayout {
    work_dir: PathBuf,
    model: String,
    dataset: String,
}

impl StoreLayout {
    pub fn new(work_dir: impl Into<PathBuf>, model: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            work_dir: work_dir.into(),
            model: model.into(),
            dataset: dataset.into(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// `{model}_{dataset}`, the key this job uses in the score ledger.
    pub fn job_key(&self) -> String {
        format!("{}_{}", self.model, self.dataset)
    }

    /// The single authoritative store for this job.
    pub fn canonical(&self) -> RecordStore {
        RecordStore::new(self.work_dir.join(format!("{}.json", self.job_key())))
    }

    /// Transient store owned exclusively by one rank until merge time.
    pub fn rank_store(&self, rank: usize) -> RecordStore {
        RecordStore::new(self.work_dir.join(format!("{}_{}.json", self.job_key(), rank)))
    }

    /// Cross-run score ledger shared by every job in this work directory.
    pub fn ledger_path(&self) -> PathBuf {
        self.work_dir.join("results.json")
    }

    /// Per-item predictions table written next to the canonical store once a
    /// run completes.
    pub fn predictions_path(&self) -> PathBuf {
        self.work_dir.join(format!("{}_meta.json", self.job_key()))
    }

    /// Rendezvous directory for one launch of the sharded path. `job_id`
    /// must be shared by all ranks of a launch and unique across launches.
    pub fn barrier_dir(&self, job_id: &str) -> PathBuf {
        self.work_dir
            .join(".barriers")
            .join(format!("{}_{}", self.job_key(), job_id))
    }
}
