//! Cross-run score ledger: `{model}_{dataset}` → latest score entry.
//!
//! Loaded, merged and saved as a whole mapping under the same lock discipline
//! as the answer stores; concurrent jobs writing different keys into one
//! ledger file cannot clobber each other.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::StoreError;
use crate::storage::flock;
use crate::storage::record_store::DEFAULT_LOCK_WAIT;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreEntry {
    /// Accuracy in percent.
    pub score: f64,
    /// How many items the score covers.
    pub items: usize,
    pub at: DateTime<Utc>,
}

impl ScoreEntry {
    pub fn now(score: f64, items: usize) -> Self {
        Self {
            score,
            items,
            at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScoreLedger {
    path: PathBuf,
    lock_wait: Duration,
}

impl ScoreLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_wait: DEFAULT_LOCK_WAIT,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<BTreeMap<String, ScoreEntry>, StoreError> {
        let _lock = flock::acquire(&self.path, false, self.lock_wait)?;
        self.read_unlocked()
    }

    /// Merge one score under `job_key` into the ledger and persist it.
    pub fn record(&self, job_key: &str, entry: ScoreEntry) -> Result<(), StoreError> {
        let _lock = flock::acquire(&self.path, true, self.lock_wait)?;
        let mut scores = self.read_unlocked()?;
        scores.insert(job_key.to_string(), entry);

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|e| StoreError::io(&self.path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &scores).map_err(|e| StoreError::Parse {
            path: self.path.clone(),
            source: e,
        })?;
        writer.flush().map_err(|e| StoreError::io(&self.path, e))?;
        writer
            .into_inner()
            .map_err(|e| StoreError::io(&self.path, e.into_error()))?
            .sync_all()
            .map_err(|e| StoreError::io(&self.path, e))?;
        Ok(())
    }

    fn read_unlocked(&self) -> Result<BTreeMap<String, ScoreEntry>, StoreError> {
        let file = match OpenOptions::new().read(true).open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };
        serde_json::from_reader(BufReader::new(file)).map_err(|e| StoreError::Parse {
            path: self.path.clone(),
            source: e,
        })
    }
}
