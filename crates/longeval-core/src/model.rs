use serde::{Deserialize, Serialize};

/// One unit of work: a stable key plus the fully rendered prompt.
///
/// Keys are derived from dataset identity (never from list position) so they
/// stay stable across reruns; the pending-set diff depends on that.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkItem {
    pub key: String,
    pub prompt: String,
}

impl WorkItem {
    pub fn new(key: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            prompt: prompt.into(),
        }
    }
}

/// A resolved work item, aligned back to original dataset order by the runner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultRecord {
    pub key: String,
    pub value: String,
}

/// Which execution family a backend belongs to. Decided once at startup from
/// the provider, never re-checked per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Network-bound remote API: cheap concurrency, rate-limited.
    Api,
    /// Device-bound local model: one process per device, strictly sequential.
    Local,
}

/// Outcome counts from one execution pass. `failed` items were absorbed
/// (never checkpointed) and stay pending for the next run; `skipped` items
/// were already resolved in the store before the pass started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunReport {
    pub fn processed(&self) -> usize {
        self.completed + self.failed + self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_report_counts_processed() {
        let report = RunReport {
            completed: 7,
            failed: 3,
            skipped: 2,
        };
        assert_eq!(report.processed(), 12);
    }
}
