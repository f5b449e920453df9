use std::path::PathBuf;

/// Failures from the durable key/value stores.
///
/// A failed save leaves prior contents intact; callers may retry or abort the
/// job without risking the canonical store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("timed out after {waited_ms}ms waiting for lock on {}", path.display())]
    LockTimeout { path: PathBuf, waited_ms: u64 },

    #[error("store io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store at {} is not a valid mapping: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Job-level failures that abort the current run.
///
/// Per-item generation failures are deliberately absent here: they are
/// absorbed by the executors, reported through run counts, and retried on the
/// next invocation.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// Post-run verification found unresolved keys. Scoring must not proceed
    /// on a partial store; completed checkpoints stay intact for a rerun.
    #[error("run incomplete: {missing} of {total} items unresolved (rerun to resume)")]
    IncompleteRun { missing: usize, total: usize },

    /// A local backend could not claim its device or endpoint.
    #[error("device allocation failed: {0}")]
    DeviceAllocation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_messages_name_the_path() {
        let err = StoreError::LockTimeout {
            path: PathBuf::from("out/gpt-4_stackselect_4k.json"),
            waited_ms: 5000,
        };
        let msg = err.to_string();
        assert!(msg.contains("5000ms"));
        assert!(msg.contains("gpt-4_stackselect_4k.json"));
    }

    #[test]
    fn incomplete_run_reports_counts() {
        let err = EvalError::IncompleteRun {
            missing: 3,
            total: 200,
        };
        assert!(err.to_string().contains("3 of 200"));
    }
}
