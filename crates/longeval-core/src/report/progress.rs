//! Progress reporting. Executors emit done/total in completion order; the
//! console layer consumes via a sink.

use std::sync::Arc;

/// One progress update: how many items are done and total count.
#[derive(Debug, Clone, Copy)]
pub struct ProgressEvent {
    pub done: usize,
    pub total: usize,
}

/// Sink for progress events. Executors call this each time an item completes
/// (successfully or not). Implementations may throttle.
pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;
