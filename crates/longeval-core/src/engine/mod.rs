//! The resumable batch-inference engine.
//!
//! Two execution strategies, never mixed within one job: a bounded-concurrency
//! worker pool for remote APIs ([`pool`]) and static rank sharding for local
//! models ([`shard`] + [`barrier`] + [`merge`]). [`runner`] glues them into
//! one resumable job.

pub mod barrier;
pub mod merge;
pub mod pool;
pub mod runner;
pub mod shard;

pub use runner::JobRunner;
