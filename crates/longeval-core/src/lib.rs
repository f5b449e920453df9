//! Core library for the longeval benchmark harness.
//!
//! The pipeline: a [`dataset::Dataset`] yields keyed prompts, the
//! [`engine::runner::JobRunner`] executes the pending subset against a
//! [`providers::llm::TextBackend`] (bounded worker pool for remote APIs,
//! static rank sharding for local models), progress is checkpointed through
//! [`storage::record_store::RecordStore`], and the completed answer store is
//! scored and accumulated in the [`storage::ledger::ScoreLedger`].

pub mod dataset;
pub mod engine;
pub mod errors;
pub mod model;
pub mod providers;
pub mod report;
pub mod storage;
