//! Durable key/value stores for checkpointed answers and accumulated scores.
//!
//! Everything here follows one contract: whole-mapping reads and writes under
//! an advisory file lock with a bounded wait. No partial-key update primitive
//! exists; callers load, mutate in memory, and save the full mapping, which
//! keeps checkpoint and merge logic idempotent.

mod flock;
pub mod layout;
pub mod ledger;
pub mod record_store;

pub use layout::StoreLayout;
pub use ledger::{ScoreEntry, ScoreLedger};
pub use record_store::RecordStore;
