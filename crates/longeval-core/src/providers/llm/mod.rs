//! Generation backends. One variant per backend family, selected at startup;
//! the engine only sees the trait.

pub mod fake;
pub mod local;
pub mod openai;

use async_trait::async_trait;

use crate::model::BackendKind;

/// A text-generation backend. `generate` may be slow and may fail per call;
/// the engine absorbs per-item failures and performs no retries of its own.
#[async_trait]
pub trait TextBackend: Send + Sync {
    /// One prompt in, one completion out.
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;

    /// Remote APIs tolerate concurrent in-flight calls; local models
    /// monopolize their device and are driven strictly sequentially.
    fn is_remote(&self) -> bool;

    fn model_name(&self) -> &str;

    fn kind(&self) -> BackendKind {
        if self.is_remote() {
            BackendKind::Api
        } else {
            BackendKind::Local
        }
    }
}
