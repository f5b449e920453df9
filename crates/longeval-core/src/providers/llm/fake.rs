//! Scripted backend for tests and pipeline smoke runs.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::TextBackend;

/// Deterministic backend: echoes a transform of the prompt, optionally
/// failing scripted prompts. `is_remote` is configurable so both engine
/// paths can be exercised against it.
pub struct FakeBackend {
    model: String,
    remote: bool,
    calls: AtomicUsize,
    /// Prompts that fail every time.
    fail_prompts: Mutex<HashSet<String>>,
    /// Fail everything after this many successful calls (crash simulation).
    fail_after: Option<usize>,
}

impl FakeBackend {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            remote: true,
            calls: AtomicUsize::new(0),
            fail_prompts: Mutex::new(HashSet::new()),
            fail_after: None,
        }
    }

    pub fn local(mut self) -> Self {
        self.remote = false;
        self
    }

    pub fn failing_on(self, prompt: impl Into<String>) -> Self {
        self.fail_prompts.lock().unwrap().insert(prompt.into());
        self
    }

    pub fn failing_after(mut self, successes: usize) -> Self {
        self.fail_after = Some(successes);
        self
    }

    /// Stop failing a previously scripted prompt ("the backend got fixed").
    pub fn heal(&self, prompt: &str) {
        self.fail_prompts.lock().unwrap().remove(prompt);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn answer_for(prompt: &str) -> String {
        format!("ans:{prompt}")
    }
}

#[async_trait]
impl TextBackend for FakeBackend {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = self.fail_after {
            if n >= limit {
                anyhow::bail!("scripted crash after {limit} calls");
            }
        }
        if self.fail_prompts.lock().unwrap().contains(prompt) {
            anyhow::bail!("scripted failure for prompt");
        }
        Ok(Self::answer_for(prompt))
    }

    fn is_remote(&self) -> bool {
        self.remote
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_failures_and_healing() {
        let backend = FakeBackend::new("fake").failing_on("p2");
        assert_eq!(backend.generate("p1").await.unwrap(), "ans:p1");
        assert!(backend.generate("p2").await.is_err());

        backend.heal("p2");
        assert_eq!(backend.generate("p2").await.unwrap(), "ans:p2");
        assert_eq!(backend.calls(), 3);
    }
}
