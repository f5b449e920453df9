//! Local model backend: an OpenAI-compatible inference server pinned to this
//! rank's device (llama.cpp, vLLM and friends all speak this dialect).
//!
//! The process owns its server exclusively, so generation is driven one call
//! at a time; the engine routes this family through the static shard path.

use async_trait::async_trait;
use serde_json::json;

use super::TextBackend;
use crate::errors::EvalError;

#[derive(Debug)]
pub struct LocalServerBackend {
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
    client: reqwest::Client,
}

impl LocalServerBackend {
    /// Connect to the per-rank server and verify it is actually serving.
    /// A dead or unreachable endpoint is a device-allocation failure the
    /// coordinator decides about, not a process exit.
    pub async fn connect(model: String, base_url: String) -> Result<Self, EvalError> {
        let backend = Self {
            model,
            base_url,
            max_tokens: 512,
            client: reqwest::Client::new(),
        };
        backend.probe().await?;
        Ok(backend)
    }

    async fn probe(&self) -> Result<(), EvalError> {
        let url = format!("{}/models", self.base_url);
        let resp = self.client.get(&url).send().await.map_err(|e| {
            EvalError::DeviceAllocation(format!("no inference server at {}: {}", self.base_url, e))
        })?;
        if !resp.status().is_success() {
            return Err(EvalError::DeviceAllocation(format!(
                "inference server at {} unhealthy: {}",
                self.base_url,
                resp.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl TextBackend for LocalServerBackend {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0.0,
            "max_tokens": self.max_tokens,
        });

        let resp = self.client.post(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            anyhow::bail!("local server error: {} {}", status.as_u16(), detail);
        }

        let payload: serde_json::Value = resp.json().await?;
        let text = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("local server returned no message content"))?;
        Ok(text.to_string())
    }

    fn is_remote(&self) -> bool {
        false
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_server_is_a_device_allocation_failure() {
        // Nothing listens on this port.
        let err = LocalServerBackend::connect(
            "internlm2-7b".into(),
            "http://127.0.0.1:1/v1".into(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EvalError::DeviceAllocation(_)));
    }
}
