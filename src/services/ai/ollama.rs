use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

use super::{LlmProvider, Message};

/// Local Ollama server, non-streaming `/api/chat`.
pub struct OllamaProvider {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(base_url: String, model: String, timeout_secs: u64) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            client: super::http_client(timeout_secs),
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn chat(&self, system_prompt: &str, messages: &[Message]) -> anyhow::Result<String> {
        let payload = json!({
            "model": self.model,
            "messages": super::with_system(system_prompt, messages),
            "stream": false,
            "options": { "temperature": 0.2 },
        });

        let endpoint = format!("{}/api/chat", self.base_url);
        let resp = self
            .client
            .post(&endpoint)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("ollama request to {endpoint} failed"))?;

        super::read_completion("ollama", resp, "/message/content").await
    }
}
