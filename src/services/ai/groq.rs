use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

use super::{LlmProvider, Message};

const GROQ_CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Hosted OpenAI-compatible endpoint. Requires `GROQ_API_KEY`.
pub struct GroqProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GroqProvider {
    pub fn new(api_key: String, model: String, timeout_secs: u64) -> Self {
        Self {
            api_key,
            model,
            client: super::http_client(timeout_secs),
        }
    }
}

#[async_trait]
impl LlmProvider for GroqProvider {
    async fn chat(&self, system_prompt: &str, messages: &[Message]) -> anyhow::Result<String> {
        let payload = json!({
            "model": self.model,
            "messages": super::with_system(system_prompt, messages),
            "temperature": 0.2,
        });

        let resp = self
            .client
            .post(GROQ_CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("groq request failed (model {})", self.model))?;

        let reply = super::read_completion("groq", resp, "/choices/0/message/content").await?;
        tracing::debug!(model = %self.model, chars = reply.len(), "groq completion received");
        Ok(reply)
    }
}
