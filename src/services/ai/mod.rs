pub mod groq;
pub mod ollama;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::ConversationMessage;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

impl From<&ConversationMessage> for Message {
    fn from(m: &ConversationMessage) -> Self {
        Self {
            role: m.role.clone(),
            content: m.content.clone(),
        }
    }
}

/// The external completion service. Implementations must fail (not hang)
/// past their configured timeout.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, system_prompt: &str, messages: &[Message]) -> anyhow::Result<String>;
}

/// OpenAI-style message array with the system prompt first.
pub(crate) fn with_system(system_prompt: &str, messages: &[Message]) -> Vec<serde_json::Value> {
    std::iter::once(serde_json::json!({ "role": "system", "content": system_prompt }))
        .chain(
            messages
                .iter()
                .map(|m| serde_json::json!({ "role": m.role, "content": m.content })),
        )
        .collect()
}

/// Reads a chat-completion body and extracts the reply at `pointer`
/// (a JSON pointer). Non-2xx statuses become errors carrying the body.
pub(crate) async fn read_completion(
    provider: &str,
    resp: reqwest::Response,
    pointer: &str,
) -> anyhow::Result<String> {
    let status = resp.status();
    let data: serde_json::Value = resp
        .json()
        .await
        .with_context(|| format!("{provider}: unreadable completion body"))?;

    if !status.is_success() {
        anyhow::bail!("{provider} returned {status}: {data}");
    }

    data.pointer(pointer)
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .ok_or_else(|| anyhow::anyhow!("{provider}: no reply at {pointer}"))
}

pub(crate) fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to build HTTP client with timeout, using defaults");
            reqwest::Client::new()
        })
}
