use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationMessage {
    pub role: String,
    pub content: String,
}

impl ConversationMessage {
    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.to_string(),
        }
    }
}

/// The most recent `turns` exchanges (a user message and its reply each),
/// oldest first.
pub fn recent(history: &[ConversationMessage], turns: usize) -> &[ConversationMessage] {
    let start = history.len().saturating_sub(turns.saturating_mul(2));
    &history[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_counts_exchanges() {
        let history: Vec<ConversationMessage> = (0..5)
            .flat_map(|i| {
                [
                    ConversationMessage::user(&format!("q{i}")),
                    ConversationMessage::assistant(&format!("a{i}")),
                ]
            })
            .collect();
        let window = recent(&history, 2);
        assert_eq!(window.len(), 4);
        assert_eq!(window[0].content, "q3");
        assert_eq!(recent(&history, 20).len(), 10);
        assert!(recent(&history, 0).is_empty());
    }
}
