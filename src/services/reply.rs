use chrono::Duration;

use crate::models::ConversationMessage;
use crate::services::session::{self, SessionStore};

/// Records the turn in the conversation history and hands the reply back.
/// The stored history is never trimmed here; readers take their own window.
pub fn finalize_reply(
    store: &dyn SessionStore,
    conversation_key: &str,
    mut history: Vec<ConversationMessage>,
    user_message: &str,
    reply: String,
    ttl: Duration,
) -> anyhow::Result<String> {
    history.push(ConversationMessage::user(user_message));
    history.push(ConversationMessage::assistant(&reply));
    session::set_json(store, conversation_key, &history, ttl)?;
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use super::*;
    use crate::services::clock::FixedClock;
    use crate::services::session::MemorySessionStore;

    #[test]
    fn test_appends_both_sides_of_the_turn() {
        let now = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let store = MemorySessionStore::new(Arc::new(FixedClock(now)));
        let earlier = vec![
            ConversationMessage::user("xin chào"),
            ConversationMessage::assistant("Chào bạn"),
        ];

        let reply = finalize_reply(
            &store,
            "chat:u1",
            earlier,
            "spa ở Hà Nội",
            "Các spa ở **Hà Nội**".to_string(),
            Duration::seconds(86_400),
        )
        .unwrap();
        assert_eq!(reply, "Các spa ở **Hà Nội**");

        let stored: Vec<ConversationMessage> = session::get_json(&store, "chat:u1").unwrap().unwrap();
        assert_eq!(stored.len(), 4);
        assert_eq!(stored[2], ConversationMessage::user("spa ở Hà Nội"));
        assert_eq!(stored[3].role, "assistant");
    }
}
