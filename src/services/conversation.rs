use std::sync::Arc;

use chrono::Duration;

use crate::models::conversation::recent;
use crate::models::{BookingContext, ConversationMessage};
use crate::services::booking::LastContext;
use crate::services::nlu::{enrich, HybridClassifier, LlmClassifier};
use crate::services::policy::{self, RouteEnv, Turn};
use crate::services::reply::finalize_reply;
use crate::services::session::{self, get_json};
use crate::state::AppState;

pub use crate::services::policy::APOLOGY;

/// One user turn: classify, enrich, route, run the handler, record history.
///
/// A failing handler is logged and answered with [`APOLOGY`]; the turn is
/// still recorded. Store failures outside the handler propagate.
pub async fn process_message(state: &Arc<AppState>, user_id: &str, message: &str) -> anyhow::Result<String> {
    let now = state.clock.now();
    let sessions = state.sessions.as_ref();
    let conversation_key = session::chat_key(user_id);

    let history: Vec<ConversationMessage> = get_json(sessions, &conversation_key)?.unwrap_or_default();
    let window = recent(&history, state.config.history_window);

    let llm_classifier = LlmClassifier::new(state.llm.as_ref());
    let nlu = HybridClassifier::new(&llm_classifier)
        .classify(message, window, now)
        .await;
    let slots = enrich(&nlu, message, &state.resolver, now);

    let booking_key = session::booking_key(user_id);
    let mut booking: BookingContext = get_json(sessions, &booking_key)?.unwrap_or_default();
    if policy::is_topic_switch(&nlu, message, &booking) {
        tracing::info!(user = user_id, intent = nlu.intent.as_str(), "topic switch, booking reset");
        booking = BookingContext::default();
        sessions.delete(&booking_key)?;
    }

    let last_spa_list: Vec<String> =
        get_json(sessions, &session::last_spa_list_key(&conversation_key))?.unwrap_or_default();
    let last_spa_focus: Option<String> = get_json(sessions, &session::last_spa_focus_key(&conversation_key))?;
    let last_context: Option<LastContext> = get_json(sessions, &session::last_context_key(&conversation_key))?;

    let list_pick = if booking.is_active() || slots.spa_name.is_some() {
        None
    } else {
        state.resolver.pick_ordinal(message, &last_spa_list)
    };

    let env = RouteEnv {
        booking: &booking,
        list_pick: list_pick.is_some(),
    };
    let rule = policy::route(&nlu, &env);
    tracing::info!(
        user = user_id,
        intent = nlu.intent.as_str(),
        rule = rule.name,
        confidence = nlu.confidence,
        stage = booking.stage().as_str(),
        "rule selected"
    );

    let mut turn = Turn {
        state: state.as_ref(),
        user_id,
        conversation_key: &conversation_key,
        message,
        nlu: &nlu,
        slots: &slots,
        history: window,
        booking,
        last_spa_focus,
        last_context,
        list_pick,
        now,
    };
    let reply = match policy::dispatch(rule.handler, &mut turn).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!(user = user_id, rule = rule.name, error = %e, "handler failed");
            APOLOGY.to_string()
        }
    };

    finalize_reply(
        sessions,
        &conversation_key,
        history,
        message,
        reply,
        Duration::seconds(state.config.history_ttl_secs as i64),
    )
}
