//! Dialogue policy: an ordered rule table picks exactly one handler per turn.
//!
//! Rules are evaluated by descending priority, ties in declaration order. The
//! first rule whose condition holds wins; [`FALLBACK`] matches everything
//! else.

mod handlers;

pub use handlers::APOLOGY;

use std::sync::LazyLock;

use chrono::{Duration, NaiveDateTime};

use crate::models::{BookingContext, ConversationMessage, Intent, NluResult};
use crate::services::booking::{wants_additional_booking, LastContext};
use crate::services::nlu::Slots;
use crate::services::session::{self, SessionStore};
use crate::state::AppState;

pub const SPA_LIST_TTL_SECS: i64 = 1800;
pub const SPA_FOCUS_TTL_SECS: i64 = 1800;
pub const LAST_CONTEXT_TTL_SECS: i64 = 900;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Greeting,
    BookingConfirm,
    Booking,
    SuggestRelax,
    ServiceDetail,
    ListServices,
    SpaIntro,
    ListSpas,
    AppointmentLookup,
    AppointmentListAll,
    SkincareQa,
    OpenReply,
}

/// What a rule may look at besides the classification.
pub struct RouteEnv<'a> {
    pub booking: &'a BookingContext,
    /// The message picked an entry from the last presented spa list.
    pub list_pick: bool,
}

pub struct Rule {
    pub name: &'static str,
    pub priority: u8,
    pub handler: HandlerKind,
    condition: fn(&NluResult, &RouteEnv<'_>) -> bool,
}

impl Rule {
    pub fn matches(&self, nlu: &NluResult, env: &RouteEnv<'_>) -> bool {
        (self.condition)(nlu, env)
    }
}

pub static RULES: [Rule; 11] = [
    Rule {
        name: "greeting",
        priority: 110,
        handler: HandlerKind::Greeting,
        condition: |nlu, _| nlu.intent == Intent::Greeting,
    },
    Rule {
        name: "booking_confirm",
        priority: 100,
        handler: HandlerKind::BookingConfirm,
        condition: |nlu, _| nlu.intent == Intent::Booking && nlu.is_confirm,
    },
    Rule {
        name: "booking",
        priority: 95,
        handler: HandlerKind::Booking,
        condition: continues_booking,
    },
    Rule {
        name: "suggest_relax",
        priority: 90,
        handler: HandlerKind::SuggestRelax,
        condition: |nlu, _| nlu.intent == Intent::SuggestRelax,
    },
    Rule {
        name: "service_detail",
        priority: 80,
        handler: HandlerKind::ServiceDetail,
        condition: |nlu, _| nlu.intent == Intent::ServiceDetail,
    },
    Rule {
        name: "list_services",
        priority: 70,
        handler: HandlerKind::ListServices,
        condition: |nlu, _| nlu.intent == Intent::ListServices,
    },
    Rule {
        name: "spa_intro",
        priority: 60,
        handler: HandlerKind::SpaIntro,
        condition: |nlu, env| nlu.intent == Intent::SpaIntro || (nlu.intent == Intent::Fallback && env.list_pick),
    },
    Rule {
        name: "list_spas",
        priority: 50,
        handler: HandlerKind::ListSpas,
        condition: |nlu, _| nlu.intent == Intent::ListSpas,
    },
    Rule {
        name: "appointment_lookup",
        priority: 40,
        handler: HandlerKind::AppointmentLookup,
        condition: |nlu, _| nlu.intent == Intent::AppointmentLookup,
    },
    Rule {
        name: "appointment_list_all",
        priority: 30,
        handler: HandlerKind::AppointmentListAll,
        condition: |nlu, _| nlu.intent == Intent::AppointmentListAll,
    },
    Rule {
        name: "skincare_qa",
        priority: 20,
        handler: HandlerKind::SkincareQa,
        condition: |nlu, _| nlu.intent == Intent::SkincareQa,
    },
];

pub static FALLBACK: Rule = Rule {
    name: "fallback",
    priority: 0,
    handler: HandlerKind::OpenReply,
    condition: |_, _| true,
};

static ORDERED: LazyLock<Vec<&'static Rule>> = LazyLock::new(|| {
    let mut rules: Vec<&'static Rule> = RULES.iter().collect();
    rules.sort_by_key(|r| std::cmp::Reverse(r.priority));
    rules
});

/// A booking in progress keeps the turn when the classifier had nothing
/// better, or when the user answers an open spa/service choice.
fn continues_booking(nlu: &NluResult, env: &RouteEnv<'_>) -> bool {
    nlu.intent == Intent::Booking
        || (env.booking.is_active() && nlu.intent == Intent::Fallback)
        || (env.booking.awaiting_choice()
            && matches!(
                nlu.intent,
                Intent::ServiceDetail | Intent::SpaIntro | Intent::ListServices
            ))
}

pub fn route(nlu: &NluResult, env: &RouteEnv<'_>) -> &'static Rule {
    ORDERED
        .iter()
        .copied()
        .find(|rule| rule.matches(nlu, env))
        .unwrap_or(&FALLBACK)
}

/// Leaving the booking flow for a spa search or a skincare question, or
/// asking to book something else, drops the context in progress.
pub fn is_topic_switch(nlu: &NluResult, message: &str, booking: &BookingContext) -> bool {
    wants_additional_booking(message)
        || (booking.is_active() && matches!(nlu.intent, Intent::ListSpas | Intent::SkincareQa))
}

/// Everything a handler needs for one turn. `booking` is the user's context
/// as loaded; handlers that change it persist it themselves.
pub struct Turn<'a> {
    pub state: &'a AppState,
    pub user_id: &'a str,
    pub conversation_key: &'a str,
    pub message: &'a str,
    pub nlu: &'a NluResult,
    pub slots: &'a Slots,
    pub history: &'a [ConversationMessage],
    pub booking: BookingContext,
    pub last_spa_focus: Option<String>,
    pub last_context: Option<LastContext>,
    pub list_pick: Option<String>,
    pub now: NaiveDateTime,
}

impl Turn<'_> {
    fn sessions(&self) -> &dyn SessionStore {
        self.state.sessions.as_ref()
    }

    fn remember_spa_list(&self, names: &[String]) -> anyhow::Result<()> {
        session::set_json(
            self.sessions(),
            &session::last_spa_list_key(self.conversation_key),
            &names,
            Duration::seconds(SPA_LIST_TTL_SECS),
        )
    }

    fn remember_focus(&self, spa: &str) -> anyhow::Result<()> {
        session::set_json(
            self.sessions(),
            &session::last_spa_focus_key(self.conversation_key),
            &spa,
            Duration::seconds(SPA_FOCUS_TTL_SECS),
        )
    }

    fn remember_context(&self, context: &LastContext) -> anyhow::Result<()> {
        session::set_json(
            self.sessions(),
            &session::last_context_key(self.conversation_key),
            context,
            Duration::seconds(LAST_CONTEXT_TTL_SECS),
        )
    }

    fn save_booking(&self) -> anyhow::Result<()> {
        session::set_json(
            self.sessions(),
            &session::booking_key(self.user_id),
            &self.booking,
            Duration::seconds(self.state.config.booking_ttl_secs as i64),
        )
    }

    fn clear_booking(&mut self) -> anyhow::Result<()> {
        self.booking = BookingContext::default();
        self.sessions().delete(&session::booking_key(self.user_id))
    }
}

pub async fn dispatch(handler: HandlerKind, turn: &mut Turn<'_>) -> anyhow::Result<String> {
    match handler {
        HandlerKind::Greeting => Ok(handlers::greeting()),
        HandlerKind::BookingConfirm | HandlerKind::Booking => handlers::booking(turn),
        HandlerKind::SuggestRelax => handlers::suggest_relax(turn),
        HandlerKind::ServiceDetail => handlers::service_detail(turn),
        HandlerKind::ListServices => handlers::list_services(turn),
        HandlerKind::SpaIntro => handlers::spa_intro(turn),
        HandlerKind::ListSpas => handlers::list_spas(turn),
        HandlerKind::AppointmentLookup => handlers::appointment_lookup(turn),
        HandlerKind::AppointmentListAll => handlers::appointment_list_all(turn),
        HandlerKind::SkincareQa | HandlerKind::OpenReply => Ok(handlers::open_reply(turn).await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(booking: &BookingContext) -> RouteEnv<'_> {
        RouteEnv {
            booking,
            list_pick: false,
        }
    }

    fn nlu(intent: Intent) -> NluResult {
        NluResult::new(intent, 0.9)
    }

    #[test]
    fn test_rules_declared_in_priority_order() {
        let priorities: Vec<u8> = RULES.iter().map(|r| r.priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(priorities, sorted);
        assert!(RULES.iter().all(|r| r.priority > FALLBACK.priority));
    }

    #[test]
    fn test_every_intent_routes_somewhere() {
        let idle = BookingContext::default();
        for intent in Intent::ALL {
            let rule = route(&nlu(intent), &env(&idle));
            assert!(!rule.name.is_empty());
        }
        assert_eq!(route(&nlu(Intent::Fallback), &env(&idle)).name, "fallback");
    }

    #[test]
    fn test_greeting_outranks_everything() {
        let mut n = nlu(Intent::Greeting);
        n.is_confirm = true;
        let active = BookingContext::started();
        assert_eq!(route(&n, &env(&active)).name, "greeting");
    }

    #[test]
    fn test_confirmed_booking_outranks_plain_booking() {
        let idle = BookingContext::default();
        let mut n = nlu(Intent::Booking);
        assert_eq!(route(&n, &env(&idle)).name, "booking");
        n.is_confirm = true;
        assert_eq!(route(&n, &env(&idle)).name, "booking_confirm");
    }

    #[test]
    fn test_active_booking_keeps_fallback_turns() {
        let idle = BookingContext::default();
        let active = BookingContext::started();
        assert_eq!(route(&nlu(Intent::Fallback), &env(&active)).name, "booking");
        assert_eq!(route(&nlu(Intent::Fallback), &env(&idle)).name, "fallback");
        // a committed non-booking intent still wins over an idle booking
        assert_eq!(route(&nlu(Intent::ListServices), &env(&active)).name, "list_services");
    }

    #[test]
    fn test_open_choice_captures_entity_answers() {
        let mut choosing = BookingContext::started();
        choosing.offer_spas(vec!["Lê Vy Spa".to_string(), "Spa Serenity".to_string()]);
        assert_eq!(route(&nlu(Intent::SpaIntro), &env(&choosing)).name, "booking");
        assert_eq!(route(&nlu(Intent::ServiceDetail), &env(&choosing)).name, "booking");
        assert_eq!(route(&nlu(Intent::ListSpas), &env(&choosing)).name, "list_spas");
    }

    #[test]
    fn test_list_pick_opens_spa_intro() {
        let idle = BookingContext::default();
        let picked = RouteEnv {
            booking: &idle,
            list_pick: true,
        };
        assert_eq!(route(&nlu(Intent::Fallback), &picked).name, "spa_intro");
    }

    #[test]
    fn test_routing_is_deterministic() {
        let active = BookingContext::started();
        let n = nlu(Intent::Fallback);
        let first = route(&n, &env(&active)).name;
        for _ in 0..10 {
            assert_eq!(route(&n, &env(&active)).name, first);
        }
    }

    #[test]
    fn test_topic_switch() {
        let active = BookingContext::started();
        let idle = BookingContext::default();
        assert!(is_topic_switch(&nlu(Intent::ListSpas), "spa ở Hà Nội", &active));
        assert!(is_topic_switch(&nlu(Intent::SkincareQa), "da dầu dùng gì", &active));
        assert!(!is_topic_switch(&nlu(Intent::ListSpas), "spa ở Hà Nội", &idle));
        assert!(is_topic_switch(&nlu(Intent::Booking), "đặt thêm lịch", &idle));
        assert!(!is_topic_switch(&nlu(Intent::Booking), "16:00", &active));
    }
}
