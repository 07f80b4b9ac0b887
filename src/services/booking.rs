//! Booking slot-filling.
//!
//! [`advance`] takes the stored [`BookingContext`] and one enriched turn,
//! applies everything the turn supplies, then reports the first thing still
//! missing as a [`BookingOutcome`]. It never touches storage; the caller
//! persists the context and, on [`BookingOutcome::Confirmed`], the
//! appointment.

use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::models::{Appointment, BookingContext, NluResult, SlotOption};
use crate::services::nlu::heuristics::is_affirmative;
use crate::services::nlu::normalize::{contains_phrase, normalize};
use crate::services::nlu::{EntityResolver, Slots};

const WINDOW_PREFERRED: [(u32, u32); 2] = [(14, 30), (16, 0)];
const LEAD_MINUTES: i64 = 30;
const SPACING_MINUTES: i64 = 90;

const GRID_DAYS: i64 = 3;
const GRID_HOURS: [u32; 4] = [9, 11, 14, 16];
pub const GRID_SHOWN: usize = 8;

const SPA_SUGGESTION_LIMIT: usize = 5;
const SPA_SUGGESTION_CUTOFF: f64 = 60.0;

const BACK_REFERENCES: &[&str] = &["dich vu nay", "dich vu do", "dich vu tren", "goi nay", "this service"];
const ADDITIONAL_BOOKING: &[&str] = &["dat them", "book them", "dat them lich", "them lich hen"];

/// The spa and service of the last service-detail reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LastContext {
    pub spa_name: Option<String>,
    pub service_name: Option<String>,
}

/// Everything one turn contributes to the booking.
pub struct BookingTurn<'a> {
    pub message: &'a str,
    pub nlu: &'a NluResult,
    pub slots: &'a Slots,
    pub last_spa_focus: Option<&'a str>,
    pub last_context: Option<&'a LastContext>,
    pub now: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BookingOutcome {
    /// Several services match; the user picks one.
    ChooseService { candidates: Vec<String> },
    /// The service is offered at several spas; the user picks one.
    ChooseSpa { service: String, candidates: Vec<String> },
    /// No spa named; closest catalog spas to what was typed.
    SuggestSpas(Vec<String>),
    AskSpa,
    /// The named spa does not offer the named service.
    ServiceNotOffered { spa: String, service: String, services: Vec<String> },
    /// Spa known, service not; the spa's services are offered.
    ChooseServiceAtSpa { spa: String, services: Vec<String> },
    ProposeSlots { slots: Vec<SlotOption>, from_window: bool },
    /// Slots were offered and the reply named none of them, or named a past time.
    AskTime { past: bool },
    Summary { spa: String, service: String, slot: SlotOption },
    Confirmed(Appointment),
}

/// "Book another one": the current context is discarded before this turn.
pub fn wants_additional_booking(message: &str) -> bool {
    let msg = normalize(message);
    ADDITIONAL_BOOKING.iter().any(|p| contains_phrase(&msg, p))
}

pub fn advance(ctx: &mut BookingContext, turn: &BookingTurn<'_>, resolver: &EntityResolver) -> BookingOutcome {
    ctx.activate();
    let mut consumed = false;

    // Answers to an open choice.
    if !ctx.service_candidates().is_empty() {
        if let Some(service) = resolver.pick_candidate(turn.message, ctx.service_candidates()) {
            ctx.set_service(&service);
            consumed = true;
        }
    }
    if !consumed && !ctx.spa_candidates().is_empty() {
        if let Some(spa) = resolver.pick_candidate(turn.message, ctx.spa_candidates()) {
            ctx.set_spa(&spa);
            consumed = true;
        }
    }

    if let Some(outcome) = apply_named_entities(ctx, turn, resolver, consumed) {
        return outcome;
    }
    // A time is only taken once spa and service are fixed; any later change
    // of either would drop it again.
    if let Some(outcome) = settle_entities(ctx, turn, resolver) {
        return outcome;
    }

    let (offered_now, past) = apply_time(ctx, turn, resolver, consumed);

    settle_time(ctx, turn, offered_now, past)
}

/// Spa and service named in this turn. Returns early only when the named spa
/// lacks the named service.
fn apply_named_entities(
    ctx: &mut BookingContext,
    turn: &BookingTurn<'_>,
    resolver: &EntityResolver,
    consumed: bool,
) -> Option<BookingOutcome> {
    let named_spa = turn.slots.spa_name.as_deref();
    let named_service = turn.slots.service_name.as_deref();

    if let Some(spa) = named_spa {
        ctx.set_spa(spa);
        if let Some(current) = ctx.service_name() {
            if !resolver.spa_offers(spa, current) {
                ctx.clear_service();
            }
        }
    }

    if let Some(service) = named_service {
        match ctx.spa_name() {
            Some(spa) if !resolver.spa_offers(spa, service) => {
                if named_spa.is_some() {
                    let spa = spa.to_string();
                    let services = service_names_of(resolver, &spa);
                    ctx.offer_services(services.clone());
                    return Some(BookingOutcome::ServiceNotOffered {
                        spa,
                        service: service.to_string(),
                        services,
                    });
                }
                // A service named after the spa was settled: the newer mention wins.
                ctx.clear_spa();
                ctx.set_service(service);
            }
            _ => ctx.set_service(service),
        }
    }

    if ctx.service_name().is_none() && !consumed {
        back_reference(ctx, turn);
    }

    if !consumed {
        let mut mentioned = resolver.find_services_in_text(turn.message);
        if let Some(spa) = ctx.spa_name() {
            mentioned.retain(|s| resolver.spa_offers(spa, s));
        }
        match mentioned.len() {
            0 => {}
            1 => {
                if ctx.service_name().is_none() {
                    ctx.set_service(&mentioned[0]);
                }
            }
            _ => ctx.offer_services(mentioned),
        }
    }
    None
}

/// "dịch vụ này" refers to the last service-detail reply, accepted when no
/// spa is set or it names the same spa.
fn back_reference(ctx: &mut BookingContext, turn: &BookingTurn<'_>) {
    let msg = normalize(turn.message);
    if !BACK_REFERENCES.iter().any(|p| contains_phrase(&msg, p)) {
        return;
    }
    let Some(last) = turn.last_context else { return };
    let Some(service) = last.service_name.as_deref() else { return };

    match (ctx.spa_name(), last.spa_name.as_deref()) {
        (None, Some(last_spa)) => {
            ctx.set_spa(last_spa);
            ctx.set_service(service);
        }
        (None, None) => ctx.set_service(service),
        (Some(current), Some(last_spa)) if current == last_spa => ctx.set_service(service),
        _ => tracing::debug!(service, "back-reference ignored, spa differs"),
    }
}

/// Returns `(slots offered this turn, a past time was given)`.
fn apply_time(
    ctx: &mut BookingContext,
    turn: &BookingTurn<'_>,
    resolver: &EntityResolver,
    consumed: bool,
) -> (bool, bool) {
    if !consumed && !ctx.available_slots().is_empty() {
        if let Some(slot) = pick_slot(ctx.available_slots(), turn, resolver) {
            ctx.set_slot(slot);
            return (false, false);
        }
    }

    if let Some((start, end)) = turn.nlu.time_range.as_ref().and_then(|r| r.bounds()) {
        if ctx.slot().is_some() {
            return (false, false);
        }
        let slots = propose_in_window(start, end, turn.now);
        if !slots.is_empty() {
            ctx.offer_slots(slots);
            return (true, false);
        }
        // Nothing left in the window; an explicit time may still be usable.
    }

    if consumed {
        return (false, false);
    }
    match turn.slots.datetime {
        Some(dt) if dt < turn.now => (false, true),
        Some(dt) => {
            ctx.set_slot(SlotOption::at(dt));
            (false, false)
        }
        None => (false, false),
    }
}

/// An offered slot named by position or by its clock time.
fn pick_slot(offered: &[SlotOption], turn: &BookingTurn<'_>, resolver: &EntityResolver) -> Option<SlotOption> {
    let labels: Vec<String> = offered.iter().map(|s| s.label.clone()).collect();
    if let Some(label) = resolver.pick_ordinal(turn.message, &labels) {
        return offered.iter().find(|s| s.label == label).cloned();
    }
    if let Some(dt) = turn.slots.datetime {
        if let Some(exact) = offered.iter().find(|s| s.datetime() == Some(dt)) {
            return Some(exact.clone());
        }
    }
    let msg = normalize(turn.message);
    offered
        .iter()
        .find(|s| s.hhmm().is_some_and(|hhmm| contains_phrase(&msg, &hhmm)))
        .cloned()
}

/// The open question about spa or service, if any. `None` means both are set.
fn settle_entities(
    ctx: &mut BookingContext,
    turn: &BookingTurn<'_>,
    resolver: &EntityResolver,
) -> Option<BookingOutcome> {
    if !ctx.service_candidates().is_empty() {
        return Some(BookingOutcome::ChooseService {
            candidates: ctx.service_candidates().to_vec(),
        });
    }
    if !ctx.spa_candidates().is_empty() {
        if let Some(service) = ctx.service_name() {
            return Some(BookingOutcome::ChooseSpa {
                service: service.to_string(),
                candidates: ctx.spa_candidates().to_vec(),
            });
        }
        return Some(BookingOutcome::SuggestSpas(ctx.spa_candidates().to_vec()));
    }

    if ctx.spa_name().is_none() {
        if let Some(outcome) = settle_spa(ctx, turn, resolver) {
            return Some(outcome);
        }
    }
    let Some(spa) = ctx.spa_name().map(str::to_string) else {
        return Some(BookingOutcome::AskSpa);
    };

    if ctx.service_name().is_none() {
        let services = service_names_of(resolver, &spa);
        ctx.offer_services(services.clone());
        return Some(BookingOutcome::ChooseServiceAtSpa { spa, services });
    }
    None
}

fn settle_time(ctx: &mut BookingContext, turn: &BookingTurn<'_>, offered_now: bool, past: bool) -> BookingOutcome {
    let (Some(spa), Some(service)) = (
        ctx.spa_name().map(str::to_string),
        ctx.service_name().map(str::to_string),
    ) else {
        return BookingOutcome::AskSpa;
    };

    let Some(slot) = ctx.slot().cloned() else {
        if offered_now {
            return BookingOutcome::ProposeSlots {
                slots: ctx.available_slots().to_vec(),
                from_window: true,
            };
        }
        if past || !ctx.available_slots().is_empty() {
            return BookingOutcome::AskTime { past };
        }
        let grid = default_grid(turn.now);
        ctx.offer_slots(grid.clone());
        return BookingOutcome::ProposeSlots {
            slots: grid,
            from_window: false,
        };
    };

    if turn.nlu.is_confirm || is_affirmative(turn.message) {
        if ctx.confirm() {
            return BookingOutcome::Confirmed(Appointment::new(&spa, &service, &slot, turn.now));
        }
    }
    BookingOutcome::Summary { spa, service, slot }
}

/// Fills the spa from what is already known, or returns the question to ask.
fn settle_spa(ctx: &mut BookingContext, turn: &BookingTurn<'_>, resolver: &EntityResolver) -> Option<BookingOutcome> {
    let focus = turn
        .last_spa_focus
        .filter(|spa| ctx.service_name().map_or(true, |svc| resolver.spa_offers(spa, svc)));

    match ctx.service_name().map(str::to_string) {
        Some(service) => {
            let offering = resolver.spas_offering(&service);
            if let Some(spa) = focus {
                ctx.set_spa(spa);
                return None;
            }
            match offering.len() {
                0 => Some(BookingOutcome::AskSpa),
                1 => {
                    ctx.set_spa(&offering[0]);
                    None
                }
                _ => {
                    ctx.offer_spas(offering.clone());
                    Some(BookingOutcome::ChooseSpa {
                        service,
                        candidates: offering,
                    })
                }
            }
        }
        None => {
            if let Some(spa) = focus {
                ctx.set_spa(spa);
                return None;
            }
            let suggestions = resolver.suggest_spas(turn.message, SPA_SUGGESTION_LIMIT, SPA_SUGGESTION_CUTOFF);
            if suggestions.is_empty() {
                return Some(BookingOutcome::AskSpa);
            }
            ctx.offer_spas(suggestions.clone());
            Some(BookingOutcome::SuggestSpas(suggestions))
        }
    }
}

fn service_names_of(resolver: &EntityResolver, spa: &str) -> Vec<String> {
    resolver
        .catalog()
        .services_of(spa)
        .iter()
        .map(|s| s.name.clone())
        .collect()
}

/// Two slots inside `[start, end]`: 14:30 and 16:00 when they are still
/// ahead, otherwise two slots 90 minutes apart from the first quarter hour at
/// least 30 minutes out.
pub fn propose_in_window(start: NaiveDateTime, end: NaiveDateTime, now: NaiveDateTime) -> Vec<SlotOption> {
    let preferred: Vec<NaiveDateTime> = WINDOW_PREFERRED
        .iter()
        .filter_map(|&(h, m)| NaiveTime::from_hms_opt(h, m, 0))
        .map(|t| start.date().and_time(t))
        .filter(|dt| *dt >= start && *dt <= end && *dt > now)
        .collect();
    if !preferred.is_empty() {
        return preferred.into_iter().map(SlotOption::at).collect();
    }

    let first = round_up_to_quarter(start.max(now + Duration::minutes(LEAD_MINUTES)));
    let second = first + Duration::minutes(SPACING_MINUTES);
    if first > end {
        return Vec::new();
    }
    let mut slots = vec![SlotOption::at(first)];
    if second <= end {
        slots.push(SlotOption::at(second));
    }
    slots
}

/// The next three days at the standard hours, at most [`GRID_SHOWN`].
pub fn default_grid(now: NaiveDateTime) -> Vec<SlotOption> {
    (1..=GRID_DAYS)
        .map(|d| now.date() + Duration::days(d))
        .flat_map(|day| GRID_HOURS.iter().filter_map(move |&h| day.and_hms_opt(h, 0, 0)))
        .take(GRID_SHOWN)
        .map(SlotOption::at)
        .collect()
}

fn round_up_to_quarter(dt: NaiveDateTime) -> NaiveDateTime {
    let dt = dt.with_second(0).and_then(|d| d.with_nanosecond(0)).unwrap_or(dt);
    let rem = dt.minute() % 15;
    if rem == 0 {
        dt
    } else {
        dt + Duration::minutes((15 - rem) as i64)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use super::*;
    use crate::models::{BookingStage, Catalog, Intent};
    use crate::services::nlu::classifier::post_process;
    use crate::services::nlu::heuristics::classify_keywords;
    use crate::services::nlu::similarity::TokenSetSimilarity;
    use crate::services::nlu::{enrich, AliasIndex};

    fn resolver() -> EntityResolver {
        let catalog = Arc::new(Catalog::embedded().unwrap());
        let aliases = AliasIndex::build(&catalog);
        EntityResolver::new(catalog, aliases, Box::new(TokenSetSimilarity))
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    /// Runs one message through keyword classification and enrichment.
    fn step(ctx: &mut BookingContext, r: &EntityResolver, message: &str, now: NaiveDateTime) -> BookingOutcome {
        step_with(ctx, r, message, now, None, None)
    }

    fn step_with(
        ctx: &mut BookingContext,
        r: &EntityResolver,
        message: &str,
        now: NaiveDateTime,
        focus: Option<&str>,
        last: Option<&LastContext>,
    ) -> BookingOutcome {
        let nlu = post_process(classify_keywords(message), message, now);
        let slots = enrich(&nlu, message, r, now);
        let turn = BookingTurn {
            message,
            nlu: &nlu,
            slots: &slots,
            last_spa_focus: focus,
            last_context: last,
            now,
        };
        let outcome = advance(ctx, &turn, r);
        if ctx.is_confirmed() {
            assert!(ctx.spa_name().is_some() && ctx.service_name().is_some() && ctx.slot().is_some());
        }
        outcome
    }

    #[test]
    fn test_window_booking_then_pick_then_confirm() {
        let r = resolver();
        let now = at(10, 0);
        let mut ctx = BookingContext::default();

        let outcome = step(&mut ctx, &r, "đặt massage đá nóng chiều nay", now);
        let BookingOutcome::ProposeSlots { slots, from_window } = outcome else {
            panic!("expected proposals, got {outcome:?}");
        };
        assert!(from_window);
        let times: Vec<_> = slots.iter().filter_map(|s| s.hhmm()).collect();
        assert_eq!(times, vec!["14:30", "16:00"]);
        assert_eq!(ctx.service_name(), Some("Massage đá nóng"));
        assert_eq!(ctx.spa_name(), Some("Nấm Spa"));

        let outcome = step(&mut ctx, &r, "16:00", now);
        assert!(matches!(outcome, BookingOutcome::Summary { .. }), "{outcome:?}");
        assert_eq!(ctx.slot().and_then(|s| s.hhmm()).as_deref(), Some("16:00"));
        assert_eq!(ctx.stage(), BookingStage::AwaitingConfirmation);

        let BookingOutcome::Confirmed(appt) = step(&mut ctx, &r, "đặt luôn", now) else {
            panic!("expected confirmation");
        };
        assert_eq!(appt.spa_name, "Nấm Spa");
        assert_eq!(appt.slot_label, "01/01/2024 16:00");
    }

    #[test]
    fn test_pick_slot_by_ordinal() {
        let r = resolver();
        let now = at(10, 0);
        let mut ctx = BookingContext::default();
        step(&mut ctx, &r, "đặt massage đá nóng chiều nay", now);
        step(&mut ctx, &r, "1", now);
        assert_eq!(ctx.slot().and_then(|s| s.hhmm()).as_deref(), Some("14:30"));
    }

    #[test]
    fn test_unrecognized_reply_asks_for_time() {
        let r = resolver();
        let now = at(10, 0);
        let mut ctx = BookingContext::default();
        step(&mut ctx, &r, "đặt massage đá nóng chiều nay", now);
        let outcome = step(&mut ctx, &r, "hmm", now);
        assert_eq!(outcome, BookingOutcome::AskTime { past: false });
        assert!(ctx.slot().is_none());
    }

    #[test]
    fn test_non_affirmative_reply_repeats_summary() {
        let r = resolver();
        let now = at(10, 0);
        let mut ctx = BookingContext::default();
        step(&mut ctx, &r, "đặt Massage Thái ở Nấm Spa 16:00", now);
        assert_eq!(ctx.stage(), BookingStage::AwaitingConfirmation);
        let outcome = step(&mut ctx, &r, "không, để mình nghĩ", now);
        assert!(matches!(outcome, BookingOutcome::Summary { .. }));
        assert!(!ctx.is_confirmed());
        let outcome = step(&mut ctx, &r, "ok", now);
        assert!(matches!(outcome, BookingOutcome::Confirmed(_)));
    }

    #[test]
    fn test_changing_spa_invalidates_slot() {
        let r = resolver();
        let now = at(10, 0);
        let mut ctx = BookingContext::default();
        step(&mut ctx, &r, "đặt chăm sóc da mụn ở Lê Vy Spa 16:00", now);
        assert!(ctx.slot().is_some());

        step(&mut ctx, &r, "thôi đổi sang Spa Serenity", now);
        assert_eq!(ctx.spa_name(), Some("Spa Serenity"));
        assert_eq!(ctx.service_name(), Some("Chăm sóc da mụn"));
        assert!(ctx.slot().is_none());
    }

    #[test]
    fn test_new_spa_without_service_drops_service() {
        let r = resolver();
        let now = at(10, 0);
        let mut ctx = BookingContext::default();
        step(&mut ctx, &r, "đặt massage thái ở Nấm Spa", now);
        let outcome = step(&mut ctx, &r, "à thôi, Lê Vy Spa", now);
        assert_eq!(ctx.spa_name(), Some("Lê Vy Spa"));
        assert!(ctx.service_name().is_none());
        assert!(matches!(outcome, BookingOutcome::ChooseServiceAtSpa { .. }));
    }

    #[test]
    fn test_shared_service_asks_which_spa() {
        let r = resolver();
        let now = at(10, 0);
        let mut ctx = BookingContext::default();
        let outcome = step(&mut ctx, &r, "đặt chăm sóc da mụn", now);
        let BookingOutcome::ChooseSpa { candidates, .. } = outcome else {
            panic!("expected spa choice, got {outcome:?}");
        };
        assert_eq!(candidates, vec!["Lê Vy Spa", "Spa Serenity"]);

        step(&mut ctx, &r, "2", now);
        assert_eq!(ctx.spa_name(), Some("Spa Serenity"));
        assert!(ctx.spa_candidates().is_empty());
    }

    #[test]
    fn test_generic_service_offers_candidates() {
        let r = resolver();
        let now = at(10, 0);
        let mut ctx = BookingContext::default();
        step(&mut ctx, &r, "Nấm Spa", now);
        let outcome = step(&mut ctx, &r, "đặt lịch massage", now);
        let BookingOutcome::ChooseService { candidates } = outcome else {
            panic!("expected service choice, got {outcome:?}");
        };
        assert_eq!(candidates.len(), 3);
        step(&mut ctx, &r, "massage thái", now);
        assert_eq!(ctx.service_name(), Some("Massage Thái"));
    }

    #[test]
    fn test_service_not_offered_at_named_spa() {
        let r = resolver();
        let mut ctx = BookingContext::default();
        let outcome = step(&mut ctx, &r, "đặt massage thái ở Lê Vy Spa", at(10, 0));
        assert!(matches!(outcome, BookingOutcome::ServiceNotOffered { .. }), "{outcome:?}");
        assert!(ctx.service_name().is_none());
    }

    #[test]
    fn test_back_reference_same_spa_only() {
        let r = resolver();
        let now = at(10, 0);
        let last = LastContext {
            spa_name: Some("Nấm Spa".to_string()),
            service_name: Some("Massage Thái".to_string()),
        };

        let mut ctx = BookingContext::default();
        step_with(&mut ctx, &r, "đặt dịch vụ này", now, None, Some(&last));
        assert_eq!(ctx.spa_name(), Some("Nấm Spa"));
        assert_eq!(ctx.service_name(), Some("Massage Thái"));

        let mut other = BookingContext::default();
        step(&mut other, &r, "Lê Vy Spa", now);
        step_with(&mut other, &r, "đặt dịch vụ này", now, None, Some(&last));
        assert!(other.service_name().is_none());
    }

    #[test]
    fn test_focus_spa_used_when_none_named() {
        let r = resolver();
        let mut ctx = BookingContext::default();
        step_with(&mut ctx, &r, "đặt lịch", at(10, 0), Some("ACNE STUDIO"), None);
        assert_eq!(ctx.spa_name(), Some("ACNE STUDIO"));
    }

    #[test]
    fn test_default_grid_when_no_time() {
        let r = resolver();
        let mut ctx = BookingContext::default();
        let outcome = step(&mut ctx, &r, "đặt Massage Thái ở Nấm Spa", at(10, 0));
        let BookingOutcome::ProposeSlots { slots, from_window } = outcome else {
            panic!("expected grid, got {outcome:?}");
        };
        assert!(!from_window);
        assert_eq!(slots.len(), GRID_SHOWN);
        assert_eq!(slots[0].label, "02/01/2024 09:00");
    }

    #[test]
    fn test_past_time_is_refused() {
        let r = resolver();
        let mut ctx = BookingContext::default();
        let outcome = step(&mut ctx, &r, "đặt Massage Thái ở Nấm Spa 01/01/2024 08:00", at(10, 0));
        assert_eq!(outcome, BookingOutcome::AskTime { past: true });
        assert!(ctx.slot().is_none());
    }

    #[test]
    fn test_window_late_in_afternoon_uses_spacing() {
        let slots = propose_in_window(at(13, 0), at(18, 0), at(16, 10));
        let times: Vec<_> = slots.iter().filter_map(|s| s.hhmm()).collect();
        assert_eq!(times, vec!["16:45"]);

        let slots = propose_in_window(at(8, 0), at(11, 30), at(7, 0));
        let times: Vec<_> = slots.iter().filter_map(|s| s.hhmm()).collect();
        assert_eq!(times, vec!["08:00", "09:30"]);
    }

    #[test]
    fn test_time_given_before_spa_is_asked_again() {
        let r = resolver();
        let now = at(10, 0);
        let mut ctx = BookingContext::default();
        let outcome = step(&mut ctx, &r, "đặt chăm sóc da mụn 16:00", now);
        assert!(matches!(outcome, BookingOutcome::ChooseSpa { .. }), "{outcome:?}");
        assert!(ctx.slot().is_none());

        let outcome = step(&mut ctx, &r, "Spa Serenity", now);
        assert_eq!(ctx.spa_name(), Some("Spa Serenity"));
        assert!(ctx.slot().is_none());
        assert!(matches!(outcome, BookingOutcome::ProposeSlots { from_window: false, .. }), "{outcome:?}");
    }

    #[test]
    fn test_full_window_falls_back_to_explicit_time() {
        let r = resolver();
        let now = at(17, 40);
        let mut ctx = BookingContext::default();
        step(&mut ctx, &r, "đặt Massage Thái ở Nấm Spa", now);

        let message = "kín rồi thì 02/01/2024 10:00";
        let mut nlu = post_process(classify_keywords(message), message, now);
        nlu.time_range = Some(crate::models::TimeRange::new(at(13, 0), at(18, 0), "chiều nay"));
        let slots = enrich(&nlu, message, &r, now);
        let turn = BookingTurn {
            message,
            nlu: &nlu,
            slots: &slots,
            last_spa_focus: None,
            last_context: None,
            now,
        };
        assert!(propose_in_window(at(13, 0), at(18, 0), now).is_empty());
        ctx.offer_slots(Vec::new());
        let outcome = advance(&mut ctx, &turn, &r);
        assert!(matches!(outcome, BookingOutcome::Summary { .. }), "{outcome:?}");
        assert_eq!(ctx.slot().map(|s| s.label.as_str()), Some("02/01/2024 10:00"));
    }

    #[test]
    fn test_additional_booking_phrase() {
        assert!(wants_additional_booking("đặt thêm lịch nữa"));
        assert!(!wants_additional_booking("đặt lịch"));
    }

    #[test]
    fn test_booking_intent_keeps_context_across_fallback_turns() {
        let r = resolver();
        let mut ctx = BookingContext::default();
        step(&mut ctx, &r, "đặt Massage Thái ở Nấm Spa", at(10, 0));
        assert_eq!(classify_keywords("2").intent, Intent::Fallback);
        step(&mut ctx, &r, "2", at(10, 0));
        assert_eq!(ctx.slot().map(|s| s.label.as_str()), Some("02/01/2024 11:00"));
    }
}
