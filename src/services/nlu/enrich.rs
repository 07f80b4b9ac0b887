use chrono::NaiveDateTime;

use super::entities::EntityResolver;
use super::normalize::normalize;
use super::timeparse;
use crate::models::NluResult;

/// Canonical slot values for one message. `spa_name` and `service_name` are
/// catalog names or `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Slots {
    pub city: Option<String>,
    pub spa_name: Option<String>,
    pub service_name: Option<String>,
    pub datetime: Option<NaiveDateTime>,
}

/// Resolves the classifier's raw slot strings. A slot the classifier left
/// empty is looked for in the whole message instead.
pub fn enrich(nlu: &NluResult, message: &str, resolver: &EntityResolver, now: NaiveDateTime) -> Slots {
    let city = nlu
        .city_raw
        .as_deref()
        .and_then(|raw| resolver.map_city(raw))
        .or_else(|| resolver.map_city(message));

    let spa = nlu
        .spa_name_raw
        .as_deref()
        .and_then(|raw| resolver.resolve_spa(raw))
        .or_else(|| resolver.resolve_spa(message));

    let service_name = nlu
        .service_name_raw
        .as_deref()
        .and_then(|raw| resolver.map_service(raw, None))
        .or_else(|| resolver.map_service(message, None));

    // Entity mentions must not be read as time words ("Hoa Mai" is not "mai").
    let mut masks: Vec<String> = Vec::new();
    if let Some(found) = &spa {
        masks.push(found.matched.clone());
        masks.push(normalize(&found.name));
    }
    if let Some(service) = &service_name {
        masks.push(normalize(service));
    }
    let mask_refs: Vec<&str> = masks.iter().map(String::as_str).collect();

    let time_text = nlu.datetime_raw.as_deref().unwrap_or(message);
    let datetime = timeparse::parse_masked(time_text, now, &mask_refs);

    let slots = Slots {
        city,
        spa_name: spa.map(|m| m.name),
        service_name,
        datetime,
    };
    tracing::debug!(
        city = ?slots.city,
        spa = ?slots.spa_name,
        service = ?slots.service_name,
        datetime = ?slots.datetime,
        "slots enriched"
    );
    slots
}
