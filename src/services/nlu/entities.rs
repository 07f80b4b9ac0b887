//! Maps raw mentions to canonical catalog names: spas, services and cities.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, LazyLock};

use chrono::Duration;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::normalize::{contains_phrase, normalize, tokens};
use super::similarity::StringSimilarity;
use crate::models::Catalog;
use crate::services::session::{self, SessionStore};

/// Tokens that carry no identity in a spa name.
const NAME_STOPWORDS: &[&str] = &["spa", "tham", "my", "vien", "tmv"];

/// Words that collide with date/time vocabulary once diacritics are gone
/// ("Nấm" vs "năm", "Mai" vs "mai"). Never used as single-word aliases.
const TIME_WORDS: &[&str] = &[
    "mai", "nay", "nam", "toi", "sang", "trua", "chieu", "dem", "khuya", "mot", "kia", "thu", "tuan",
    "gio", "hom", "ngay",
];

/// Conversational filler stripped from a message before fuzzy comparison.
const FILLER: &[&str] = &[
    "dat", "lich", "hen", "cho", "minh", "toi", "em", "anh", "chi", "ban", "muon", "giup", "luon", "book",
    "voi", "o", "tai", "di", "nhe", "nha", "a", "la", "co", "khong", "gi", "nao", "xem", "vao", "luc",
    "can", "hoi", "ve", "the", "thi", "duoc", "oi", "va", "cua", "dich", "vu", "lam", "nhu",
];

const ALIAS_CACHE_TTL_DAYS: i64 = 7;

static ORDINAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:so|#|chon|lua chon|cai|option|number|no\.?)?\s*#?(\d{1,2})\.?$").unwrap()
});

const ORDINAL_WORDS: &[(&str, usize)] = &[
    ("dau tien", 1),
    ("thu nhat", 1),
    ("first", 1),
    ("thu hai", 2),
    ("second", 2),
    ("thu ba", 3),
    ("third", 3),
];

/// Normalized alias → canonical spa name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AliasIndex {
    aliases: BTreeMap<String, String>,
}

impl AliasIndex {
    pub fn build(catalog: &Catalog) -> Self {
        let mut aliases: BTreeMap<String, String> = BTreeMap::new();
        let mut ambiguous: BTreeSet<String> = BTreeSet::new();

        // Full names first: they always map to themselves.
        for spa in &catalog.spas {
            aliases.insert(normalize(&spa.name), spa.name.clone());
        }

        for spa in &catalog.spas {
            for alias in short_aliases(&spa.name) {
                match aliases.get(&alias) {
                    Some(owner) if owner != &spa.name => {
                        ambiguous.insert(alias);
                    }
                    Some(_) => {}
                    None => {
                        aliases.insert(alias, spa.name.clone());
                    }
                }
            }
        }

        for alias in ambiguous {
            let is_full_name = catalog.spas.iter().any(|s| normalize(&s.name) == alias);
            if !is_full_name {
                aliases.remove(&alias);
            }
        }

        Self { aliases }
    }

    /// Loads the index cached for this catalog version, building and caching
    /// it on a miss. Store failures only cost a rebuild.
    pub fn cached(catalog: &Catalog, store: &dyn SessionStore) -> Self {
        let key = format!("nlu:spa_alias_index:{}", catalog.fingerprint());
        match session::get_json::<AliasIndex>(store, &key) {
            Ok(Some(index)) if !index.aliases.is_empty() => {
                tracing::debug!(key = %key, aliases = index.len(), "alias index loaded from cache");
                return index;
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "alias index cache read failed"),
        }

        let index = Self::build(catalog);
        if let Err(e) = session::set_json(store, &key, &index, Duration::days(ALIAS_CACHE_TTL_DAYS)) {
            tracing::warn!(error = %e, "alias index cache write failed");
        }
        tracing::info!(aliases = index.len(), "alias index built");
        index
    }

    /// Every alias occurring as a whole phrase in `normalized`.
    pub fn mentions(&self, normalized: &str) -> Vec<String> {
        self.aliases
            .keys()
            .filter(|alias| contains_phrase(normalized, alias))
            .cloned()
            .collect()
    }

    pub fn get(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Longest alias occurring in `normalized` as a whole phrase.
    fn longest_match(&self, normalized: &str) -> Option<SpaMatch> {
        self.aliases
            .iter()
            .filter(|(alias, _)| contains_phrase(normalized, alias))
            .max_by_key(|(alias, _)| alias.len())
            .map(|(alias, name)| SpaMatch {
                name: name.clone(),
                matched: alias.clone(),
            })
    }
}

fn short_aliases(name: &str) -> Vec<String> {
    let norm = normalize(name);
    let words: Vec<&str> = tokens(&norm).collect();
    let mut out = Vec::new();

    if let Some(stripped) = norm.strip_suffix(" spa") {
        let stripped = stripped.trim();
        if !stripped.is_empty() && !TIME_WORDS.contains(&stripped) {
            out.push(stripped.to_string());
        }
    }

    let significant: Vec<&str> = words
        .iter()
        .copied()
        .filter(|w| w.len() >= 3 && !NAME_STOPWORDS.contains(w))
        .collect();
    if let Some(last) = significant.last() {
        if !TIME_WORDS.contains(last) {
            out.push(last.to_string());
        }
    }
    if significant.len() >= 2 {
        out.push(significant.join(" "));
    }

    let acronym: String = words.iter().filter_map(|w| w.chars().next()).collect();
    if acronym.chars().count() >= 2 {
        out.push(acronym);
    }

    out.retain(|a| a != &norm);
    out
}

/// A resolved spa and the normalized text that identified it.
#[derive(Debug, Clone, PartialEq)]
pub struct SpaMatch {
    pub name: String,
    pub matched: String,
}

struct CityEntry {
    name: String,
    synonyms: Vec<String>,
}

fn city_synonyms(city: &str) -> &'static [&'static str] {
    match city {
        "ho chi minh" => &["tp hcm", "tphcm", "tp.hcm", "hcm", "sai gon", "saigon", "sg", "ho chi minh city"],
        "ha noi" => &["hanoi", "hn", "thu do"],
        _ => &[],
    }
}

/// Spa, service and city resolution over one catalog.
pub struct EntityResolver {
    catalog: Arc<Catalog>,
    aliases: AliasIndex,
    cities: Vec<CityEntry>,
    similarity: Box<dyn StringSimilarity>,
}

impl EntityResolver {
    pub fn new(catalog: Arc<Catalog>, aliases: AliasIndex, similarity: Box<dyn StringSimilarity>) -> Self {
        let mut cities: Vec<CityEntry> = Vec::new();
        for spa in &catalog.spas {
            let Some(city) = spa.city() else { continue };
            if cities.iter().any(|c| c.name == city) {
                continue;
            }
            let key = normalize(&city);
            let mut synonyms = vec![key.clone()];
            synonyms.extend(city_synonyms(&key).iter().map(|s| s.to_string()));
            cities.push(CityEntry { name: city, synonyms });
        }

        tracing::debug!(
            cities = cities.len(),
            aliases = aliases.len(),
            similarity = similarity.name(),
            "entity resolver ready"
        );

        Self {
            catalog,
            aliases,
            cities,
            similarity,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Canonical city (as written in catalog addresses, lowercased) named in
    /// `raw`. First match in catalog order wins.
    pub fn map_city(&self, raw: &str) -> Option<String> {
        let text = normalize(raw);
        if text.is_empty() {
            return None;
        }
        self.cities
            .iter()
            .find(|city| {
                city.synonyms.iter().any(|syn| {
                    if syn.chars().count() <= 3 {
                        contains_phrase(&text, syn)
                    } else {
                        text.contains(syn.as_str())
                    }
                })
            })
            .map(|city| city.name.clone())
    }

    pub fn spas_in_city(&self, city: &str) -> Vec<&str> {
        let city = city.to_lowercase();
        self.catalog
            .spas
            .iter()
            .filter(|s| s.city().as_deref() == Some(city.as_str()))
            .map(|s| s.name.as_str())
            .collect()
    }

    /// Spa names and aliases written in `raw`, normalized.
    pub fn spa_mentions(&self, raw: &str) -> Vec<String> {
        self.aliases.mentions(&normalize(raw))
    }

    pub fn map_spa(&self, raw: &str) -> Option<String> {
        self.resolve_spa(raw).map(|m| m.name)
    }

    pub fn resolve_spa(&self, raw: &str) -> Option<SpaMatch> {
        let text = normalize(raw);
        if text.is_empty() {
            return None;
        }

        if let Some(found) = self.aliases.longest_match(&text) {
            return Some(found);
        }

        if let Some(spa) = self.catalog.spas.iter().find(|s| text.contains(&normalize(&s.name))) {
            return Some(SpaMatch {
                name: spa.name.clone(),
                matched: normalize(&spa.name),
            });
        }

        let query = fuzzy_query(&text)?;
        let (name, score) = self
            .catalog
            .spas
            .iter()
            .map(|s| (s, self.similarity.score(&query, &normalize(&s.name))))
            .max_by(|a, b| a.1.total_cmp(&b.1))?;
        if score >= self.similarity.accept_threshold() {
            tracing::debug!(spa = %name.name, score, "fuzzy spa match");
            Some(SpaMatch {
                name: name.name.clone(),
                matched: query,
            })
        } else {
            None
        }
    }

    /// Up to `limit` spa names scoring at least `cutoff` (0–100), best first.
    pub fn suggest_spas(&self, raw: &str, limit: usize, cutoff: f64) -> Vec<String> {
        let Some(query) = fuzzy_query(&normalize(raw)) else {
            return Vec::new();
        };
        let mut scored: Vec<(f64, &str)> = self
            .catalog
            .spas
            .iter()
            .map(|s| (self.similarity.score(&query, &normalize(&s.name)), s.name.as_str()))
            .filter(|(score, _)| *score >= cutoff)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.into_iter().take(limit).map(|(_, n)| n.to_string()).collect()
    }

    /// Best service named in `raw`, restricted to one spa when given.
    /// A full-name substring beats token overlap.
    pub fn map_service(&self, raw: &str, spa: Option<&str>) -> Option<String> {
        let text = normalize(raw);
        if text.is_empty() {
            return None;
        }
        let names = self.service_names(spa);

        let exact = names
            .iter()
            .filter(|n| text.contains(&normalize(n)))
            .max_by_key(|n| n.len());
        if let Some(name) = exact {
            return Some(name.to_string());
        }

        best_overlap(&text, &names).into_iter().next()
    }

    /// Every distinct catalog service named in `raw`. Falls back to the best
    /// token overlap, then to up to three close fuzzy matches.
    pub fn find_services_in_text(&self, raw: &str) -> Vec<String> {
        let text = normalize(raw);
        if text.is_empty() {
            return Vec::new();
        }
        let names = self.service_names(None);

        let mut exact: Vec<String> = names
            .iter()
            .filter(|n| contains_phrase(&text, &normalize(n)))
            .map(|n| n.to_string())
            .collect();
        if !exact.is_empty() {
            // "Massage" inside "Massage đá nóng" is not a second mention.
            let all = exact.clone();
            exact.retain(|n| {
                let nn = normalize(n);
                !all.iter().any(|o| o != n && normalize(o).contains(&nn))
            });
            return exact;
        }

        let overlap = best_overlap(&text, &names);
        if !overlap.is_empty() {
            return overlap;
        }

        // A generic word ("massage") names every service carrying it.
        let generic: BTreeSet<&str> = tokens(&text)
            .filter(|t| t.len() >= 4 && !FILLER.contains(t) && !TIME_WORDS.contains(t) && !NAME_STOPWORDS.contains(t))
            .collect();
        let partial: Vec<String> = names
            .iter()
            .filter(|n| tokens(&normalize(n)).any(|t| generic.contains(t)))
            .map(|n| n.to_string())
            .collect();
        if !partial.is_empty() {
            return partial;
        }

        let Some(query) = fuzzy_query(&text) else {
            return Vec::new();
        };
        let mut scored: Vec<(f64, &str)> = names
            .iter()
            .map(|n| (strsim::normalized_levenshtein(&query, &normalize(n)), *n))
            .filter(|(score, _)| *score >= 0.6)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.into_iter().take(3).map(|(_, n)| n.to_string()).collect()
    }

    /// Catalog entry whose service name equals `name` (accent-insensitive).
    /// Returns `(spa, service)`; first in catalog order.
    pub fn find_exact_service_by_name(&self, name: &str) -> Option<(String, String)> {
        let wanted = normalize(name);
        self.catalog
            .offerings()
            .find(|(_, svc)| normalize(&svc.name) == wanted)
            .map(|(spa, svc)| (spa.name.clone(), svc.name.clone()))
    }

    pub fn spas_offering(&self, service: &str) -> Vec<String> {
        let wanted = normalize(service);
        self.catalog
            .offerings()
            .filter(|(_, svc)| normalize(&svc.name) == wanted)
            .map(|(spa, _)| spa.name.clone())
            .collect()
    }

    pub fn spa_offers(&self, spa: &str, service: &str) -> bool {
        let wanted = normalize(service);
        self.catalog
            .services_of(spa)
            .iter()
            .any(|svc| normalize(&svc.name) == wanted)
    }

    /// Candidate picked by position only ("2", "số 2", "thứ hai").
    pub fn pick_ordinal(&self, raw: &str, candidates: &[String]) -> Option<String> {
        let idx = ordinal(&normalize(raw))?;
        candidates.get(idx.checked_sub(1)?).cloned()
    }

    /// Resolves a reply against an offered list, by ordinal ("2", "số 2",
    /// "đầu tiên") or by name.
    pub fn pick_candidate(&self, raw: &str, candidates: &[String]) -> Option<String> {
        let text = normalize(raw);
        if text.is_empty() || candidates.is_empty() {
            return None;
        }

        if let Some(idx) = ordinal(&text) {
            return candidates.get(idx.checked_sub(1)?).cloned();
        }

        let named = candidates
            .iter()
            .filter(|c| contains_phrase(&text, &normalize(c)))
            .max_by_key(|c| c.len());
        if let Some(c) = named {
            return Some(c.clone());
        }

        let query = fuzzy_query(&text)?;
        let containing: Vec<&String> = candidates
            .iter()
            .filter(|c| contains_phrase(&normalize(c), &query))
            .collect();
        if containing.len() == 1 {
            return Some(containing[0].clone());
        }

        let names: Vec<&str> = candidates.iter().map(String::as_str).collect();
        let overlap = best_overlap(&text, &names);
        if overlap.len() == 1 {
            return overlap.into_iter().next();
        }

        // A tie at the top is still ambiguous.
        let mut scored: Vec<(f64, &String)> = candidates
            .iter()
            .map(|c| (self.similarity.score(&query, &normalize(c)), c))
            .filter(|(score, _)| *score >= self.similarity.accept_threshold())
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        match scored.as_slice() {
            [(best, c), (second, _), ..] if best > second => Some((*c).clone()),
            [(_, c)] => Some((*c).clone()),
            _ => None,
        }
    }

    fn service_names(&self, spa: Option<&str>) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.catalog
            .offerings()
            .filter(|(s, _)| spa.map_or(true, |want| s.name == want))
            .map(|(_, svc)| svc.name.as_str())
            .filter(|n| seen.insert(*n))
            .collect()
    }
}

/// Services sharing the most significant tokens (length ≥ 3) with the
/// message, when that count is at least two.
fn best_overlap(text: &str, names: &[&str]) -> Vec<String> {
    let words: BTreeSet<&str> = tokens(text).collect();
    let scored: Vec<(usize, &str)> = names
        .iter()
        .map(|n| {
            let norm = normalize(n);
            let score = tokens(&norm)
                .filter(|t| t.len() >= 3 && words.contains(t))
                .collect::<BTreeSet<_>>()
                .len();
            (score, *n)
        })
        .collect();
    let best = scored.iter().map(|(s, _)| *s).max().unwrap_or(0);
    if best < 2 {
        return Vec::new();
    }
    scored
        .into_iter()
        .filter(|(s, _)| *s == best)
        .map(|(_, n)| n.to_string())
        .collect()
}

/// The identifying part of a normalized message: filler, time words and
/// numbers removed. `None` when nothing is left.
fn fuzzy_query(normalized: &str) -> Option<String> {
    let kept: Vec<&str> = tokens(normalized)
        .filter(|t| !FILLER.contains(t) && !TIME_WORDS.contains(t) && !t.chars().all(|c| c.is_ascii_digit()))
        .collect();
    if kept.is_empty() || kept.iter().all(|t| NAME_STOPWORDS.contains(t)) {
        None
    } else {
        Some(kept.join(" "))
    }
}

fn ordinal(normalized: &str) -> Option<usize> {
    if let Some(caps) = ORDINAL.captures(normalized.trim()) {
        return caps.get(1)?.as_str().parse().ok();
    }
    ORDINAL_WORDS
        .iter()
        .find(|(word, _)| contains_phrase(normalized, word))
        .map(|(_, n)| *n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::nlu::similarity::{SequenceSimilarity, TokenSetSimilarity};

    fn resolver() -> EntityResolver {
        let catalog = Arc::new(Catalog::embedded().unwrap());
        let aliases = AliasIndex::build(&catalog);
        EntityResolver::new(catalog, aliases, Box::new(TokenSetSimilarity))
    }

    #[test]
    fn test_every_spa_aliases_itself() {
        let catalog = Catalog::embedded().unwrap();
        let index = AliasIndex::build(&catalog);
        for spa in &catalog.spas {
            assert_eq!(index.get(&normalize(&spa.name)), Some(spa.name.as_str()));
        }
    }

    #[test]
    fn test_spa_mentions_cover_aliases() {
        let r = resolver();
        assert_eq!(r.spa_mentions("lịch hẹn ở Hoa Mai"), vec!["hoa mai".to_string()]);
        assert!(r.spa_mentions("lịch hẹn ngày mai").is_empty());
    }

    #[test]
    fn test_short_aliases() {
        assert_eq!(
            short_aliases("Thẩm mỹ viện Hoa Mai"),
            vec!["hoa mai".to_string(), "tmvhm".to_string()]
        );
        assert_eq!(short_aliases("An Miên Spa"), vec!["an mien", "mien", "ams"]);
        // "nam" reads as a year
        assert_eq!(short_aliases("Nấm Spa"), vec!["ns"]);
    }

    #[test]
    fn test_hoa_mai_aliases_resolve_same_spa() {
        let r = resolver();
        assert_eq!(r.map_spa("TMV Hoa Mai").as_deref(), Some("Thẩm mỹ viện Hoa Mai"));
        assert_eq!(r.map_spa("Hoa Mai").as_deref(), Some("Thẩm mỹ viện Hoa Mai"));
        assert_eq!(r.map_spa("thẩm mỹ viện hoa mai").as_deref(), Some("Thẩm mỹ viện Hoa Mai"));
    }

    #[test]
    fn test_longest_alias_wins() {
        let r = resolver();
        let found = r.resolve_spa("mình muốn tới an miên spa").unwrap();
        assert_eq!(found.name, "An Miên Spa");
        assert_eq!(found.matched, "an mien spa");
    }

    #[test]
    fn test_alias_needs_word_boundary() {
        let r = resolver();
        // "ns" inside another word must not resolve
        assert_eq!(r.map_spa("dns"), None);
    }

    #[test]
    fn test_fuzzy_spa_typo() {
        let r = resolver();
        assert_eq!(r.map_spa("spa serenty").as_deref(), Some("Spa Serenity"));
    }

    #[test]
    fn test_time_words_do_not_resolve_spas() {
        let r = resolver();
        assert_eq!(r.map_spa("mai"), None);
        assert_eq!(r.map_spa("16:00"), None);
        assert_eq!(r.map_spa("đặt luôn"), None);
    }

    #[test]
    fn test_map_city_synonyms() {
        let r = resolver();
        assert_eq!(r.map_city("spa nào ở Hà Nội").as_deref(), Some("hà nội"));
        assert_eq!(r.map_city("ha noi").as_deref(), Some("hà nội"));
        assert_eq!(r.map_city("Sài Gòn có spa nào").as_deref(), Some("hồ chí minh"));
        assert_eq!(r.map_city("tp.hcm").as_deref(), Some("hồ chí minh"));
        assert_eq!(r.map_city("Đà Nẵng"), None);
    }

    #[test]
    fn test_short_city_synonym_needs_boundary() {
        let r = resolver();
        assert_eq!(r.map_city("chon lua"), None);
        assert_eq!(r.map_city("spa o hn"), Some("hà nội".to_string()));
    }

    #[test]
    fn test_spas_in_city() {
        let r = resolver();
        let hanoi = r.spas_in_city("hà nội");
        assert!(hanoi.contains(&"Nấm Spa"));
        assert!(!hanoi.contains(&"An Miên Spa"));
    }

    #[test]
    fn test_map_service_exact_beats_overlap() {
        let r = resolver();
        assert_eq!(
            r.map_service("đặt massage đá nóng chiều nay", None).as_deref(),
            Some("Massage đá nóng")
        );
        assert_eq!(
            r.map_service("liệu trình trị mụn", None).as_deref(),
            Some("Liệu trình trị mụn công nghệ cao")
        );
        assert_eq!(r.map_service("massage", None), None);
    }

    #[test]
    fn test_find_services_in_text() {
        let r = resolver();
        assert_eq!(r.find_services_in_text("massage đá nóng"), vec!["Massage đá nóng"]);
        let both = r.find_services_in_text("body massage hay massage thái");
        assert_eq!(both, vec!["Body Massage", "Massage Thái"]);
        assert!(r.find_services_in_text("16:00").is_empty());
    }

    #[test]
    fn test_generic_word_lists_every_carrier() {
        let r = resolver();
        let found = r.find_services_in_text("đặt massage");
        assert_eq!(found.len(), 5);
        assert!(found.contains(&"Massage thư giãn".to_string()));
        assert!(r.find_services_in_text("Spa Serenity").is_empty());
    }

    #[test]
    fn test_spas_offering_shared_service() {
        let r = resolver();
        let spas = r.spas_offering("chăm sóc da mụn");
        assert_eq!(spas, vec!["Lê Vy Spa", "Spa Serenity"]);
        assert_eq!(
            r.find_exact_service_by_name("massage da nong"),
            Some(("Nấm Spa".to_string(), "Massage đá nóng".to_string()))
        );
    }

    #[test]
    fn test_pick_candidate_by_ordinal_and_name() {
        let r = resolver();
        let options = vec!["Lê Vy Spa".to_string(), "Spa Serenity".to_string()];
        assert_eq!(r.pick_candidate("2", &options).as_deref(), Some("Spa Serenity"));
        assert_eq!(r.pick_candidate("số 1", &options).as_deref(), Some("Lê Vy Spa"));
        assert_eq!(r.pick_candidate("serenity", &options).as_deref(), Some("Spa Serenity"));
        assert_eq!(r.pick_candidate("3", &options), None);
        assert_eq!(r.pick_candidate("chưa biết", &options), None);
        assert_eq!(r.pick_ordinal("thứ hai", &options).as_deref(), Some("Spa Serenity"));
        assert_eq!(r.pick_ordinal("serenity", &options), None);
    }

    #[test]
    fn test_suggest_spas() {
        let r = resolver();
        let found = r.suggest_spas("serenity", 5, 60.0);
        assert_eq!(found.first().map(String::as_str), Some("Spa Serenity"));
        assert!(r.suggest_spas("16:00", 5, 60.0).is_empty());
    }

    #[test]
    fn test_sequence_backend_still_resolves_typos() {
        let catalog = Arc::new(Catalog::embedded().unwrap());
        let aliases = AliasIndex::build(&catalog);
        let r = EntityResolver::new(catalog, aliases, Box::new(SequenceSimilarity));
        assert_eq!(r.map_spa("spa serenty").as_deref(), Some("Spa Serenity"));
    }
}
