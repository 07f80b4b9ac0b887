//! Deterministic keyword classification, used when the completion service
//! is unavailable or returns something unusable.

use super::normalize::{contains_phrase, has_any_keyword, normalize};
use crate::models::{Intent, Language, NluResult};

const GREETING: &[&str] = &["xin chao", "chao", "hello", "hi", "glow ai", "glowai"];
const SUGGEST_RELAX: &[&str] = &[
    "thu gian",
    "relax",
    "xa stress",
    "met",
    "met moi",
    "goi y gi",
    "massage thu gian",
];
const LIST_SPAS: &[&str] = &[
    "danh sach spa",
    "spa o",
    "spa tai",
    "spa gan",
    "spa quanh",
    "spa nao",
    "tim spa",
    "spa khu vuc",
];
const SPA_INTRO: &[&str] = &["gioi thieu", "thong tin", "o dau", "tot khong"];
const LIST_SERVICES: &[&str] = &["danh sach dich vu", "bang gia", "cac dich vu", "dich vu cua"];
const BOOKING: &[&str] = &[
    "dat lich",
    "dat hen",
    "booking",
    "book",
    "giu cho",
    "dang ky lich",
    "chieu nay",
    "sang mai",
    ":",
];
const APPT_LIST_ALL: &[&str] = &["tat ca lich hen", "danh sach lich hen", "all appointments"];
const APPT_LOOKUP: &[&str] = &["lich hen", "booking cua toi", "xem lich", "kiem tra lich"];
const SKINCARE: &[&str] = &[
    "skincare",
    "duong da",
    "routine",
    "chong nang",
    "serum",
    "toner",
    "da dau",
    "da kho",
    "lo chan long",
    "bi mun",
];

/// Checked in order; the first set with a hit decides.
const RULES: &[(&[&str], Intent, f32)] = &[
    (GREETING, Intent::Greeting, 0.4),
    (SUGGEST_RELAX, Intent::SuggestRelax, 0.4),
    (LIST_SPAS, Intent::ListSpas, 0.3),
    (SPA_INTRO, Intent::SpaIntro, 0.3),
    (LIST_SERVICES, Intent::ListServices, 0.3),
    (BOOKING, Intent::Booking, 0.4),
    (APPT_LIST_ALL, Intent::AppointmentListAll, 0.3),
    (APPT_LOOKUP, Intent::AppointmentLookup, 0.3),
    (SKINCARE, Intent::SkincareQa, 0.3),
];

const FALLBACK_CONFIDENCE: f32 = 0.1;

const QUICK_CONFIRM: &[&str] = &["dat giup", "dat luon", "book luon", "xac nhan"];

const AFFIRMATIVE: &[&str] = &[
    "dong y",
    "xac nhan",
    "confirm",
    "ok",
    "oke",
    "okay",
    "yes",
    "chot",
    "dat luon",
    "dat giup",
    "book luon",
    "duoc",
];

pub fn classify_keywords(message: &str) -> NluResult {
    let msg = normalize(message);
    let mut nlu = RULES
        .iter()
        .find(|(keywords, _, _)| has_any_keyword(&msg, keywords))
        .map(|(_, intent, confidence)| NluResult::new(*intent, *confidence))
        .unwrap_or_else(|| NluResult::new(Intent::Fallback, FALLBACK_CONFIDENCE));
    nlu.language = detect_language(message);
    nlu
}

/// An explicit "book it now" phrase.
pub fn is_quick_confirm(message: &str) -> bool {
    let msg = normalize(message);
    QUICK_CONFIRM.iter().any(|p| contains_phrase(&msg, p))
}

/// A yes to a confirmation summary.
pub fn is_affirmative(message: &str) -> bool {
    let msg = normalize(message);
    let negated = ["khong", "chua", "no", "huy"].iter().any(|n| contains_phrase(&msg, n));
    !negated && AFFIRMATIVE.iter().any(|p| contains_phrase(&msg, p))
}

fn detect_language(message: &str) -> Language {
    let lower = message.to_lowercase();
    if normalize(&lower) != lower.split_whitespace().collect::<Vec<_>>().join(" ") {
        Language::Vi
    } else {
        Language::Auto
    }
}
