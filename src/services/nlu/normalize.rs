//! Accent- and case-insensitive text canonicalization.
//!
//! All matching in the assistant runs on normalized text: lowercase, no
//! combining diacritics, `đ` folded to `d`, single spaces, trimmed.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Canonicalize text for matching. Idempotent.
///
/// ```
/// use glowdesk::services::nlu::normalize::normalize;
///
/// assert_eq!(normalize("  Hà   Nội "), "ha noi");
/// assert_eq!(normalize("Đặt lịch"), "dat lich");
/// ```
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| match c {
            'đ' | 'Đ' => 'd',
            other => other,
        })
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether `needle` occurs in `haystack` delimited by non-alphanumeric
/// characters (or the ends of the string). Both sides should already be
/// normalized.
pub fn contains_phrase(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle) {
        let start = from + pos;
        let end = start + needle.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        from = start + haystack[start..].chars().next().map_or(1, char::len_utf8);
    }
    false
}

/// Keyword test used by the heuristics: short alphabetic keywords must match
/// as whole words ("hi" must not fire inside "chieu"); longer ones and
/// keywords with punctuation match as substrings.
pub fn has_keyword(haystack: &str, keyword: &str) -> bool {
    let short_word = keyword.chars().count() <= 3 && keyword.chars().all(char::is_alphanumeric);
    if short_word {
        contains_phrase(haystack, keyword)
    } else {
        haystack.contains(keyword)
    }
}

pub fn has_any_keyword(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| has_keyword(haystack, k))
}

/// Blanks out every whole-phrase occurrence of the given masks in normalized
/// text, so entity names are not read as other vocabulary.
pub fn mask_phrases(normalized: &str, masks: &[&str]) -> String {
    let mut out = normalized.to_string();
    for mask in masks {
        let mask = normalize(mask);
        if mask.is_empty() {
            continue;
        }
        if let Ok(re) = regex::Regex::new(&format!(r"\b{}\b", regex::escape(&mask))) {
            out = re.replace_all(&out, " ").into_owned();
        }
    }
    out
}

/// Whitespace tokens of already-normalized text.
pub fn tokens(normalized: &str) -> impl Iterator<Item = &str> {
    normalized.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty())
}
