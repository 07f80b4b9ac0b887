//! Vietnamese/English natural-language date and time parsing.
//!
//! Examples of accepted input: "12/08/2025 09:00", "12/8 lúc 9h",
//! "2 giờ chiều nay", "9h kém 15 tối mai", "9 giờ rưỡi sáng thứ 6 tuần sau",
//! "CN tuần sau", "ngày 5 lúc 14:00", "2pm", "tối nay", "nửa đêm".
//!
//! All times are Vietnam wall-clock times (`NaiveDateTime`). Several
//! Vietnamese words collapse together once diacritics are stripped ("tối"
//! evening and "tôi" me, "sáng" morning and "sang" over, "mốt" and "một"), so
//! those are decided on the accented text, or on surrounding time words when
//! the user typed without accents.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use super::normalize::{contains_phrase, mask_phrases, normalize};
use crate::models::TimeRange;

/// Default time when only a date is given.
const DEFAULT_HOUR: u32 = 9;

static FULL_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{4})\b").unwrap());
static SHORT_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})[/-](\d{1,2})\b").unwrap());
static COMPACT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(\d{1,2})[/-](\d{1,2})\b(?:[/-](\d{4}))?(?:\s+nam\s+(\d{4}))?(?:\s+(?:vao luc|luc|vao|l)\s*|\s+)(\d{1,2})(?::(\d{2}))?(?:\s|$)",
    )
    .unwrap()
});
static DAY_OF_MONTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bngay\s+(\d{1,2})\b").unwrap());
static HH_MM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{1,2}):(\d{2})\b").unwrap());
static H_UNIT_MM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})\s*(?:gio|h|g)\s*(\d{1,2})\b").unwrap());
static H_UNIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})\s*(?:gio|h|g)\b").unwrap());
static H_MERIDIEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})\s*([ap])\.?m\b").unwrap());
static PM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d\s*p\.?m\b").unwrap());
static AM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d\s*a\.?m\b").unwrap());
static MINUTES_BEFORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bkem\s+(\d{1,2})\b").unwrap());
static DAYPART_TODAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:sang|trua|chieu|toi|dem|khuya)\s+(?:nay|hom nay)\b").unwrap());
static DAYPART_TOMORROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:sang|trua|chieu|toi|dem|khuya)\s+mai\b").unwrap());
static DAY_AFTER_CONTEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:sang|trua|chieu|toi|dem|khuya|ngay)\s+mot\b").unwrap());

/// Time-word context for daypart words that are ambiguous without accents.
static DAYPART_CONTEXT: LazyLock<HashMap<&'static str, Regex>> = LazyLock::new(|| {
    ["sang", "toi", "dem"]
        .into_iter()
        .map(|k| {
            let re = Regex::new(&format!(
                r"(?:\d{{1,2}}(?::\d{{2}})?\s*(?:gio|h|g)?(?:\s*\d{{1,2}})?(?:\s*(?:kem\s+\d{{1,2}}|ruoi))?\s+|\bbuoi\s+|\bnua\s+){k}\b|\b{k}\s+(?:nay|hom nay|mai|mot|qua|thu|chu nhat|cn|ngay)\b"
            ))
            .unwrap();
            (k, re)
        })
        .collect()
});

const WEEKDAYS: &[(&str, Weekday)] = &[
    ("thu 2", Weekday::Mon),
    ("thu hai", Weekday::Mon),
    ("monday", Weekday::Mon),
    ("thu 3", Weekday::Tue),
    ("thu ba", Weekday::Tue),
    ("tuesday", Weekday::Tue),
    ("thu 4", Weekday::Wed),
    ("thu tu", Weekday::Wed),
    ("wednesday", Weekday::Wed),
    ("thu 5", Weekday::Thu),
    ("thu nam", Weekday::Thu),
    ("thursday", Weekday::Thu),
    ("thu 6", Weekday::Fri),
    ("thu sau", Weekday::Fri),
    ("friday", Weekday::Fri),
    ("thu 7", Weekday::Sat),
    ("thu bay", Weekday::Sat),
    ("saturday", Weekday::Sat),
    ("chu nhat", Weekday::Sun),
    ("cn", Weekday::Sun),
    ("sunday", Weekday::Sun),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DayPart {
    Morning,
    Noon,
    Afternoon,
    Evening,
    Night,
    LateNight,
}

/// (daypart, unaccented key, accented form, English words). Order is the
/// detection priority.
const DAYPARTS: &[(DayPart, &str, &str, &[&str])] = &[
    (DayPart::Morning, "sang", "sáng", &["morning"]),
    (DayPart::Noon, "trua", "trưa", &["noon"]),
    (DayPart::Afternoon, "chieu", "chiều", &["afternoon"]),
    (DayPart::Evening, "toi", "tối", &["evening", "tonight"]),
    (DayPart::Night, "dem", "đêm", &["night"]),
    (DayPart::LateNight, "khuya", "khuya", &[]),
];

impl DayPart {
    fn default_time(self) -> (u32, u32) {
        match self {
            DayPart::Morning => (9, 0),
            DayPart::Noon => (12, 0),
            DayPart::Afternoon => (15, 0),
            DayPart::Evening => (19, 0),
            DayPart::Night => (22, 0),
            DayPart::LateNight => (23, 30),
        }
    }

    /// Reads a 12-hour clock hour in this part of the day. Returns the 24-hour
    /// hour and how many days past the named day it falls on.
    fn to_24h(self, hour: u32) -> (u32, i64) {
        match (self, hour) {
            (DayPart::Morning, h) => (h, 0),
            (DayPart::Noon, h @ 1..=4) => (h + 12, 0),
            (DayPart::Noon, h) => (h, 0),
            (DayPart::Afternoon, h @ 1..=11) => (h + 12, 0),
            (DayPart::Afternoon, h) => (h, 0),
            (DayPart::Evening, 12) => (0, 1),
            (DayPart::Evening, h @ 1..=11) => (h + 12, 0),
            (DayPart::Evening, h) => (h, 0),
            (DayPart::Night | DayPart::LateNight, 0 | 12) => (0, 1),
            (DayPart::Night | DayPart::LateNight, h @ 1..=5) => (h, 1),
            (DayPart::Night | DayPart::LateNight, h @ 6..=11) => (h + 12, 0),
            (DayPart::Night | DayPart::LateNight, h) => (h, 0),
        }
    }
}

struct Input {
    /// Normalized text with masked phrases blanked out.
    norm: String,
    /// Lowercased NFC text, used to tell apart words that normalize alike.
    raw: String,
}

impl Input {
    fn new(text: &str, masks: &[&str]) -> Self {
        Self {
            norm: mask_phrases(&normalize(text), masks),
            raw: text.nfc().collect::<String>().to_lowercase(),
        }
    }

    fn has(&self, phrase: &str) -> bool {
        contains_phrase(&self.norm, phrase)
    }
}

#[derive(Debug, Clone, Copy)]
struct TimeOfDay {
    hour: u32,
    minute: u32,
    day_offset: i64,
}

#[derive(Debug, Clone, Copy)]
struct DateHit {
    date: NaiveDate,
    /// "ngày N": move to next month when the result is already past.
    rolls_monthly: bool,
}

enum DateMatch {
    Found(DateHit),
    Invalid,
}

/// Parses a date/time expression relative to `now`. Returns `None` when the
/// text holds no recognizable date or time, or names an impossible date.
pub fn parse(text: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    parse_masked(text, now, &[])
}

/// Like [`parse`], ignoring the given phrases (e.g. a spa name such as
/// "Hoa Mai" that contains a day word).
pub fn parse_masked(text: &str, now: NaiveDateTime, masks: &[&str]) -> Option<NaiveDateTime> {
    let input = Input::new(text, masks);

    if let Some(dt) = parse_compact(&input, now) {
        return Some(dt);
    }

    let date = match parse_date(&input, now) {
        Some(DateMatch::Invalid) => return None,
        Some(DateMatch::Found(hit)) => Some(hit),
        None => None,
    };
    let time = parse_time(&input);
    if date.is_none() && time.is_none() {
        return None;
    }

    let tod = time.unwrap_or(TimeOfDay {
        hour: DEFAULT_HOUR,
        minute: 0,
        day_offset: 0,
    });
    let base = date.map(|d| d.date).unwrap_or_else(|| now.date());
    let mut dt = base.and_hms_opt(tod.hour, tod.minute, 0)? + Duration::days(tod.day_offset);

    match date {
        Some(hit) if hit.rolls_monthly && dt < now => {
            let next = next_month_with_day(hit.date, hit.date.day())?;
            dt = next.and_hms_opt(tod.hour, tod.minute, 0)? + Duration::days(tod.day_offset);
        }
        // Only a time was given and it already passed today.
        None if dt < now => dt += Duration::days(1),
        _ => {}
    }
    Some(dt)
}

/// `dd/mm[/yyyy] [luc] HH[:MM]` in one go. Skipped when a daypart or am/pm
/// needs to reinterpret the hour.
fn parse_compact(input: &Input, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let caps = COMPACT.captures(&input.norm)?;
    if detect_daypart(input).is_some() || PM.is_match(&input.norm) || AM.is_match(&input.norm) {
        return None;
    }
    let day = cap_num(&caps, 1)?;
    let month = cap_num(&caps, 2)?;
    let year = cap_num(&caps, 3)
        .or_else(|| cap_num(&caps, 4))
        .map(|y| y as i32)
        .unwrap_or_else(|| now.year());
    let hour = cap_num(&caps, 5)?;
    let minute = cap_num(&caps, 6).unwrap_or(0);
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)
}

fn parse_date(input: &Input, now: NaiveDateTime) -> Option<DateMatch> {
    if let Some(caps) = FULL_DATE.captures(&input.norm) {
        let found = match (cap_num(&caps, 3), cap_num(&caps, 2), cap_num(&caps, 1)) {
            (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y as i32, m, d),
            _ => None,
        };
        return Some(explicit(found));
    }

    if let Some(caps) = SHORT_DATE.captures(&input.norm) {
        let found = match (cap_num(&caps, 2), cap_num(&caps, 1)) {
            (Some(m), Some(d)) => NaiveDate::from_ymd_opt(now.year(), m, d),
            _ => None,
        };
        return Some(explicit(found));
    }

    if let Some(caps) = DAY_OF_MONTH.captures(&input.norm) {
        let day = cap_num(&caps, 1)?;
        let found = NaiveDate::from_ymd_opt(now.year(), now.month(), day)
            .or_else(|| next_month_with_day(now.date(), day));
        return Some(match found {
            Some(date) => DateMatch::Found(DateHit {
                date,
                rolls_monthly: true,
            }),
            None => DateMatch::Invalid,
        });
    }

    parse_relative_date(input, now).map(|date| {
        DateMatch::Found(DateHit {
            date,
            rolls_monthly: false,
        })
    })
}

fn cap_num(caps: &regex::Captures<'_>, i: usize) -> Option<u32> {
    caps.get(i).and_then(|m| m.as_str().parse().ok())
}

fn explicit(date: Option<NaiveDate>) -> DateMatch {
    match date {
        Some(date) => DateMatch::Found(DateHit {
            date,
            rolls_monthly: false,
        }),
        None => DateMatch::Invalid,
    }
}

fn parse_relative_date(input: &Input, now: NaiveDateTime) -> Option<NaiveDate> {
    let today = now.date();

    if let Some(target) = WEEKDAYS
        .iter()
        .find(|(key, _)| input.has(key))
        .map(|(_, wd)| *wd)
    {
        let week_offset = if input.has("tuan sau") || input.has("tuan toi") || input.has("next week") {
            7
        } else if input.has("tuan truoc") || input.has("last week") {
            -7
        } else {
            0
        };
        let base = today + Duration::days(week_offset);
        let ahead = (target.num_days_from_monday() as i64 - base.weekday().num_days_from_monday() as i64)
            .rem_euclid(7);
        return Some(base + Duration::days(ahead));
    }

    if input.has("ngay kia") || input.has("day after tomorrow") || is_day_after_tomorrow(input) {
        return Some(today + Duration::days(2));
    }

    if input.has("ngay mai") || input.has("tomorrow") || input.has("mai") || DAYPART_TOMORROW.is_match(&input.norm) {
        return Some(today + Duration::days(1));
    }

    if input.has("hom nay") || input.has("today") || input.has("tonight") || DAYPART_TODAY.is_match(&input.norm) {
        return Some(today);
    }

    None
}

/// "mốt" (day after tomorrow) and "một" (one) normalize alike.
fn is_day_after_tomorrow(input: &Input) -> bool {
    if !input.has("mot") {
        return false;
    }
    contains_phrase(&input.raw, "mốt")
        || (contains_phrase(&input.raw, "mot") && DAY_AFTER_CONTEXT.is_match(&input.norm))
}

fn next_month_with_day(from: NaiveDate, day: u32) -> Option<NaiveDate> {
    let (mut year, mut month) = (from.year(), from.month());
    for _ in 0..12 {
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }
    None
}

fn detect_daypart(input: &Input) -> Option<DayPart> {
    for (part, key, accented, english) in DAYPARTS {
        if english.iter().any(|w| input.has(w)) {
            return Some(*part);
        }
        if !input.has(key) {
            continue;
        }
        match DAYPART_CONTEXT.get(key) {
            None => return Some(*part),
            Some(context) => {
                let accented_hit = contains_phrase(&input.raw, accented);
                let typed_plain = contains_phrase(&input.raw, key);
                if accented_hit || (typed_plain && context.is_match(&input.norm)) {
                    return Some(*part);
                }
            }
        }
    }
    None
}

fn parse_time(input: &Input) -> Option<TimeOfDay> {
    let daypart = detect_daypart(input);
    let pm = PM.is_match(&input.norm);
    let am = AM.is_match(&input.norm);

    if let Some((hour, minute)) = numeric_time(&input.norm) {
        let hour = if pm && (1..=11).contains(&hour) {
            hour + 12
        } else if am && hour == 12 {
            0
        } else {
            hour
        };
        let (hour, day_offset) = match daypart {
            Some(part) if !(am || pm) => part.to_24h(hour),
            _ => (hour, 0),
        };
        if hour > 23 || minute > 59 {
            return None;
        }
        return Some(TimeOfDay {
            hour,
            minute,
            day_offset,
        });
    }

    if input.has("nua dem") || input.has("midnight") {
        return Some(TimeOfDay {
            hour: 0,
            minute: 0,
            day_offset: 1,
        });
    }

    daypart.map(|part| {
        let (hour, minute) = part.default_time();
        TimeOfDay {
            hour,
            minute,
            day_offset: 0,
        }
    })
}

fn numeric_time(norm: &str) -> Option<(u32, u32)> {
    if let Some(caps) = HH_MM.captures(norm) {
        return Some((cap_num(&caps, 1)?, cap_num(&caps, 2)?));
    }

    if let Some(caps) = H_UNIT_MM.captures(norm) {
        let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
        let followed_by_date = norm[end..].starts_with(['/', '-']);
        if !followed_by_date {
            return Some((cap_num(&caps, 1)?, cap_num(&caps, 2)?));
        }
    }

    if let Some(caps) = H_UNIT.captures(norm) {
        let mut hour = cap_num(&caps, 1)?;
        let mut minute = 0;
        if let Some(before) = MINUTES_BEFORE.captures(norm).and_then(|c| cap_num(&c, 1)) {
            if (1..60).contains(&before) {
                minute = 60 - before;
                hour = if hour == 0 { 23 } else { hour - 1 };
            }
        }
        if contains_phrase(norm, "ruoi") {
            minute = 30;
        }
        return Some((hour, minute));
    }

    if let Some(caps) = H_MERIDIEM.captures(norm) {
        return Some((cap_num(&caps, 1)?, 0));
    }

    None
}

/// (phrases, days from today, start, end, label)
const WINDOWS: &[(&[&str], i64, (u32, u32), (u32, u32), &str)] = &[
    (&["chieu nay", "this afternoon"], 0, (13, 0), (18, 0), "this_afternoon"),
    (&["sang mai", "tomorrow morning"], 1, (8, 0), (11, 30), "tomorrow_morning"),
    (&["sang nay", "this morning"], 0, (8, 0), (11, 30), "this_morning"),
    (&["trua nay"], 0, (11, 0), (13, 30), "this_noon"),
    (&["trua mai"], 1, (11, 0), (13, 30), "tomorrow_noon"),
    (&["chieu mai", "tomorrow afternoon"], 1, (13, 0), (18, 0), "tomorrow_afternoon"),
    (&["toi nay", "tonight", "this evening"], 0, (18, 0), (21, 30), "this_evening"),
    (&["toi mai", "tomorrow evening"], 1, (18, 0), (21, 30), "tomorrow_evening"),
];

/// Recognizes a fuzzy window such as "chiều nay" or "sáng mai". Windows for
/// today start no earlier than `now` and are dropped once they are over.
pub fn parse_window(text: &str, now: NaiveDateTime) -> Option<TimeRange> {
    let norm = normalize(text);
    let (_, days, start, end, label) = WINDOWS
        .iter()
        .find(|(phrases, ..)| phrases.iter().any(|p| contains_phrase(&norm, p)))?;

    let day = now.date() + Duration::days(*days);
    let mut start_at = day.and_hms_opt(start.0, start.1, 0)?;
    let end_at = day.and_hms_opt(end.0, end.1, 0)?;
    if *days == 0 {
        if end_at <= now {
            return None;
        }
        start_at = start_at.max(now);
    }
    Some(TimeRange::new(start_at, end_at, label))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    // 2024-01-01 is a Monday.
    fn monday_10am() -> NaiveDateTime {
        dt("2024-01-01 10:00")
    }

    fn p(text: &str) -> Option<NaiveDateTime> {
        parse(text, monday_10am())
    }

    #[test]
    fn test_full_explicit_datetime() {
        assert_eq!(p("12/08/2025 09:00"), Some(dt("2025-08-12 09:00")));
        assert_eq!(p("12-8-2025 14:30"), Some(dt("2025-08-12 14:30")));
    }

    #[test]
    fn test_short_date_defaults_current_year() {
        assert_eq!(p("12/8 lúc 9h"), Some(dt("2024-08-12 09:00")));
        assert_eq!(p("12/8 14:30"), Some(dt("2024-08-12 14:30")));
        assert_eq!(p("ngày 12/8 2 giờ chiều"), Some(dt("2024-08-12 14:00")));
    }

    #[test]
    fn test_late_year_short_dates() {
        let now = dt("2025-08-10 09:00");
        assert_eq!(parse("đặt lịch 15/12", now), Some(dt("2025-12-15 09:00")));
        assert_eq!(parse("ngày 20/11", now), Some(dt("2025-11-20 09:00")));
        assert_eq!(parse("15/12 lúc 10h", now), Some(dt("2025-12-15 10:00")));
        assert_eq!(parse("15/12 10", now), Some(dt("2025-12-15 10:00")));
    }

    #[test]
    fn test_date_without_time_defaults_to_nine() {
        assert_eq!(p("15/01/2024"), Some(dt("2024-01-15 09:00")));
    }

    #[test]
    fn test_invalid_date_is_none() {
        assert_eq!(p("31/02/2024 10:00"), None);
        assert_eq!(p("31/02"), None);
    }

    #[test]
    fn test_day_of_month_rolls_forward() {
        assert_eq!(p("ngày 5 lúc 14:00"), Some(dt("2024-01-05 14:00")));
        assert_eq!(
            parse("ngày 5 lúc 14:00", dt("2024-01-10 10:00")),
            Some(dt("2024-02-05 14:00"))
        );
        assert_eq!(
            parse("ngày 20", dt("2024-12-25 10:00")),
            Some(dt("2025-01-20 09:00"))
        );
    }

    #[test]
    fn test_relative_days() {
        assert_eq!(p("hôm nay 15h"), Some(dt("2024-01-01 15:00")));
        assert_eq!(p("mai 10h"), Some(dt("2024-01-02 10:00")));
        assert_eq!(p("tomorrow 3pm"), Some(dt("2024-01-02 15:00")));
        assert_eq!(p("ngày kia"), Some(dt("2024-01-03 09:00")));
        assert_eq!(p("mốt 8h"), Some(dt("2024-01-03 08:00")));
    }

    #[test]
    fn test_mot_meaning_one_is_not_a_day() {
        assert_eq!(p("đặt một lịch"), None);
    }

    #[test]
    fn test_weekdays_with_week_offset() {
        assert_eq!(p("thứ 3"), Some(dt("2024-01-02 09:00")));
        assert_eq!(p("thứ 2"), Some(dt("2024-01-01 09:00")));
        assert_eq!(p("CN tuần sau"), Some(dt("2024-01-14 09:00")));
        assert_eq!(p("9 giờ rưỡi sáng thứ 6 tuần sau"), Some(dt("2024-01-12 09:30")));
        assert_eq!(p("thứ 6 tuần này 16:00"), Some(dt("2024-01-05 16:00")));
    }

    #[test]
    fn test_daypart_with_day_word() {
        assert_eq!(p("tối nay"), Some(dt("2024-01-01 19:00")));
        assert_eq!(p("sáng mai"), Some(dt("2024-01-02 09:00")));
        assert_eq!(p("trưa mai"), Some(dt("2024-01-02 12:00")));
        assert_eq!(p("khuya nay"), Some(dt("2024-01-01 23:30")));
    }

    #[test]
    fn test_explicit_times() {
        assert_eq!(p("16:00"), Some(dt("2024-01-01 16:00")));
        assert_eq!(p("14h30"), Some(dt("2024-01-01 14:30")));
        assert_eq!(p("14 giờ 15"), Some(dt("2024-01-01 14:15")));
        assert_eq!(p("2pm"), Some(dt("2024-01-01 14:00")));
        assert_eq!(p("11 am"), Some(dt("2024-01-01 11:00")));
    }

    #[test]
    fn test_kem_and_ruoi() {
        assert_eq!(p("9h kém 15 tối mai"), Some(dt("2024-01-02 20:45")));
        assert_eq!(p("3 giờ rưỡi chiều"), Some(dt("2024-01-01 15:30")));
    }

    #[test]
    fn test_daypart_reinterprets_hour() {
        assert_eq!(p("6 giờ tối"), Some(dt("2024-01-01 18:00")));
        assert_eq!(p("2 giờ chiều nay"), Some(dt("2024-01-01 14:00")));
        assert_eq!(p("11 giờ trưa"), Some(dt("2024-01-01 11:00")));
        assert_eq!(p("1 giờ trưa"), Some(dt("2024-01-01 13:00")));
        assert_eq!(p("10 giờ đêm"), Some(dt("2024-01-01 22:00")));
    }

    #[test]
    fn test_six_pm_rolls_when_past() {
        assert_eq!(
            parse("6 giờ tối", dt("2024-01-01 19:00")),
            Some(dt("2024-01-02 18:00"))
        );
    }

    #[test]
    fn test_midnight_wraps_to_next_day() {
        assert_eq!(p("nửa đêm"), Some(dt("2024-01-02 00:00")));
        assert_eq!(p("12 giờ tối"), Some(dt("2024-01-02 00:00")));
        assert_eq!(p("2 giờ đêm"), Some(dt("2024-01-02 02:00")));
        assert_eq!(p("1h khuya"), Some(dt("2024-01-02 01:00")));
    }

    #[test]
    fn test_bare_dayparts_use_defaults() {
        assert_eq!(p("chiều"), Some(dt("2024-01-01 15:00")));
        assert_eq!(p("buổi tối"), Some(dt("2024-01-01 19:00")));
        assert_eq!(p("trưa"), Some(dt("2024-01-01 12:00")));
        // 09:00 already passed at 10:00
        assert_eq!(p("sáng"), Some(dt("2024-01-02 09:00")));
    }

    #[test]
    fn test_time_only_in_past_advances_a_day() {
        assert_eq!(p("9h30"), Some(dt("2024-01-02 09:30")));
    }

    #[test]
    fn test_pronoun_toi_is_not_evening() {
        assert_eq!(p("lịch hẹn của tôi"), None);
        assert_eq!(p("lich hen cua toi"), None);
        assert_eq!(p("6h toi"), Some(dt("2024-01-01 18:00")));
    }

    #[test]
    fn test_no_time_tokens() {
        assert_eq!(p("xin chào"), None);
        assert_eq!(p("đặt dịch vụ này"), None);
        assert_eq!(p(""), None);
    }

    #[test]
    fn test_masked_spa_name() {
        assert_eq!(p("Hoa Mai"), Some(dt("2024-01-02 09:00")));
        assert_eq!(parse_masked("đặt Hoa Mai", monday_10am(), &["hoa mai"]), None);
    }

    #[test]
    fn test_window_this_afternoon() {
        let tr = parse_window("chiều nay", monday_10am()).unwrap();
        assert_eq!(tr.bounds(), Some((dt("2024-01-01 13:00"), dt("2024-01-01 18:00"))));
        assert_eq!(tr.label.as_deref(), Some("this_afternoon"));
    }

    #[test]
    fn test_window_this_afternoon_clamped_and_expired() {
        let tr = parse_window("chiều nay", dt("2024-01-01 15:20")).unwrap();
        assert_eq!(tr.bounds(), Some((dt("2024-01-01 15:20"), dt("2024-01-01 18:00"))));
        assert!(parse_window("chiều nay", dt("2024-01-01 18:30")).is_none());
    }

    #[test]
    fn test_window_tomorrow_morning() {
        let tr = parse_window("sáng mai nhé", monday_10am()).unwrap();
        assert_eq!(tr.bounds(), Some((dt("2024-01-02 08:00"), dt("2024-01-02 11:30"))));
    }

    #[test]
    fn test_no_window() {
        assert!(parse_window("16:00", monday_10am()).is_none());
    }
}
