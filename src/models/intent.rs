use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    ListSpas,
    SpaIntro,
    ListServices,
    ServiceDetail,
    Booking,
    #[serde(alias = "appt_lookup")]
    AppointmentLookup,
    #[serde(alias = "appt_list_all")]
    AppointmentListAll,
    SkincareQa,
    SuggestRelax,
    Fallback,
}

impl Intent {
    pub const ALL: [Intent; 11] = [
        Intent::Greeting,
        Intent::ListSpas,
        Intent::SpaIntro,
        Intent::ListServices,
        Intent::ServiceDetail,
        Intent::Booking,
        Intent::AppointmentLookup,
        Intent::AppointmentListAll,
        Intent::SkincareQa,
        Intent::SuggestRelax,
        Intent::Fallback,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Greeting => "greeting",
            Intent::ListSpas => "list_spas",
            Intent::SpaIntro => "spa_intro",
            Intent::ListServices => "list_services",
            Intent::ServiceDetail => "service_detail",
            Intent::Booking => "booking",
            Intent::AppointmentLookup => "appointment_lookup",
            Intent::AppointmentListAll => "appointment_list_all",
            Intent::SkincareQa => "skincare_qa",
            Intent::SuggestRelax => "suggest_relax",
            Intent::Fallback => "fallback",
        }
    }

    /// Intents a fuzzy time window is allowed to override into a booking.
    pub fn is_uncommitted(&self) -> bool {
        matches!(
            self,
            Intent::Fallback | Intent::SuggestRelax | Intent::SkincareQa | Intent::Greeting
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Vi,
    En,
    #[default]
    Auto,
}

/// A fuzzy window such as "chiều nay". Bounds travel as ISO-8601 strings so
/// the completion service can fill them in directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TimeRange {
    pub start_iso: Option<String>,
    pub end_iso: Option<String>,
    pub label: Option<String>,
}

impl TimeRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, label: &str) -> Self {
        Self {
            start_iso: Some(start.format("%Y-%m-%dT%H:%M:%S").to_string()),
            end_iso: Some(end.format("%Y-%m-%dT%H:%M:%S").to_string()),
            label: Some(label.to_string()),
        }
    }

    /// Local wall-clock bounds. Offsets in the strings are dropped: all times in
    /// this system are Vietnam local time.
    pub fn bounds(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let start = parse_local(self.start_iso.as_deref()?)?;
        let end = parse_local(self.end_iso.as_deref()?)?;
        (start <= end).then_some((start, end))
    }
}

fn parse_local(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// One classification of one message. Built once by the classifier and then
/// only read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NluResult {
    pub intent: Intent,
    #[serde(default)]
    pub spa_name_raw: Option<String>,
    #[serde(default)]
    pub service_name_raw: Option<String>,
    #[serde(default)]
    pub city_raw: Option<String>,
    #[serde(default)]
    pub datetime_raw: Option<String>,
    #[serde(default)]
    pub time_range: Option<TimeRange>,
    #[serde(default)]
    pub is_confirm: bool,
    #[serde(default, alias = "lang")]
    pub language: Language,
    #[serde(default)]
    pub confidence: f32,
}

impl NluResult {
    pub fn new(intent: Intent, confidence: f32) -> Self {
        Self {
            intent,
            spa_name_raw: None,
            service_name_raw: None,
            city_raw: None,
            datetime_raw: None,
            time_range: None,
            is_confirm: false,
            language: Language::Auto,
            confidence,
        }
    }
}
