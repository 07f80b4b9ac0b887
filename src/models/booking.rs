use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const SLOT_LABEL_FORMAT: &str = "%d/%m/%Y %H:%M";

/// A concrete bookable time, as shown to the user and as stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotOption {
    pub label: String,
    pub iso: String,
}

impl SlotOption {
    pub fn at(dt: NaiveDateTime) -> Self {
        Self {
            label: dt.format(SLOT_LABEL_FORMAT).to_string(),
            iso: dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }

    pub fn datetime(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.iso, "%Y-%m-%dT%H:%M:%S").ok()
    }

    pub fn hhmm(&self) -> Option<String> {
        self.datetime().map(|dt| dt.format("%H:%M").to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingStage {
    Empty,
    SpaPending,
    ServicePending,
    SlotPending,
    AwaitingConfirmation,
    Confirmed,
}

impl BookingStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStage::Empty => "empty",
            BookingStage::SpaPending => "spa_pending",
            BookingStage::ServicePending => "service_pending",
            BookingStage::SlotPending => "slot_pending",
            BookingStage::AwaitingConfirmation => "awaiting_confirmation",
            BookingStage::Confirmed => "confirmed",
        }
    }
}

/// Per-user in-progress booking. Fields are private so that every change of
/// spa or service goes through the setters that drop a stale slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BookingContext {
    #[serde(default)]
    active: bool,
    #[serde(default)]
    spa_name: Option<String>,
    #[serde(default)]
    service_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    service_candidates: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    spa_candidates: Vec<String>,
    #[serde(default)]
    slot: Option<SlotOption>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    available_slots: Vec<SlotOption>,
    #[serde(default)]
    confirmed: bool,
}

impl BookingContext {
    pub fn started() -> Self {
        Self {
            active: true,
            ..Self::default()
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn activate(&mut self) {
        self.active = true;
    }

    pub fn spa_name(&self) -> Option<&str> {
        self.spa_name.as_deref()
    }

    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    pub fn slot(&self) -> Option<&SlotOption> {
        self.slot.as_ref()
    }

    pub fn service_candidates(&self) -> &[String] {
        &self.service_candidates
    }

    pub fn spa_candidates(&self) -> &[String] {
        &self.spa_candidates
    }

    pub fn available_slots(&self) -> &[SlotOption] {
        &self.available_slots
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    pub fn awaiting_choice(&self) -> bool {
        !self.service_candidates.is_empty() || !self.spa_candidates.is_empty()
    }

    pub fn stage(&self) -> BookingStage {
        if !self.active {
            return BookingStage::Empty;
        }
        if self.confirmed {
            return BookingStage::Confirmed;
        }
        match (&self.spa_name, &self.service_name, &self.slot) {
            (None, _, _) => BookingStage::SpaPending,
            (Some(_), None, _) => BookingStage::ServicePending,
            (Some(_), Some(_), None) => BookingStage::SlotPending,
            (Some(_), Some(_), Some(_)) => BookingStage::AwaitingConfirmation,
        }
    }

    /// Sets the spa. Any change, including the first one, invalidates a
    /// chosen or offered time.
    pub fn set_spa(&mut self, name: &str) {
        if self.spa_name.as_deref() == Some(name) {
            return;
        }
        self.invalidate_time();
        self.spa_name = Some(name.to_string());
        self.spa_candidates.clear();
    }

    /// Sets the service. Any change invalidates a chosen or offered time.
    pub fn set_service(&mut self, name: &str) {
        if self.service_name.as_deref() == Some(name) {
            return;
        }
        self.invalidate_time();
        self.service_name = Some(name.to_string());
        self.service_candidates.clear();
    }

    pub fn clear_spa(&mut self) {
        if self.spa_name.take().is_some() {
            self.invalidate_time();
        }
    }

    pub fn clear_service(&mut self) {
        if self.service_name.take().is_some() {
            self.invalidate_time();
        }
    }

    pub fn offer_services(&mut self, candidates: Vec<String>) {
        self.service_candidates = candidates;
    }

    pub fn offer_spas(&mut self, candidates: Vec<String>) {
        self.spa_candidates = candidates;
    }

    pub fn offer_slots(&mut self, slots: Vec<SlotOption>) {
        self.available_slots = slots;
    }

    pub fn set_slot(&mut self, slot: SlotOption) {
        self.slot = Some(slot);
        self.confirmed = false;
    }

    /// Marks the booking confirmed. Refuses unless spa, service and slot are
    /// all present.
    pub fn confirm(&mut self) -> bool {
        if self.spa_name.is_some() && self.service_name.is_some() && self.slot.is_some() {
            self.confirmed = true;
        }
        self.confirmed
    }

    /// Back to AwaitingConfirmation after a confirmation could not be stored.
    pub fn withdraw_confirmation(&mut self) {
        self.confirmed = false;
    }

    fn invalidate_time(&mut self) {
        self.slot = None;
        self.available_slots.clear();
        self.confirmed = false;
    }
}
