use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::booking::SlotOption;

/// A confirmed booking. Append-only: created once on confirmation, never
/// updated by the assistant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: String,
    pub spa_name: String,
    pub service_name: String,
    pub slot_label: String,
    pub slot_iso: String,
    pub created_at: NaiveDateTime,
}

impl Appointment {
    pub fn new(spa_name: &str, service_name: &str, slot: &SlotOption, now: NaiveDateTime) -> Self {
        Self {
            id: format!("APPT-{}", uuid::Uuid::new_v4().simple()),
            spa_name: spa_name.to_string(),
            service_name: service_name.to_string(),
            slot_label: slot.label.clone(),
            slot_iso: slot.iso.clone(),
            created_at: now,
        }
    }

    pub fn scheduled_at(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.slot_iso, "%Y-%m-%dT%H:%M:%S").ok()
    }
}

/// Orders appointments by scheduled time; unparseable times sort last.
pub fn sort_by_schedule(appointments: &mut [Appointment]) {
    appointments.sort_by_key(|a| a.scheduled_at().unwrap_or(NaiveDateTime::MAX));
}
