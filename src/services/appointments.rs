use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use rusqlite::Connection;

use crate::db::queries;
use crate::models::appointment::sort_by_schedule;
use crate::models::Appointment;
use crate::services::nlu::normalize::{contains_phrase, mask_phrases, normalize};

pub trait AppointmentStore: Send + Sync {
    /// Stores a new appointment and returns its id.
    fn append(&self, user_id: &str, appointment: &Appointment) -> anyhow::Result<String>;
    /// All appointments of a user, in no particular order.
    fn list(&self, user_id: &str) -> anyhow::Result<Vec<Appointment>>;
}

pub struct SqliteAppointmentStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteAppointmentStore {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }
}

impl AppointmentStore for SqliteAppointmentStore {
    fn append(&self, user_id: &str, appointment: &Appointment) -> anyhow::Result<String> {
        let db = self.db.lock().map_err(|_| anyhow!("database lock poisoned"))?;
        queries::insert_appointment(&db, user_id, appointment)?;
        Ok(appointment.id.clone())
    }

    fn list(&self, user_id: &str) -> anyhow::Result<Vec<Appointment>> {
        let db = self.db.lock().map_err(|_| anyhow!("database lock poisoned"))?;
        queries::get_appointments_for_user(&db, user_id)
    }
}

/// A user's appointments sorted by scheduled time.
pub fn list_sorted(store: &dyn AppointmentStore, user_id: &str) -> anyhow::Result<Vec<Appointment>> {
    let mut appointments = store.list(user_id)?;
    sort_by_schedule(&mut appointments);
    Ok(appointments)
}

/// Appointments scheduled within `[start, end]`, sorted.
pub fn list_in_range(
    store: &dyn AppointmentStore,
    user_id: &str,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> anyhow::Result<Vec<Appointment>> {
    Ok(list_sorted(store, user_id)?
        .into_iter()
        .filter(|a| {
            a.scheduled_at()
                .map(|at| at >= start && at <= end)
                .unwrap_or(false)
        })
        .collect())
}

/// A lookup window named in the message ("hôm nay", "tuần sau", ...).
/// `masks` are entity names to ignore ("Hoa Mai" does not mean tomorrow).
pub fn lookup_range(
    message: &str,
    now: NaiveDateTime,
    masks: &[&str],
) -> Option<(NaiveDateTime, NaiveDateTime, String)> {
    let msg = mask_phrases(&normalize(message), masks);
    let today = now.date();

    let (start, end, title) = if contains_phrase(&msg, "hom nay") || contains_phrase(&msg, "today") {
        (today, today, "hôm nay")
    } else if contains_phrase(&msg, "ngay mai") || contains_phrase(&msg, "mai") || contains_phrase(&msg, "tomorrow") {
        let d = today + Duration::days(1);
        (d, d, "ngày mai")
    } else if contains_phrase(&msg, "tuan sau") || contains_phrase(&msg, "tuan toi") || contains_phrase(&msg, "next week") {
        let monday = week_start(today) + Duration::days(7);
        (monday, monday + Duration::days(6), "tuần sau")
    } else if contains_phrase(&msg, "tuan nay") || contains_phrase(&msg, "this week") {
        let monday = week_start(today);
        (monday, monday + Duration::days(6), "tuần này")
    } else if contains_phrase(&msg, "thang nay") || contains_phrase(&msg, "this month") {
        let first = today.with_day(1)?;
        let next_first = if first.month() == 12 {
            NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)?
        };
        (first, next_first - Duration::days(1), "tháng này")
    } else {
        return None;
    };

    Some((
        start.and_hms_opt(0, 0, 0)?,
        end.and_hms_opt(23, 59, 59)?,
        title.to_string(),
    ))
}

fn week_start(day: NaiveDate) -> NaiveDate {
    day - Duration::days(day.weekday().num_days_from_monday() as i64)
}
