use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::Appointment;

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ── Key-value session entries ──

pub fn kv_get(conn: &Connection, key: &str, now: NaiveDateTime) -> anyhow::Result<Option<String>> {
    let now = now.format(TS_FORMAT).to_string();
    let value = conn
        .query_row(
            "SELECT value FROM kv_store WHERE key = ?1 AND expires_at > ?2",
            params![key, now],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(value)
}

pub fn kv_set(
    conn: &Connection,
    key: &str,
    value: &str,
    expires_at: NaiveDateTime,
) -> anyhow::Result<()> {
    let expires_at = expires_at.format(TS_FORMAT).to_string();
    conn.execute(
        "INSERT INTO kv_store (key, value, expires_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET
           value = excluded.value,
           expires_at = excluded.expires_at",
        params![key, value, expires_at],
    )?;
    Ok(())
}

pub fn kv_delete(conn: &Connection, key: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
    Ok(count > 0)
}

pub fn kv_purge_expired(conn: &Connection, now: NaiveDateTime) -> anyhow::Result<usize> {
    let now = now.format(TS_FORMAT).to_string();
    let count = conn.execute("DELETE FROM kv_store WHERE expires_at <= ?1", params![now])?;
    Ok(count)
}

// ── Appointments ──

pub fn insert_appointment(
    conn: &Connection,
    user_id: &str,
    appt: &Appointment,
) -> anyhow::Result<()> {
    let created_at = appt.created_at.format(TS_FORMAT).to_string();
    conn.execute(
        "INSERT INTO appointments (id, user_id, spa_name, service_name, slot_label, slot_iso, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            appt.id,
            user_id,
            appt.spa_name,
            appt.service_name,
            appt.slot_label,
            appt.slot_iso,
            created_at,
        ],
    )?;
    Ok(())
}

pub fn get_appointments_for_user(
    conn: &Connection,
    user_id: &str,
) -> anyhow::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(
        "SELECT id, spa_name, service_name, slot_label, slot_iso, created_at
         FROM appointments WHERE user_id = ?1",
    )?;

    let rows = stmt.query_map(params![user_id], |row| {
        let created_at: String = row.get(5)?;
        Ok(Appointment {
            id: row.get(0)?,
            spa_name: row.get(1)?,
            service_name: row.get(2)?,
            slot_label: row.get(3)?,
            slot_iso: row.get(4)?,
            created_at: NaiveDateTime::parse_from_str(&created_at, TS_FORMAT)
                .unwrap_or_default(),
        })
    })?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row?);
    }
    Ok(appointments)
}
