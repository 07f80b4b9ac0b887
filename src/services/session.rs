//! Keyed session storage with per-key TTL.
//!
//! Everything the assistant remembers between turns (booking context,
//! conversation history, last presented spa list, cached alias index) goes
//! through [`SessionStore`]. Read-modify-write cycles are not locked: two
//! concurrent turns for the same user can overwrite each other, and callers are
//! expected to serialize a user's messages.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::db::queries;
use crate::services::clock::Clock;

pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<Value>>;
    fn set(&self, key: &str, value: Value, ttl: Duration) -> anyhow::Result<()>;
    fn delete(&self, key: &str) -> anyhow::Result<()>;
}

pub fn booking_key(user_id: &str) -> String {
    format!("booking:{user_id}")
}

pub fn chat_key(user_id: &str) -> String {
    format!("chat:{user_id}")
}

pub fn last_spa_list_key(conversation_key: &str) -> String {
    format!("{conversation_key}:last_spa_list")
}

pub fn last_spa_focus_key(conversation_key: &str) -> String {
    format!("{conversation_key}:last_spa_focus")
}

pub fn last_context_key(conversation_key: &str) -> String {
    format!("{conversation_key}:last_context")
}

/// Reads and decodes a JSON value. A value that no longer matches `T` is
/// treated as absent.
pub fn get_json<T: DeserializeOwned>(store: &dyn SessionStore, key: &str) -> anyhow::Result<Option<T>> {
    let Some(value) = store.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_value(value) {
        Ok(v) => Ok(Some(v)),
        Err(e) => {
            tracing::warn!(key, error = %e, "discarding undecodable session value");
            Ok(None)
        }
    }
}

pub fn set_json<T: Serialize>(
    store: &dyn SessionStore,
    key: &str,
    value: &T,
    ttl: Duration,
) -> anyhow::Result<()> {
    store.set(key, serde_json::to_value(value)?, ttl)
}

// ── In-memory ──

pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, (Value, NaiveDateTime)>>,
    clock: Arc<dyn Clock>,
}

impl MemorySessionStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        let now = self.clock.now();
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("session store lock poisoned"))?;
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > now => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Writes `key` and sweeps out every entry that has already expired.
    fn set(&self, key: &str, value: Value, ttl: Duration) -> anyhow::Result<()> {
        let now = self.clock.now();
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("session store lock poisoned"))?;
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        entries.insert(key.to_string(), (value, now + ttl));
        Ok(())
    }

    fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.entries
            .lock()
            .map_err(|_| anyhow!("session store lock poisoned"))?
            .remove(key);
        Ok(())
    }
}

// ── SQLite ──

pub struct SqliteSessionStore {
    db: Arc<Mutex<Connection>>,
    clock: Arc<dyn Clock>,
}

impl SqliteSessionStore {
    pub fn new(db: Arc<Mutex<Connection>>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub fn purge_expired(&self) -> anyhow::Result<usize> {
        let db = self.db.lock().map_err(|_| anyhow!("database lock poisoned"))?;
        queries::kv_purge_expired(&db, self.clock.now())
    }
}

impl SessionStore for SqliteSessionStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        let raw = {
            let db = self.db.lock().map_err(|_| anyhow!("database lock poisoned"))?;
            queries::kv_get(&db, key, self.clock.now())?
        };
        Ok(raw.and_then(|s| serde_json::from_str(&s).ok()))
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) -> anyhow::Result<()> {
        let raw = serde_json::to_string(&value)?;
        let db = self.db.lock().map_err(|_| anyhow!("database lock poisoned"))?;
        queries::kv_set(&db, key, &raw, self.clock.now() + ttl)
    }

    fn delete(&self, key: &str) -> anyhow::Result<()> {
        let db = self.db.lock().map_err(|_| anyhow!("database lock poisoned"))?;
        queries::kv_delete(&db, key)?;
        Ok(())
    }
}
