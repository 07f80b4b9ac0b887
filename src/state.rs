use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::models::Catalog;
use crate::services::ai::LlmProvider;
use crate::services::appointments::{AppointmentStore, SqliteAppointmentStore};
use crate::services::clock::Clock;
use crate::services::nlu::similarity;
use crate::services::nlu::{AliasIndex, EntityResolver};
use crate::services::session::{MemorySessionStore, SessionStore, SqliteSessionStore};

pub struct AppState {
    pub config: AppConfig,
    pub llm: Box<dyn LlmProvider>,
    pub sessions: Arc<dyn SessionStore>,
    pub appointments: Arc<dyn AppointmentStore>,
    pub resolver: EntityResolver,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Wires stores and the entity resolver. The alias index is read from the
    /// session store when a copy for this catalog is cached there.
    pub fn new(
        config: AppConfig,
        llm: Box<dyn LlmProvider>,
        db: Arc<Mutex<Connection>>,
        catalog: Catalog,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let sessions: Arc<dyn SessionStore> = match config.session_backend.as_str() {
            "memory" => Arc::new(MemorySessionStore::new(clock.clone())),
            _ => Arc::new(SqliteSessionStore::new(db.clone(), clock.clone())),
        };
        let appointments: Arc<dyn AppointmentStore> = Arc::new(SqliteAppointmentStore::new(db));

        let aliases = AliasIndex::cached(&catalog, sessions.as_ref());
        let resolver = EntityResolver::new(
            Arc::new(catalog),
            aliases,
            similarity::from_config(&config.similarity_backend),
        );

        tracing::info!(
            sessions = config.session_backend.as_str(),
            spas = resolver.catalog().spas.len(),
            "application state ready"
        );

        Self {
            config,
            llm,
            sessions,
            appointments,
            resolver,
            clock,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        self.resolver.catalog()
    }
}
