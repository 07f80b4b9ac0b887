use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;

use glowdesk::config::AppConfig;
use glowdesk::db;
use glowdesk::handlers;
use glowdesk::models::Catalog;
use glowdesk::services::ai::groq::GroqProvider;
use glowdesk::services::ai::ollama::OllamaProvider;
use glowdesk::services::ai::LlmProvider;
use glowdesk::services::clock::SystemClock;
use glowdesk::services::session::SqliteSessionStore;
use glowdesk::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;
    let db = Arc::new(Mutex::new(conn));
    let clock = Arc::new(SystemClock);

    match SqliteSessionStore::new(db.clone(), clock.clone()).purge_expired() {
        Ok(purged) => tracing::info!(purged, "expired sessions removed"),
        Err(e) => tracing::warn!(error = %e, "failed to purge expired sessions"),
    }

    let llm: Box<dyn LlmProvider> = match config.llm_provider.as_str() {
        "groq" => {
            anyhow::ensure!(!config.groq_api_key.is_empty(), "GROQ_API_KEY must be set when LLM_PROVIDER=groq");
            tracing::info!("using Groq LLM provider (model: {})", config.groq_model);
            Box::new(GroqProvider::new(
                config.groq_api_key.clone(),
                config.groq_model.clone(),
                config.llm_timeout_secs,
            ))
        }
        _ => {
            tracing::info!("using Ollama LLM provider (url: {})", config.ollama_url);
            Box::new(OllamaProvider::new(
                config.ollama_url.clone(),
                config.ollama_model.clone(),
                config.llm_timeout_secs,
            ))
        }
    };

    let catalog = Catalog::load(config.catalog_path.as_deref())?;
    tracing::info!(spas = catalog.spas.len(), fingerprint = %catalog.fingerprint(), "catalog loaded");

    let port = config.port;
    let state = Arc::new(AppState::new(config, llm, db, catalog, clock));
    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
