use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub llm_provider: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub groq_api_key: String,
    pub groq_model: String,
    pub llm_timeout_secs: u64,
    pub catalog_path: Option<String>,
    pub session_backend: String,
    pub booking_ttl_secs: u64,
    pub history_ttl_secs: u64,
    pub history_window: usize,
    pub similarity_backend: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "glowdesk.db".to_string()),
            llm_provider: env::var("LLM_PROVIDER").unwrap_or_else(|_| "ollama".to_string()),
            ollama_url: env::var("OLLAMA_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            ollama_model: env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2".to_string()),
            groq_api_key: env::var("GROQ_API_KEY").unwrap_or_default(),
            groq_model: env::var("GROQ_MODEL")
                .unwrap_or_else(|_| "llama-3.3-70b-versatile".to_string()),
            llm_timeout_secs: parse_or("LLM_TIMEOUT_SECS", 20),
            catalog_path: env::var("CATALOG_PATH").ok().filter(|p| !p.is_empty()),
            session_backend: env::var("SESSION_BACKEND").unwrap_or_else(|_| "sqlite".to_string()),
            booking_ttl_secs: parse_or("BOOKING_TTL_SECS", 1800),
            history_ttl_secs: parse_or("HISTORY_TTL_SECS", 86_400),
            history_window: parse_or("HISTORY_WINDOW", 20),
            similarity_backend: env::var("SIMILARITY_BACKEND")
                .unwrap_or_else(|_| "token_set".to_string()),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            database_url: ":memory:".to_string(),
            llm_provider: "ollama".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
            ollama_model: "llama3.2".to_string(),
            groq_api_key: String::new(),
            groq_model: "llama-3.3-70b-versatile".to_string(),
            llm_timeout_secs: 20,
            catalog_path: None,
            session_backend: "memory".to_string(),
            booking_ttl_secs: 1800,
            history_ttl_secs: 86_400,
            history_window: 20,
            similarity_backend: "token_set".to_string(),
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
