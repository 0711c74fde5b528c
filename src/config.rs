use once_cell::sync::Lazy;
use std::env;

/// Server settings read from the environment (and `.env`) once at startup.
pub static SERVER: Lazy<ServerConfig> = Lazy::new(ServerConfig::from_env);

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Upper bound on request bodies; uploads arrive base64-encoded.
    pub body_limit: usize,
    pub metrics_key: Option<String>,
    pub openapi_key: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(8000),
            body_limit: env::var("REQUEST_MAX_BYTES")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(16 * 1024 * 1024),
            metrics_key: non_empty_var("METRICS_KEY"),
            openapi_key: non_empty_var("OPENAPI_KEY"),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            body_limit: 16 * 1024 * 1024,
            metrics_key: None,
            openapi_key: None,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
