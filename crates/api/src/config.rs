/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, from the comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds. A full sync pass can take minutes,
    /// so the default is generous.
    pub request_timeout_secs: u64,
    /// Bearer token required by the sync endpoints. When unset every sync
    /// request is rejected.
    pub sync_trigger_token: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:8081`    |
    /// | `REQUEST_TIMEOUT_SECS` | `600`                      |
    /// | `SYNC_TRIGGER_TOKEN`   | unset (sync disabled)      |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:8081".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "600".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let sync_trigger_token = std::env::var("SYNC_TRIGGER_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        if sync_trigger_token.is_none() {
            tracing::warn!("SYNC_TRIGGER_TOKEN is not set; sync endpoints will refuse all requests");
        }

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            sync_trigger_token,
        }
    }
}
