use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub max_connections: u32,
}

impl AppConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://madrasah.db?mode=rwc".to_string());

        let bind_addr = match env::var("BIND_ADDR") {
            Ok(raw) => raw
                .parse::<SocketAddr>()
                .map_err(|e| AppError::BadRequest(format!("BIND_ADDR is invalid: {}", e)))?,
            Err(_) => SocketAddr::from(([127, 0, 0, 1], 3000)),
        };

        let max_connections = match env::var("DB_MAX_CONNECTIONS") {
            Ok(raw) => raw
                .parse::<u32>()
                .map_err(|e| AppError::BadRequest(format!("DB_MAX_CONNECTIONS is invalid: {}", e)))?,
            Err(_) => 5,
        };

        Ok(Self {
            database_url,
            bind_addr,
            max_connections,
        })
    }
}

const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings for talking to a running instance of the REST API.
#[derive(Clone, Debug)]
pub struct ApiClientConfig {
    pub base_url: String,
    /// Upper bound on a whole request, body included.
    pub timeout: Duration,
}

impl ApiClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_API_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn new_from_env() -> Result<Self, AppError> {
        let base_url = env::var("MADRASAH_API_URL")
            .map_err(|_| AppError::BadRequest("MADRASAH_API_URL is not set".to_string()))?;

        let timeout = match env::var("MADRASAH_API_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs = raw.parse::<u64>().map_err(|e| {
                    AppError::BadRequest(format!("MADRASAH_API_TIMEOUT_SECS is invalid: {}", e))
                })?;
                if secs == 0 {
                    return Err(AppError::BadRequest(
                        "MADRASAH_API_TIMEOUT_SECS must be at least 1".to_string(),
                    ));
                }
                Duration::from_secs(secs)
            }
            Err(_) => DEFAULT_API_TIMEOUT,
        };

        Ok(Self::new(base_url).with_timeout(timeout))
    }
}
