/// Configuration management for blog-service
///
/// All settings come from environment variables (optionally seeded from a `.env`
/// file by `main`).
use serde::{Deserialize, Serialize};

const DEV_JWT_SECRET: &str = "development-only-secret-change-me-0000";
const MIN_JWT_SECRET_LEN: usize = 32;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// CORS configuration
    pub cors: CorsConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Bearer token validation
    pub auth: AuthConfig,
    /// Feed pagination
    pub feed: FeedConfig,
    /// Uploaded image storage
    pub media: MediaConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (development, staging, production)
    pub env: String,
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.env.eq_ignore_ascii_case("production")
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Comma-separated list of allowed origins
    pub allowed_origins: String,
}

/// Which repository implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret shared with the identity provider
    pub jwt_secret: String,
    /// Where the page surface sends anonymous users
    pub login_url: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("login_url", &self.login_url)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeedConfig {
    pub page_size: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self { page_size: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    pub root: String,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let production = app_env.eq_ignore_ascii_case("production");

        Ok(Config {
            app: AppConfig {
                env: app_env.clone(),
                host: std::env::var("BLOG_SERVICE_HOST")
                    .unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or_default("BLOG_SERVICE_PORT", 8080)?,
            },
            cors: {
                let allowed_origins = match std::env::var("CORS_ALLOWED_ORIGINS") {
                    Ok(value) => value,
                    Err(_) if production => {
                        return Err("CORS_ALLOWED_ORIGINS must be set in production".to_string())
                    }
                    Err(_) => "http://localhost:3000".to_string(),
                };

                if production && allowed_origins.trim() == "*" {
                    return Err("CORS_ALLOWED_ORIGINS cannot be '*' in production".to_string());
                }

                CorsConfig { allowed_origins }
            },
            database: DatabaseConfig {
                backend: parse_backend(
                    &std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "postgres".to_string()),
                )?,
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgres://localhost/blog".to_string()),
                max_connections: parse_env_or_default("DATABASE_MAX_CONNECTIONS", 10)?,
                min_connections: parse_env_or_default("DATABASE_MIN_CONNECTIONS", 1)?,
                acquire_timeout_secs: parse_env_or_default("DATABASE_ACQUIRE_TIMEOUT_SECS", 10)?,
            },
            auth: {
                let jwt_secret = match std::env::var("JWT_SECRET") {
                    Ok(secret) => secret,
                    Err(_) if production => {
                        return Err("JWT_SECRET must be set in production".to_string())
                    }
                    Err(_) => DEV_JWT_SECRET.to_string(),
                };
                if jwt_secret.len() < MIN_JWT_SECRET_LEN {
                    return Err(format!(
                        "JWT_SECRET too short: need at least {} bytes",
                        MIN_JWT_SECRET_LEN
                    ));
                }

                AuthConfig {
                    jwt_secret,
                    login_url: std::env::var("LOGIN_URL")
                        .unwrap_or_else(|_| "/auth/login/".to_string()),
                }
            },
            feed: FeedConfig {
                page_size: {
                    let size: usize = parse_env_or_default("FEED_PAGE_SIZE", 10)?;
                    if size == 0 {
                        return Err("FEED_PAGE_SIZE must be positive".to_string());
                    }
                    size
                },
            },
            media: MediaConfig {
                root: std::env::var("MEDIA_ROOT").unwrap_or_else(|_| "./media".to_string()),
                max_upload_bytes: parse_env_or_default("MEDIA_MAX_UPLOAD_BYTES", 5 * 1024 * 1024)?,
            },
        })
    }
}

fn parse_backend(raw: &str) -> Result<StorageBackend, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
        "memory" => Ok(StorageBackend::Memory),
        other => Err(format!(
            "STORAGE_BACKEND must be 'postgres' or 'memory', got '{}'",
            other
        )),
    }
}

fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .trim()
            .parse()
            .map_err(|e| format!("Failed to parse {}='{}': {}", key, val, e)),
        Err(_) => Ok(default),
    }
}
