//! Configuration module for the travel backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Default per-file ceiling for receipt uploads (10 MiB).
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Secret used to sign bearer tokens (required for logins to succeed)
    pub jwt_secret: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Directory receipt uploads are written to
    pub upload_dir: PathBuf,
    /// Per-file size ceiling for uploads, in bytes
    pub max_upload_bytes: usize,
    /// OpenWeather API key for destination weather lookups
    pub weather_api_key: Option<String>,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let jwt_secret = env::var("TRAVEL_JWT_SECRET").ok();

        let db_path = env::var("TRAVEL_DB_PATH")
            .unwrap_or_else(|_| "./data/travel.sqlite".to_string())
            .into();

        let upload_dir = env::var("TRAVEL_UPLOAD_DIR")
            .unwrap_or_else(|_| "./uploads".to_string())
            .into();

        let max_upload_bytes = env::var("TRAVEL_MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        let weather_api_key = env::var("TRAVEL_WEATHER_API_KEY").ok();

        let bind_addr = env::var("TRAVEL_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:5000".to_string())
            .parse()
            .expect("Invalid TRAVEL_BIND_ADDR format");

        let log_level = env::var("TRAVEL_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Self {
            jwt_secret,
            db_path,
            upload_dir,
            max_upload_bytes,
            weather_api_key,
            bind_addr,
            log_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        // Clear any existing env vars
        env::remove_var("TRAVEL_JWT_SECRET");
        env::remove_var("TRAVEL_DB_PATH");
        env::remove_var("TRAVEL_UPLOAD_DIR");
        env::remove_var("TRAVEL_MAX_UPLOAD_BYTES");
        env::remove_var("TRAVEL_WEATHER_API_KEY");
        env::remove_var("TRAVEL_BIND_ADDR");
        env::remove_var("TRAVEL_LOG_LEVEL");

        let config = Config::from_env();

        assert!(config.jwt_secret.is_none());
        assert_eq!(config.db_path, PathBuf::from("./data/travel.sqlite"));
        assert_eq!(config.upload_dir, PathBuf::from("./uploads"));
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert!(config.weather_api_key.is_none());
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:5000");
        assert_eq!(config.log_level, "info");
    }
}
