//! Dashboard configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `FOLIO_API_BASE_URL` - Base URL of the CMS backend (e.g. `http://localhost:8080/api`)
//!
//! ## Optional
//! - `FOLIO_HOST` - Bind address (default: 127.0.0.1)
//! - `FOLIO_PORT` - Listen port (default: 3002)
//! - `FOLIO_BASE_URL` - Public URL of the dashboard; `https://` enables secure cookies
//!   (default: `http://localhost:3002`)
//! - `FOLIO_SESSION_FILE` - Where the session is persisted (default: `.folio/auth-storage.json`)
//! - `FOLIO_PRIVILEGED_ROLE` - Role required for the dashboard (default: ADMIN)
//! - `FOLIO_REQUEST_TIMEOUT_SECS` - Backend request timeout (default: 30)
//! - `FOLIO_LOG_FORMAT` - `json` for structured logs, anything else for text
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Traces sample rate (default: 1.0)

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use folio_core::Role;
use thiserror::Error;
use url::Url;

const DEFAULT_PORT: u16 = 3002;
const DEFAULT_SESSION_FILE: &str = ".folio/auth-storage.json";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Dashboard configuration.
#[derive(Debug, Clone)]
pub struct FolioConfig {
    /// Base URL of the CMS backend
    pub api_base_url: Url,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the dashboard
    pub base_url: String,
    /// Session persistence file
    pub session_file: PathBuf,
    /// Role a user must hold to use the dashboard
    pub privileged_role: String,
    /// Timeout for each backend request
    pub request_timeout: Duration,
    /// Emit JSON logs instead of text
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

impl FolioConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_base_url = parse_api_base_url(&get_required_env("FOLIO_API_BASE_URL")?)
            .map_err(|e| ConfigError::InvalidEnvVar("FOLIO_API_BASE_URL".to_string(), e))?;
        let host = get_env_or_default("FOLIO_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("FOLIO_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("FOLIO_PORT", &DEFAULT_PORT.to_string())
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("FOLIO_PORT".to_string(), e.to_string()))?;
        let base_url =
            get_env_or_default("FOLIO_BASE_URL", &format!("http://localhost:{port}"));
        let session_file = PathBuf::from(get_env_or_default("FOLIO_SESSION_FILE", DEFAULT_SESSION_FILE));
        let privileged_role = get_env_or_default("FOLIO_PRIVILEGED_ROLE", Role::DEFAULT_PRIVILEGED);
        let timeout_secs = get_env_or_default(
            "FOLIO_REQUEST_TIMEOUT_SECS",
            &DEFAULT_REQUEST_TIMEOUT_SECS.to_string(),
        )
        .parse::<u64>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("FOLIO_REQUEST_TIMEOUT_SECS".to_string(), e.to_string())
        })?;
        let log_json = get_optional_env("FOLIO_LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json"));
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            api_base_url,
            host,
            port,
            base_url,
            session_file,
            privileged_role,
            request_timeout: Duration::from_secs(timeout_secs),
            log_json,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Defaults for everything but the backend URL. Used by tests and
    /// embedders that do not read the environment.
    #[must_use]
    pub fn with_api_base_url(api_base_url: Url) -> Self {
        Self {
            api_base_url,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            base_url: format!("http://localhost:{DEFAULT_PORT}"),
            session_file: PathBuf::from(DEFAULT_SESSION_FILE),
            privileged_role: Role::DEFAULT_PRIVILEGED.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            log_json: false,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 1.0,
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Cookies are `Secure` only when the dashboard is served over HTTPS.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

/// Parse and check the backend base URL.
fn parse_api_base_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme '{other}'")),
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err("must not contain a query or fragment".to_string());
    }
    Ok(url)
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_api_base_url() {
        let url = parse_api_base_url(" http://localhost:8080/api ").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api");
        assert!(parse_api_base_url("https://cms.example.com").is_ok());
        assert!(parse_api_base_url("ftp://cms.example.com").is_err());
        assert!(parse_api_base_url("http://cms.example.com/?x=1").is_err());
        assert!(parse_api_base_url("not a url").is_err());
    }

    #[test]
    fn test_defaults() {
        let config = FolioConfig::with_api_base_url(Url::parse("http://localhost:8080").unwrap());
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3002");
        assert_eq!(config.privileged_role, "ADMIN");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(!config.secure_cookies());
    }

    #[test]
    fn test_secure_cookies_follow_scheme() {
        let mut config = FolioConfig::with_api_base_url(Url::parse("http://localhost:8080").unwrap());
        config.base_url = "https://admin.example.com".to_string();
        assert!(config.secure_cookies());
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingEnvVar("FOLIO_API_BASE_URL".to_string());
        assert_eq!(
            err.to_string(),
            "Missing environment variable: FOLIO_API_BASE_URL"
        );
    }
}
