//! Configuration management
//!
//! Configuration is read from `config.yml` (or the path in `ALTA_CONFIG`) and
//! can be overridden with `ALTA_*` environment variables.
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding an alternative config file path
pub const CONFIG_PATH_ENV: &str = "ALTA_CONFIG";

/// Default config file name
pub const DEFAULT_CONFIG_PATH: &str = "config.yml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Upload configuration
    #[serde(default)]
    pub upload: UploadConfig,
    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (for cookie-based auth)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
    /// Directory served under /static
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    /// Take the client IP from X-Forwarded-For / X-Real-IP.
    /// Only enable behind a reverse proxy that overwrites those headers.
    #[serde(default)]
    pub trust_proxy_headers: bool,
    /// Mark the session cookie `Secure` (HTTPS deployments)
    #[serde(default)]
    pub secure_cookies: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
            static_dir: default_static_dir(),
            trust_proxy_headers: false,
            secure_cookies: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_cors_origin() -> String {
    "http://localhost:5000".to_string()
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Maximum pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Seconds to wait for a free connection
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
    /// Seconds before a connection is recycled
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
            max_lifetime_secs: default_max_lifetime(),
        }
    }
}

fn default_database_url() -> String {
    "data/alta_colaboradores.db".to_string()
}

fn default_max_connections() -> u32 {
    30
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_max_lifetime() -> u64 {
    1800
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Cache configuration for dashboard aggregates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    /// Maximum number of cached entries
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            max_capacity: default_max_capacity(),
        }
    }
}

fn default_ttl() -> u64 {
    300
}

fn default_max_capacity() -> u64 {
    10_000
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Upload directory path
    #[serde(default = "default_upload_path")]
    pub path: PathBuf,
    /// Maximum size of a single document in bytes (default: 10MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Maximum size of a whole multipart request in bytes (default: 50MB)
    #[serde(default = "default_max_request_size")]
    pub max_request_size: u64,
    /// Allowed document extensions (lowercase, without dot)
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            path: default_upload_path(),
            max_file_size: default_max_file_size(),
            max_request_size: default_max_request_size(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

fn default_upload_path() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024 // 10MB
}

fn default_max_request_size() -> u64 {
    50 * 1024 * 1024 // 50MB
}

fn default_allowed_extensions() -> Vec<String> {
    ["pdf", "jpg", "jpeg", "png", "doc", "docx", "xls", "xlsx"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl UploadConfig {
    /// Check if a file extension is allowed (case-insensitive)
    pub fn is_extension_allowed(&self, extension: &str) -> bool {
        let extension = extension.to_lowercase();
        self.allowed_extensions.iter().any(|e| *e == extension)
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Session lifetime in days
    #[serde(default = "default_session_expiration_days")]
    pub session_expiration_days: i64,
    /// Failed logins allowed per correo inside the window
    #[serde(default = "default_max_login_attempts")]
    pub max_login_attempts: usize,
    /// Window for failed login attempts, in minutes
    #[serde(default = "default_login_window_minutes")]
    pub login_window_minutes: i64,
    /// Login requests allowed per IP per minute
    #[serde(default = "default_ip_requests_per_minute")]
    pub ip_requests_per_minute: usize,
    /// Correo of the admin created on first start
    #[serde(default = "default_bootstrap_admin_correo")]
    pub bootstrap_admin_correo: String,
    /// Password of the admin created on first start (no admin is created when unset)
    #[serde(default)]
    pub bootstrap_admin_password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_expiration_days: default_session_expiration_days(),
            max_login_attempts: default_max_login_attempts(),
            login_window_minutes: default_login_window_minutes(),
            ip_requests_per_minute: default_ip_requests_per_minute(),
            bootstrap_admin_correo: default_bootstrap_admin_correo(),
            bootstrap_admin_password: None,
        }
    }
}

fn default_session_expiration_days() -> i64 {
    7
}

fn default_max_login_attempts() -> usize {
    5
}

fn default_login_window_minutes() -> i64 {
    15
}

fn default_ip_requests_per_minute() -> usize {
    10
}

fn default_bootstrap_admin_correo() -> String {
    "admin@alta.local".to_string()
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// A missing or empty file yields the default configuration. Invalid YAML
    /// is an error that names the line and column.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern `ALTA_<SECTION>_<KEY>`, e.g.
    /// `ALTA_SERVER_PORT` or `ALTA_DATABASE_URL`.
    pub fn load_with_env(path: &Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config file path from `ALTA_CONFIG`, falling back to `config.yml`
    pub fn default_path() -> PathBuf {
        std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be greater than 0".to_string(),
            ));
        }
        if self.auth.session_expiration_days <= 0 {
            return Err(ConfigError::ValidationError(
                "auth.session_expiration_days must be greater than 0".to_string(),
            ));
        }
        if self.upload.max_file_size > self.upload.max_request_size {
            return Err(ConfigError::ValidationError(
                "upload.max_file_size cannot exceed upload.max_request_size".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        // Server
        if let Ok(host) = std::env::var("ALTA_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("ALTA_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("ALTA_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }
        if let Some(trust) = env_bool("ALTA_SERVER_TRUST_PROXY_HEADERS") {
            self.server.trust_proxy_headers = trust;
        }
        if let Some(secure) = env_bool("ALTA_SERVER_SECURE_COOKIES") {
            self.server.secure_cookies = secure;
        }

        // Database
        if let Ok(driver) = std::env::var("ALTA_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("ALTA_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(max) = std::env::var("ALTA_DATABASE_MAX_CONNECTIONS") {
            if let Ok(max) = max.parse::<u32>() {
                self.database.max_connections = max;
            }
        }

        // Upload
        if let Ok(path) = std::env::var("ALTA_UPLOAD_PATH") {
            self.upload.path = PathBuf::from(path);
        }
        if let Ok(size) = std::env::var("ALTA_UPLOAD_MAX_FILE_SIZE") {
            if let Ok(size) = size.parse::<u64>() {
                self.upload.max_file_size = size;
            }
        }

        // Cache
        if let Ok(ttl) = std::env::var("ALTA_CACHE_TTL_SECONDS") {
            if let Ok(ttl) = ttl.parse::<u64>() {
                self.cache.ttl_seconds = ttl;
            }
        }

        // Auth
        if let Ok(days) = std::env::var("ALTA_AUTH_SESSION_EXPIRATION_DAYS") {
            if let Ok(days) = days.parse::<i64>() {
                self.auth.session_expiration_days = days;
            }
        }
        if let Ok(correo) = std::env::var("ALTA_AUTH_BOOTSTRAP_ADMIN_CORREO") {
            self.auth.bootstrap_admin_correo = correo;
        }
        if let Ok(password) = std::env::var("ALTA_AUTH_BOOTSTRAP_ADMIN_PASSWORD") {
            if !password.is_empty() {
                self.auth.bootstrap_admin_password = Some(password);
            }
        }
    }
}

/// Boolean environment flag; unrecognised values are ignored
fn env_bool(key: &str) -> Option<bool> {
    match std::env::var(key).ok()?.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared by every test that touches ALTA_* variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn valid_config_strategy() -> impl Strategy<Value = Config> {
        (
            prop_oneof![Just("localhost".to_string()), Just("0.0.0.0".to_string())],
            1024u16..65535,
            prop_oneof![Just(DatabaseDriver::Sqlite), Just(DatabaseDriver::Mysql)],
            1u32..100,
            1u64..86_400,
            1i64..60,
        )
            .prop_map(|(host, port, driver, max_connections, ttl, days)| {
                let mut config = Config::default();
                config.server.host = host;
                config.server.port = port;
                config.database.driver = driver;
                config.database.max_connections = max_connections;
                config.cache.ttl_seconds = ttl;
                config.auth.session_expiration_days = days;
                config
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// Writing a config as YAML and loading it back keeps every field
        #[test]
        fn config_survives_yaml_file(config in valid_config_strategy()) {
            let yaml = serde_yaml::to_string(&config).expect("Failed to serialize config");
            let mut file = NamedTempFile::new().expect("Failed to create temp file");
            write!(file, "{}", yaml).expect("Failed to write config");

            let parsed = Config::load(file.path()).expect("Failed to parse config");

            prop_assert_eq!(config.server.host, parsed.server.host);
            prop_assert_eq!(config.server.port, parsed.server.port);
            prop_assert_eq!(config.database.driver, parsed.database.driver);
            prop_assert_eq!(config.database.max_connections, parsed.database.max_connections);
            prop_assert_eq!(config.cache.ttl_seconds, parsed.cache.ttl_seconds);
            prop_assert_eq!(config.auth.session_expiration_days, parsed.auth.session_expiration_days);
        }

        /// Any single section given alone leaves the others at their defaults
        #[test]
        fn single_section_keeps_other_defaults(port in 1024u16..65535) {
            let mut file = NamedTempFile::new().expect("Failed to create temp file");
            write!(file, "server:\n  port: {}\n", port).expect("Failed to write config");

            let config = Config::load(file.path()).expect("Failed to parse config");
            let defaults = Config::default();

            prop_assert_eq!(config.server.port, port);
            prop_assert_eq!(config.database.url, defaults.database.url);
            prop_assert_eq!(config.upload.allowed_extensions, defaults.upload.allowed_extensions);
            prop_assert_eq!(config.auth.max_login_attempts, defaults.auth.max_login_attempts);
        }
    }
}
