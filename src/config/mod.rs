use serde::Deserialize;

use crate::external;

/// Complete shoplink configuration.
///
/// Secrets never live here — the token-signing secret and the
/// cookie-encryption master key come from the `SHOPLINK_TOKEN_SECRET`
/// and `SHOPLINK_ENCRYPTION_KEY` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct ShoplinkConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub external: ExternalConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Token issuance configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Access token lifetime in minutes
    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: i64,
}

fn default_token_ttl_minutes() -> i64 {
    30
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl_minutes: default_token_ttl_minutes(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String {
    "shoplink.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// External platform endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalConfig {
    #[serde(default = "default_auth_base_url")]
    pub auth_base_url: String,
    #[serde(default = "default_profile_url")]
    pub profile_url: String,
    #[serde(default = "default_ip_echo_url")]
    pub ip_echo_url: String,
}

fn default_auth_base_url() -> String {
    external::AUTH_BASE_URL.to_string()
}

fn default_profile_url() -> String {
    external::PROFILE_URL.to_string()
}

fn default_ip_echo_url() -> String {
    external::IP_ECHO_URL.to_string()
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            auth_base_url: default_auth_base_url(),
            profile_url: default_profile_url(),
            ip_echo_url: default_ip_echo_url(),
        }
    }
}

impl Default for ShoplinkConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            storage: StorageConfig::default(),
            external: ExternalConfig::default(),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<ShoplinkConfig, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let config: ShoplinkConfig = toml::from_str(&contents)?;
    Ok(config)
}
