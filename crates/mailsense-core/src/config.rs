//! Configuration management for Mailsense

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Google OAuth settings
    #[serde(default)]
    pub oauth: OAuthConfig,

    /// Credential storage settings
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Classification service settings
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Retrieval pipeline settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            oauth: OAuthConfig::default(),
            credentials: CredentialsConfig::default(),
            classifier: ClassifierConfig::default(),
            pipeline: PipelineConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log file path
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_file: default_log_file(),
        }
    }
}

/// Google OAuth settings.
///
/// Secrets are usually supplied through the environment rather than the
/// config file; `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET` and
/// `GOOGLE_REDIRECT_URI` take precedence over file values when set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// OAuth client ID
    #[serde(default)]
    pub client_id: String,

    /// OAuth client secret
    #[serde(default)]
    pub client_secret: String,

    /// Redirect URI registered for the OAuth callback
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: default_redirect_uri(),
        }
    }
}

/// Credential storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Path of the persisted credential record
    #[serde(default = "default_credentials_path")]
    pub path: PathBuf,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            path: default_credentials_path(),
        }
    }
}

/// Classification service settings.
///
/// `OPENAI_API_KEY` takes precedence over the file value when set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// API key for the classification service
    #[serde(default)]
    pub api_key: String,

    /// Chat model used for classification and drafting
    #[serde(default = "default_classifier_model")]
    pub model: String,

    /// Base URL of the chat completions API
    #[serde(default = "default_classifier_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_classifier_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_classifier_model(),
            base_url: default_classifier_base_url(),
            request_timeout_secs: default_classifier_timeout_secs(),
        }
    }
}

/// Retrieval pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Max in-flight enrich/classify tasks per batch
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Default result cap for inbox listing
    #[serde(default = "default_list_max_results")]
    pub list_max_results: u32,

    /// Default result cap for conversation grouping
    #[serde(default = "default_conversation_max_results")]
    pub conversation_max_results: u32,

    /// Result cap for the subscription scan
    #[serde(default = "default_subscription_max_results")]
    pub subscription_max_results: u32,

    /// Global rate limit toward the mailbox provider (requests per second)
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_second: u32,

    /// Retries for transient provider failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
            list_max_results: default_list_max_results(),
            conversation_max_results: default_conversation_max_results(),
            subscription_max_results: default_subscription_max_results(),
            rate_limit_per_second: default_rate_limit(),
            max_retries: default_max_retries(),
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed browser origin, also the redirect target after the OAuth
    /// callback completes
    #[serde(default = "default_frontend_origin")]
    pub frontend_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            frontend_origin: default_frontend_origin(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> PathBuf {
    get_config_dir().join("logs").join("mailsense.log")
}

fn default_redirect_uri() -> String {
    "http://localhost:5000/auth/google/callback".to_string()
}

fn default_credentials_path() -> PathBuf {
    get_config_dir().join("credentials.json")
}

fn default_classifier_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_classifier_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_classifier_timeout_secs() -> u64 {
    15
}

fn default_max_in_flight() -> usize {
    8
}

fn default_list_max_results() -> u32 {
    10
}

fn default_conversation_max_results() -> u32 {
    30
}

fn default_subscription_max_results() -> u32 {
    50
}

fn default_rate_limit() -> u32 {
    10
}

fn default_max_retries() -> u32 {
    3
}

fn default_port() -> u16 {
    5000
}

fn default_frontend_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Get the config directory (~/.mailsense)
pub fn get_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mailsense")
}

impl Config {
    /// Load configuration from the default path with environment overrides
    pub fn load() -> Result<Self> {
        let config_path = get_config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&contents)?;
            info!("Loaded configuration from {:?}", path);
            Ok(config)
        } else {
            info!("No config file found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, contents)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Overlay secrets and origin settings from the environment
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("GOOGLE_CLIENT_ID") {
            self.oauth.client_id = v;
        }
        if let Ok(v) = std::env::var("GOOGLE_CLIENT_SECRET") {
            self.oauth.client_secret = v;
        }
        if let Ok(v) = std::env::var("GOOGLE_REDIRECT_URI") {
            self.oauth.redirect_uri = v;
        }
        if let Ok(v) = std::env::var("OPENAI_API_KEY") {
            self.classifier.api_key = v;
        }
        if let Ok(v) = std::env::var("FRONTEND_URL") {
            self.server.frontend_origin = v;
        }
    }

    /// Validate that the settings needed for the OAuth flow are present
    pub fn validate_oauth(&self) -> Result<()> {
        if self.oauth.client_id.is_empty() {
            return Err(Error::Config("oauth.client_id is not set".to_string()));
        }
        if self.oauth.client_secret.is_empty() {
            return Err(Error::Config("oauth.client_secret is not set".to_string()));
        }
        Ok(())
    }
}
