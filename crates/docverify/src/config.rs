//! Configuration for the verification service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Environment variable holding the Gemini API key
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Main service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DocVerifyConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// LLM provider configuration
    pub llm: LlmConfig,
    /// Storage configuration
    pub storage: StorageConfig,
    /// Analysis request limits
    pub analysis: AnalysisConfig,
}

impl DocVerifyConfig {
    /// Load configuration: defaults, then an optional TOML file, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| {
            Error::Config(format!("Invalid config file '{}': {}", path.display(), e))
        })
    }

    /// Apply environment overrides using the given lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.llm.api_key = Some(key);
        }
        if let Some(host) = lookup("DOCVERIFY_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("DOCVERIFY_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| Error::Config(format!("Invalid DOCVERIFY_PORT: {}", port)))?;
        }
        if let Some(db) = lookup("DOCVERIFY_DATABASE") {
            self.storage.database_path = PathBuf::from(db);
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable permissive CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 50MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
            max_upload_size: 50 * 1024 * 1024,
        }
    }
}

/// Gemini configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API key; analysis requests fail with 500 when absent
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// API base URL
    pub base_url: String,
    /// Generation model name
    pub model: String,
    /// Temperature for generation
    pub temperature: f32,
    /// Nucleus sampling
    pub top_p: f32,
    /// Output token cap
    pub max_output_tokens: u32,
    /// Timeout for a single HTTP request in seconds
    pub timeout_secs: u64,
    /// Interval between file state polls in seconds
    pub poll_interval_secs: u64,
    /// Give up waiting for an uploaded file after this many seconds
    pub ready_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.5-flash".to_string(),
            temperature: 0.1,
            top_p: 0.95,
            max_output_tokens: 8192,
            timeout_secs: 120,
            poll_interval_secs: 2,
            ready_timeout_secs: 300,
        }
    }
}

impl LlmConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    /// Whether an API key is available
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file
    pub database_path: PathBuf,
    /// Parent directory for per-request staging directories
    pub staging_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data").join("validations.db"),
            staging_dir: std::env::temp_dir(),
        }
    }
}

/// Limits applied to analysis requests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// User id used when the request carries no `user-id` header
    pub guest_user_id: String,
    /// Maximum files per request
    pub max_files: usize,
    /// Maximum rows returned by the history endpoint
    pub history_limit: usize,
    /// Accepted MIME types
    pub allowed_mime_types: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            guest_user_id: "guest_user".to_string(),
            max_files: 10,
            history_limit: 50,
            allowed_mime_types: [
                "application/pdf",
                "image/png",
                "image/jpeg",
                "image/webp",
                "image/heic",
                "text/plain",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl AnalysisConfig {
    pub fn accepts(&self, mime_type: &str) -> bool {
        self.allowed_mime_types
            .iter()
            .any(|m| m.eq_ignore_ascii_case(mime_type))
    }
}
