//! Application configuration for ServiceFunnel.
//!
//! User config lives at `~/.servicefunnel/servicefunnel.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, ServiceFunnelError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "servicefunnel.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".servicefunnel";

// ---------------------------------------------------------------------------
// Config structs (matching servicefunnel.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Service dataset location.
    #[serde(default)]
    pub dataset: DatasetConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Settings for clients talking to a running server.
    #[serde(default)]
    pub client: ClientConfig,

    /// Question rephrasing settings.
    #[serde(default)]
    pub rephrase: RephraseConfig,
}

/// `[dataset]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Path to the `.xlsx` or `.csv` service dataset.
    #[serde(default = "default_dataset_path")]
    pub path: String,

    /// Worksheet to read (spreadsheets only). Defaults to the first sheet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: default_dataset_path(),
            sheet: None,
        }
    }
}

fn default_dataset_path() -> String {
    "services.xlsx".into()
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on.
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".into()
}

/// `[client]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of a running funnel server.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_server_url() -> String {
    "http://localhost:5000".into()
}
fn default_timeout_secs() -> u64 {
    10
}

/// `[rephrase]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RephraseConfig {
    /// Whether to ask the text-generation service to reword questions.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Chat model to use.
    #[serde(default = "default_model")]
    pub model: String,

    /// Completion token cap.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// System prompt framing the rewording.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for RephraseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            system_prompt: default_system_prompt(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_max_tokens() -> u32 {
    100
}
fn default_system_prompt() -> String {
    "You are a helpful assistant that guides users through home improvement service options."
        .into()
}

impl ClientConfig {
    /// Parse and validate `server_url`.
    pub fn server_url(&self) -> Result<Url> {
        let url = Url::parse(&self.server_url).map_err(|e| {
            ServiceFunnelError::config(format!("invalid server_url '{}': {e}", self.server_url))
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ServiceFunnelError::config(format!(
                "server_url must be http or https, got '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.servicefunnel/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ServiceFunnelError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.servicefunnel/servicefunnel.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ServiceFunnelError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ServiceFunnelError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ServiceFunnelError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ServiceFunnelError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ServiceFunnelError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the rephrasing API key from the env var named in the config.
pub fn rephrase_api_key(config: &RephraseConfig) -> Result<String> {
    let var_name = &config.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(ServiceFunnelError::config(format!(
            "rephrasing API key not found. Set the {var_name} environment variable."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("services.xlsx"));
        assert!(toml_str.contains("OPENAI_API_KEY"));
        assert!(!toml_str.contains("sheet"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.server.bind, "127.0.0.1:5000");
        assert_eq!(parsed.rephrase.model, "gpt-3.5-turbo");
        assert_eq!(parsed.rephrase.max_tokens, 100);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[dataset]
path = "/srv/funnel/services.csv"
sheet = "Services"

[rephrase]
enabled = false
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.dataset.path, "/srv/funnel/services.csv");
        assert_eq!(config.dataset.sheet.as_deref(), Some("Services"));
        assert!(!config.rephrase.enabled);
        assert_eq!(config.rephrase.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.client.timeout_secs, 10);
    }

    #[test]
    fn server_url_validation() {
        let mut client = ClientConfig::default();
        assert_eq!(
            client.server_url().expect("default url").as_str(),
            "http://localhost:5000/"
        );

        client.server_url = "ftp://example.com".into();
        assert!(client.server_url().is_err());

        client.server_url = "not a url".into();
        assert!(client.server_url().is_err());
    }

    #[test]
    fn api_key_lookup() {
        let config = RephraseConfig {
            // Use a unique env var name to avoid interfering with other tests
            api_key_env: "SF_TEST_NONEXISTENT_KEY_12345".into(),
            ..RephraseConfig::default()
        };
        let result = rephrase_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
