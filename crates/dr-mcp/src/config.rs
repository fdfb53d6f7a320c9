use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use dr_core::{FormatStyle, PromptTemplate};

/// Environment variable holding the bearer credential.
pub const API_KEY_ENV: &str = "DEEPSEEK_API_KEY";
/// Prefix for every other setting, e.g. `DEEP_REASON_MODEL`.
pub const ENV_PREFIX: &str = "DEEP_REASON_";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bearer token for the reasoning endpoint. A missing key is not a
    /// startup error; each call reports it instead.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: Option<f32>,

    /// When false the request carries no temperature at all
    #[serde(default = "default_send_temperature")]
    pub send_temperature: bool,

    #[serde(default)]
    pub prompt_template: PromptTemplate,

    /// Output style: "verbose" or "minimal"
    #[serde(default)]
    pub format: FormatStyle,

    /// Upper bound on a whole call, stream included
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.deepseek.com".to_string()
}

fn default_model() -> String {
    "deepseek-reasoner".to_string()
}

fn default_temperature() -> Option<f32> {
    Some(0.7)
}

fn default_send_temperature() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    600
}

fn default_connect_timeout() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            send_temperature: default_send_temperature(),
            prompt_template: PromptTemplate::default(),
            format: FormatStyle::default(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Read a `.env` file from the working directory (or a parent) into the
/// process environment. Variables that are already set keep their value.
pub fn load_dotenv() -> Option<PathBuf> {
    match dotenvy::dotenv() {
        Ok(path) => {
            debug!(path = %path.display(), "Loaded .env file");
            Some(path)
        }
        Err(e) if e.not_found() => None,
        Err(e) => {
            warn!(error = %e, "Ignoring unreadable .env file");
            None
        }
    }
}

impl Config {
    /// Defaults, then the TOML file, then environment variables.
    pub fn figment(file: &Path) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(file))
            .merge(Env::raw().only(&[API_KEY_ENV]).map(|_| "api_key".into()))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Load from an explicit path (which must exist) or the default location
    /// (which may not).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => {
                if !p.exists() {
                    anyhow::bail!("Config file not found: {}", p.display());
                }
                p.to_path_buf()
            }
            None => Self::config_path()?,
        };

        Self::figment(&file)
            .extract()
            .with_context(|| format!("Failed to load configuration (file: {})", file.display()))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("deep-reason"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Temperature to put on the wire, if any.
    pub fn request_temperature(&self) -> Option<f32> {
        self.temperature.filter(|_| self.send_temperature)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// Copy safe to print: the key is masked.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if let Some(key) = config.api_key.as_mut() {
            let tail: String = key.chars().skip(key.chars().count().saturating_sub(4)).collect();
            *key = format!("****{}", tail);
        }
        config
    }
}
