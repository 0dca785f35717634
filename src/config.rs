use crate::error::ConfigError;
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Workspace directory - computed from home, not serialized
    #[serde(skip)]
    pub workspace_dir: PathBuf,
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Shared key for the OpenAI-compatible endpoints. The
    /// `PARLEY_API_KEY` environment variable takes precedence.
    pub api_key: Option<String>,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub speech: SpeechConfig,

    #[serde(default)]
    pub retention: RetentionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7611,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    pub base_url: String,
    pub model: String,
    pub default_voice: String,
    pub default_speed: f64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "tts-1".to_string(),
            default_voice: "alloy".to_string(),
            default_speed: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Seconds between timer-driven sweep passes. 0 disables the timer;
    /// the opportunistic write-path sweep always runs.
    pub sweep_interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 3600,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_dir: PathBuf::new(),
            config_path: PathBuf::new(),
            api_key: None,
            gateway: GatewayConfig::default(),
            provider: ProviderConfig::default(),
            speech: SpeechConfig::default(),
            retention: RetentionConfig::default(),
        }
    }
}

impl Config {
    /// Load `~/.parley/config.toml`, writing the defaults on first run.
    pub fn load_or_init() -> Result<Self, ConfigError> {
        let user_dirs = UserDirs::new()
            .ok_or_else(|| ConfigError::Load("cannot locate home directory".to_string()))?;
        Self::load_or_init_at(user_dirs.home_dir().join(".parley"))
    }

    /// Same as [`Config::load_or_init`] with an explicit workspace
    /// directory (tests, containers).
    pub fn load_or_init_at(workspace_dir: PathBuf) -> Result<Self, ConfigError> {
        fs::create_dir_all(&workspace_dir)?;
        let config_path = workspace_dir.join("config.toml");

        let mut config = if config_path.exists() {
            let raw = fs::read_to_string(&config_path)?;
            toml::from_str::<Config>(&raw)
                .map_err(|e| ConfigError::Load(format!("{}: {e}", config_path.display())))?
        } else {
            let config = Config::default();
            let rendered = toml::to_string_pretty(&config)
                .map_err(|e| ConfigError::Load(e.to_string()))?;
            fs::write(&config_path, rendered)?;
            config
        };

        config.workspace_dir = workspace_dir;
        config.config_path = config_path;
        Ok(config)
    }

    pub fn db_path(&self) -> PathBuf {
        self.workspace_dir.join("parley.db")
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.workspace_dir.join("audio")
    }

    /// Environment takes precedence over the config file.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var("PARLEY_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .or_else(|| self.api_key.clone())
    }
}
