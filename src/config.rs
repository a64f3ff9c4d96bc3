use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::Rule;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub marketplace: MarketplaceConfig,
    pub collector: CollectorConfig,
    pub batch: BatchConfig,
    pub generation: GenerationConfig,
    pub events: EventsConfig,
    pub knowledge_base: Vec<Rule>,
    pub notifications: NotificationsConfig,
}

/// Marketplace seller API connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketplaceConfig {
    pub base_url: String,
    pub client_id: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api-seller.ozon.ru".to_string(),
            client_id: None,
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl MarketplaceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Review listing pagination
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub page_size: usize,
    /// Hard ceiling on pages fetched per partition
    pub max_pages: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_pages: 10,
        }
    }
}

/// Batch run defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub max_items: usize,
    pub inter_item_delay_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_items: 20,
            inter_item_delay_ms: 3000,
        }
    }
}

impl BatchConfig {
    pub fn inter_item_delay(&self) -> Duration {
        Duration::from_millis(self.inter_item_delay_ms)
    }
}

/// Text-generation provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProvider {
    #[default]
    OpenAi,
    Anthropic,
}

/// Text-generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub provider: GenerationProvider,
    /// Model name; provider default when absent
    pub model: Option<String>,
    /// API base URL; provider default when absent
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub reply_language: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: GenerationProvider::OpenAi,
            model: None,
            base_url: None,
            temperature: 0.7,
            max_tokens: 300,
            timeout_secs: 60,
            reply_language: "Russian".to_string(),
        }
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Environment variable holding the provider's API key
    pub fn api_key_var(&self) -> &'static str {
        match self.provider {
            GenerationProvider::OpenAi => "OPENAI_API_KEY",
            GenerationProvider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

/// Diagnostic event log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { capacity: 300 }
    }
}

/// Notifications configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NotificationsConfig {
    pub slack: SlackConfig,
}

/// Slack notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    pub enabled: bool,
    pub webhook_url: Option<String>,
    pub channel: Option<String>,
    pub on_complete: bool,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_url: None,
            channel: None,
            on_complete: true,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        info!(path = %path.display(), "Loaded configuration");

        Ok(config)
    }

    /// Load configuration from the default location (.review-responder/config.yml)
    pub fn load_default() -> Result<Self> {
        Self::load(".review-responder/config.yml")
    }

    /// Fill marketplace credentials from the environment when set
    pub fn with_env_credentials(mut self) -> Self {
        if let Ok(id) = std::env::var("MARKETPLACE_CLIENT_ID") {
            self.marketplace.client_id = Some(id);
        }
        if let Ok(key) = std::env::var("MARKETPLACE_API_KEY") {
            self.marketplace.api_key = Some(key);
        }
        self
    }
}
