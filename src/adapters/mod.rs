pub mod claude;
pub mod openai;

pub use claude::ClaudeAdapter;
pub use openai::OpenAiAdapter;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::{GenerationConfig, GenerationProvider};
use crate::error::RemoteError;

/// Text generation: prompt in, reply text out
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, RemoteError>;

    /// Provider name for diagnostics
    fn provider_name(&self) -> &'static str;
}

/// Generator used when no API key is available; every call fails
pub struct DisabledGenerator {
    missing: &'static str,
}

impl DisabledGenerator {
    pub fn new(missing: &'static str) -> Self {
        Self { missing }
    }
}

#[async_trait]
impl ReplyGenerator for DisabledGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, RemoteError> {
        Err(RemoteError::NotConfigured(self.missing))
    }

    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Build the configured generator, reading its API key from the environment
pub fn build_generator(config: &GenerationConfig) -> Result<Arc<dyn ReplyGenerator>> {
    let var = config.api_key_var();
    let api_key = match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            warn!(var, "Generation API key not set; replies cannot be generated");
            return Ok(Arc::new(DisabledGenerator::new(var)));
        }
    };

    let generator: Arc<dyn ReplyGenerator> = match config.provider {
        GenerationProvider::OpenAi => Arc::new(OpenAiAdapter::new(api_key, config)?),
        GenerationProvider::Anthropic => Arc::new(ClaudeAdapter::new(api_key, config)?),
    };

    info!(provider = generator.provider_name(), "Initialized reply generator");

    Ok(generator)
}

/// Strip whitespace and wrapping quotes the model sometimes adds
pub(crate) fn clean_reply(text: &str) -> Result<String, RemoteError> {
    let cleaned = text
        .trim()
        .trim_matches(|c: char| c == '"' || c == '«' || c == '»')
        .trim()
        .to_string();

    if cleaned.is_empty() {
        return Err(RemoteError::Malformed("empty reply text".to_string()));
    }

    Ok(cleaned)
}
