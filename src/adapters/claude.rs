use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::{clean_reply, ReplyGenerator};
use crate::config::GenerationConfig;
use crate::error::RemoteError;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Reply generator backed by the Anthropic messages API
pub struct ClaudeAdapter {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<AnthropicMessage>,
    system: String,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

impl ClaudeAdapter {
    pub fn new(api_key: String, config: &GenerationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to create Anthropic HTTP client")?;

        Ok(Self {
            client,
            api_key,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn build_system_prompt(&self) -> String {
        "You write short, polite replies to marketplace customer reviews on behalf of the seller. \
         Reply with the text of the answer only."
            .to_string()
    }
}

#[async_trait]
impl ReplyGenerator for ClaudeAdapter {
    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn generate(&self, prompt: &str) -> Result<String, RemoteError> {
        let request = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            system: self.build_system_prompt(),
        };

        debug!("Sending request to Anthropic API");

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RemoteError::http(status, &error_text));
        }

        let anthropic_response: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Malformed(e.to_string()))?;

        let content: String = anthropic_response
            .content
            .iter()
            .map(|c| c.text.as_str())
            .collect();

        let reply = clean_reply(&content)?;

        info!(chars = reply.chars().count(), "Claude reply generated");

        Ok(reply)
    }

    fn provider_name(&self) -> &'static str {
        "anthropic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(base_url: &str) -> ClaudeAdapter {
        let config = GenerationConfig {
            base_url: Some(base_url.to_string()),
            ..Default::default()
        };
        ClaudeAdapter::new("test-key".to_string(), &config).unwrap()
    }

    #[tokio::test]
    async fn test_generate() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", "2023-06-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "Благодарим за покупку!"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = adapter(&server.uri()).generate("prompt").await.unwrap();
        assert_eq!(reply, "Благодарим за покупку!");
    }

    #[tokio::test]
    async fn test_generate_unauthorized() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid x-api-key"))
            .mount(&server)
            .await;

        let err = adapter(&server.uri()).generate("prompt").await.unwrap_err();
        assert!(matches!(err, RemoteError::Http { status: 401, .. }));
    }

    #[test]
    fn test_model_from_config() {
        let config = GenerationConfig {
            model: Some("claude-opus-4".to_string()),
            ..Default::default()
        };
        let adapter = ClaudeAdapter::new("test-key".to_string(), &config).unwrap();
        assert_eq!(adapter.model, "claude-opus-4");
        assert_eq!(adapter.provider_name(), "anthropic");
    }
}
