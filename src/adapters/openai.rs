use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::{clean_reply, ReplyGenerator};
use crate::config::GenerationConfig;
use crate::error::RemoteError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Reply generator backed by OpenAI chat completions
pub struct OpenAiAdapter {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiAdapter {
    pub fn new(api_key: String, config: &GenerationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to create OpenAI HTTP client")?;

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
}

#[async_trait]
impl ReplyGenerator for OpenAiAdapter {
    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn generate(&self, prompt: &str) -> Result<String, RemoteError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!("Sending request to OpenAI API");

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RemoteError::http(status, &error_text));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::Malformed(e.to_string()))?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        let reply = clean_reply(&content)?;

        info!(chars = reply.chars().count(), "OpenAI reply generated");

        Ok(reply)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(base_url: &str) -> OpenAiAdapter {
        let config = GenerationConfig {
            base_url: Some(base_url.to_string()),
            ..Default::default()
        };
        OpenAiAdapter::new("test-key".to_string(), &config).unwrap()
    }

    #[tokio::test]
    async fn test_generate() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": " Спасибо за отзыв! "}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = adapter(&server.uri()).generate("prompt").await.unwrap();
        assert_eq!(reply, "Спасибо за отзыв!");
    }

    #[tokio::test]
    async fn test_generate_http_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = adapter(&server.uri()).generate("prompt").await.unwrap_err();
        assert!(matches!(err, RemoteError::Http { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_generate_empty_choice() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let err = adapter(&server.uri()).generate("prompt").await.unwrap_err();
        assert!(matches!(err, RemoteError::Malformed(_)));
    }

    #[test]
    fn test_model_from_config() {
        let config = GenerationConfig {
            model: Some("gpt-4o".to_string()),
            ..Default::default()
        };
        let adapter = OpenAiAdapter::new("test-key".to_string(), &config).unwrap();
        assert_eq!(adapter.model, "gpt-4o");
        assert_eq!(adapter.provider_name(), "openai");
    }
}
