use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SlackConfig;
use crate::models::{RunSummary, TerminationReason};
use crate::orchestrator::render_summary;

/// Notification service for run outcomes
pub struct NotificationService {
    client: Client,
    slack: Option<SlackNotifier>,
}

impl NotificationService {
    pub fn new(slack_config: &SlackConfig) -> Self {
        let slack = if slack_config.enabled && slack_config.on_complete {
            slack_config
                .webhook_url
                .as_ref()
                .map(|url| SlackNotifier::new(url.clone(), slack_config.channel.clone()))
        } else {
            None
        };

        Self {
            client: Client::new(),
            slack,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.slack.is_some()
    }

    /// Send the final summary of a batch run
    pub async fn notify_run_complete(&self, summary: &RunSummary) -> Result<()> {
        if let Some(ref slack) = self.slack {
            slack.notify_run_complete(&self.client, summary).await?;
        }
        Ok(())
    }
}

/// Slack webhook notifier
struct SlackNotifier {
    webhook_url: String,
    channel: Option<String>,
}

#[derive(Serialize)]
struct SlackMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<String>,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    blocks: Option<Vec<SlackBlock>>,
}

#[derive(Serialize)]
struct SlackBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<SlackText>,
}

#[derive(Serialize)]
struct SlackText {
    #[serde(rename = "type")]
    text_type: String,
    text: String,
}

impl SlackBlock {
    fn section(text: String) -> Self {
        Self {
            block_type: "section".to_string(),
            text: Some(SlackText {
                text_type: "mrkdwn".to_string(),
                text,
            }),
        }
    }
}

impl SlackNotifier {
    fn new(webhook_url: String, channel: Option<String>) -> Self {
        Self {
            webhook_url,
            channel,
        }
    }

    async fn send(&self, client: &Client, message: SlackMessage) -> Result<()> {
        debug!("Sending Slack notification");

        let response = client
            .post(&self.webhook_url)
            .json(&message)
            .send()
            .await
            .context("Failed to send Slack notification")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Slack notification failed");
            anyhow::bail!("Slack webhook returned error: {} - {}", status, body);
        }

        info!("Slack notification sent");
        Ok(())
    }

    async fn notify_run_complete(&self, client: &Client, summary: &RunSummary) -> Result<()> {
        let headline = match summary.termination {
            TerminationReason::Cancelled => "Review reply run cancelled",
            TerminationReason::Cap => "Review reply run reached its item cap",
            TerminationReason::Exhausted => "Review reply run finished",
        };

        let mut blocks = vec![
            SlackBlock::section(format!("*{}*", headline)),
            SlackBlock::section(render_summary(summary)),
        ];

        if summary.failed > 0 {
            blocks.push(SlackBlock::section(format!(
                "{} replies failed and will be retried on the next run.",
                summary.failed
            )));
        }

        let message = SlackMessage {
            channel: self.channel.clone(),
            text: format!("{}: {}", headline, render_summary(summary)),
            blocks: Some(blocks),
        };

        self.send(client, message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn summary() -> RunSummary {
        RunSummary {
            candidates: 3,
            submitted: 2,
            failed: 1,
            skipped: 0,
            termination: TerminationReason::Exhausted,
            cancelled_at: None,
        }
    }

    #[test]
    fn test_notification_service_disabled() {
        let config = SlackConfig {
            enabled: false,
            ..Default::default()
        };

        let service = NotificationService::new(&config);
        assert!(!service.is_enabled());
    }

    #[test]
    fn test_notification_service_enabled() {
        let config = SlackConfig {
            enabled: true,
            webhook_url: Some("https://hooks.slack.com/test".to_string()),
            channel: Some("#reviews".to_string()),
            on_complete: true,
        };

        let service = NotificationService::new(&config);
        assert!(service.is_enabled());
    }

    #[tokio::test]
    async fn test_notify_run_complete() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_partial_json(json!({
                "channel": "#reviews",
                "text": "Review reply run finished: Submitted 2, failed 1, skipped 0 of 3 candidates"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let config = SlackConfig {
            enabled: true,
            webhook_url: Some(format!("{}/hook", server.uri())),
            channel: Some("#reviews".to_string()),
            on_complete: true,
        };

        NotificationService::new(&config)
            .notify_run_complete(&summary())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_notify_webhook_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let config = SlackConfig {
            enabled: true,
            webhook_url: Some(server.uri()),
            channel: None,
            on_complete: true,
        };

        let result = NotificationService::new(&config)
            .notify_run_complete(&summary())
            .await;
        assert!(result.is_err());
    }
}
