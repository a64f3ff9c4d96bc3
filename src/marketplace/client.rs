use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::ReviewCatalog;
use crate::config::MarketplaceConfig;
use crate::error::RemoteError;
use crate::events::EventLog;
use crate::models::{Partition, Product, Review};

const LIST_REVIEWS: &str = "/v1/review/list";
const CREATE_COMMENT: &str = "/v1/review/comment/create";

/// Seller API client for review listing and replies
pub struct MarketplaceClient {
    client: Client,
    base_url: String,
    client_id: String,
    api_key: String,
    events: Arc<EventLog>,
}

#[derive(Debug, Serialize)]
struct ListRequest<'a> {
    status: &'a str,
    limit: usize,
    offset: usize,
    sort_dir: &'a str,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    reviews: Vec<WireReview>,
}

#[derive(Debug, Deserialize)]
struct WireReview {
    id: String,
    #[serde(default)]
    sku: Option<u64>,
    #[serde(default)]
    product_name: Option<String>,
    #[serde(default)]
    text: String,
    rating: u8,
    published_at: DateTime<Utc>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Serialize)]
struct CommentRequest<'a> {
    review_id: &'a str,
    text: &'a str,
    mark_review_as_processed: bool,
}

impl MarketplaceClient {
    /// Create a client; fails when credentials are missing
    pub fn new(config: &MarketplaceConfig, events: Arc<EventLog>) -> Result<Self> {
        let client_id = config
            .client_id
            .clone()
            .filter(|s| !s.is_empty())
            .context("Marketplace client id not set (MARKETPLACE_CLIENT_ID)")?;
        let api_key = config
            .api_key
            .clone()
            .filter(|s| !s.is_empty())
            .context("Marketplace API key not set (MARKETPLACE_API_KEY)")?;

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to create marketplace HTTP client")?;

        info!(base_url = %config.base_url, "Initialized marketplace client");

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_id,
            api_key,
            events,
        })
    }

    async fn post<B, T>(&self, endpoint: &str, body: &B) -> Result<T, RemoteError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body_preview = serde_json::to_string(body).unwrap_or_default();
        self.events
            .request(endpoint, format!("Body: {}", truncate(&body_preview, 100)));

        let result = self.send(endpoint, body).await;

        match &result {
            Ok(_) => self.events.success(endpoint, "OK"),
            Err(e) => {
                warn!(endpoint, error = %e, "Marketplace request failed");
                self.events.error(endpoint, e);
            }
        }

        result
    }

    async fn send<B, T>(&self, endpoint: &str, body: &B) -> Result<T, RemoteError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, endpoint))
            .header("Client-Id", &self.client_id)
            .header("Api-Key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(RemoteError::http(status, &text));
        }

        serde_json::from_str(&text).map_err(|e| RemoteError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl ReviewCatalog for MarketplaceClient {
    #[instrument(skip(self))]
    async fn list_reviews(
        &self,
        partition: Partition,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Review>, RemoteError> {
        let request = ListRequest {
            status: partition.remote_status(),
            limit,
            offset,
            sort_dir: "DESC",
        };

        let response: ListResponse = self.post(LIST_REVIEWS, &request).await?;

        debug!(count = response.reviews.len(), "Fetched review page");

        Ok(response.reviews.into_iter().map(convert_review).collect())
    }

    #[instrument(skip(self, text), fields(len = text.len()))]
    async fn submit_reply(&self, review_id: &str, text: &str) -> Result<(), RemoteError> {
        let request = CommentRequest {
            review_id,
            text,
            mark_review_as_processed: true,
        };

        let _: serde_json::Value = self.post(CREATE_COMMENT, &request).await?;

        debug!("Reply submitted");

        Ok(())
    }
}

fn convert_review(r: WireReview) -> Review {
    let name = match (&r.product_name, r.sku) {
        (Some(name), _) => name.clone(),
        (None, Some(sku)) => format!("SKU {}", sku),
        (None, None) => String::new(),
    };

    Review {
        id: r.id,
        rating: r.rating.clamp(1, 5),
        text: r.text,
        product: Product { name, sku: r.sku },
        published_at: r.published_at,
        answered: r.status.as_deref() == Some("PROCESSED"),
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
