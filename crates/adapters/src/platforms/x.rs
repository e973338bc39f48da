//! X (Twitter) publish adapter

use async_trait::async_trait;
use draftsmith_domain::{Platform, PublishAdapter, PublishError, PublishReceipt};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{DEFAULT_TIMEOUT_SECS, dry_run_receipt};

/// X API publisher for creating posts
pub struct XPublisher {
    client: Client,
    user_token: Option<SecretString>,
    base_url: String,
}

impl XPublisher {
    pub fn new(user_token: Option<SecretString>) -> Self {
        Self::with_base_url(user_token, "https://api.x.com".to_string())
    }

    pub fn with_base_url(user_token: Option<SecretString>, base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            user_token,
            base_url,
        }
    }
}

#[derive(Serialize)]
struct CreateTweetRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct CreateTweetResponse {
    data: TweetData,
}

#[derive(Deserialize)]
struct TweetData {
    id: String,
}

#[async_trait]
impl PublishAdapter for XPublisher {
    fn platform(&self) -> Platform {
        Platform::X
    }

    async fn publish(&self, text: &str, dry_run: bool) -> Result<PublishReceipt, PublishError> {
        if dry_run {
            return Ok(dry_run_receipt(Platform::X));
        }

        let token = self
            .user_token
            .as_ref()
            .ok_or_else(|| PublishError::Auth("X access token not configured".to_string()))?;

        let response = self
            .client
            .post(format!("{}/2/tweets", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", token.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .json(&CreateTweetRequest { text })
            .send()
            .await
            .map_err(|e| PublishError::Network(e.to_string()))?;

        if response.status() == 401 {
            return Err(PublishError::Auth("invalid user token".to_string()));
        }

        if response.status() == 429 {
            return Err(PublishError::RateLimited);
        }

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Api(format!(
                "failed to create post: {}",
                body
            )));
        }

        let tweet: CreateTweetResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;

        Ok(PublishReceipt {
            url: Some(format!("https://x.com/i/status/{}", tweet.data.id)),
            external_id: tweet.data.id,
            dry_run: false,
        })
    }
}
