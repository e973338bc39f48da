//! Threads publish adapter
//!
//! Publishing is a two-step flow against the Threads Graph API: create a
//! media container, then publish it by creation id.

use async_trait::async_trait;
use draftsmith_domain::{Platform, PublishAdapter, PublishError, PublishReceipt};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::{DEFAULT_TIMEOUT_SECS, dry_run_receipt};

/// Threads Graph API publisher
pub struct ThreadsPublisher {
    client: Client,
    user_id: Option<String>,
    access_token: Option<SecretString>,
    base_url: String,
}

impl ThreadsPublisher {
    pub fn new(user_id: Option<String>, access_token: Option<SecretString>) -> Self {
        Self::with_base_url(user_id, access_token, "https://graph.threads.net".to_string())
    }

    pub fn with_base_url(
        user_id: Option<String>,
        access_token: Option<SecretString>,
        base_url: String,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            user_id,
            access_token,
            base_url,
        }
    }
}

#[derive(Deserialize)]
struct IdResponse {
    #[serde(default)]
    id: String,
}

#[async_trait]
impl PublishAdapter for ThreadsPublisher {
    fn platform(&self) -> Platform {
        Platform::Threads
    }

    async fn publish(&self, text: &str, dry_run: bool) -> Result<PublishReceipt, PublishError> {
        if dry_run {
            return Ok(dry_run_receipt(Platform::Threads));
        }

        let user_id = self
            .user_id
            .as_deref()
            .ok_or_else(|| PublishError::Auth("Threads user id not configured".to_string()))?;
        let token = self
            .access_token
            .as_ref()
            .ok_or_else(|| PublishError::Auth("Threads access token not configured".to_string()))?;

        let create_response = self
            .client
            .post(format!("{}/v1.0/{}/threads", self.base_url, user_id))
            .form(&[
                ("media_type", "TEXT"),
                ("text", text),
                ("access_token", token.expose_secret()),
            ])
            .send()
            .await
            .map_err(|e| PublishError::Network(e.to_string()))?;

        if create_response.status() == 401 {
            return Err(PublishError::Auth("invalid access token".to_string()));
        }
        if create_response.status() == 429 {
            return Err(PublishError::RateLimited);
        }
        if !create_response.status().is_success() {
            let status = create_response.status();
            let body = create_response.text().await.unwrap_or_default();
            return Err(PublishError::Api(format!(
                "container create failed {}: {}",
                status, body
            )));
        }

        let creation: IdResponse = create_response
            .json()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;
        if creation.id.is_empty() {
            return Err(PublishError::Api(
                "container create returned no creation id".to_string(),
            ));
        }

        let publish_response = self
            .client
            .post(format!("{}/v1.0/{}/threads_publish", self.base_url, user_id))
            .form(&[
                ("creation_id", creation.id.as_str()),
                ("access_token", token.expose_secret()),
            ])
            .send()
            .await
            .map_err(|e| PublishError::Network(e.to_string()))?;

        if !publish_response.status().is_success() {
            let status = publish_response.status();
            let body = publish_response.text().await.unwrap_or_default();
            return Err(PublishError::Api(format!(
                "publish failed {}: {}",
                status, body
            )));
        }

        let published: IdResponse = publish_response
            .json()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;

        let external_id = if published.id.is_empty() {
            creation.id
        } else {
            published.id
        };

        Ok(PublishReceipt {
            external_id,
            url: None,
            dry_run: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn publisher_for(server: &MockServer) -> ThreadsPublisher {
        ThreadsPublisher::with_base_url(
            Some("4242".to_string()),
            Some(SecretString::new("test-token".into())),
            server.uri(),
        )
    }

    #[tokio::test]
    async fn test_dry_run_receipt() {
        let publisher = ThreadsPublisher::with_base_url(None, None, "http://127.0.0.1:1".into());
        let receipt = publisher.publish("text", true).await.unwrap();
        assert!(receipt.dry_run);
        assert_eq!(receipt.external_id, "dryrun-threads");
    }

    #[tokio::test]
    async fn test_two_step_publish() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1.0/4242/threads"))
            .and(body_string_contains("media_type=TEXT"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "container-1"})),
            )
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1.0/4242/threads_publish"))
            .and(body_string_contains("creation_id=container-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "post-9"})),
            )
            .mount(&mock_server)
            .await;

        let receipt = publisher_for(&mock_server)
            .publish("a threads post", false)
            .await
            .unwrap();
        assert_eq!(receipt.external_id, "post-9");
    }

    #[tokio::test]
    async fn test_missing_creation_id_is_api_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1.0/4242/threads"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&mock_server)
            .await;

        let result = publisher_for(&mock_server).publish("text", false).await;
        assert!(matches!(result, Err(PublishError::Api(_))));
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let publisher = ThreadsPublisher::with_base_url(None, None, "http://127.0.0.1:1".into());
        let result = publisher.publish("text", false).await;
        assert!(matches!(result, Err(PublishError::Auth(_))));
    }
}
