//! LinkedIn publish adapter
//!
//! Posts UGC shares. The author URN comes from configuration when provided;
//! otherwise it is resolved from the `/v2/userinfo` endpoint once per publish.

use async_trait::async_trait;
use draftsmith_domain::{Platform, PublishAdapter, PublishError, PublishReceipt};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{DEFAULT_TIMEOUT_SECS, dry_run_receipt};

/// LinkedIn UGC publisher
pub struct LinkedinPublisher {
    client: Client,
    access_token: Option<SecretString>,
    person_urn: Option<String>,
    base_url: String,
}

impl LinkedinPublisher {
    pub fn new(access_token: Option<SecretString>, person_urn: Option<String>) -> Self {
        Self::with_base_url(access_token, person_urn, "https://api.linkedin.com".to_string())
    }

    pub fn with_base_url(
        access_token: Option<SecretString>,
        person_urn: Option<String>,
        base_url: String,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            access_token,
            person_urn: person_urn.as_deref().and_then(normalize_person_urn),
            base_url,
        }
    }

    async fn resolve_author_urn(&self, token: &SecretString) -> Result<String, PublishError> {
        if let Some(urn) = &self.person_urn {
            return Ok(urn.clone());
        }

        let response = self
            .client
            .get(format!("{}/v2/userinfo", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", token.expose_secret()),
            )
            .send()
            .await
            .map_err(|e| PublishError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PublishError::Auth(format!(
                "could not resolve member id (userinfo returned {})",
                response.status()
            )));
        }

        #[derive(Deserialize)]
        struct UserInfo {
            #[serde(default)]
            sub: String,
        }

        let info: UserInfo = response
            .json()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;

        normalize_person_urn(&info.sub).ok_or_else(|| {
            PublishError::Auth("userinfo returned no member id".to_string())
        })
    }
}

fn normalize_person_urn(value: &str) -> Option<String> {
    let raw = value.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.starts_with("urn:li:person:") {
        Some(raw.to_string())
    } else {
        Some(format!("urn:li:person:{}", raw))
    }
}

#[derive(Deserialize)]
struct UgcPostResponse {
    #[serde(default)]
    id: String,
}

#[async_trait]
impl PublishAdapter for LinkedinPublisher {
    fn platform(&self) -> Platform {
        Platform::Linkedin
    }

    async fn publish(&self, text: &str, dry_run: bool) -> Result<PublishReceipt, PublishError> {
        if dry_run {
            return Ok(dry_run_receipt(Platform::Linkedin));
        }

        let token = self.access_token.as_ref().ok_or_else(|| {
            PublishError::Auth("LinkedIn access token not configured".to_string())
        })?;
        let author = self.resolve_author_urn(token).await?;

        let payload = json!({
            "author": author,
            "lifecycleState": "PUBLISHED",
            "specificContent": {
                "com.linkedin.ugc.ShareContent": {
                    "shareCommentary": {"text": text},
                    "shareMediaCategory": "NONE"
                }
            },
            "visibility": {"com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC"}
        });

        let response = self
            .client
            .post(format!("{}/v2/ugcPosts", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", token.expose_secret()),
            )
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&payload)
            .send()
            .await
            .map_err(|e| PublishError::Network(e.to_string()))?;

        if response.status() == 401 {
            return Err(PublishError::Auth("invalid access token".to_string()));
        }
        if response.status() == 429 {
            return Err(PublishError::RateLimited);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Api(format!(
                "publish failed {}: {}",
                status, body
            )));
        }

        let post: UgcPostResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;

        Ok(PublishReceipt {
            external_id: post.id,
            url: None,
            dry_run: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_normalize_person_urn() {
        assert_eq!(
            normalize_person_urn("abc123"),
            Some("urn:li:person:abc123".to_string())
        );
        assert_eq!(
            normalize_person_urn("urn:li:person:abc123"),
            Some("urn:li:person:abc123".to_string())
        );
        assert_eq!(normalize_person_urn("   "), None);
    }

    #[tokio::test]
    async fn test_dry_run_receipt() {
        let publisher =
            LinkedinPublisher::with_base_url(None, None, "http://127.0.0.1:1".into());
        let receipt = publisher.publish("text", true).await.unwrap();
        assert!(receipt.dry_run);
        assert_eq!(receipt.external_id, "dryrun-linkedin");
    }

    #[tokio::test]
    async fn test_publish_with_explicit_urn() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v2/ugcPosts"))
            .and(header("X-Restli-Protocol-Version", "2.0.0"))
            .and(body_string_contains("urn:li:person:me42"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "urn:li:share:777"
            })))
            .mount(&mock_server)
            .await;

        let publisher = LinkedinPublisher::with_base_url(
            Some(SecretString::new("test-token".into())),
            Some("me42".to_string()),
            mock_server.uri(),
        );

        let receipt = publisher.publish("professional update", false).await.unwrap();
        assert_eq!(receipt.external_id, "urn:li:share:777");
    }

    #[tokio::test]
    async fn test_publish_resolves_urn_from_userinfo() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/userinfo"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"sub": "member9"})),
            )
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v2/ugcPosts"))
            .and(body_string_contains("urn:li:person:member9"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "urn:li:share:1"
            })))
            .mount(&mock_server)
            .await;

        let publisher = LinkedinPublisher::with_base_url(
            Some(SecretString::new("test-token".into())),
            None,
            mock_server.uri(),
        );

        let receipt = publisher.publish("text", false).await.unwrap();
        assert_eq!(receipt.external_id, "urn:li:share:1");
    }

    #[tokio::test]
    async fn test_missing_token_fails() {
        let publisher =
            LinkedinPublisher::with_base_url(None, None, "http://127.0.0.1:1".into());
        let result = publisher.publish("text", false).await;
        assert!(matches!(result, Err(PublishError::Auth(_))));
    }
}
