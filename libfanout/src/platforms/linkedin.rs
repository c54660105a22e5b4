//! LinkedIn member share adapter (UGC Posts API)

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

use crate::config::LinkedInConfig;
use crate::error::{PlatformError, Result};
use crate::platforms::http::{build_client, extract_id, map_status_error, map_transport_error};
use crate::platforms::PlatformAdapter;
use crate::types::{Credential, Metrics, PublishOutcome};

const PLATFORM: &str = "LinkedIn";
const RESTLI_ID_HEADER: &str = "x-restli-id";

pub struct LinkedInAdapter {
    client: Client,
    api_url: String,
    access_token: SecretString,
}

impl LinkedInAdapter {
    pub fn new(config: &LinkedInConfig, credential: &Credential) -> Self {
        Self {
            client: build_client(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            access_token: SecretString::from(credential.access_token.expose_secret().to_owned()),
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(self.access_token.expose_secret())
            .header("X-Restli-Protocol-Version", "2.0.0")
    }

    /// Resolve the member id the share is authored as
    async fn member_id(&self) -> std::result::Result<String, PlatformError> {
        let response = self
            .authorized(self.client.get(format!("{}/v2/me", self.api_url)))
            .send()
            .await
            .map_err(|e| PlatformError::Lookup(format!("Could not retrieve LinkedIn URN: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::Lookup(format!(
                "Could not retrieve LinkedIn URN ({}): {}",
                status, body
            )));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| {
            PlatformError::Lookup(format!("Could not retrieve LinkedIn URN: {}", e))
        })?;
        extract_id(&body).ok_or_else(|| {
            PlatformError::Lookup("Could not retrieve LinkedIn URN: profile has no id".to_string())
        })
    }

    async fn share(&self, content: &str) -> std::result::Result<String, PlatformError> {
        let member_id = self.member_id().await?;

        let payload = json!({
            "author": format!("urn:li:person:{}", member_id),
            "lifecycleState": "PUBLISHED",
            "specificContent": {
                "com.linkedin.ugc.ShareContent": {
                    "shareCommentary": {"text": content},
                    "shareMediaCategory": "NONE"
                }
            },
            "visibility": {"com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC"}
        });

        let response = self
            .authorized(self.client.post(format!("{}/v2/ugcPosts", self.api_url)))
            .json(&payload)
            .send()
            .await
            .map_err(|e| map_transport_error(PLATFORM, "publish", e))?;

        let status = response.status();
        if status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            if status.is_success() {
                return Err(PlatformError::Posting(format!(
                    "LinkedIn publish returned {} instead of 201 Created: {}",
                    status, body
                )));
            }
            return Err(map_status_error(PLATFORM, "publish", status, &body));
        }

        let header_id = response
            .headers()
            .get(RESTLI_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        let body_id = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|body| extract_id(&body));

        body_id.or(header_id).ok_or_else(|| {
            PlatformError::Posting("LinkedIn publish response carried no post id".to_string())
        })
    }
}

#[async_trait]
impl PlatformAdapter for LinkedInAdapter {
    fn name(&self) -> &str {
        "linkedin"
    }

    async fn authenticate(&self) -> bool {
        match self
            .authorized(self.client.get(format!("{}/v2/me", self.api_url)))
            .send()
            .await
        {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                tracing::debug!("LinkedIn authentication check failed: {}", e);
                false
            }
        }
    }

    async fn publish(&self, content: &str, media_url: Option<&str>) -> PublishOutcome {
        if media_url.is_some() {
            tracing::debug!("LinkedIn shares are text-only; ignoring media reference");
        }
        let result = self.share(content).await;
        if let Err(e) = &result {
            tracing::error!("LinkedIn error: {}", e);
        }
        result.into()
    }

    async fn fetch_analytics(&self) -> Result<Metrics> {
        // Member-level share statistics are not available on this API tier
        Ok(["likes", "shares", "comments"]
            .into_iter()
            .map(|k| (k.to_string(), 0))
            .collect())
    }
}
