//! Facebook page feed adapter (Graph API)

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

use crate::config::FacebookConfig;
use crate::error::{PlatformError, Result};
use crate::platforms::http::{
    build_client, extract_id, map_status_error, map_transport_error, read_counter, read_json,
};
use crate::platforms::PlatformAdapter;
use crate::types::{Credential, Metrics, PublishOutcome};

const PLATFORM: &str = "Facebook";

pub struct FacebookAdapter {
    client: Client,
    graph_url: String,
    /// Page token from config if set, otherwise the account's own token
    token: Option<SecretString>,
}

impl FacebookAdapter {
    pub fn new(config: &FacebookConfig, credential: &Credential) -> Self {
        let token = config
            .page_access_token
            .as_ref()
            .filter(|t| !t.trim().is_empty())
            .map(|t| SecretString::from(t.clone()))
            .or_else(|| {
                credential.has_access_token().then(|| {
                    SecretString::from(credential.access_token.expose_secret().to_owned())
                })
            });

        Self {
            client: build_client(),
            graph_url: config.graph_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn token(&self) -> std::result::Result<&str, PlatformError> {
        self.token
            .as_ref()
            .map(|t| t.expose_secret())
            .ok_or_else(|| {
                PlatformError::Authentication("No Facebook page access token available".to_string())
            })
    }

    async fn post_to_feed(
        &self,
        content: &str,
        media_url: Option<&str>,
    ) -> std::result::Result<String, PlatformError> {
        let token = self.token()?;
        let mut params = vec![("message", content), ("access_token", token)];
        if let Some(link) = media_url {
            params.push(("link", link));
        }

        let response = self
            .client
            .post(format!("{}/me/feed", self.graph_url))
            .query(&params)
            .send()
            .await
            .map_err(|e| map_transport_error(PLATFORM, "posting", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status_error(PLATFORM, "posting", status, &body));
        }

        let body = read_json(PLATFORM, "posting", response).await?;
        extract_id(&body).ok_or_else(|| {
            PlatformError::Posting(format!("Facebook response had no post id: {}", body))
        })
    }
}

#[async_trait]
impl PlatformAdapter for FacebookAdapter {
    fn name(&self) -> &str {
        "facebook"
    }

    async fn authenticate(&self) -> bool {
        let Ok(token) = self.token() else {
            return false;
        };

        match self
            .client
            .get(format!("{}/me", self.graph_url))
            .query(&[("access_token", token)])
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("Facebook authentication check failed: {}", e);
                false
            }
        }
    }

    async fn publish(&self, content: &str, media_url: Option<&str>) -> PublishOutcome {
        let result = self.post_to_feed(content, media_url).await;
        if let Err(e) = &result {
            tracing::error!("Facebook error: {}", e);
        }
        result.into()
    }

    async fn fetch_analytics(&self) -> Result<Metrics> {
        let token = self.token()?;
        let response = self
            .client
            .get(format!("{}/me", self.graph_url))
            .query(&[("fields", "fan_count,followers_count"), ("access_token", token)])
            .send()
            .await
            .map_err(|e| map_transport_error(PLATFORM, "analytics", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status_error(PLATFORM, "analytics", status, &body).into());
        }

        let body = read_json(PLATFORM, "analytics", response).await?;
        let mut metrics = Metrics::new();
        metrics.insert("fans".to_string(), read_counter(&body, "fan_count"));
        metrics.insert("followers".to_string(), read_counter(&body, "followers_count"));
        Ok(metrics)
    }
}
