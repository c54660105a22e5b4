//! Instagram business account adapter
//!
//! Publishing is a two-step protocol on the Graph API: a media container
//! is created from the image URL and caption, then the container is
//! committed with `media_publish`. A post without media cannot be
//! published at all.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::config::InstagramConfig;
use crate::error::{PlatformError, Result};
use crate::platforms::http::{
    build_client, extract_id, map_status_error, map_transport_error, read_counter, read_json,
};
use crate::platforms::PlatformAdapter;
use crate::types::{Credential, Metrics, PublishOutcome};

const PLATFORM: &str = "Instagram";

pub struct InstagramAdapter {
    client: Client,
    graph_url: String,
    business_id: String,
    access_token: SecretString,
}

impl InstagramAdapter {
    pub fn new(config: &InstagramConfig, credential: &Credential) -> Self {
        Self {
            client: build_client(),
            graph_url: config.graph_url.trim_end_matches('/').to_string(),
            business_id: config.business_id.trim().to_string(),
            access_token: SecretString::from(credential.access_token.expose_secret().to_owned()),
        }
    }

    fn has_token(&self) -> bool {
        !self.access_token.expose_secret().trim().is_empty()
    }

    async fn post_form(
        &self,
        context: &str,
        url: String,
        form: &[(&str, &str)],
    ) -> std::result::Result<Value, PlatformError> {
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| map_transport_error(PLATFORM, context, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status_error(PLATFORM, context, status, &body));
        }

        read_json(PLATFORM, context, response).await
    }

    async fn create_container(
        &self,
        content: &str,
        media_url: &str,
    ) -> std::result::Result<String, PlatformError> {
        let url = format!("{}/{}/media", self.graph_url, self.business_id);
        let form = [
            ("image_url", media_url),
            ("caption", content),
            ("access_token", self.access_token.expose_secret()),
        ];

        // Any failure here is terminal; the commit step must not run
        let body = self
            .post_form("container creation", url, &form)
            .await
            .map_err(|e| PlatformError::Posting(format!("Container creation failed: {}", e)))?;

        extract_id(&body)
            .ok_or_else(|| PlatformError::Posting(format!("Container creation failed: {}", body)))
    }

    async fn commit_container(
        &self,
        creation_id: &str,
    ) -> std::result::Result<String, PlatformError> {
        let url = format!("{}/{}/media_publish", self.graph_url, self.business_id);
        let form = [
            ("creation_id", creation_id),
            ("access_token", self.access_token.expose_secret()),
        ];

        let body = self.post_form("media publish", url, &form).await?;
        extract_id(&body).ok_or_else(|| {
            PlatformError::Posting(format!("Instagram media_publish returned no id: {}", body))
        })
    }

    async fn publish_media(
        &self,
        content: &str,
        media_url: Option<&str>,
    ) -> std::result::Result<String, PlatformError> {
        let media_url = media_url.filter(|m| !m.trim().is_empty()).ok_or_else(|| {
            PlatformError::Validation("Instagram requires a media_url (image/video)".to_string())
        })?;

        if self.business_id.is_empty() {
            return Err(PlatformError::Authentication(
                "Instagram business id is not configured".to_string(),
            ));
        }

        let creation_id = self.create_container(content, media_url).await?;
        tracing::debug!("Instagram container {} created", creation_id);
        self.commit_container(&creation_id).await
    }
}

#[async_trait]
impl PlatformAdapter for InstagramAdapter {
    fn name(&self) -> &str {
        "instagram"
    }

    async fn authenticate(&self) -> bool {
        !self.business_id.is_empty() && self.has_token()
    }

    async fn publish(&self, content: &str, media_url: Option<&str>) -> PublishOutcome {
        let result = self.publish_media(content, media_url).await;
        if let Err(e) = &result {
            tracing::error!("Instagram error: {}", e);
        }
        result.into()
    }

    async fn fetch_analytics(&self) -> Result<Metrics> {
        let response = self
            .client
            .get(format!("{}/{}", self.graph_url, self.business_id))
            .query(&[
                ("fields", "followers_count,media_count"),
                ("access_token", self.access_token.expose_secret()),
            ])
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
        metrics.insert("followers".to_string(), read_counter(&body, "followers_count"));
        metrics.insert("media".to_string(), read_counter(&body, "media_count"));
        Ok(metrics)
    }
}
