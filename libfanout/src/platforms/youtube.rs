//! YouTube adapter
//!
//! "Publishing" on YouTube means uploading a video. The media reference is
//! either an http(s) URL, which is downloaded first, or a local file path.
//! Uploads use the resumable protocol: an initial `POST` carries the video
//! metadata and returns a session URL in `Location`, then the bytes are
//! sent with a single `PUT`.
//!
//! The video is held in memory for the upload, and requests use their own
//! timeout from `[platforms.youtube] upload_timeout_secs`. The orchestrator's
//! `[publishing] timeout_secs` still bounds the whole call, so it has to be
//! raised for anything but short clips.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use crate::config::YouTubeConfig;
use crate::error::{PlatformError, Result};
use crate::platforms::http::{
    build_client_with_timeout, extract_id, map_status_error, map_transport_error, read_counter,
    read_json,
};
use crate::platforms::PlatformAdapter;
use crate::types::{Credential, Metrics, PublishOutcome};

const PLATFORM: &str = "YouTube";

/// YouTube rejects titles longer than this many characters
const MAX_TITLE_CHARS: usize = 100;

const VIDEO_TAGS: [&str; 2] = ["SMM", "SocialMedia"];

pub struct YouTubeAdapter {
    client: Client,
    api_url: String,
    upload_url: String,
    access_token: SecretString,
}

impl YouTubeAdapter {
    pub fn new(config: &YouTubeConfig, credential: &Credential) -> Self {
        Self {
            client: build_client_with_timeout(Duration::from_secs(config.upload_timeout_secs)),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            upload_url: config.upload_url.trim_end_matches('/').to_string(),
            access_token: SecretString::from(credential.access_token.expose_secret().to_owned()),
        }
    }

    async fn read_media(&self, media_url: &str) -> std::result::Result<Vec<u8>, PlatformError> {
        if media_url.starts_with("http://") || media_url.starts_with("https://") {
            let response = self
                .client
                .get(media_url)
                .send()
                .await
                .map_err(|e| map_transport_error(PLATFORM, "video download", e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(PlatformError::Validation(format!(
                    "Could not download video from {} ({})",
                    media_url, status
                )));
            }

            return response
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| map_transport_error(PLATFORM, "video download", e));
        }

        let path = shellexpand::tilde(media_url).to_string();
        tokio::fs::read(&path).await.map_err(|e| {
            PlatformError::Validation(format!("Could not read video file {}: {}", path, e))
        })
    }

    async fn start_upload_session(
        &self,
        content: &str,
        size: usize,
    ) -> std::result::Result<String, PlatformError> {
        let title: String = content.chars().take(MAX_TITLE_CHARS).collect();
        let metadata = json!({
            "snippet": {
                "title": title,
                "description": content,
                "tags": VIDEO_TAGS,
            },
            "status": {
                "privacyStatus": "public"
            }
        });

        let response = self
            .client
            .post(format!("{}/upload/youtube/v3/videos", self.upload_url))
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .bearer_auth(self.access_token.expose_secret())
            .header("X-Upload-Content-Type", "video/*")
            .header("X-Upload-Content-Length", size.to_string())
            .json(&metadata)
            .send()
            .await
            .map_err(|e| map_transport_error(PLATFORM, "upload init", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status_error(PLATFORM, "upload init", status, &body));
        }

        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                PlatformError::Posting("YouTube did not return an upload session URL".to_string())
            })
    }

    async fn upload(
        &self,
        content: &str,
        media_url: Option<&str>,
    ) -> std::result::Result<String, PlatformError> {
        let media_url = media_url.filter(|m| !m.trim().is_empty()).ok_or_else(|| {
            PlatformError::Validation(
                "YouTube requires a media_url (video file link or path)".to_string(),
            )
        })?;

        if self.access_token.expose_secret().trim().is_empty() {
            return Err(PlatformError::Authentication(
                "No YouTube access token available".to_string(),
            ));
        }

        let bytes = self.read_media(media_url).await?;
        let session_url = self.start_upload_session(content, bytes.len()).await?;
        tracing::debug!("YouTube upload session opened, sending {} bytes", bytes.len());

        let response = self
            .client
            .put(session_url)
            .bearer_auth(self.access_token.expose_secret())
            .header("Content-Type", "video/*")
            .body(bytes)
            .send()
            .await
            .map_err(|e| map_transport_error(PLATFORM, "upload", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status_error(PLATFORM, "upload", status, &body));
        }

        let body = read_json(PLATFORM, "upload", response).await?;
        extract_id(&body).ok_or_else(|| {
            PlatformError::Posting(format!("YouTube upload response had no video id: {}", body))
        })
    }
}

#[async_trait]
impl PlatformAdapter for YouTubeAdapter {
    fn name(&self) -> &str {
        "youtube"
    }

    async fn authenticate(&self) -> bool {
        !self.access_token.expose_secret().trim().is_empty()
    }

    async fn publish(&self, content: &str, media_url: Option<&str>) -> PublishOutcome {
        let result = self.upload(content, media_url).await;
        if let Err(e) = &result {
            tracing::error!("YouTube error: {}", e);
        }
        result.into()
    }

    async fn fetch_analytics(&self) -> Result<Metrics> {
        let response = self
            .client
            .get(format!("{}/youtube/v3/channels", self.api_url))
            .query(&[("part", "statistics"), ("mine", "true")])
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .map_err(|e| map_transport_error(PLATFORM, "analytics", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status_error(PLATFORM, "analytics", status, &body).into());
        }

        let body = read_json(PLATFORM, "analytics", response).await?;
        let stats = body
            .get("items")
            .and_then(Value::as_array)
            .and_then(|items| items.first())
            .and_then(|item| item.get("statistics"))
            .cloned()
            .unwrap_or(Value::Null);

        let mut metrics = Metrics::new();
        metrics.insert("views".to_string(), read_counter(&stats, "viewCount"));
        metrics.insert("subscribers".to_string(), read_counter(&stats, "subscriberCount"));
        metrics.insert("videos".to_string(), read_counter(&stats, "videoCount"));
        Ok(metrics)
    }
}
