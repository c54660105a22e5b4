//! Core types for Fanout

use std::collections::BTreeMap;
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FanoutError, PlatformError};

/// Lifecycle state shared by posts and their per-platform links
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Published,
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Published => "published",
            PostStatus::Failed => "failed",
        }
    }

    /// `published` and `failed` are terminal until an external re-run
    pub fn is_terminal(&self) -> bool {
        matches!(self, PostStatus::Published | PostStatus::Failed)
    }
}

impl FromStr for PostStatus {
    type Err = FanoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(PostStatus::Draft),
            "scheduled" => Ok(PostStatus::Scheduled),
            "published" => Ok(PostStatus::Published),
            "failed" => Ok(PostStatus::Failed),
            other => Err(FanoutError::InvalidInput(format!(
                "Unknown status '{}'. Valid options: draft, scheduled, published, failed",
                other
            ))),
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A piece of content authored once and published to every linked account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub content: String,
    /// Image or video reference (URL or local path) for platforms that need one
    pub media_url: Option<String>,
    pub status: PostStatus,
    pub scheduled_at: Option<i64>,
    /// Set once, on the first transition into `published`
    pub published_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Post {
    pub fn new(user_id: impl Into<String>, content: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            content: content.into(),
            media_url: None,
            status: PostStatus::Draft,
            scheduled_at: None,
            published_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_media(mut self, media_url: impl Into<String>) -> Self {
        self.media_url = Some(media_url.into());
        self
    }
}

/// Credential material for one platform account.
///
/// Only adapters look inside; everything else passes it through.
pub struct Credential {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub expires_at: Option<i64>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: None,
            expires_at: None,
        }
    }

    /// True when a non-blank access token is present
    pub fn has_access_token(&self) -> bool {
        !self.access_token.expose_secret().trim().is_empty()
    }
}

impl Clone for Credential {
    fn clone(&self) -> Self {
        Self {
            access_token: SecretString::from(self.access_token.expose_secret().to_owned()),
            refresh_token: self
                .refresh_token
                .as_ref()
                .map(|t| SecretString::from(t.expose_secret().to_owned())),
            expires_at: self.expires_at,
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// A user's account on one third-party platform
#[derive(Debug, Clone)]
pub struct PlatformAccount {
    pub id: String,
    pub user_id: String,
    /// Lowercase platform identifier, e.g. "facebook"
    pub platform: String,
    pub platform_user_id: Option<String>,
    pub credential: Credential,
    pub created_at: i64,
    pub updated_at: i64,
}

impl PlatformAccount {
    pub fn new(
        user_id: impl Into<String>,
        platform: impl Into<String>,
        credential: Credential,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            platform: platform.into().to_lowercase(),
            platform_user_id: None,
            credential,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Association between one post and one platform account, carrying that
/// platform's individual publish outcome
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlatformLink {
    pub id: String,
    pub post_id: String,
    pub account_id: String,
    pub status: PostStatus,
    /// Set only on success
    pub platform_post_id: Option<String>,
    /// Set only on failure
    pub error_message: Option<String>,
    pub updated_at: i64,
}

impl PlatformLink {
    pub fn new(post_id: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            post_id: post_id.into(),
            account_id: account_id.into(),
            status: PostStatus::Draft,
            platform_post_id: None,
            error_message: None,
            updated_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Record a successful publish: status, platform id, and a cleared error
    pub fn mark_published(&mut self, platform_post_id: String) {
        self.status = PostStatus::Published;
        self.platform_post_id = Some(platform_post_id);
        self.error_message = None;
        self.updated_at = chrono::Utc::now().timestamp();
    }

    /// Record a failed attempt. Any platform id from an earlier run is kept.
    pub fn mark_failed(&mut self, reason: String) {
        self.status = PostStatus::Failed;
        self.error_message = Some(reason);
        self.updated_at = chrono::Utc::now().timestamp();
    }
}

/// Normalized result of one adapter publish call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum PublishOutcome {
    Success { platform_post_id: String },
    Failure { reason: String },
}

impl PublishOutcome {
    pub fn success(platform_post_id: impl Into<String>) -> Self {
        PublishOutcome::Success {
            platform_post_id: platform_post_id.into(),
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        PublishOutcome::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PublishOutcome::Success { .. })
    }
}

impl From<std::result::Result<String, PlatformError>> for PublishOutcome {
    fn from(result: std::result::Result<String, PlatformError>) -> Self {
        match result {
            Ok(id) => PublishOutcome::Success { platform_post_id: id },
            Err(e) => PublishOutcome::Failure {
                reason: e.to_string(),
            },
        }
    }
}

/// Named counters returned by an adapter's analytics call
pub type Metrics = BTreeMap<String, u64>;
