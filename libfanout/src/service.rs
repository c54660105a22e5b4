//! Service facade for Fanout
//!
//! `FanoutService` is the single entry point the binaries use. It owns the
//! database, the adapter registry and the publish orchestrator, and wraps
//! them in the operations a user actually performs: write a post, attach
//! platform accounts, publish now or later, and look at account analytics.
//!
//! # Example
//!
//! ```no_run
//! use libfanout::service::{FanoutService, NewPost};
//!
//! # async fn example() -> libfanout::Result<()> {
//! let service = FanoutService::new().await?;
//!
//! let account = service.add_account("linkedin", "token", None).await?;
//! let created = service
//!     .create_post(NewPost {
//!         content: "Hello everyone".to_string(),
//!         media_url: None,
//!         account_ids: vec![account.id.clone()],
//!         publish: true,
//!     })
//!     .await?;
//!
//! println!("Post {} is {}", created.post.id, created.post.status);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::config::{resolve_db_path, Config};
use crate::db::Database;
use crate::error::{FanoutError, Result};
use crate::events::EventReceiver;
use crate::orchestrator::{PublishOrchestrator, RunReport};
use crate::registry::AdapterRegistry;
use crate::types::{Credential, Metrics, PlatformAccount, PlatformLink, Post, PostStatus};

/// Input for [`FanoutService::create_post`]
#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub content: String,
    pub media_url: Option<String>,
    /// Accounts to link the new post to
    pub account_ids: Vec<String>,
    /// Run the orchestrator right after creating the post
    pub publish: bool,
}

/// Edits to an unpublished post
#[derive(Debug, Clone, Default)]
pub struct PostUpdate {
    pub content: Option<String>,
    pub media_url: Option<String>,
    /// Remove the media reference
    pub clear_media: bool,
}

#[derive(Debug, Clone)]
pub struct CreatedPost {
    pub post: Post,
    pub links: Vec<PlatformLink>,
    /// Present when the post was published on creation
    pub run: Option<RunReport>,
}

/// A post together with its platform links
#[derive(Debug, Clone)]
pub struct PostDetails {
    pub post: Post,
    pub links: Vec<PlatformLink>,
}

pub struct FanoutService {
    db: Database,
    config: Arc<Config>,
    orchestrator: Arc<PublishOrchestrator>,
}

impl FanoutService {
    /// Service built from the default configuration file
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be parsed or the
    /// database cannot be opened or migrated.
    pub async fn new() -> Result<Self> {
        let config = Config::load()?;
        Self::from_config(config).await
    }

    /// Service with the built-in platform adapters
    pub async fn from_config(config: Config) -> Result<Self> {
        let db_path = resolve_db_path(Some(&config.database.path))?;
        let db = Database::new(&db_path).await?;
        let registry = AdapterRegistry::from_config(&config.platforms);
        Ok(Self::with_registry(db, registry, config))
    }

    /// Service over an already opened database and a custom registry
    pub fn with_registry(db: Database, registry: AdapterRegistry, config: Config) -> Self {
        let orchestrator = PublishOrchestrator::from_config(
            Arc::new(db.clone()),
            Arc::new(registry),
            &config.publishing,
        );

        Self {
            db,
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn orchestrator(&self) -> &PublishOrchestrator {
        &self.orchestrator
    }

    /// Follow publish progress events
    pub fn subscribe(&self) -> EventReceiver {
        self.orchestrator.event_bus().subscribe()
    }

    fn user(&self) -> &str {
        &self.config.defaults.user
    }

    // ------------------------------------------------------------------
    // Posts
    // ------------------------------------------------------------------

    /// Create a draft post linked to `account_ids`, optionally publishing it
    pub async fn create_post(&self, request: NewPost) -> Result<CreatedPost> {
        let content = request.content.trim();
        if content.is_empty() {
            return Err(FanoutError::InvalidInput(
                "Post content cannot be empty".to_string(),
            ));
        }

        // Every account must exist before anything is written
        for account_id in &request.account_ids {
            self.require_account(account_id).await?;
        }

        let mut post = Post::new(self.user(), content);
        post.media_url = request.media_url.filter(|m| !m.trim().is_empty());
        self.db.create_post(&post).await?;

        let links = self.link_accounts(&post.id, &request.account_ids).await?;
        info!("Created post {} with {} link(s)", post.id, links.len());

        if !request.publish {
            return Ok(CreatedPost {
                post,
                links,
                run: None,
            });
        }

        let run = self.publish_now(&post.id).await?;
        let details = self.get_post(&post.id).await?;
        Ok(CreatedPost {
            post: details.post,
            links: details.links,
            run: Some(run),
        })
    }

    pub async fn get_post(&self, post_id: &str) -> Result<PostDetails> {
        let post = self
            .db
            .get_post(post_id)
            .await?
            .ok_or_else(|| FanoutError::PostNotFound(post_id.to_string()))?;
        let links = self.db.get_links(post_id).await?;
        Ok(PostDetails { post, links })
    }

    /// The configured user's posts, newest first
    pub async fn list_posts(&self, status: Option<PostStatus>, limit: usize) -> Result<Vec<Post>> {
        self.db.list_posts(Some(self.user()), status, limit).await
    }

    /// Edit content or media of a draft or scheduled post
    pub async fn update_post(&self, post_id: &str, update: PostUpdate) -> Result<Post> {
        let mut post = self.get_post(post_id).await?.post;

        if !matches!(post.status, PostStatus::Draft | PostStatus::Scheduled) {
            return Err(FanoutError::InvalidInput(format!(
                "Post {} is {}; only draft or scheduled posts can be edited",
                post_id, post.status
            )));
        }

        if let Some(content) = update.content {
            let content = content.trim();
            if content.is_empty() {
                return Err(FanoutError::InvalidInput(
                    "Post content cannot be empty".to_string(),
                ));
            }
            post.content = content.to_string();
        }
        if update.clear_media {
            post.media_url = None;
        } else if let Some(media_url) = update.media_url {
            post.media_url = Some(media_url);
        }

        post.updated_at = Utc::now().timestamp();
        let updated = self
            .db
            .update_post_content(
                &post.id,
                &post.content,
                post.media_url.as_deref(),
                post.updated_at,
            )
            .await?;
        if !updated {
            return Err(FanoutError::InvalidInput(format!(
                "Post {} changed while editing; only draft or scheduled posts can be edited",
                post_id
            )));
        }
        Ok(post)
    }

    // ------------------------------------------------------------------
    // Accounts and links
    // ------------------------------------------------------------------

    /// Store a platform account for the configured user
    pub async fn add_account(
        &self,
        platform: &str,
        access_token: &str,
        platform_user_id: Option<&str>,
    ) -> Result<PlatformAccount> {
        if !self.orchestrator.registry().supports(platform) {
            return Err(FanoutError::UnsupportedPlatform(platform.to_string()));
        }
        if access_token.trim().is_empty() {
            return Err(FanoutError::InvalidInput(
                "Access token cannot be empty".to_string(),
            ));
        }

        let mut account =
            PlatformAccount::new(self.user(), platform, Credential::new(access_token));
        account.platform_user_id = platform_user_id.map(str::to_string);
        self.db.create_account(&account).await?;

        info!("Added {} account {}", account.platform, account.id);
        Ok(account)
    }

    pub async fn list_accounts(&self) -> Result<Vec<PlatformAccount>> {
        self.db.list_accounts(Some(self.user())).await
    }

    /// Link a post to accounts. Accounts already linked are left alone.
    ///
    /// New links start in the post's status when it is draft or scheduled,
    /// otherwise in draft so the next run picks them up.
    pub async fn link_accounts(
        &self,
        post_id: &str,
        account_ids: &[String],
    ) -> Result<Vec<PlatformLink>> {
        let details = self.get_post(post_id).await?;

        let initial = match details.post.status {
            PostStatus::Scheduled => PostStatus::Scheduled,
            _ => PostStatus::Draft,
        };

        let mut created = Vec::new();
        for account_id in account_ids {
            if details.links.iter().any(|l| &l.account_id == account_id)
                || created.iter().any(|l: &PlatformLink| &l.account_id == account_id)
            {
                continue;
            }
            self.require_account(account_id).await?;

            let mut link = PlatformLink::new(post_id, account_id);
            link.status = initial;
            self.db.create_link(&link).await?;
            created.push(link);
        }

        Ok(created)
    }

    async fn require_account(&self, account_id: &str) -> Result<PlatformAccount> {
        self.db
            .get_account(account_id)
            .await?
            .ok_or_else(|| FanoutError::AccountNotFound(account_id.to_string()))
    }

    // ------------------------------------------------------------------
    // Publishing
    // ------------------------------------------------------------------

    /// Run the orchestrator for one post right away
    pub async fn publish_now(&self, post_id: &str) -> Result<RunReport> {
        self.orchestrator.run(post_id).await
    }

    /// Defer publishing until `at`
    pub async fn schedule(&self, post_id: &str, at: DateTime<Utc>) -> Result<Post> {
        let post = self.get_post(post_id).await?.post;

        if post.status == PostStatus::Published {
            return Err(FanoutError::InvalidInput(format!(
                "Post {} is already published",
                post_id
            )));
        }
        if at <= Utc::now() {
            return Err(FanoutError::InvalidInput(
                "Scheduled time must be in the future".to_string(),
            ));
        }

        self.db.mark_scheduled(post_id, at.timestamp()).await?;
        info!("Scheduled post {} for {}", post_id, at.to_rfc3339());
        Ok(self.get_post(post_id).await?.post)
    }

    /// Run every scheduled post whose time is at or before `now`.
    ///
    /// A failing post is logged and does not stop the others; only a
    /// failure to read the due list is returned.
    pub async fn process_due(&self, now: i64) -> Result<Vec<RunReport>> {
        let due = self.db.get_scheduled_posts_due(now).await?;
        if due.is_empty() {
            return Ok(Vec::new());
        }

        info!("Found {} scheduled post(s) due", due.len());
        let mut reports = Vec::with_capacity(due.len());
        for post in due {
            match self.orchestrator.run(&post.id).await {
                Ok(report) => reports.push(report),
                Err(e) => error!("Failed to publish scheduled post {}: {}", post.id, e),
            }
        }
        Ok(reports)
    }

    // ------------------------------------------------------------------
    // Platform checks
    // ------------------------------------------------------------------

    /// Best-effort credential check for one account
    pub async fn authenticate(&self, account_id: &str) -> Result<bool> {
        let account = self.require_account(account_id).await?;
        let adapter = self
            .orchestrator
            .registry()
            .resolve(&account.platform, &account.credential)?;
        Ok(adapter.authenticate().await)
    }

    pub async fn analytics(&self, account_id: &str) -> Result<Metrics> {
        let account = self.require_account(account_id).await?;
        let adapter = self
            .orchestrator
            .registry()
            .resolve(&account.platform, &account.credential)?;
        adapter.fetch_analytics().await
    }
}
