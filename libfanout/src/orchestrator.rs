//! Fan-out of one post to all of its platform links
//!
//! A run loads the post and its links, attempts one publish per link that
//! is not yet published, records every outcome on its own link, and then
//! derives the post status once all attempts have been joined.
//!
//! Adapter problems of any kind (reported failures, unsupported platforms,
//! missing accounts, timeouts, panics) are confined to the link they
//! happened on. Only store errors escape a run, because after one of those
//! durable state no longer matches what the run observed and the caller
//! has to re-run the whole post.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::aggregate::derive_post_status;
use crate::config::PublishingConfig;
use crate::error::{FanoutError, Result};
use crate::events::{Event, EventBus};
use crate::registry::AdapterRegistry;
use crate::store::PostStore;
use crate::types::{PlatformLink, Post, PostStatus, PublishOutcome};

/// Default bound on a single adapter call
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of links attempted at once
pub const DEFAULT_MAX_CONCURRENT_LINKS: usize = 8;

/// Failure reason recorded when an adapter call exceeds the timeout
pub const TIMEOUT_REASON: &str = "timeout";

/// Failure reason recorded when an adapter reports success without an id
pub const EMPTY_ID_REASON: &str = "platform returned an empty post id";

/// What happened to one link during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum LinkResult {
    /// Already published before this run; no adapter call was made
    Skipped,
    Published { platform_post_id: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkReport {
    pub link_id: String,
    pub account_id: String,
    /// `None` when the account could not be loaded
    pub platform: Option<String>,
    #[serde(flatten)]
    pub result: LinkResult,
}

/// Summary of one orchestrator run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub post_id: String,
    /// Post status after the run
    pub status: PostStatus,
    pub links: Vec<LinkReport>,
}

impl RunReport {
    /// Links an adapter call was made (or attempted) for
    pub fn attempted(&self) -> usize {
        self.links
            .iter()
            .filter(|l| l.result != LinkResult::Skipped)
            .count()
    }

    pub fn published(&self) -> usize {
        self.links
            .iter()
            .filter(|l| matches!(l.result, LinkResult::Published { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.links
            .iter()
            .filter(|l| matches!(l.result, LinkResult::Failed { .. }))
            .count()
    }
}

/// Removes the post id from the in-flight set when the run ends, even on error
struct RunGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
    post_id: String,
}

impl RunGuard {
    fn acquire(in_flight: &Arc<Mutex<HashSet<String>>>, post_id: &str) -> Result<Self> {
        let mut runs = in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !runs.insert(post_id.to_string()) {
            return Err(FanoutError::RunInProgress(post_id.to_string()));
        }
        Ok(Self {
            in_flight: Arc::clone(in_flight),
            post_id: post_id.to_string(),
        })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut runs = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        runs.remove(&self.post_id);
    }
}

/// Drives publish runs through a [`PostStore`] and an [`AdapterRegistry`]
pub struct PublishOrchestrator {
    store: Arc<dyn PostStore>,
    registry: Arc<AdapterRegistry>,
    timeout: Duration,
    max_concurrent_links: usize,
    in_flight: Arc<Mutex<HashSet<String>>>,
    event_bus: EventBus,
}

impl PublishOrchestrator {
    pub fn new(store: Arc<dyn PostStore>, registry: Arc<AdapterRegistry>) -> Self {
        Self {
            store,
            registry,
            timeout: DEFAULT_PUBLISH_TIMEOUT,
            max_concurrent_links: DEFAULT_MAX_CONCURRENT_LINKS,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            event_bus: EventBus::default(),
        }
    }

    /// Orchestrator using the `[publishing]` settings
    pub fn from_config(
        store: Arc<dyn PostStore>,
        registry: Arc<AdapterRegistry>,
        config: &PublishingConfig,
    ) -> Self {
        Self::new(store, registry)
            .with_timeout(Duration::from_secs(config.timeout_secs))
            .with_max_concurrent_links(config.max_concurrent_links)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_concurrent_links(mut self, max: usize) -> Self {
        self.max_concurrent_links = max.max(1);
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Publish `post_id` to every link that is not yet published.
    ///
    /// Re-running a post is safe: published links are skipped, so only
    /// failed or never-attempted links see another adapter call.
    ///
    /// # Errors
    ///
    /// - `PostNotFound` if the post does not exist (nothing is written)
    /// - `RunInProgress` if this orchestrator is already running the post
    /// - `Database` if a link or the post could not be read or persisted
    #[instrument(skip_all, fields(post_id = %post_id))]
    pub async fn run(&self, post_id: &str) -> Result<RunReport> {
        let _guard = RunGuard::acquire(&self.in_flight, post_id)?;

        let post = self
            .store
            .get_post(post_id)
            .await?
            .ok_or_else(|| FanoutError::PostNotFound(post_id.to_string()))?;

        let links = self.store.get_links(post_id).await?;
        if links.is_empty() {
            info!("Post {} has no platform links, nothing to publish", post_id);
            return Ok(RunReport {
                post_id: post_id.to_string(),
                status: post.status,
                links: Vec::new(),
            });
        }

        let (done, pending): (Vec<PlatformLink>, Vec<PlatformLink>) = links
            .into_iter()
            .partition(|link| link.status == PostStatus::Published);

        info!(
            "Publishing post {} to {} link(s) ({} already published)",
            post_id,
            pending.len(),
            done.len()
        );
        self.event_bus.emit(Event::RunStarted {
            post_id: post_id.to_string(),
            links: pending.len(),
        });

        let attempts: Vec<Result<(PlatformLink, LinkReport)>> = stream::iter(pending)
            .map(|link| self.attempt(&post, link))
            .buffer_unordered(self.max_concurrent_links)
            .collect()
            .await;

        let mut reports: Vec<LinkReport> = done
            .iter()
            .map(|link| LinkReport {
                link_id: link.id.clone(),
                account_id: link.account_id.clone(),
                platform: None,
                result: LinkResult::Skipped,
            })
            .collect();
        let mut statuses: Vec<PostStatus> = done.iter().map(|link| link.status).collect();
        let mut store_error = None;

        // Every attempt has finished by now; surface the first store failure
        for attempt in attempts {
            match attempt {
                Ok((link, report)) => {
                    statuses.push(link.status);
                    reports.push(report);
                }
                Err(e) => {
                    warn!("Store failure while publishing post {}: {}", post_id, e);
                    if store_error.is_none() {
                        store_error = Some(e);
                    }
                }
            }
        }
        if let Some(e) = store_error {
            return Err(e);
        }

        let status = derive_post_status(&statuses).unwrap_or(post.status);
        let attempted = reports.iter().any(|r| r.result != LinkResult::Skipped);

        if attempted || status != post.status {
            let now = chrono::Utc::now().timestamp();
            self.store.save_post_status(post_id, status, now).await?;
        } else {
            debug!("Post {} unchanged, every link already published", post_id);
        }

        let report = RunReport {
            post_id: post_id.to_string(),
            status,
            links: reports,
        };

        info!(
            "Post {} is {} ({} published, {} failed, {} skipped)",
            post_id,
            status,
            report.published(),
            report.failed(),
            report.links.len() - report.attempted()
        );
        self.event_bus.emit(Event::RunCompleted {
            post_id: post_id.to_string(),
            status,
            published: report.published(),
            failed: report.failed(),
        });

        Ok(report)
    }

    /// One link's attempt: resolve, publish, record. Only store errors are returned.
    async fn attempt(
        &self,
        post: &Post,
        mut link: PlatformLink,
    ) -> Result<(PlatformLink, LinkReport)> {
        let account = self.store.get_account(&link.account_id).await?;
        let platform = account.as_ref().map(|a| a.platform.clone());

        let outcome = match &account {
            None => PublishOutcome::failure(format!(
                "platform account {} not found",
                link.account_id
            )),
            Some(account) => match self.registry.resolve(&account.platform, &account.credential) {
                Err(e) => PublishOutcome::failure(e.to_string()),
                Ok(adapter) => {
                    debug!("Publishing post {} to {}", post.id, account.platform);
                    let publish = adapter.publish(&post.content, post.media_url.as_deref());
                    let call = AssertUnwindSafe(publish).catch_unwind();
                    match tokio::time::timeout(self.timeout, call).await {
                        Err(_) => PublishOutcome::failure(TIMEOUT_REASON),
                        Ok(Err(panic)) => PublishOutcome::failure(format!(
                            "adapter panicked: {}",
                            panic_message(&*panic)
                        )),
                        Ok(Ok(outcome)) => outcome,
                    }
                }
            },
        };

        let platform_name = platform.clone().unwrap_or_else(|| "unknown".to_string());
        let result = match outcome {
            PublishOutcome::Success { platform_post_id } if !platform_post_id.trim().is_empty() => {
                info!(
                    "Published post {} to {}: {}",
                    post.id, platform_name, platform_post_id
                );
                link.mark_published(platform_post_id.clone());
                LinkResult::Published { platform_post_id }
            }
            PublishOutcome::Success { .. } => {
                warn!("{} returned an empty post id for post {}", platform_name, post.id);
                link.mark_failed(EMPTY_ID_REASON.to_string());
                LinkResult::Failed {
                    reason: EMPTY_ID_REASON.to_string(),
                }
            }
            PublishOutcome::Failure { reason } => {
                let reason = if reason.trim().is_empty() {
                    "unknown error".to_string()
                } else {
                    reason
                };
                warn!("Failed to publish post {} to {}: {}", post.id, platform_name, reason);
                link.mark_failed(reason.clone());
                LinkResult::Failed { reason }
            }
        };

        self.store.save_link(&link).await?;

        match &result {
            LinkResult::Published { platform_post_id } => self.event_bus.emit(Event::LinkPublished {
                post_id: post.id.clone(),
                link_id: link.id.clone(),
                platform: platform_name,
                platform_post_id: platform_post_id.clone(),
            }),
            LinkResult::Failed { reason } => self.event_bus.emit(Event::LinkFailed {
                post_id: post.id.clone(),
                link_id: link.id.clone(),
                platform: platform_name,
                reason: reason.clone(),
            }),
            LinkResult::Skipped => {}
        }

        let report = LinkReport {
            link_id: link.id.clone(),
            account_id: link.account_id.clone(),
            platform,
            result,
        };
        Ok((link, report))
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
