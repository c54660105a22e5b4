//! Platform adapters
//!
//! One adapter per third-party platform. Each translates a generic publish
//! request into that platform's API calls and normalizes the answer into a
//! [`PublishOutcome`]. Adapters are built per account by the
//! [`AdapterRegistry`](crate::registry::AdapterRegistry); the orchestrator
//! never branches on platform names.
//!
//! # Examples
//!
//! ```no_run
//! use libfanout::config::FacebookConfig;
//! use libfanout::platforms::{facebook::FacebookAdapter, PlatformAdapter};
//! use libfanout::types::{Credential, PublishOutcome};
//!
//! # async fn example() {
//! let adapter = FacebookAdapter::new(&FacebookConfig::default(), &Credential::new("token"));
//!
//! if adapter.authenticate().await {
//!     match adapter.publish("Hello from fanout", None).await {
//!         PublishOutcome::Success { platform_post_id } => println!("Posted: {}", platform_post_id),
//!         PublishOutcome::Failure { reason } => eprintln!("Failed: {}", reason),
//!     }
//! }
//! # }
//! ```

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Metrics, PublishOutcome};

pub mod facebook;
pub mod http;
pub mod instagram;
pub mod linkedin;
pub mod youtube;

// Mock adapter is available for all builds (not just tests) to support integration tests
pub mod mock;

/// Capability every platform adapter provides
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Lowercase platform identifier, e.g. "linkedin"
    fn name(&self) -> &str;

    /// Best-effort credential check.
    ///
    /// Never fails: network errors and rejected credentials both yield
    /// `false`. Depending on the platform this is either a live API call or
    /// a purely local check of required settings, so a `true` here says
    /// nothing about whether `publish` will succeed.
    async fn authenticate(&self) -> bool;

    /// Publish `content`, optionally with an image/video reference.
    ///
    /// Expected failures (missing media, non-2xx responses, network errors)
    /// are returned as `PublishOutcome::Failure` with a human-readable
    /// reason, never as a panic.
    async fn publish(&self, content: &str, media_url: Option<&str>) -> PublishOutcome;

    /// Basic account-level counters (likes, followers, views...)
    async fn fetch_analytics(&self) -> Result<Metrics>;
}
