//! Store interface consumed by the publish orchestrator
//!
//! The orchestrator reads and writes posts and links only through this
//! trait. Implementations must give read-your-writes consistency within a
//! run and persist each link with a single atomic write.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{PlatformAccount, PlatformLink, Post, PostStatus};

#[async_trait]
pub trait PostStore: Send + Sync {
    /// Fetch a post, `None` when no such post exists
    async fn get_post(&self, post_id: &str) -> Result<Option<Post>>;

    /// All links attached to a post, in creation order
    async fn get_links(&self, post_id: &str) -> Result<Vec<PlatformLink>>;

    /// Fetch the account a link targets
    async fn get_account(&self, account_id: &str) -> Result<Option<PlatformAccount>>;

    /// Persist a link's status and result fields in one write
    async fn save_link(&self, link: &PlatformLink) -> Result<()>;

    /// Persist the outcome of a run on the post row.
    ///
    /// Only `status` and `updated_at` change, plus `published_at` the first
    /// time the post becomes published. Content, media and schedule may be
    /// edited while a run is in flight and must survive it.
    async fn save_post_status(&self, post_id: &str, status: PostStatus, at: i64) -> Result<()>;
}
