//! Integration tests for publish runs against a real SQLite store
//!
//! Each test wires the orchestrator to a temporary database and mock
//! adapters, then checks the post and link rows left behind by a run.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use libfanout::error::DbError;
use libfanout::orchestrator::LinkResult;
use libfanout::platforms::mock::MockConfig;
use libfanout::{
    AdapterRegistry, Credential, Database, FanoutError, PlatformAccount, PlatformLink, Post,
    PostStatus, PostStore, PublishOrchestrator, Result,
};
use tempfile::TempDir;

struct Fixture {
    db: Database,
    _temp_dir: TempDir,
}

async fn setup() -> Fixture {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("fanout.db");
    let db = Database::new(db_path.to_str().unwrap()).await.unwrap();
    Fixture {
        db,
        _temp_dir: temp_dir,
    }
}

impl Fixture {
    async fn post(&self, content: &str) -> Post {
        let post = Post::new("user-1", content);
        self.db.create_post(&post).await.unwrap();
        post
    }

    async fn link(&self, post: &Post, platform: &str) -> PlatformLink {
        let account = PlatformAccount::new("user-1", platform, Credential::new("token"));
        self.db.create_account(&account).await.unwrap();
        let link = PlatformLink::new(&post.id, &account.id);
        self.db.create_link(&link).await.unwrap();
        link
    }

    async fn stored_link(&self, post_id: &str, link_id: &str) -> PlatformLink {
        self.db
            .get_links(post_id)
            .await
            .unwrap()
            .into_iter()
            .find(|l| l.id == link_id)
            .unwrap()
    }

    async fn stored_post(&self, post_id: &str) -> Post {
        self.db.get_post(post_id).await.unwrap().unwrap()
    }

    fn orchestrator(&self, mocks: &[(&str, &MockConfig)]) -> PublishOrchestrator {
        orchestrator_over(Arc::new(self.db.clone()), mocks)
    }
}

fn orchestrator_over(
    store: Arc<dyn PostStore>,
    mocks: &[(&str, &MockConfig)],
) -> PublishOrchestrator {
    let mut registry = AdapterRegistry::new();
    for (platform, config) in mocks {
        registry.register(platform, config.factory());
    }
    PublishOrchestrator::new(store, Arc::new(registry))
}

#[tokio::test]
async fn test_all_success_publishes_post() {
    let fx = setup().await;
    let post = fx.post("Everywhere").await;
    let links = vec![
        fx.link(&post, "a").await,
        fx.link(&post, "b").await,
        fx.link(&post, "c").await,
    ];

    let a = MockConfig::success("a", "A1");
    let b = MockConfig::success("b", "B1");
    let c = MockConfig::success("c", "C1");
    fx.orchestrator(&[("a", &a), ("b", &b), ("c", &c)])
        .run(&post.id)
        .await
        .unwrap();

    for link in &links {
        let stored = fx.stored_link(&post.id, &link.id).await;
        assert_eq!(stored.status, PostStatus::Published);
        assert!(stored.platform_post_id.is_some());
        assert!(stored.error_message.is_none());
    }

    let stored = fx.stored_post(&post.id).await;
    assert_eq!(stored.status, PostStatus::Published);
    assert!(stored.published_at.is_some());
}

#[tokio::test]
async fn test_hello_partial_success_fails_post() {
    let fx = setup().await;
    let post = fx.post("Hello").await;
    let link_a = fx.link(&post, "a").await;
    let link_b = fx.link(&post, "b").await;

    let a = MockConfig::success("a", "A1");
    let b = MockConfig::failure("b", "rate limited");
    fx.orchestrator(&[("a", &a), ("b", &b)])
        .run(&post.id)
        .await
        .unwrap();

    let stored_a = fx.stored_link(&post.id, &link_a.id).await;
    assert_eq!(stored_a.status, PostStatus::Published);
    assert_eq!(stored_a.platform_post_id.as_deref(), Some("A1"));

    let stored_b = fx.stored_link(&post.id, &link_b.id).await;
    assert_eq!(stored_b.status, PostStatus::Failed);
    assert_eq!(stored_b.error_message.as_deref(), Some("rate limited"));

    let stored = fx.stored_post(&post.id).await;
    assert_eq!(stored.status, PostStatus::Failed);
    assert!(stored.published_at.is_none());
}

#[tokio::test]
async fn test_rerun_of_published_post_is_noop() {
    let fx = setup().await;
    let post = fx.post("Once").await;
    fx.link(&post, "a").await;
    fx.link(&post, "b").await;

    let a = MockConfig::success("a", "A1");
    let b = MockConfig::success("b", "B1");
    let orchestrator = fx.orchestrator(&[("a", &a), ("b", &b)]);

    orchestrator.run(&post.id).await.unwrap();
    let post_after_first = fx.stored_post(&post.id).await;
    let links_after_first = fx.db.get_links(&post.id).await.unwrap();

    let report = orchestrator.run(&post.id).await.unwrap();

    assert_eq!(a.publish_calls(), 1);
    assert_eq!(b.publish_calls(), 1);
    assert_eq!(report.attempted(), 0);
    assert!(report.links.iter().all(|l| l.result == LinkResult::Skipped));
    assert_eq!(fx.stored_post(&post.id).await, post_after_first);
    assert_eq!(fx.db.get_links(&post.id).await.unwrap(), links_after_first);
}

#[tokio::test]
async fn test_rerun_retries_only_failed_link() {
    let fx = setup().await;
    let post = fx.post("Retry").await;
    let link_a = fx.link(&post, "a").await;
    let link_b = fx.link(&post, "b").await;

    let a = MockConfig::success("a", "A1");
    let b_broken = MockConfig::failure("b", "temporarily down");
    fx.orchestrator(&[("a", &a), ("b", &b_broken)])
        .run(&post.id)
        .await
        .unwrap();
    assert_eq!(fx.stored_post(&post.id).await.status, PostStatus::Failed);

    // Second run with a recovered platform B
    let b_fixed = MockConfig::success("b", "B1");
    fx.orchestrator(&[("a", &a), ("b", &b_fixed)])
        .run(&post.id)
        .await
        .unwrap();

    assert_eq!(a.publish_calls(), 1);
    assert_eq!(b_fixed.publish_calls(), 1);

    let stored_b = fx.stored_link(&post.id, &link_b.id).await;
    assert_eq!(stored_b.status, PostStatus::Published);
    assert_eq!(stored_b.platform_post_id.as_deref(), Some("B1"));
    assert!(stored_b.error_message.is_none());
    assert_eq!(
        fx.stored_link(&post.id, &link_a.id).await.platform_post_id.as_deref(),
        Some("A1")
    );

    let stored = fx.stored_post(&post.id).await;
    assert_eq!(stored.status, PostStatus::Published);
    assert!(stored.published_at.is_some());
}

#[tokio::test]
async fn test_missing_media_fails_link_without_call() {
    let fx = setup().await;
    let post = fx.post("Text only").await;
    let link = fx.link(&post, "gram").await;

    let gram = MockConfig::success("gram", "G1").requiring_media();
    fx.orchestrator(&[("gram", &gram)])
        .run(&post.id)
        .await
        .unwrap();

    let stored = fx.stored_link(&post.id, &link.id).await;
    assert_eq!(stored.status, PostStatus::Failed);
    assert!(stored.error_message.unwrap().contains("media_url"));
    assert_eq!(gram.publish_calls(), 0);
}

#[tokio::test]
async fn test_unsupported_platform_does_not_stop_others() {
    let fx = setup().await;
    let post = fx.post("Mixed").await;
    let unknown = fx.link(&post, "myspace").await;
    let known = fx.link(&post, "a").await;

    let a = MockConfig::success("a", "A1");
    let report = fx
        .orchestrator(&[("a", &a)])
        .run(&post.id)
        .await
        .unwrap();

    let stored_unknown = fx.stored_link(&post.id, &unknown.id).await;
    assert_eq!(stored_unknown.status, PostStatus::Failed);
    assert_eq!(
        stored_unknown.error_message.as_deref(),
        Some("Unsupported platform: myspace")
    );
    assert_eq!(
        fx.stored_link(&post.id, &known.id).await.status,
        PostStatus::Published
    );
    assert_eq!(report.status, PostStatus::Failed);
    assert_eq!(a.publish_calls(), 1);
}

#[tokio::test]
async fn test_failed_link_keeps_previous_platform_id() {
    let fx = setup().await;
    let post = fx.post("Sticky").await;
    let mut link = fx.link(&post, "a").await;
    link.platform_post_id = Some("old-id".to_string());
    link.status = PostStatus::Failed;
    link.error_message = Some("earlier failure".to_string());
    fx.db.update_link(&link).await.unwrap();

    let a = MockConfig::failure("a", "still failing");
    fx.orchestrator(&[("a", &a)])
        .run(&post.id)
        .await
        .unwrap();

    let stored = fx.stored_link(&post.id, &link.id).await;
    assert_eq!(stored.status, PostStatus::Failed);
    assert_eq!(stored.error_message.as_deref(), Some("still failing"));
    assert_eq!(stored.platform_post_id.as_deref(), Some("old-id"));
}

#[tokio::test]
async fn test_run_with_no_links_is_noop() {
    let fx = setup().await;
    let post = fx.post("Nobody").await;

    let report = fx.orchestrator(&[]).run(&post.id).await.unwrap();

    assert!(report.links.is_empty());
    assert_eq!(fx.stored_post(&post.id).await, post);
}

#[tokio::test]
async fn test_unknown_post_is_not_found() {
    let fx = setup().await;
    let result = fx.orchestrator(&[]).run("missing-post").await;
    assert!(matches!(result, Err(FanoutError::PostNotFound(_))));
}

#[tokio::test]
async fn test_many_links_with_bounded_concurrency() {
    let fx = setup().await;
    let post = fx.post("Crowd").await;
    let mut mocks = Vec::new();
    for i in 0..12 {
        let name = format!("p{}", i);
        fx.link(&post, &name).await;
        mocks.push((name.clone(), MockConfig::success(&name, &format!("id-{}", i))));
    }

    let refs: Vec<(&str, &MockConfig)> = mocks.iter().map(|(n, c)| (n.as_str(), c)).collect();
    let report = fx
        .orchestrator(&refs)
        .with_max_concurrent_links(3)
        .run(&post.id)
        .await
        .unwrap();

    assert_eq!(report.published(), 12);
    assert_eq!(fx.stored_post(&post.id).await.status, PostStatus::Published);
}

/// Store wrapper whose post writes fail
struct BrokenPostWrites {
    inner: Database,
}

#[async_trait]
impl PostStore for BrokenPostWrites {
    async fn get_post(&self, post_id: &str) -> Result<Option<Post>> {
        self.inner.get_post(post_id).await
    }

    async fn get_links(&self, post_id: &str) -> Result<Vec<PlatformLink>> {
        self.inner.get_links(post_id).await
    }

    async fn get_account(&self, account_id: &str) -> Result<Option<PlatformAccount>> {
        self.inner.get_account(account_id).await
    }

    async fn save_link(&self, link: &PlatformLink) -> Result<()> {
        self.inner.update_link(link).await
    }

    async fn save_post_status(&self, _post_id: &str, _status: PostStatus, _at: i64) -> Result<()> {
        Err(FanoutError::Database(DbError::IoError(std::io::Error::new(
            std::io::ErrorKind::Other,
            "read-only filesystem",
        ))))
    }
}

#[tokio::test]
async fn test_post_write_failure_surfaces_and_rerun_recovers() {
    let fx = setup().await;
    let post = fx.post("Fragile").await;
    let link = fx.link(&post, "a").await;

    let a = MockConfig::success("a", "A1");
    let broken = orchestrator_over(
        Arc::new(BrokenPostWrites {
            inner: fx.db.clone(),
        }),
        &[("a", &a)],
    );

    let error = broken.run(&post.id).await.unwrap_err();
    assert!(matches!(error, FanoutError::Database(_)));
    assert!(error.is_retryable());

    // The link write landed, the post write did not
    assert_eq!(
        fx.stored_link(&post.id, &link.id).await.status,
        PostStatus::Published
    );
    assert_eq!(fx.stored_post(&post.id).await.status, PostStatus::Draft);

    // A healthy re-run repairs the post without calling the platform again
    fx.orchestrator(&[("a", &a)]).run(&post.id).await.unwrap();
    assert_eq!(a.publish_calls(), 1);
    let stored = fx.stored_post(&post.id).await;
    assert_eq!(stored.status, PostStatus::Published);
    assert!(stored.published_at.is_some());
}

#[tokio::test]
async fn test_edit_during_run_survives_post_write() {
    let fx = setup().await;
    let mut post = Post::new("user-1", "original");
    post.status = PostStatus::Scheduled;
    post.scheduled_at = Some(1_900_000_000);
    fx.db.create_post(&post).await.unwrap();
    fx.link(&post, "slow").await;

    let slow = MockConfig::success("slow", "S1").with_delay(Duration::from_millis(300));
    let orchestrator = fx.orchestrator(&[("slow", &slow)]);

    let edit = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        fx.db
            .update_post_content(&post.id, "edited", None, chrono::Utc::now().timestamp())
            .await
            .unwrap()
    };
    let (report, edited) = tokio::join!(orchestrator.run(&post.id), edit);

    assert!(edited);
    assert_eq!(report.unwrap().status, PostStatus::Published);
    assert_eq!(slow.published(), vec!["original".to_string()]);

    let stored = fx.stored_post(&post.id).await;
    assert_eq!(stored.content, "edited");
    assert_eq!(stored.scheduled_at, Some(1_900_000_000));
    assert_eq!(stored.status, PostStatus::Published);
    assert!(stored.published_at.is_some());
}
