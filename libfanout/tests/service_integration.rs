//! Integration tests for FanoutService
//!
//! Runs the service end to end: real platform adapters pointed at a local
//! mock HTTP server, a temporary SQLite database, and scheduled runs.

use chrono::Utc;
use libfanout::config::Config;
use libfanout::platforms::mock::MockConfig;
use libfanout::service::{FanoutService, NewPost};
use libfanout::{AdapterRegistry, Database, PostStatus};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(temp_dir: &TempDir, server: &MockServer) -> Config {
    let db_path = temp_dir.path().join("fanout.db");
    let toml = format!(
        r#"
[database]
path = "{db}"

[publishing]
timeout_secs = 5

[platforms.facebook]
graph_url = "{uri}"

[platforms.instagram]
business_id = "1784"
graph_url = "{uri}"

[platforms.linkedin]
api_url = "{uri}"
"#,
        db = db_path.display().to_string().replace('\\', "/"),
        uri = server.uri()
    );
    Config::from_toml(&toml).unwrap()
}

#[tokio::test]
async fn test_end_to_end_with_real_adapters() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/me/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "fb-1"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "member"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/ugcPosts"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "li-1"})))
        .expect(1)
        .mount(&server)
        .await;
    // Instagram must never be contacted for a text-only post
    Mock::given(method("POST"))
        .and(path("/1784/media"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let service = FanoutService::from_config(config_for(&temp_dir, &server))
        .await
        .unwrap();

    let facebook = service.add_account("Facebook", "fb-token", None).await.unwrap();
    let linkedin = service.add_account("linkedin", "li-token", None).await.unwrap();
    let instagram = service.add_account("instagram", "ig-token", None).await.unwrap();

    let created = service
        .create_post(NewPost {
            content: "Launch day".to_string(),
            media_url: None,
            account_ids: vec![facebook.id.clone(), linkedin.id.clone(), instagram.id.clone()],
            publish: true,
        })
        .await
        .unwrap();

    assert_eq!(created.post.status, PostStatus::Failed);
    let by_account = |id: &str| {
        created
            .links
            .iter()
            .find(|l| l.account_id == id)
            .cloned()
            .unwrap()
    };
    assert_eq!(by_account(facebook.id.as_str()).platform_post_id.as_deref(), Some("fb-1"));
    assert_eq!(by_account(linkedin.id.as_str()).platform_post_id.as_deref(), Some("li-1"));

    let ig = by_account(instagram.id.as_str());
    assert_eq!(ig.status, PostStatus::Failed);
    assert!(ig
        .error_message
        .unwrap()
        .contains("Instagram requires a media_url (image/video)"));
}

#[tokio::test]
async fn test_process_due_runs_only_due_posts() {
    let db = Database::new(":memory:").await.unwrap();
    let a = MockConfig::success("a", "A1");
    let mut registry = AdapterRegistry::new();
    registry.register("a", a.factory());
    let service = FanoutService::with_registry(db, registry, Config::default_config());

    let account = service.add_account("a", "token", None).await.unwrap();
    let mut ids = Vec::new();
    for content in ["first", "second"] {
        let created = service
            .create_post(NewPost {
                content: content.to_string(),
                account_ids: vec![account.id.clone()],
                ..Default::default()
            })
            .await
            .unwrap();
        ids.push(created.post.id);
    }

    let soon = Utc::now() + chrono::Duration::minutes(10);
    let later = Utc::now() + chrono::Duration::days(2);
    service.schedule(&ids[0], soon).await.unwrap();
    service.schedule(&ids[1], later).await.unwrap();

    let links = service.get_post(&ids[0]).await.unwrap().links;
    assert!(links.iter().all(|l| l.status == PostStatus::Scheduled));

    // Nothing is due yet
    assert!(service.process_due(Utc::now().timestamp()).await.unwrap().is_empty());

    // Pretend an hour has passed
    let an_hour_on = (Utc::now() + chrono::Duration::hours(1)).timestamp();
    let reports = service.process_due(an_hour_on).await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].post_id, ids[0]);
    assert_eq!(a.publish_calls(), 1);

    let first = service.get_post(&ids[0]).await.unwrap().post;
    assert_eq!(first.status, PostStatus::Published);
    let second = service.get_post(&ids[1]).await.unwrap().post;
    assert_eq!(second.status, PostStatus::Scheduled);

    // A published post is not picked up again
    assert!(service.process_due(an_hour_on).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_posts_filters_by_status() {
    let db = Database::new(":memory:").await.unwrap();
    let a = MockConfig::success("a", "A1");
    let mut registry = AdapterRegistry::new();
    registry.register("a", a.factory());
    let service = FanoutService::with_registry(db, registry, Config::default_config());
    let account = service.add_account("a", "token", None).await.unwrap();

    service
        .create_post(NewPost {
            content: "draft".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    service
        .create_post(NewPost {
            content: "live".to_string(),
            account_ids: vec![account.id],
            publish: true,
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(service.list_posts(None, 10).await.unwrap().len(), 2);
    let published = service
        .list_posts(Some(PostStatus::Published), 10)
        .await
        .unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].content, "live");
}
