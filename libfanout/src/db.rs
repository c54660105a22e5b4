//! SQLite persistence for posts, platform accounts and links

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use crate::error::{DbError, Result};
use crate::store::PostStore;
use crate::types::{Credential, PlatformAccount, PlatformLink, Post, PostStatus};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database at `db_path` and run migrations.
    ///
    /// `":memory:"` opens a private in-memory database on a single pooled
    /// connection.
    pub async fn new(db_path: &str) -> Result<Self> {
        let pool = if db_path == ":memory:" {
            let options = SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(DbError::SqlxError)?
                .foreign_keys(true);
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await
                .map_err(DbError::SqlxError)?
        } else {
            let expanded_path = shellexpand::tilde(db_path).to_string();
            let path = Path::new(&expanded_path);

            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
                }
            }

            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .foreign_keys(true);
            SqlitePool::connect_with(options)
                .await
                .map_err(DbError::SqlxError)?
        };

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    // ------------------------------------------------------------------
    // Posts
    // ------------------------------------------------------------------

    pub async fn create_post(&self, post: &Post) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO posts (id, user_id, content, media_url, status, scheduled_at,
                               published_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.user_id)
        .bind(&post.content)
        .bind(&post.media_url)
        .bind(post.status.as_str())
        .bind(post.scheduled_at)
        .bind(post.published_at)
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_post(&self, post_id: &str) -> Result<Option<Post>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, content, media_url, status, scheduled_at,
                   published_at, created_at, updated_at
            FROM posts WHERE id = ?
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        row.as_ref().map(row_to_post).transpose()
    }

    /// Replace the editable fields of a draft or scheduled post.
    ///
    /// Returns `false` when the post is missing or has left the editable
    /// states, e.g. because a run finished in the meantime.
    pub async fn update_post_content(
        &self,
        post_id: &str,
        content: &str,
        media_url: Option<&str>,
        updated_at: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET content = ?, media_url = ?, updated_at = ?
            WHERE id = ? AND status IN ('draft', 'scheduled')
            "#,
        )
        .bind(content)
        .bind(media_url)
        .bind(updated_at)
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Record a run's outcome without touching content, media or schedule
    pub async fn update_post_status(
        &self,
        post_id: &str,
        status: PostStatus,
        at: i64,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET status = ?,
                updated_at = ?,
                published_at = CASE
                    WHEN ? = 'published' THEN COALESCE(published_at, ?)
                    ELSE published_at
                END
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(at)
        .bind(status.as_str())
        .bind(at)
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        if result.rows_affected() == 0 {
            return Err(DbError::MissingRow {
                table: "posts",
                id: post_id.to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// List posts newest first, optionally filtered by owner and status
    pub async fn list_posts(
        &self,
        user_id: Option<&str>,
        status: Option<PostStatus>,
        limit: usize,
    ) -> Result<Vec<Post>> {
        let mut where_clauses = vec!["1=1"];
        if user_id.is_some() {
            where_clauses.push("user_id = ?");
        }
        if status.is_some() {
            where_clauses.push("status = ?");
        }

        let query_str = format!(
            r#"
            SELECT id, user_id, content, media_url, status, scheduled_at,
                   published_at, created_at, updated_at
            FROM posts
            WHERE {}
            ORDER BY created_at DESC, id
            LIMIT ?
            "#,
            where_clauses.join(" AND ")
        );

        let mut query = sqlx::query(&query_str);
        if let Some(user) = user_id {
            query = query.bind(user);
        }
        if let Some(s) = status {
            query = query.bind(s.as_str());
        }
        query = query.bind(limit as i64);

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        rows.iter().map(row_to_post).collect()
    }

    /// Scheduled posts whose time has come
    pub async fn get_scheduled_posts_due(&self, now: i64) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, content, media_url, status, scheduled_at,
                   published_at, created_at, updated_at
            FROM posts
            WHERE status = 'scheduled'
              AND scheduled_at IS NOT NULL
              AND scheduled_at <= ?
            ORDER BY scheduled_at ASC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(row_to_post).collect()
    }

    /// Move a post and its unresolved links to `scheduled` in one transaction
    pub async fn mark_scheduled(&self, post_id: &str, scheduled_at: i64) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(DbError::SqlxError)?;

        let result = sqlx::query(
            r#"
            UPDATE posts SET status = 'scheduled', scheduled_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(scheduled_at)
        .bind(now)
        .bind(post_id)
        .execute(&mut *tx)
        .await
        .map_err(DbError::SqlxError)?;

        if result.rows_affected() == 0 {
            return Err(DbError::MissingRow {
                table: "posts",
                id: post_id.to_string(),
            }
            .into());
        }

        sqlx::query(
            r#"
            UPDATE post_platform_links SET status = 'scheduled', updated_at = ?
            WHERE post_id = ? AND status != 'published'
            "#,
        )
        .bind(now)
        .bind(post_id)
        .execute(&mut *tx)
        .await
        .map_err(DbError::SqlxError)?;

        tx.commit().await.map_err(DbError::SqlxError)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Platform accounts
    // ------------------------------------------------------------------

    pub async fn create_account(&self, account: &PlatformAccount) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO platform_accounts (id, user_id, platform, platform_user_id,
                                           access_token, refresh_token, expires_at,
                                           created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.id)
        .bind(&account.user_id)
        .bind(&account.platform)
        .bind(&account.platform_user_id)
        .bind(account.credential.access_token.expose_secret())
        .bind(
            account
                .credential
                .refresh_token
                .as_ref()
                .map(|t| t.expose_secret().to_string()),
        )
        .bind(account.credential.expires_at)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_account(&self, account_id: &str) -> Result<Option<PlatformAccount>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, platform, platform_user_id, access_token, refresh_token,
                   expires_at, created_at, updated_at
            FROM platform_accounts WHERE id = ?
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(row.as_ref().map(row_to_account))
    }

    pub async fn list_accounts(&self, user_id: Option<&str>) -> Result<Vec<PlatformAccount>> {
        let rows = match user_id {
            Some(user) => {
                sqlx::query(
                    r#"
                    SELECT id, user_id, platform, platform_user_id, access_token,
                           refresh_token, expires_at, created_at, updated_at
                    FROM platform_accounts WHERE user_id = ?
                    ORDER BY created_at, id
                    "#,
                )
                .bind(user)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT id, user_id, platform, platform_user_id, access_token,
                           refresh_token, expires_at, created_at, updated_at
                    FROM platform_accounts
                    ORDER BY created_at, id
                    "#,
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(DbError::SqlxError)?;

        Ok(rows.iter().map(row_to_account).collect())
    }

    // ------------------------------------------------------------------
    // Links
    // ------------------------------------------------------------------

    pub async fn create_link(&self, link: &PlatformLink) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO post_platform_links (id, post_id, account_id, status,
                                             platform_post_id, error_message, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&link.id)
        .bind(&link.post_id)
        .bind(&link.account_id)
        .bind(link.status.as_str())
        .bind(&link.platform_post_id)
        .bind(&link.error_message)
        .bind(link.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_links(&self, post_id: &str) -> Result<Vec<PlatformLink>> {
        let rows = sqlx::query(
            r#"
            SELECT id, post_id, account_id, status, platform_post_id, error_message, updated_at
            FROM post_platform_links
            WHERE post_id = ?
            ORDER BY rowid
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(row_to_link).collect()
    }

    /// Write a link's status and result columns with one statement
    pub async fn update_link(&self, link: &PlatformLink) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE post_platform_links
            SET status = ?, platform_post_id = ?, error_message = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(link.status.as_str())
        .bind(&link.platform_post_id)
        .bind(&link.error_message)
        .bind(link.updated_at)
        .bind(&link.id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        if result.rows_affected() == 0 {
            return Err(DbError::MissingRow {
                table: "post_platform_links",
                id: link.id.clone(),
            }
            .into());
        }

        Ok(())
    }
}

#[async_trait]
impl PostStore for Database {
    async fn get_post(&self, post_id: &str) -> Result<Option<Post>> {
        Database::get_post(self, post_id).await
    }

    async fn get_links(&self, post_id: &str) -> Result<Vec<PlatformLink>> {
        Database::get_links(self, post_id).await
    }

    async fn get_account(&self, account_id: &str) -> Result<Option<PlatformAccount>> {
        Database::get_account(self, account_id).await
    }

    async fn save_link(&self, link: &PlatformLink) -> Result<()> {
        self.update_link(link).await
    }

    async fn save_post_status(&self, post_id: &str, status: PostStatus, at: i64) -> Result<()> {
        self.update_post_status(post_id, status, at).await
    }
}

fn parse_status(table: &'static str, raw: &str) -> Result<PostStatus> {
    raw.parse::<PostStatus>().map_err(|_| {
        DbError::CorruptRow {
            table,
            detail: format!("unknown status '{}'", raw),
        }
        .into()
    })
}

fn row_to_post(r: &SqliteRow) -> Result<Post> {
    Ok(Post {
        id: r.get("id"),
        user_id: r.get("user_id"),
        content: r.get("content"),
        media_url: r.get("media_url"),
        status: parse_status("posts", &r.get::<String, _>("status"))?,
        scheduled_at: r.get("scheduled_at"),
        published_at: r.get("published_at"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}

fn row_to_link(r: &SqliteRow) -> Result<PlatformLink> {
    Ok(PlatformLink {
        id: r.get("id"),
        post_id: r.get("post_id"),
        account_id: r.get("account_id"),
        status: parse_status("post_platform_links", &r.get::<String, _>("status"))?,
        platform_post_id: r.get("platform_post_id"),
        error_message: r.get("error_message"),
        updated_at: r.get("updated_at"),
    })
}

fn row_to_account(r: &SqliteRow) -> PlatformAccount {
    PlatformAccount {
        id: r.get("id"),
        user_id: r.get("user_id"),
        platform: r.get("platform"),
        platform_user_id: r.get("platform_user_id"),
        credential: Credential {
            access_token: SecretString::from(r.get::<String, _>("access_token")),
            refresh_token: r
                .get::<Option<String>, _>("refresh_token")
                .map(SecretString::from),
            expires_at: r.get("expires_at"),
        },
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FanoutError;
    use tempfile::TempDir;

    async fn memory_db() -> Database {
        Database::new(":memory:").await.unwrap()
    }

    async fn seed_account(db: &Database, platform: &str) -> PlatformAccount {
        let account = PlatformAccount::new("user-1", platform, Credential::new("token"));
        db.create_account(&account).await.unwrap();
        account
    }

    #[tokio::test]
    async fn test_create_and_retrieve_post() {
        let db = memory_db().await;
        let post = Post::new("user-1", "Hello").with_media("https://cdn.example/img.jpg");
        db.create_post(&post).await.unwrap();

        let retrieved = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(retrieved, post);
    }

    #[tokio::test]
    async fn test_get_nonexistent_post_returns_none() {
        let db = memory_db().await;
        assert!(db.get_post("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_database_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("fanout.db");

        let db = Database::new(db_path.to_str().unwrap()).await.unwrap();
        let post = Post::new("user-1", "persisted");
        db.create_post(&post).await.unwrap();

        assert!(db_path.exists());
        assert!(db.get_post(&post.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_post_status_sets_published_at_once() {
        let db = memory_db().await;
        let post = Post::new("user-1", "Hello");
        db.create_post(&post).await.unwrap();

        db.update_post_status(&post.id, PostStatus::Failed, 1_600_000_000)
            .await
            .unwrap();
        let failed = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(failed.status, PostStatus::Failed);
        assert_eq!(failed.published_at, None);

        db.update_post_status(&post.id, PostStatus::Published, 1_700_000_000)
            .await
            .unwrap();
        db.update_post_status(&post.id, PostStatus::Published, 1_800_000_000)
            .await
            .unwrap();

        let retrieved = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(retrieved.status, PostStatus::Published);
        assert_eq!(retrieved.published_at, Some(1_700_000_000));
        assert_eq!(retrieved.updated_at, 1_800_000_000);
    }

    #[tokio::test]
    async fn test_update_post_status_keeps_edited_fields() {
        let db = memory_db().await;
        let mut post = Post::new("user-1", "original");
        post.status = PostStatus::Scheduled;
        post.scheduled_at = Some(1_650_000_000);
        db.create_post(&post).await.unwrap();

        let edited = db
            .update_post_content(&post.id, "edited", Some("https://cdn.test/a.png"), 1_650_000_001)
            .await
            .unwrap();
        assert!(edited);

        db.update_post_status(&post.id, PostStatus::Published, 1_650_000_002)
            .await
            .unwrap();

        let retrieved = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(retrieved.content, "edited");
        assert_eq!(retrieved.media_url.as_deref(), Some("https://cdn.test/a.png"));
        assert_eq!(retrieved.scheduled_at, Some(1_650_000_000));
    }

    #[tokio::test]
    async fn test_update_post_content_refuses_finished_posts() {
        let db = memory_db().await;
        let post = Post::new("user-1", "done");
        db.create_post(&post).await.unwrap();
        db.update_post_status(&post.id, PostStatus::Published, 1_700_000_000)
            .await
            .unwrap();

        let edited = db
            .update_post_content(&post.id, "too late", None, 1_700_000_001)
            .await
            .unwrap();
        assert!(!edited);
        assert_eq!(db.get_post(&post.id).await.unwrap().unwrap().content, "done");
    }

    #[tokio::test]
    async fn test_update_missing_post_is_an_error() {
        let db = memory_db().await;

        match db.update_post_status("never-inserted", PostStatus::Failed, 1).await {
            Err(FanoutError::Database(DbError::MissingRow { table, .. })) => {
                assert_eq!(table, "posts");
            }
            other => panic!("Expected MissingRow, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_account_round_trip_keeps_credential() {
        let db = memory_db().await;
        let mut account =
            PlatformAccount::new("user-1", "linkedin", Credential::new("access-123"));
        account.credential.refresh_token = Some(SecretString::from("refresh-456".to_string()));
        account.credential.expires_at = Some(1_800_000_000);
        account.platform_user_id = Some("member-9".to_string());
        db.create_account(&account).await.unwrap();

        let retrieved = db.get_account(&account.id).await.unwrap().unwrap();
        assert_eq!(retrieved.platform, "linkedin");
        assert_eq!(retrieved.platform_user_id.as_deref(), Some("member-9"));
        assert_eq!(retrieved.credential.access_token.expose_secret(), "access-123");
        assert_eq!(
            retrieved
                .credential
                .refresh_token
                .as_ref()
                .map(|t| t.expose_secret().to_string()),
            Some("refresh-456".to_string())
        );
        assert_eq!(retrieved.credential.expires_at, Some(1_800_000_000));
    }

    #[tokio::test]
    async fn test_links_round_trip_and_update() {
        let db = memory_db().await;
        let post = Post::new("user-1", "Hello");
        db.create_post(&post).await.unwrap();
        let account = seed_account(&db, "facebook").await;

        let mut link = PlatformLink::new(&post.id, &account.id);
        db.create_link(&link).await.unwrap();

        link.mark_published("fb_123".to_string());
        db.update_link(&link).await.unwrap();

        let links = db.get_links(&post.id).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].status, PostStatus::Published);
        assert_eq!(links[0].platform_post_id.as_deref(), Some("fb_123"));
        assert!(links[0].error_message.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_link_for_same_account_rejected() {
        let db = memory_db().await;
        let post = Post::new("user-1", "Hello");
        db.create_post(&post).await.unwrap();
        let account = seed_account(&db, "facebook").await;

        db.create_link(&PlatformLink::new(&post.id, &account.id))
            .await
            .unwrap();
        let result = db.create_link(&PlatformLink::new(&post.id, &account.id)).await;
        assert!(result.is_err(), "Expected UNIQUE(post_id, account_id) violation");
    }

    #[tokio::test]
    async fn test_link_requires_existing_post() {
        let db = memory_db().await;
        let account = seed_account(&db, "facebook").await;

        let result = db
            .create_link(&PlatformLink::new("no-such-post", &account.id))
            .await;
        assert!(result.is_err(), "Expected foreign key violation");
    }

    #[tokio::test]
    async fn test_list_posts_filters_by_status() {
        let db = memory_db().await;
        let draft = Post::new("user-1", "draft");
        let mut failed = Post::new("user-1", "failed");
        failed.status = PostStatus::Failed;
        let other_user = Post::new("user-2", "someone else");
        db.create_post(&draft).await.unwrap();
        db.create_post(&failed).await.unwrap();
        db.create_post(&other_user).await.unwrap();

        let all_user1 = db.list_posts(Some("user-1"), None, 10).await.unwrap();
        assert_eq!(all_user1.len(), 2);

        let failed_only = db
            .list_posts(None, Some(PostStatus::Failed), 10)
            .await
            .unwrap();
        assert_eq!(failed_only.len(), 1);
        assert_eq!(failed_only[0].id, failed.id);
    }

    #[tokio::test]
    async fn test_mark_scheduled_and_query_due() {
        let db = memory_db().await;
        let post = Post::new("user-1", "later");
        db.create_post(&post).await.unwrap();
        let account = seed_account(&db, "facebook").await;
        db.create_link(&PlatformLink::new(&post.id, &account.id))
            .await
            .unwrap();

        db.mark_scheduled(&post.id, 1_000).await.unwrap();

        let stored = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PostStatus::Scheduled);
        assert_eq!(stored.scheduled_at, Some(1_000));
        let links = db.get_links(&post.id).await.unwrap();
        assert_eq!(links[0].status, PostStatus::Scheduled);

        assert!(db.get_scheduled_posts_due(999).await.unwrap().is_empty());
        let due = db.get_scheduled_posts_due(1_000).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, post.id);
    }

    #[tokio::test]
    async fn test_mark_scheduled_keeps_published_links() {
        let db = memory_db().await;
        let post = Post::new("user-1", "retry later");
        db.create_post(&post).await.unwrap();
        let account = seed_account(&db, "facebook").await;
        let mut link = PlatformLink::new(&post.id, &account.id);
        link.mark_published("fb_1".to_string());
        db.create_link(&link).await.unwrap();

        db.mark_scheduled(&post.id, 2_000).await.unwrap();

        let links = db.get_links(&post.id).await.unwrap();
        assert_eq!(links[0].status, PostStatus::Published);
    }
}
