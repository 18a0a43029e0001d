use uuid::Uuid;

use super::schema::Database;
use super::types::{DatabaseError, Feed};

const FEED_COLUMNS: &str = "id, name, url, user_id, last_fetched_at, created_at, updated_at";

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Insert a new feed owned by `user_id`.
    ///
    /// Fails with a unique violation if a feed with the same URL exists.
    pub async fn insert_feed(
        &self,
        name: &str,
        url: &str,
        user_id: Uuid,
    ) -> Result<Feed, DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        let feed = sqlx::query_as::<_, Feed>(&format!(
            r#"
            INSERT INTO feeds (id, name, url, user_id, last_fetched_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, NULL, ?, ?)
            RETURNING {FEED_COLUMNS}
        "#
        ))
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(url)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(feed)
    }

    pub async fn get_feed(&self, feed_id: Uuid) -> Result<Option<Feed>, DatabaseError> {
        let feed =
            sqlx::query_as::<_, Feed>(&format!("SELECT {FEED_COLUMNS} FROM feeds WHERE id = ?"))
                .bind(feed_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(feed)
    }

    /// All feeds, oldest first
    pub async fn get_feeds(&self) -> Result<Vec<Feed>, DatabaseError> {
        let feeds = sqlx::query_as::<_, Feed>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds ORDER BY created_at, url"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    // ========================================================================
    // Scheduler Queries
    // ========================================================================

    /// Select up to `limit` feeds, most overdue first.
    ///
    /// Never-fetched feeds come before any fetched feed; fetched feeds are
    /// ordered by oldest `last_fetched_at`. Returns fewer rows (or none) when
    /// fewer feeds exist.
    pub async fn select_due_feeds(&self, limit: u32) -> Result<Vec<Feed>, DatabaseError> {
        let feeds = sqlx::query_as::<_, Feed>(&format!(
            r#"
            SELECT {FEED_COLUMNS}
            FROM feeds
            ORDER BY last_fetched_at ASC NULLS FIRST, created_at ASC
            LIMIT ?
        "#
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    /// Stamp a feed as fetched now and return the updated row.
    ///
    /// `last_fetched_at` never moves backwards, even if the wall clock does.
    pub async fn mark_feed_fetched(&self, feed_id: Uuid) -> Result<Feed, DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        let feed = sqlx::query_as::<_, Feed>(&format!(
            r#"
            UPDATE feeds
            SET last_fetched_at = MAX(COALESCE(last_fetched_at, ?1), ?1),
                updated_at = ?1
            WHERE id = ?2
            RETURNING {FEED_COLUMNS}
        "#
        ))
        .bind(now)
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await?;

        feed.ok_or(DatabaseError::NotFound("Feed"))
    }
}
