use uuid::Uuid;

use super::schema::Database;
use super::types::{DatabaseError, InsertPostError, NewPost, Post};

/// Maximum number of posts to return from any single query (OOM protection)
const MAX_POSTS: i64 = 2000;

const POST_COLUMNS: &str =
    "id, feed_id, title, description, url, published_at, created_at, updated_at";

impl Database {
    // ========================================================================
    // Post Operations
    // ========================================================================

    /// Insert a single post.
    ///
    /// A post whose URL is already stored yields [`InsertPostError::Duplicate`]
    /// and leaves the existing row untouched.
    pub async fn insert_post(&self, post: &NewPost) -> Result<Post, InsertPostError> {
        let row = sqlx::query_as::<_, Post>(&format!(
            r#"
            INSERT INTO posts (id, feed_id, title, description, url, published_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {POST_COLUMNS}
        "#
        ))
        .bind(post.id)
        .bind(post.feed_id)
        .bind(&post.title)
        .bind(&post.description)
        .bind(&post.url)
        .bind(post.published_at)
        .bind(post.created_at)
        .bind(post.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    // ========================================================================
    // Post Queries
    // ========================================================================

    /// Posts for a feed, newest first, capped at `limit` (default 500)
    pub async fn get_posts_for_feed(
        &self,
        feed_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<Post>, DatabaseError> {
        let limit = limit.unwrap_or(500).min(MAX_POSTS);
        let posts = sqlx::query_as::<_, Post>(&format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts
            WHERE feed_id = ?
            ORDER BY published_at DESC, created_at DESC
            LIMIT ?
        "#
        ))
        .bind(feed_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    pub async fn get_post_by_url(&self, url: &str) -> Result<Option<Post>, DatabaseError> {
        let post =
            sqlx::query_as::<_, Post>(&format!("SELECT {POST_COLUMNS} FROM posts WHERE url = ?"))
                .bind(url)
                .fetch_optional(&self.pool)
                .await?;
        Ok(post)
    }

    /// Count posts, optionally restricted to a single feed
    pub async fn count_posts(&self, feed_id: Option<Uuid>) -> Result<i64, DatabaseError> {
        let count: (i64,) = match feed_id {
            Some(id) => {
                sqlx::query_as("SELECT COUNT(*) FROM posts WHERE feed_id = ?")
                    .bind(id)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT COUNT(*) FROM posts")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(count.0)
    }
}
