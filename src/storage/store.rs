//! The narrow storage contract the ingestion core depends on.

use async_trait::async_trait;
use uuid::Uuid;

use super::schema::Database;
use super::types::{DatabaseError, Feed, InsertPostError, NewPost, Post};

/// Storage operations used by the scheduler and its workers.
///
/// Implementations are shared by every concurrently running worker, so they
/// must be `Send + Sync` and do their own pooling.
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// Up to `limit` feeds, never-fetched first, then oldest fetch first.
    async fn select_due_feeds(&self, limit: u32) -> Result<Vec<Feed>, DatabaseError>;

    /// Set the feed's last-fetch timestamp to now.
    async fn mark_fetched(&self, feed_id: Uuid) -> Result<Feed, DatabaseError>;

    /// Persist a post; duplicates by URL are reported, not stored.
    async fn insert_post(&self, post: &NewPost) -> Result<Post, InsertPostError>;
}

#[async_trait]
impl FeedStore for Database {
    async fn select_due_feeds(&self, limit: u32) -> Result<Vec<Feed>, DatabaseError> {
        Database::select_due_feeds(self, limit).await
    }

    async fn mark_fetched(&self, feed_id: Uuid) -> Result<Feed, DatabaseError> {
        self.mark_feed_fetched(feed_id).await
    }

    async fn insert_post(&self, post: &NewPost) -> Result<Post, InsertPostError> {
        Database::insert_post(self, post).await
    }
}
