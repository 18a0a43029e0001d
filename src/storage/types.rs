use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// A row that must exist was not found
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

/// Outcome of a failed post insert.
///
/// `Duplicate` is the expected result of re-ingesting an item whose URL is
/// already stored and should not be reported as a failure.
#[derive(Debug, Error)]
pub enum InsertPostError {
    #[error("A post with this URL already exists")]
    Duplicate,

    #[error(transparent)]
    Other(#[from] DatabaseError),
}

impl From<sqlx::Error> for InsertPostError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => Self::Duplicate,
            _ => Self::Other(DatabaseError::Other(err)),
        }
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// Owner of a feed subscription
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Feed source with fetch bookkeeping.
///
/// `last_fetched_at` is `None` until the feed is first picked up by the
/// scheduler. Timestamps are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Feed {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub user_id: Uuid,
    pub last_fetched_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Post data from database
///
/// `description` is NULL when the source item had no description text, and
/// `Some("")` only if an empty string was stored explicitly.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub feed_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub published_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A post ready to be inserted
#[derive(Debug, Clone)]
pub struct NewPost {
    pub id: Uuid,
    pub feed_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub published_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl NewPost {
    /// Build a post with a fresh id and `created_at`/`updated_at` set to now.
    pub fn new(
        feed_id: Uuid,
        title: impl Into<String>,
        description: Option<String>,
        url: impl Into<String>,
        published_at: i64,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: Uuid::new_v4(),
            feed_id,
            title: title.into(),
            description,
            url: url.into(),
            published_at,
            created_at: now,
            updated_at: now,
        }
    }
}
