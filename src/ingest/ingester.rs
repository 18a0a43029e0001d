use std::sync::Arc;

use uuid::Uuid;

use crate::feed::RawItem;
use crate::ingest::pubdate::{parse_pub_date, PubDateError};
use crate::storage::{FeedStore, InsertPostError, NewPost};

/// Terminal state of a single item.
///
/// Exactly one outcome is produced per item; none of them is an error for
/// the feed or the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A new post was inserted
    Stored,
    /// A post with the same URL already exists
    Duplicate,
    /// `pubDate` did not parse; nothing inserted
    UnparseableDate,
    /// Insert failed for another reason (logged)
    Failed,
}

/// Per-outcome counters for one feed's items
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestTally {
    pub stored: usize,
    pub duplicates: usize,
    pub unparseable_dates: usize,
    pub failed: usize,
}

impl IngestTally {
    pub fn record(&mut self, outcome: IngestOutcome) {
        match outcome {
            IngestOutcome::Stored => self.stored += 1,
            IngestOutcome::Duplicate => self.duplicates += 1,
            IngestOutcome::UnparseableDate => self.unparseable_dates += 1,
            IngestOutcome::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.stored + self.duplicates + self.unparseable_dates + self.failed
    }

    pub fn merge(&mut self, other: &IngestTally) {
        self.stored += other.stored;
        self.duplicates += other.duplicates;
        self.unparseable_dates += other.unparseable_dates;
        self.failed += other.failed;
    }
}

/// Normalize a raw item into an insertable post.
///
/// An empty description becomes `None`; the publish date must parse.
pub fn build_post(feed_id: Uuid, item: &RawItem) -> Result<NewPost, PubDateError> {
    let published_at = parse_pub_date(&item.pub_date)?;

    let description = if item.description.is_empty() {
        None
    } else {
        Some(item.description.clone())
    };

    Ok(NewPost::new(
        feed_id,
        item.title.clone(),
        description,
        item.link.clone(),
        published_at.timestamp(),
    ))
}

/// Converts parsed items into stored posts.
pub struct Ingester<S> {
    store: Arc<S>,
}

impl<S> Clone for Ingester<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: FeedStore> Ingester<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Persist one item for `feed_id`, logging anything worth logging.
    pub async fn ingest(&self, feed_id: Uuid, item: &RawItem) -> IngestOutcome {
        let post = match build_post(feed_id, item) {
            Ok(post) => post,
            Err(e) => {
                tracing::warn!(
                    feed_id = %feed_id,
                    url = %item.link,
                    error = %e,
                    "Skipping item with unparseable publish date"
                );
                return IngestOutcome::UnparseableDate;
            }
        };

        match self.store.insert_post(&post).await {
            Ok(_) => IngestOutcome::Stored,
            Err(InsertPostError::Duplicate) => {
                tracing::debug!(feed_id = %feed_id, url = %post.url, "Post already stored");
                IngestOutcome::Duplicate
            }
            Err(InsertPostError::Other(e)) => {
                tracing::error!(
                    feed_id = %feed_id,
                    url = %post.url,
                    error = %e,
                    "Failed to store post"
                );
                IngestOutcome::Failed
            }
        }
    }
}
