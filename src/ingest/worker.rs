use std::sync::Arc;

use uuid::Uuid;

use crate::feed::Fetcher;
use crate::ingest::ingester::{IngestTally, Ingester};
use crate::storage::{Feed, FeedStore};

/// How far a feed got through its worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    /// Marked, fetched and ingested
    Completed,
    /// Marked, but the fetch failed; no items were ingested
    FetchFailed,
    /// Could not be marked fetched; nothing else was attempted
    MarkFailed,
}

/// Result of processing one feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedReport {
    pub feed_id: Uuid,
    pub status: FeedStatus,
    /// Items found in the fetched document
    pub observed: usize,
    pub tally: IngestTally,
}

/// Processes a single feed: mark fetched, fetch, ingest.
///
/// Never returns an error; every failure is logged and folded into the
/// [`FeedReport`] so sibling feeds in the batch are unaffected.
pub struct Worker<S> {
    store: Arc<S>,
    fetcher: Fetcher,
    ingester: Ingester<S>,
}

impl<S> Clone for Worker<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            fetcher: self.fetcher.clone(),
            ingester: self.ingester.clone(),
        }
    }
}

impl<S: FeedStore> Worker<S> {
    pub fn new(store: Arc<S>, fetcher: Fetcher) -> Self {
        let ingester = Ingester::new(Arc::clone(&store));
        Self {
            store,
            fetcher,
            ingester,
        }
    }

    pub async fn process(&self, feed: &Feed) -> FeedReport {
        let mut report = FeedReport {
            feed_id: feed.id,
            status: FeedStatus::MarkFailed,
            observed: 0,
            tally: IngestTally::default(),
        };

        if let Err(e) = self.store.mark_fetched(feed.id).await {
            tracing::error!(
                feed_id = %feed.id,
                name = %feed.name,
                error = %e,
                "Failed to mark feed as fetched"
            );
            return report;
        }

        // A failed fetch still counts as fetched; the feed comes due again
        // through its bumped timestamp.
        let items = match self.fetcher.fetch(&feed.url).await {
            Ok(doc) => {
                report.status = FeedStatus::Completed;
                doc.items
            }
            Err(e) => {
                tracing::warn!(
                    feed_id = %feed.id,
                    url = %feed.url,
                    error = %e,
                    "Failed to fetch feed"
                );
                report.status = FeedStatus::FetchFailed;
                Vec::new()
            }
        };

        report.observed = items.len();
        for item in &items {
            let outcome = self.ingester.ingest(feed.id, item).await;
            report.tally.record(outcome);
        }

        tracing::info!(
            feed_id = %feed.id,
            name = %feed.name,
            posts = report.observed,
            stored = report.tally.stored,
            duplicates = report.tally.duplicates,
            skipped = report.tally.unparseable_dates,
            failed = report.tally.failed,
            "Feed collected"
        );

        report
    }
}
