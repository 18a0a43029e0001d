use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::feed::Fetcher;
use crate::ingest::ingester::IngestTally;
use crate::ingest::worker::{FeedReport, FeedStatus, Worker};
use crate::storage::FeedStore;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Scheduler interval must be non-zero")]
    ZeroInterval,
}

/// Outcome of one select-dispatch-join cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Selection failed; no feeds were processed
    pub selection_failed: bool,
    /// One report per selected feed, in completion order
    pub feeds: Vec<FeedReport>,
}

impl CycleReport {
    pub fn tally(&self) -> IngestTally {
        let mut total = IngestTally::default();
        for feed in &self.feeds {
            total.merge(&feed.tally);
        }
        total
    }

    pub fn count_status(&self, status: FeedStatus) -> usize {
        self.feeds.iter().filter(|f| f.status == status).count()
    }
}

/// Totals across every cycle of a [`Scheduler::run`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerSummary {
    pub cycles: usize,
    pub failed_selections: usize,
    pub feeds_processed: usize,
    pub tally: IngestTally,
}

impl SchedulerSummary {
    fn record(&mut self, cycle: &CycleReport) {
        self.cycles += 1;
        if cycle.selection_failed {
            self.failed_selections += 1;
        }
        self.feeds_processed += cycle.feeds.len();
        self.tally.merge(&cycle.tally());
    }
}

/// Drives the ingestion cycle.
///
/// Each cycle selects up to `batch_size` due feeds, runs one [`Worker`] per
/// feed concurrently and waits for all of them before the cycle ends.
/// Cycles start at a fixed rate of one per `interval`.
pub struct Scheduler<S> {
    store: Arc<S>,
    worker: Worker<S>,
    batch_size: NonZeroU32,
    interval: Duration,
}

impl<S: FeedStore> Scheduler<S> {
    /// # Errors
    ///
    /// [`SchedulerError::ZeroInterval`] if `interval` is zero.
    pub fn new(
        store: Arc<S>,
        fetcher: Fetcher,
        batch_size: NonZeroU32,
        interval: Duration,
    ) -> Result<Self, SchedulerError> {
        if interval.is_zero() {
            return Err(SchedulerError::ZeroInterval);
        }
        let worker = Worker::new(Arc::clone(&store), fetcher);
        Ok(Self {
            store,
            worker,
            batch_size,
            interval,
        })
    }

    /// Run one cycle: select due feeds, process them all, return once every
    /// worker has finished.
    pub async fn run_cycle(&self) -> CycleReport {
        let feeds = match self.store.select_due_feeds(self.batch_size.get()).await {
            Ok(feeds) => feeds,
            Err(e) => {
                tracing::error!(error = %e, "Failed to select feeds for this cycle");
                return CycleReport {
                    selection_failed: true,
                    feeds: Vec::new(),
                };
            }
        };

        if feeds.is_empty() {
            tracing::debug!("No feeds due");
            return CycleReport::default();
        }

        let width = feeds.len();
        tracing::debug!(feeds = width, "Processing batch");

        let worker = &self.worker;
        let reports: Vec<FeedReport> = stream::iter(feeds)
            .map(|feed| async move { worker.process(&feed).await })
            .buffer_unordered(width)
            .collect()
            .await;

        let report = CycleReport {
            selection_failed: false,
            feeds: reports,
        };
        let tally = report.tally();
        tracing::info!(
            feeds = report.feeds.len(),
            fetch_failed = report.count_status(FeedStatus::FetchFailed),
            mark_failed = report.count_status(FeedStatus::MarkFailed),
            stored = tally.stored,
            "Cycle complete"
        );

        report
    }

    /// Run cycles until `shutdown` becomes `true` (or its sender is dropped).
    ///
    /// The first cycle starts immediately. Ticks missed while a slow batch
    /// is still running collapse into a single tick, so batches never
    /// overlap. Shutdown is observed between cycles; a batch in flight is
    /// allowed to finish.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> SchedulerSummary {
        tracing::info!(
            batch_size = self.batch_size.get(),
            interval_secs = self.interval.as_secs_f64(),
            "Scheduler started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut summary = SchedulerSummary::default();

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        tracing::debug!("Shutdown sender dropped");
                        break;
                    }
                    continue;
                }

                _ = ticker.tick() => {}
            }

            let cycle = self.run_cycle().await;
            summary.record(&cycle);
        }

        tracing::info!(
            cycles = summary.cycles,
            feeds = summary.feeds_processed,
            stored = summary.tally.stored,
            "Scheduler stopped"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{DEFAULT_MAX_FEED_SIZE, DEFAULT_USER_AGENT};
    use crate::storage::{DatabaseError, Feed, InsertPostError, NewPost, Post};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Select,
        Mark(Uuid),
        Insert(Uuid),
    }

    /// In-memory store that records every call in order
    #[derive(Default)]
    struct RecordingStore {
        feeds: Vec<Feed>,
        calls: Mutex<Vec<Call>>,
        urls: Mutex<HashSet<String>>,
        fail_select: bool,
        fail_mark: HashSet<Uuid>,
        fail_insert: bool,
    }

    impl RecordingStore {
        fn with_feeds(feeds: Vec<Feed>) -> Self {
            Self {
                feeds,
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn marks(&self, feed_id: Uuid) -> usize {
            self.calls()
                .iter()
                .filter(|c| **c == Call::Mark(feed_id))
                .count()
        }
    }

    #[async_trait]
    impl FeedStore for RecordingStore {
        async fn select_due_feeds(&self, limit: u32) -> Result<Vec<Feed>, DatabaseError> {
            self.calls.lock().unwrap().push(Call::Select);
            if self.fail_select {
                return Err(DatabaseError::Other(sqlx::Error::PoolTimedOut));
            }
            Ok(self.feeds.iter().take(limit as usize).cloned().collect())
        }

        async fn mark_fetched(&self, feed_id: Uuid) -> Result<Feed, DatabaseError> {
            self.calls.lock().unwrap().push(Call::Mark(feed_id));
            if self.fail_mark.contains(&feed_id) {
                return Err(DatabaseError::NotFound("Feed"));
            }
            self.feeds
                .iter()
                .find(|f| f.id == feed_id)
                .cloned()
                .ok_or(DatabaseError::NotFound("Feed"))
        }

        async fn insert_post(&self, post: &NewPost) -> Result<Post, InsertPostError> {
            self.calls.lock().unwrap().push(Call::Insert(post.feed_id));
            if self.fail_insert {
                return Err(InsertPostError::Other(DatabaseError::Other(
                    sqlx::Error::PoolClosed,
                )));
            }
            if !self.urls.lock().unwrap().insert(post.url.clone()) {
                return Err(InsertPostError::Duplicate);
            }
            Ok(Post {
                id: post.id,
                feed_id: post.feed_id,
                title: post.title.clone(),
                description: post.description.clone(),
                url: post.url.clone(),
                published_at: post.published_at,
                created_at: post.created_at,
                updated_at: post.updated_at,
            })
        }
    }

    fn feed(url: String) -> Feed {
        Feed {
            id: Uuid::new_v4(),
            name: url.clone(),
            url,
            user_id: Uuid::nil(),
            last_fetched_at: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn one_item_rss(link: &str) -> String {
        format!(
            r#"<rss><channel><item><title>t</title><link>{link}</link>
            <pubDate>Mon, 02 Jan 2006 15:04:05 -0700</pubDate></item></channel></rss>"#
        )
    }

    fn fetcher() -> Fetcher {
        Fetcher::new(Duration::from_secs(2), DEFAULT_MAX_FEED_SIZE, DEFAULT_USER_AGENT).unwrap()
    }

    fn scheduler(store: Arc<RecordingStore>, batch: u32, interval: Duration) -> Scheduler<RecordingStore> {
        Scheduler::new(store, fetcher(), NonZeroU32::new(batch).unwrap(), interval).unwrap()
    }

    async fn mount(server: &MockServer, route: &str, template: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(template)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_every_selected_feed_marked_once_despite_failures() {
        let server = MockServer::start().await;
        mount(&server, "/ok", ResponseTemplate::new(200).set_body_string(one_item_rss("https://e.com/1"))).await;
        mount(&server, "/broken", ResponseTemplate::new(500)).await;
        mount(&server, "/garbage", ResponseTemplate::new(200).set_body_string("<<<")).await;

        let feeds = vec![
            feed(format!("{}/ok", server.uri())),
            feed(format!("{}/broken", server.uri())),
            feed(format!("{}/garbage", server.uri())),
        ];
        let mut store = RecordingStore::with_feeds(feeds.clone());
        store.fail_insert = true;
        let store = Arc::new(store);

        let report = scheduler(Arc::clone(&store), 10, Duration::from_secs(60))
            .run_cycle()
            .await;

        assert!(!report.selection_failed);
        assert_eq!(report.feeds.len(), 3);
        for f in &feeds {
            assert_eq!(store.marks(f.id), 1, "feed {} marked once", f.url);
        }
        assert_eq!(report.count_status(FeedStatus::FetchFailed), 2);
        assert_eq!(report.tally().failed, 1);
    }

    #[tokio::test]
    async fn test_batch_size_limits_selection() {
        let feeds: Vec<Feed> = (0..5)
            .map(|i| feed(format!("http://127.0.0.1:9/{i}")))
            .collect();
        let mut store = RecordingStore::with_feeds(feeds);
        // Marking fails so nothing touches the network
        store.fail_mark = store.feeds.iter().map(|f| f.id).collect();
        let store = Arc::new(store);

        let report = scheduler(Arc::clone(&store), 2, Duration::from_secs(60))
            .run_cycle()
            .await;

        assert_eq!(report.feeds.len(), 2);
        assert_eq!(report.count_status(FeedStatus::MarkFailed), 2);
    }

    #[tokio::test]
    async fn test_selection_failure_skips_cycle() {
        let mut store = RecordingStore::with_feeds(vec![feed("http://127.0.0.1:9/".into())]);
        store.fail_select = true;
        let store = Arc::new(store);

        let report = scheduler(Arc::clone(&store), 10, Duration::from_secs(60))
            .run_cycle()
            .await;

        assert!(report.selection_failed);
        assert!(report.feeds.is_empty());
        assert_eq!(store.calls(), vec![Call::Select]);
    }

    #[tokio::test]
    async fn test_empty_selection_is_a_quiet_cycle() {
        let store = Arc::new(RecordingStore::default());
        let report = scheduler(store, 10, Duration::from_secs(60)).run_cycle().await;
        assert_eq!(report, CycleReport::default());
    }

    #[tokio::test]
    async fn test_batch_joins_before_next_selection() {
        let server = MockServer::start().await;
        // Each fetch outlasts several intervals
        for i in 0..3 {
            mount(
                &server,
                &format!("/slow{i}"),
                ResponseTemplate::new(200)
                    .set_body_string(one_item_rss(&format!("https://e.com/{i}")))
                    .set_delay(Duration::from_millis(150)),
            )
            .await;
        }
        let feeds: Vec<Feed> = (0..3)
            .map(|i| feed(format!("{}/slow{i}", server.uri())))
            .collect();
        let store = Arc::new(RecordingStore::with_feeds(feeds));
        let sched = scheduler(Arc::clone(&store), 3, Duration::from_millis(20));

        let (tx, rx) = watch::channel(false);
        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            tx.send(true).unwrap();
        });
        let summary = sched.run(rx).await;
        stopper.await.unwrap();

        assert!(summary.cycles >= 2, "expected several cycles, got {}", summary.cycles);

        // Every selection after the first happens only once the previous
        // batch has inserted (or attempted to insert) all of its items.
        let mut selects = 0;
        let mut inserts = 0;
        for call in store.calls() {
            match call {
                Call::Select => {
                    assert_eq!(inserts, selects * 3, "selection issued before batch finished");
                    selects += 1;
                }
                Call::Insert(_) => inserts += 1,
                Call::Mark(_) => {}
            }
        }
        assert_eq!(inserts, selects * 3);
        assert_eq!(summary.tally.stored, 3);
        assert_eq!(summary.tally.duplicates, inserts - 3);
    }

    #[tokio::test]
    async fn test_run_stops_immediately_when_already_shut_down() {
        let store = Arc::new(RecordingStore::default());
        let (_tx, rx) = watch::channel(true);

        let summary = scheduler(Arc::clone(&store), 1, Duration::from_millis(10))
            .run(rx)
            .await;

        assert_eq!(summary.cycles, 0);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_when_sender_dropped() {
        let store = Arc::new(RecordingStore::default());
        let (tx, rx) = watch::channel(false);
        drop(tx);

        let summary = tokio::time::timeout(
            Duration::from_secs(5),
            scheduler(store, 1, Duration::from_secs(3600)).run(rx),
        )
        .await
        .expect("scheduler should stop once the sender is gone");
        assert!(summary.cycles <= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_rate_ticks() {
        let store = Arc::new(RecordingStore::default());
        let sched = scheduler(Arc::clone(&store), 1, Duration::from_secs(60));

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn({
            let store = Arc::clone(&store);
            async move {
                // Immediate first tick, then one per minute: t=0, 60, 120
                tokio::time::sleep(Duration::from_secs(150)).await;
                tx.send(true).unwrap();
                store.calls().len()
            }
        });

        let summary = sched.run(rx).await;
        let selects_seen = handle.await.unwrap();

        assert_eq!(selects_seen, 3);
        assert_eq!(summary.cycles, 3);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let store = Arc::new(RecordingStore::default());
        let result = Scheduler::new(store, fetcher(), NonZeroU32::MIN, Duration::ZERO);
        assert!(matches!(result, Err(SchedulerError::ZeroInterval)));
    }
}
