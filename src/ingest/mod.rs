//! The ingestion pipeline.
//!
//! A [`Scheduler`] wakes at a fixed rate, selects the least recently fetched
//! feeds and hands each one to a [`Worker`]. The worker marks the feed as
//! fetched, downloads it and passes every item through an [`Ingester`],
//! which parses the publish date and stores the post. Failures never escape
//! a feed: they are logged and counted in the [`FeedReport`].

mod ingester;
mod pubdate;
mod scheduler;
mod worker;

pub use ingester::{build_post, IngestOutcome, IngestTally, Ingester};
pub use pubdate::{parse_pub_date, PubDateError};
pub use scheduler::{CycleReport, Scheduler, SchedulerError, SchedulerSummary};
pub use worker::{FeedReport, FeedStatus, Worker};
