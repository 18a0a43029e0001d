//! Periodic RSS aggregation into SQLite.
//!
//! See [`ingest::Scheduler`] for the entry point.

pub mod config;
pub mod feed;
pub mod ingest;
pub mod storage;
