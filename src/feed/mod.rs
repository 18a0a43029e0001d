//! Retrieval and parsing of remote RSS documents.
//!
//! - [`parser`] turns RSS 2.0 style XML into a [`RawFeedDocument`], leaving
//!   every field as untyped text.
//! - [`fetcher`] performs a single bounded HTTP GET and hands the body to the
//!   parser.
//!
//! # Example
//!
//! ```ignore
//! use gleaner::feed::{Fetcher, DEFAULT_MAX_FEED_SIZE, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
//!
//! let fetcher = Fetcher::new(DEFAULT_TIMEOUT, DEFAULT_MAX_FEED_SIZE, DEFAULT_USER_AGENT)?;
//! let doc = fetcher.fetch("https://blog.rust-lang.org/feed.xml").await?;
//! for item in &doc.items {
//!     println!("{} ({})", item.title, item.pub_date);
//! }
//! ```

mod fetcher;
mod parser;

pub use fetcher::{
    FetchError, Fetcher, DEFAULT_MAX_FEED_SIZE, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT,
};
pub use parser::{parse_document, ParseError, RawFeedDocument, RawItem};
