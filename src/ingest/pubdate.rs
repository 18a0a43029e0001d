//! Parsing of RSS `pubDate` values.
//!
//! Only RFC 1123 with a numeric zone is accepted, in its fixed-width form
//! `Mon, 02 Jan 2006 15:04:05 -0700`. Named zones such as `GMT`, two-digit
//! years and unpadded fields are rejected.

use chrono::{DateTime, FixedOffset};
use thiserror::Error;

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Layout after the weekday prefix, in chrono syntax
const DATE_LAYOUT: &str = "%d %b %Y %H:%M:%S %z";

/// Shape of the text after the weekday: `d` digit, `a` letter, `s` zone sign.
/// chrono accepts variable widths, so the width is checked first.
const DATE_SHAPE: &[u8; 26] = b"dd aaa dddd dd:dd:dd sdddd";

#[derive(Debug, Error, PartialEq)]
pub enum PubDateError {
    #[error("missing weekday prefix in {0:?}")]
    MissingWeekday(String),
    #[error("unknown weekday {0:?}")]
    UnknownWeekday(String),
    #[error("{0:?} does not match \"Mon, 02 Jan 2006 15:04:05 -0700\"")]
    Layout(String),
    #[error("invalid date {raw:?}: {source}")]
    Invalid {
        raw: String,
        source: chrono::ParseError,
    },
}

fn matches_shape(rest: &str) -> bool {
    let bytes = rest.as_bytes();
    bytes.len() == DATE_SHAPE.len()
        && bytes.iter().zip(DATE_SHAPE).all(|(&b, &want)| match want {
            b'd' => b.is_ascii_digit(),
            b'a' => b.is_ascii_alphabetic(),
            b's' => b == b'+' || b == b'-',
            literal => b == literal,
        })
}

/// Parse a `pubDate` string.
///
/// The input must match the layout exactly; surrounding whitespace is not
/// tolerated. The weekday name must be a valid three-letter abbreviation
/// but is not checked against the date itself, since feeds routinely get
/// it wrong.
pub fn parse_pub_date(raw: &str) -> Result<DateTime<FixedOffset>, PubDateError> {
    let (weekday, rest) = raw
        .split_once(", ")
        .ok_or_else(|| PubDateError::MissingWeekday(raw.to_string()))?;

    if !WEEKDAYS.iter().any(|d| d.eq_ignore_ascii_case(weekday)) {
        return Err(PubDateError::UnknownWeekday(weekday.to_string()));
    }

    if !matches_shape(rest) {
        return Err(PubDateError::Layout(raw.to_string()));
    }

    DateTime::parse_from_str(rest, DATE_LAYOUT).map_err(|source| PubDateError::Invalid {
        raw: raw.to_string(),
        source,
    })
}
