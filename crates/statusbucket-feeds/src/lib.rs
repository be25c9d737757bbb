//! statusbucket-feeds: status feed decoders for statusbucket.
//!
//! Each decoder turns transport payloads into [`statusbucket_core::RawEvent`]
//! values for the translator:
//!
//! - [`ndjson`]: one event per line, as delivered by a message broker bridge.
//! - [`gbfs`]: whole GBFS `station_status` snapshots, fanned out per station,
//!   and `station_information` snapshots turned into station replacements.
//! - [`watermark`]: skips snapshots that are not newer than the last import.

pub mod gbfs;
pub mod ndjson;
pub mod watermark;

use thiserror::Error;

/// Errors raised while decoding feed payloads.
#[derive(Error, Debug)]
pub enum FeedError {
    /// The payload is not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload is JSON but not an object (or `null`).
    #[error("expected a JSON object or null, found {found}")]
    NotAnObject { found: &'static str },

    /// A required section of a snapshot is missing.
    #[error("incorrect format of feed: missing \"{section}\"")]
    MissingSection { section: &'static str },

    /// A station in a `station_information` snapshot lacks a usable field.
    #[error("station #{index}: missing or non-numeric \"{field}\"")]
    StationField { index: usize, field: &'static str },
}

pub type Result<T> = std::result::Result<T, FeedError>;
