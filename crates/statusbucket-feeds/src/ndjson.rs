//! Newline-delimited JSON events.

use crate::{FeedError, Result};
use serde_json::Value;
use statusbucket_core::RawEvent;

/// Decode one line.
///
/// Blank lines yield `Ok(None)`. A literal `null` yields an event without a
/// value document, so the translator reports it rather than the decoder.
pub fn decode_line(line: &str) -> Result<Option<RawEvent>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    match serde_json::from_str::<Value>(line)? {
        Value::Object(map) => Ok(Some(RawEvent::new(map))),
        Value::Null => Ok(Some(RawEvent::missing())),
        Value::Bool(_) => Err(FeedError::NotAnObject { found: "a boolean" }),
        Value::Number(_) => Err(FeedError::NotAnObject { found: "a number" }),
        Value::String(_) => Err(FeedError::NotAnObject { found: "a string" }),
        Value::Array(_) => Err(FeedError::NotAnObject { found: "an array" }),
    }
}
