//! Core types for statusbucket-core.
//!
//! This module defines the values that flow through the translation step: the
//! incoming [`RawEvent`], the [`NormalizedEntry`] appended to a bucket, and the
//! three parts of an [`UpdateOperation`] (selector, mutation, options).
//!
//! Every type here serializes to the MongoDB-style document the store executor
//! expects, so `serde_json::to_string(&op)` is the wire form of an operation.

use chrono::{DateTime, TimeDelta, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Document field names
// ---------------------------------------------------------------------------

/// Array of normalised entries inside a bucket document.
pub const STATUS_FIELD: &str = "status";
/// Running entry count of a bucket document.
pub const BUCKET_SIZE_FIELD: &str = "bucket_size";
pub const MIN_TS_FIELD: &str = "min_ts";
pub const MAX_TS_FIELD: &str = "max_ts";
/// TTL marker; the store deletes the bucket once this instant has passed.
pub const EXPIRE_ON_FIELD: &str = "expire_on";
/// Event time inside a normalised entry, derived from `last_updated`.
pub const TS_FIELD: &str = "ts";
/// Authoritative event time on the incoming event, in epoch seconds.
pub const LAST_UPDATED_FIELD: &str = "last_updated";
/// Secondary observation time, in epoch seconds on input and a timestamp on output.
pub const LAST_REPORTED_FIELD: &str = "last_reported";

// ---------------------------------------------------------------------------
// Timestamp
// ---------------------------------------------------------------------------

/// A UTC instant with millisecond precision.
///
/// Serializes as an extended-JSON date, `{"$date": <epoch millis>}`, so the
/// store receives a date value rather than a bare number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Build from epoch milliseconds. `None` when outside chrono's range.
    pub fn from_millis(millis: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(millis).map(Self)
    }

    pub fn millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn checked_add(self, delta: TimeDelta) -> Option<Self> {
        self.0.checked_add_signed(delta).map(Self)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        // Drop sub-millisecond precision so equality matches the wire form.
        Self(DateTime::from_timestamp_millis(dt.timestamp_millis()).unwrap_or(dt))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%S%.3fZ"))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("$date", &self.millis())?;
        map.end()
    }
}

// ---------------------------------------------------------------------------
// RawEvent
// ---------------------------------------------------------------------------

/// A status event as handed over by the upstream transport.
///
/// The payload is a field map; it is `None` when the message carried no value
/// document at all (tombstones, `null` bodies, non-object bodies).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawEvent {
    payload: Option<Map<String, Value>>,
}

impl RawEvent {
    pub fn new(payload: Map<String, Value>) -> Self {
        Self {
            payload: Some(payload),
        }
    }

    /// An event whose value document is absent.
    pub fn missing() -> Self {
        Self { payload: None }
    }

    /// Wrap a decoded JSON value. Anything but an object has no value document.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::new(map),
            _ => Self::missing(),
        }
    }

    pub fn payload(&self) -> Option<&Map<String, Value>> {
        self.payload.as_ref()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.payload.as_ref().and_then(|p| p.get(field))
    }
}

impl From<Map<String, Value>> for RawEvent {
    fn from(payload: Map<String, Value>) -> Self {
        Self::new(payload)
    }
}

// ---------------------------------------------------------------------------
// NormalizedEntry
// ---------------------------------------------------------------------------

/// One status entry as stored inside a bucket's `status` array.
///
/// `fields` holds the opaque payload minus the entity id, the store identity
/// field and the timestamp fields, which are promoted to typed members.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedEntry {
    pub ts: Timestamp,
    pub last_reported: Timestamp,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// UpdateOperation
// ---------------------------------------------------------------------------

/// Filter addressing the open bucket of one entity.
///
/// Matches a document whose entity field equals `entity_id` and whose
/// `bucket_size` is strictly below `size_below`. Full buckets never match, so
/// the upsert opens a fresh one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSelector {
    /// Name of the entity id field in the bucket document.
    pub entity_field: String,
    pub entity_id: String,
    pub size_below: u32,
}

impl BucketSelector {
    pub fn matches(&self, entity_id: &str, bucket_size: u32) -> bool {
        self.entity_id == entity_id && bucket_size < self.size_below
    }
}

impl Serialize for BucketSelector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Below {
            #[serde(rename = "$lt")]
            lt: u32,
        }

        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(&self.entity_field, &self.entity_id)?;
        map.serialize_entry(BUCKET_SIZE_FIELD, &Below { lt: self.size_below })?;
        map.end()
    }
}

/// Mutation applied to the matched (or upserted) bucket.
///
/// `max_ts` and `expire_on` are ceiling updates and `min_ts` is a floor
/// update: the store only moves them outward, never back.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketMutation {
    /// Entry appended to `status`.
    pub push: NormalizedEntry,
    /// Added to `bucket_size`.
    pub increment: u32,
    pub max_ts: Timestamp,
    pub expire_on: Timestamp,
    pub min_ts: Timestamp,
}

impl Serialize for BucketMutation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Push<'a> {
            status: &'a NormalizedEntry,
        }
        #[derive(Serialize)]
        struct Inc {
            bucket_size: u32,
        }
        #[derive(Serialize)]
        struct Ceiling {
            max_ts: Timestamp,
            expire_on: Timestamp,
        }
        #[derive(Serialize)]
        struct Floor {
            min_ts: Timestamp,
        }

        let mut map = serializer.serialize_map(Some(4))?;
        map.serialize_entry("$push", &Push { status: &self.push })?;
        map.serialize_entry(
            "$inc",
            &Inc {
                bucket_size: self.increment,
            },
        )?;
        map.serialize_entry(
            "$max",
            &Ceiling {
                max_ts: self.max_ts,
                expire_on: self.expire_on,
            },
        )?;
        map.serialize_entry("$min", &Floor { min_ts: self.min_ts })?;
        map.end()
    }
}

/// Execution options for the update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UpdateOptions {
    /// Create the document when the selector matches nothing.
    pub upsert: bool,
}

/// A single update-one operation with upsert, described but not executed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateOperation {
    #[serde(rename = "filter")]
    pub selector: BucketSelector,
    #[serde(rename = "update")]
    pub mutation: BucketMutation,
    pub options: UpdateOptions,
}

impl UpdateOperation {
    pub fn entity_id(&self) -> &str {
        &self.selector.entity_id
    }

    /// Event time of the pushed entry.
    pub fn event_time(&self) -> Timestamp {
        self.mutation.push.ts
    }

    /// Render as a JSON document `{filter, update, options}`.
    pub fn to_document(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
