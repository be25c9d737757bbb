//! Index plan for the bucket collection.
//!
//! The selector, the time-range queries over buckets and the TTL sweep each
//! need an index. [`bucket_indexes`] describes them for whatever provisions
//! the collection; nothing here talks to a store. The read-side views live in
//! [`crate::view`].

use crate::config::BucketPolicy;
use crate::types::{BUCKET_SIZE_FIELD, EXPIRE_ON_FIELD, MAX_TS_FIELD, MIN_TS_FIELD};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// One key of a compound index. `direction` is `1` (ascending) or `-1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexKey {
    pub field: String,
    pub direction: i32,
}

impl IndexKey {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexSpec {
    pub name: String,
    #[serde(rename = "key", serialize_with = "ordered_keys")]
    pub keys: Vec<IndexKey>,
    /// Set on TTL indexes; `0` means "expire exactly at the indexed date".
    #[serde(rename = "expireAfterSeconds", skip_serializing_if = "Option::is_none")]
    pub expire_after_seconds: Option<u64>,
}

impl IndexSpec {
    /// Index named after its keys, e.g. `entity_id_1_bucket_size_1`.
    pub fn new(keys: Vec<IndexKey>) -> Self {
        let name = keys
            .iter()
            .map(|k| format!("{}_{}", k.field, k.direction))
            .collect::<Vec<_>>()
            .join("_");
        Self {
            name,
            keys,
            expire_after_seconds: None,
        }
    }

    pub fn with_ttl(mut self, seconds: u64) -> Self {
        self.expire_after_seconds = Some(seconds);
        self
    }

    /// JSON rendering. Key order is preserved, which matters for compound
    /// indexes, so this goes to a string rather than a `serde_json::Value`.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

pub(crate) fn ordered_keys<S: Serializer>(keys: &[IndexKey], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(keys.len()))?;
    for key in keys {
        map.serialize_entry(&key.field, &key.direction)?;
    }
    map.end()
}

/// Indexes required by the bucket collection under `policy`.
pub fn bucket_indexes(policy: &BucketPolicy) -> Vec<IndexSpec> {
    let entity = policy.entity_field.as_str();
    vec![
        IndexSpec::new(vec![
            IndexKey::ascending(entity),
            IndexKey::ascending(BUCKET_SIZE_FIELD),
        ]),
        IndexSpec::new(vec![
            IndexKey::ascending(entity),
            IndexKey::ascending(MIN_TS_FIELD),
            IndexKey::ascending(MAX_TS_FIELD),
        ]),
        IndexSpec::new(vec![IndexKey::ascending(EXPIRE_ON_FIELD)]).with_ttl(0),
    ]
}
