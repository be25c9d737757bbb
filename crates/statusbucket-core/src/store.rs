//! Store: in-memory reference executor for [`UpdateOperation`] values.
//!
//! Models the target collection the way the operation descriptor assumes it
//! behaves: selector match, `$push`, `$inc`, ceiling/floor updates and upsert.
//! Each `apply` runs match-then-mutate as one step, which is the atomicity a
//! real store has to provide for the bucket cap to hold.

use crate::types::{
    BucketMutation, BucketSelector, NormalizedEntry, Timestamp, UpdateOperation,
    BUCKET_SIZE_FIELD, EXPIRE_ON_FIELD, MAX_TS_FIELD, MIN_TS_FIELD, STATUS_FIELD,
};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// A bucket document as held by the store.
///
/// Serializes with the entity id under `entity_field`, the same key the
/// selector matched on.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketDocument {
    pub entity_field: String,
    pub entity_id: String,
    pub status: Vec<NormalizedEntry>,
    pub bucket_size: u32,
    pub min_ts: Timestamp,
    pub max_ts: Timestamp,
    pub expire_on: Timestamp,
}

impl Serialize for BucketDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(6))?;
        map.serialize_entry(&self.entity_field, &self.entity_id)?;
        map.serialize_entry(STATUS_FIELD, &self.status)?;
        map.serialize_entry(BUCKET_SIZE_FIELD, &self.bucket_size)?;
        map.serialize_entry(MIN_TS_FIELD, &self.min_ts)?;
        map.serialize_entry(MAX_TS_FIELD, &self.max_ts)?;
        map.serialize_entry(EXPIRE_ON_FIELD, &self.expire_on)?;
        map.end()
    }
}

impl BucketDocument {
    fn open(selector: &BucketSelector, mutation: &BucketMutation) -> Self {
        Self {
            entity_field: selector.entity_field.clone(),
            entity_id: selector.entity_id.clone(),
            status: vec![mutation.push.clone()],
            bucket_size: mutation.increment,
            min_ts: mutation.min_ts,
            max_ts: mutation.max_ts,
            expire_on: mutation.expire_on,
        }
    }

    fn absorb(&mut self, mutation: &BucketMutation) {
        self.status.push(mutation.push.clone());
        self.bucket_size = self.bucket_size.saturating_add(mutation.increment);
        self.max_ts = self.max_ts.max(mutation.max_ts);
        self.expire_on = self.expire_on.max(mutation.expire_on);
        self.min_ts = self.min_ts.min(mutation.min_ts);
    }
}

/// What `apply` did with an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// An existing open bucket was mutated.
    Matched { bucket: usize },
    /// No bucket matched; a new one was created.
    Upserted { bucket: usize },
    /// No bucket matched and upsert was off.
    Unmatched,
}

/// Ordered collection of bucket documents.
#[derive(Debug, Clone, Default)]
pub struct BucketStore {
    buckets: Vec<BucketDocument>,
}

impl BucketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute one operation. The first matching bucket in insertion order wins.
    pub fn apply(&mut self, op: &UpdateOperation) -> ApplyOutcome {
        let slot = self
            .buckets
            .iter()
            .position(|b| {
                b.entity_field == op.selector.entity_field
                    && op.selector.matches(&b.entity_id, b.bucket_size)
            });

        match slot {
            Some(bucket) => {
                self.buckets[bucket].absorb(&op.mutation);
                ApplyOutcome::Matched { bucket }
            }
            None if op.options.upsert => {
                self.buckets
                    .push(BucketDocument::open(&op.selector, &op.mutation));
                ApplyOutcome::Upserted {
                    bucket: self.buckets.len() - 1,
                }
            }
            None => ApplyOutcome::Unmatched,
        }
    }

    /// TTL sweep: drop every bucket whose `expire_on` is at or before `now`.
    /// Returns the number of buckets removed.
    pub fn expire(&mut self, now: Timestamp) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|b| b.expire_on > now);
        before - self.buckets.len()
    }

    /// Buckets of one entity, oldest first.
    pub fn buckets_for<'a>(
        &'a self,
        entity_id: &'a str,
    ) -> impl Iterator<Item = &'a BucketDocument> + 'a {
        self.buckets.iter().filter(move |b| b.entity_id == entity_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BucketDocument> {
        self.buckets.iter()
    }

    pub fn get(&self, bucket: usize) -> Option<&BucketDocument> {
        self.buckets.get(bucket)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
