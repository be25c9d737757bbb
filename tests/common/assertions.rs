//! Domain-specific assertions for statusbucket harnesses.
//!
//! Failure messages name the bucket invariant that was violated so a failing
//! property test points straight at the broken rule.

use chrono::TimeDelta;
use statusbucket_core::store::BucketDocument;

/// Assert that an operation targets `entity` through the size-bounded selector.
///
/// ```rust
/// assert_targets!(op, "S1", 120);
/// ```
#[macro_export]
macro_rules! assert_targets {
    ($op:expr, $entity:expr, $cap:expr) => {{
        let op: &statusbucket_core::UpdateOperation = &$op;
        let entity: &str = $entity;
        let cap: u32 = $cap;
        if op.selector.entity_id != entity || op.selector.size_below != cap {
            panic!(
                "assert_targets! failed:\n  expected: entity {:?}, bucket_size < {}\n  actual:   entity {:?}, bucket_size < {}",
                entity, cap, op.selector.entity_id, op.selector.size_below
            );
        }
    }};
}

/// Assert that an entry payload does not leak a stripped field.
#[macro_export]
macro_rules! assert_not_in_entry {
    ($op:expr, $key:expr) => {{
        let op: &statusbucket_core::UpdateOperation = &$op;
        let key: &str = $key;
        if op.mutation.push.fields.contains_key(key) {
            panic!(
                "assert_not_in_entry! failed: {:?} leaked into the pushed entry.\n  fields: {:?}",
                key,
                op.mutation.push.fields.keys().collect::<Vec<_>>()
            );
        }
    }};
}

/// Check every structural invariant of a stored bucket document.
pub fn assert_bucket_invariants(bucket: &BucketDocument, cap: u32, ttl: TimeDelta) {
    assert_eq!(
        bucket.bucket_size as usize,
        bucket.status.len(),
        "bucket_size must equal the number of entries (entity {})",
        bucket.entity_id
    );
    assert!(
        bucket.bucket_size <= cap,
        "bucket_size {} exceeds cap {} (entity {})",
        bucket.bucket_size,
        cap,
        bucket.entity_id
    );
    for entry in &bucket.status {
        assert!(
            bucket.min_ts <= entry.ts && entry.ts <= bucket.max_ts,
            "entry ts {} outside [{}, {}] (entity {})",
            entry.ts,
            bucket.min_ts,
            bucket.max_ts,
            bucket.entity_id
        );
    }
    assert_eq!(
        bucket.max_ts.checked_add(ttl),
        Some(bucket.expire_on),
        "expire_on must be max_ts + ttl (entity {})",
        bucket.entity_id
    );
}
