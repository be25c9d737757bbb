//! Translator: maps one [`RawEvent`] to one bucketed [`UpdateOperation`].
//!
//! The translation is a pure function of the event and the injected
//! [`BucketPolicy`]: no I/O, no logging, no shared state. The input event is
//! borrowed and left untouched; the pushed entry is built fresh.
//!
//! Re-translating the same event yields the same operation, and executing it
//! twice pushes two entries. Buckets are an append log, not a set.

use crate::config::BucketPolicy;
use crate::error::{Result, TranslateError};
use crate::types::{
    BucketMutation, BucketSelector, NormalizedEntry, RawEvent, Timestamp, UpdateOperation,
    UpdateOptions, LAST_REPORTED_FIELD, LAST_UPDATED_FIELD, TS_FIELD,
};
use serde_json::{Map, Value};

/// Stateless event-to-bucket-update translator.
#[derive(Debug, Clone, Default)]
pub struct Translator {
    policy: BucketPolicy,
}

impl Translator {
    pub fn new(policy: BucketPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &BucketPolicy {
        &self.policy
    }

    /// Build the upsert that appends `event` to its entity's open bucket.
    pub fn translate(&self, event: &RawEvent) -> Result<UpdateOperation> {
        let payload = event.payload().ok_or(TranslateError::MissingValueDocument)?;

        let entity_field = &self.policy.entity_field;
        let entity_id = match payload.get(entity_field) {
            Some(Value::String(id)) => id.clone(),
            Some(_) => {
                return Err(TranslateError::InvalidField {
                    field: entity_field.clone(),
                    expected: "a string",
                })
            }
            None => {
                return Err(TranslateError::MissingField {
                    field: entity_field.clone(),
                })
            }
        };

        let ts = epoch_seconds(payload, LAST_UPDATED_FIELD)?;
        let last_reported = epoch_seconds(payload, LAST_REPORTED_FIELD)?;
        let expire_on = ts.checked_add(self.policy.expire_after()).ok_or_else(|| {
            TranslateError::MalformedTimestamp {
                field: LAST_UPDATED_FIELD.to_string(),
                reason: "expiration falls outside the timestamp range".to_string(),
            }
        })?;

        let entry = NormalizedEntry {
            ts,
            last_reported,
            fields: self.carried_fields(payload),
        };

        Ok(UpdateOperation {
            selector: BucketSelector {
                entity_field: entity_field.clone(),
                entity_id,
                size_below: self.policy.cap,
            },
            mutation: BucketMutation {
                push: entry,
                increment: 1,
                max_ts: ts,
                expire_on,
                min_ts: ts,
            },
            options: UpdateOptions { upsert: true },
        })
    }

    /// Opaque status fields that travel into the entry unchanged.
    fn carried_fields(&self, payload: &Map<String, Value>) -> Map<String, Value> {
        payload
            .iter()
            .filter(|(key, _)| !self.is_stripped(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    fn is_stripped(&self, key: &str) -> bool {
        key == self.policy.entity_field
            || key == self.policy.identity_field
            || key == LAST_UPDATED_FIELD
            || key == LAST_REPORTED_FIELD
            || key == TS_FIELD
    }
}

/// Read `field` as epoch seconds and convert to a millisecond timestamp.
///
/// Floating-point seconds are truncated toward zero.
fn epoch_seconds(payload: &Map<String, Value>, field: &str) -> Result<Timestamp> {
    let malformed = |reason: String| TranslateError::MalformedTimestamp {
        field: field.to_string(),
        reason,
    };

    let seconds = match payload.get(field) {
        None => return Err(malformed("field is missing".to_string())),
        Some(Value::Number(n)) => {
            if let Some(secs) = n.as_i64() {
                secs
            } else if n.is_u64() {
                return Err(malformed(format!("{n} seconds is out of range")));
            } else {
                let secs = n.as_f64().unwrap_or(f64::NAN);
                if !secs.is_finite() || secs >= i64::MAX as f64 || secs < i64::MIN as f64 {
                    return Err(malformed(format!("{n} seconds is out of range")));
                }
                secs.trunc() as i64
            }
        }
        Some(other) => {
            return Err(malformed(format!(
                "expected epoch seconds, found {}",
                json_kind(other)
            )))
        }
    };

    seconds
        .checked_mul(1000)
        .and_then(Timestamp::from_millis)
        .ok_or_else(|| malformed(format!("{seconds} seconds is out of range")))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
