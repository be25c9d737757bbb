//! Test builders: ergonomic constructors for events and translators.
//!
//! These builders are designed for readability in test assertions, not for
//! production use. They panic on invalid input rather than returning `Result`.

use serde_json::{Map, Value};
use statusbucket_core::config::BucketPolicy;
use statusbucket_core::{RawEvent, Translator, UpdateOperation};

// ---------------------------------------------------------------------------
// EventBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`RawEvent`] fixtures.
///
/// # Example
///
/// ```rust
/// let event = EventBuilder::new("S1")
///     .last_updated(1000)
///     .field("num_bikes_available", 4)
///     .build();
/// ```
pub struct EventBuilder {
    fields: Map<String, Value>,
}

impl EventBuilder {
    /// Event for `entity_id` with both timestamps at epoch second 1000.
    pub fn new(entity_id: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("entity_id".into(), entity_id.into());
        fields.insert("last_updated".into(), 1000.into());
        fields.insert("last_reported".into(), 1000.into());
        Self { fields }
    }

    pub fn last_updated(mut self, seconds: i64) -> Self {
        self.fields.insert("last_updated".into(), seconds.into());
        self
    }

    pub fn last_reported(mut self, seconds: i64) -> Self {
        self.fields.insert("last_reported".into(), seconds.into());
        self
    }

    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn without(mut self, key: &str) -> Self {
        self.fields.remove(key);
        self
    }

    pub fn build(self) -> RawEvent {
        RawEvent::new(self.fields)
    }
}

// ---------------------------------------------------------------------------
// Convenience constructors
// ---------------------------------------------------------------------------

/// Translator with the default policy but a custom bucket cap.
pub fn translator_with_cap(cap: u32) -> Translator {
    Translator::new(BucketPolicy {
        cap,
        ..BucketPolicy::default()
    })
}

/// Translate `event` with the default policy, panicking on rejection.
pub fn translate_ok(event: &RawEvent) -> UpdateOperation {
    Translator::default()
        .translate(event)
        .unwrap_or_else(|e| panic!("expected event to translate, got {e}"))
}

/// `n` events for `entity_id` with `last_updated` = start, start + step, ….
pub fn event_series(entity_id: &str, start: i64, step: i64, n: usize) -> Vec<RawEvent> {
    (0..n as i64)
        .map(|i| {
            EventBuilder::new(entity_id)
                .last_updated(start + i * step)
                .last_reported(start + i * step - 1)
                .field("num_bikes_available", i)
                .build()
        })
        .collect()
}
