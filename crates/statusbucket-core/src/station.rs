//! Station documents: whole-document replacement keyed by identity.
//!
//! Station information is reference data, not a time series. Each station is
//! replaced in full (or inserted) under its identity, so a refresh picks up
//! renamed stations and capacity changes without touching the buckets.

use crate::types::UpdateOptions;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{Map, Value};

/// GeoJSON geometry member on a station document.
pub const GEOMETRY_FIELD: &str = "geometry";

/// A replace-one operation with upsert, described but not executed.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaceOperation {
    /// Name of the identity field the filter matches on.
    pub identity_field: String,
    pub id: Value,
    /// Full replacement document, identity included.
    pub replacement: Map<String, Value>,
    pub options: UpdateOptions,
}

impl ReplaceOperation {
    /// Replace (or insert) `document` under its `identity_field` value.
    /// `None` when the document carries no identity.
    pub fn upsert(identity_field: &str, document: Map<String, Value>) -> Option<Self> {
        let id = document.get(identity_field)?.clone();
        Some(Self {
            identity_field: identity_field.to_string(),
            id,
            replacement: document,
            options: UpdateOptions { upsert: true },
        })
    }

    pub fn to_document(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

impl Serialize for ReplaceOperation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct Filter<'a>(&'a str, &'a Value);

        impl Serialize for Filter<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(self.0, self.1)?;
                map.end()
            }
        }

        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("filter", &Filter(&self.identity_field, &self.id))?;
        map.serialize_entry("replacement", &self.replacement)?;
        map.serialize_entry("options", &self.options)?;
        map.end()
    }
}

/// GeoJSON point from longitude and latitude, in that order.
pub fn geo_point(lon: f64, lat: f64) -> Value {
    serde_json::json!({"type": "Point", "coordinates": [lon, lat]})
}
