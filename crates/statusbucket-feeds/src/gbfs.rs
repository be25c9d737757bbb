//! GBFS `station_status` and `station_information` snapshots.
//!
//! A snapshot carries one `last_updated` for the whole feed and a list of
//! stations keyed by `station_id`. [`StationStatusFeed::into_events`] fans it
//! out into one event per station in the shape the translator expects;
//! [`StationInformationFeed::into_replacements`] turns it into one station
//! document replacement per station.

use crate::{FeedError, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use statusbucket_core::station::{geo_point, ReplaceOperation, GEOMETRY_FIELD};
use statusbucket_core::types::LAST_UPDATED_FIELD;
use statusbucket_core::RawEvent;

/// Station key used by GBFS feeds.
pub const GBFS_STATION_FIELD: &str = "station_id";

#[derive(Deserialize)]
struct Envelope {
    last_updated: i64,
    #[serde(default)]
    ttl: u64,
    data: Option<Data>,
}

#[derive(Deserialize)]
struct Data {
    stations: Option<Vec<Map<String, Value>>>,
}

/// A decoded `station_status` snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct StationStatusFeed {
    /// Feed-level publication time, epoch seconds.
    pub last_updated: i64,
    /// Seconds until the publisher refreshes the feed.
    pub ttl: u64,
    pub stations: Vec<Map<String, Value>>,
}

impl StationStatusFeed {
    pub fn parse(body: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(body)?;
        Self::from_envelope(envelope)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let envelope: Envelope = serde_json::from_value(value)?;
        Self::from_envelope(envelope)
    }

    fn from_envelope(envelope: Envelope) -> Result<Self> {
        let data = envelope
            .data
            .ok_or(FeedError::MissingSection { section: "data" })?;
        let stations = data.stations.ok_or(FeedError::MissingSection {
            section: "data.stations",
        })?;
        Ok(Self {
            last_updated: envelope.last_updated,
            ttl: envelope.ttl,
            stations,
        })
    }

    /// One event per station.
    ///
    /// Stations without their own `last_updated` inherit the feed's, and
    /// `station_id` is moved to `entity_field`. A station that already
    /// carries `entity_field` keeps its value and loses `station_id`.
    pub fn into_events(self, entity_field: &str) -> Vec<RawEvent> {
        let last_updated = self.last_updated;
        self.stations
            .into_iter()
            .map(|mut station| {
                station
                    .entry(LAST_UPDATED_FIELD)
                    .or_insert_with(|| Value::from(last_updated));
                if entity_field != GBFS_STATION_FIELD {
                    if let Some(id) = station.remove(GBFS_STATION_FIELD) {
                        station.entry(entity_field).or_insert(id);
                    }
                }
                RawEvent::new(station)
            })
            .collect()
    }
}

/// A decoded `station_information` snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct StationInformationFeed {
    pub last_updated: i64,
    pub ttl: u64,
    pub stations: Vec<Map<String, Value>>,
}

impl StationInformationFeed {
    pub fn parse(body: &str) -> Result<Self> {
        StationStatusFeed::parse(body).map(Self::from_status_shape)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        StationStatusFeed::from_value(value).map(Self::from_status_shape)
    }

    fn from_status_shape(feed: StationStatusFeed) -> Self {
        Self {
            last_updated: feed.last_updated,
            ttl: feed.ttl,
            stations: feed.stations,
        }
    }

    /// One upsert-replace per station, keyed by `identity_field`.
    ///
    /// `station_id` becomes the identity and `lon`/`lat` are folded into a
    /// GeoJSON point under `geometry`. Any station missing one of the three
    /// fails the whole snapshot.
    pub fn into_replacements(self, identity_field: &str) -> Result<Vec<ReplaceOperation>> {
        self.stations
            .into_iter()
            .enumerate()
            .map(|(index, mut station)| {
                let missing = |field| FeedError::StationField { index, field };

                let id = station
                    .remove(GBFS_STATION_FIELD)
                    .ok_or_else(|| missing(GBFS_STATION_FIELD))?;
                let lon = coordinate(&mut station, "lon").ok_or_else(|| missing("lon"))?;
                let lat = coordinate(&mut station, "lat").ok_or_else(|| missing("lat"))?;

                station.insert(identity_field.to_string(), id);
                station.insert(GEOMETRY_FIELD.to_string(), geo_point(lon, lat));
                ReplaceOperation::upsert(identity_field, station)
                    .ok_or_else(|| missing(GBFS_STATION_FIELD))
            })
            .collect()
    }
}

fn coordinate(station: &mut Map<String, Value>, field: &str) -> Option<f64> {
    station.remove(field).and_then(|v| v.as_f64())
}
