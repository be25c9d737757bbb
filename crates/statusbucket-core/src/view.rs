//! Read-side views over the bucket collection.
//!
//! Two aggregation views join bucket documents with station documents:
//! current availability per station, and bike turnover over the last hour.
//! Like [`crate::index`], these are descriptors for whatever provisions the
//! database.

use crate::config::BucketPolicy;
use crate::index::{ordered_keys, IndexKey};
use crate::types::{MAX_TS_FIELD, MIN_TS_FIELD, STATUS_FIELD, TS_FIELD};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{json, Value};

pub const STATUS_COLLECTION: &str = "status";
pub const STATIONS_COLLECTION: &str = "stations";
pub const AVAILABILITY_VIEW: &str = "v_bike_availability";
pub const UTILIZATION_VIEW: &str = "v_avg_hourly_utilization";

/// Status field counted by both views.
pub const BIKES_AVAILABLE_FIELD: &str = "num_bikes_available";

const HOUR_MILLIS: i64 = 3_600_000;

/// One aggregation stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// `$sort` on a compound key. Kept apart from [`Stage::Expr`] because
    /// key order is significant.
    Sort(Vec<IndexKey>),
    Expr(Value),
}

impl Serialize for Stage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Stage::Sort(keys) => {
                struct Keys<'a>(&'a [IndexKey]);
                impl Serialize for Keys<'_> {
                    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                        ordered_keys(self.0, s)
                    }
                }
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("$sort", &Keys(keys))?;
                map.end()
            }
            Stage::Expr(value) => value.serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewSpec {
    pub name: String,
    #[serde(rename = "viewOn")]
    pub view_on: String,
    pub pipeline: Vec<Stage>,
}

impl ViewSpec {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Views over `status_collection`, looking stations up in `stations_collection`.
pub fn bucket_views(
    policy: &BucketPolicy,
    status_collection: &str,
    stations_collection: &str,
) -> Vec<ViewSpec> {
    vec![
        availability_view(policy, status_collection, stations_collection),
        utilization_view(policy, status_collection, stations_collection),
    ]
}

/// Latest `num_bikes_available` per station against its capacity, in percent.
fn availability_view(policy: &BucketPolicy, status: &str, stations: &str) -> ViewSpec {
    let entity = policy.entity_field.as_str();
    let bikes = format!("${STATUS_FIELD}.{BIKES_AVAILABLE_FIELD}");

    ViewSpec {
        name: AVAILABILITY_VIEW.to_string(),
        view_on: status.to_string(),
        pipeline: vec![
            Stage::Sort(vec![
                IndexKey::ascending(entity),
                IndexKey::ascending(MIN_TS_FIELD),
                IndexKey::ascending(MAX_TS_FIELD),
            ]),
            Stage::Expr(json!({"$group": {
                "_id": {entity: format!("${entity}")},
                "latest_status": {"$last": bikes},
            }})),
            // Last bucket's array; keep its newest entry.
            Stage::Expr(json!({"$addFields": {
                "latest_status": {"$arrayElemAt": ["$latest_status", -1]},
            }})),
            Stage::Expr(json!({"$lookup": {
                "from": stations,
                "localField": format!("_id.{entity}"),
                "foreignField": policy.identity_field,
                "as": "station",
            }})),
            Stage::Expr(json!({"$unwind": "$station"})),
            Stage::Expr(json!({"$project": {
                "_id": 0,
                entity: format!("$_id.{entity}"),
                "station_capacity": "$station.capacity",
                "station_bikes_available": "$latest_status",
                "station_availability": percent_of_capacity("$latest_status"),
                "geometry": "$station.geometry",
            }})),
        ],
    }
}

/// Mean absolute change in `num_bikes_available` over the last hour, as a
/// percentage of capacity.
fn utilization_view(policy: &BucketPolicy, status: &str, stations: &str) -> ViewSpec {
    let entity = policy.entity_field.as_str();
    let entry_ts = format!("${STATUS_FIELD}.{TS_FIELD}");
    let series = format!("${STATUS_FIELD}.{BIKES_AVAILABLE_FIELD}");

    ViewSpec {
        name: UTILIZATION_VIEW.to_string(),
        view_on: status.to_string(),
        pipeline: vec![
            // Buckets overlapping the last hour. The entity term lets the
            // range index serve the match.
            Stage::Expr(json!({"$match": {"$expr": {"$and": [
                {"$gt": [format!("${entity}"), "0"]},
                {"$lte": [format!("${MIN_TS_FIELD}"), "$$NOW"]},
                {"$gte": [format!("${MAX_TS_FIELD}"), {"$add": ["$$NOW", -HOUR_MILLIS]}]},
            ]}}})),
            Stage::Expr(json!({"$unwind": {"path": format!("${STATUS_FIELD}")}})),
            Stage::Expr(json!({"$match": {"$expr": {"$and": [
                {"$lte": [entry_ts, "$$NOW"]},
                {"$gte": [entry_ts, {"$add": ["$$NOW", -HOUR_MILLIS]}]},
            ]}}})),
            Stage::Expr(json!({"$group": {
                "_id": format!("${entity}"),
                STATUS_FIELD: {"$push": {BIKES_AVAILABLE_FIELD: series}},
            }})),
            Stage::Expr(json!({"$addFields": {"delta": {"$map": {
                "input": {"$range": [1, {"$size": format!("${STATUS_FIELD}")}]},
                "as": "i",
                "in": {"$abs": {"$subtract": [
                    {"$arrayElemAt": [series, "$$i"]},
                    {"$arrayElemAt": [series, {"$subtract": ["$$i", 1]}]},
                ]}},
            }}}})),
            Stage::Expr(json!({"$addFields": {"avg_delta": {"$avg": "$delta"}}})),
            Stage::Expr(json!({"$lookup": {
                "from": stations,
                "localField": "_id",
                "foreignField": policy.identity_field,
                "as": "station",
            }})),
            Stage::Expr(json!({"$unwind": {"path": "$station"}})),
            Stage::Expr(json!({"$project": {
                "_id": 0,
                entity: format!("$station.{}", policy.identity_field),
                "name": "$station.name",
                "geometry": "$station.geometry",
                "utilization": percent_of_capacity("$avg_delta"),
            }})),
        ],
    }
}

/// `value / capacity * 100` rounded to two places; zero-capacity stations give 0.
fn percent_of_capacity(value: &str) -> Value {
    json!({"$cond": [
        {"$gt": ["$station.capacity", 0]},
        {"$round": [{"$multiply": [{"$divide": [value, "$station.capacity"]}, 100]}, 2]},
        0,
    ]})
}
