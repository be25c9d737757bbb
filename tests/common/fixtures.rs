//! Static event corpora used across harnesses.

/// NDJSON status events, one station update per line, including the odd
/// malformed line a real bridge delivers.
pub const CORPUS_NDJSON: &[&str] = &[
    r#"{"entity_id":"72","last_updated":1700000000,"last_reported":1699999990,"num_bikes_available":4,"num_docks_available":35}"#,
    r#"{"entity_id":"79","last_updated":1700000000,"last_reported":1699999995,"num_bikes_available":12,"num_docks_available":21}"#,
    "",
    r#"{"entity_id":"72","last_updated":1700000030,"last_reported":1700000020,"num_bikes_available":3,"num_docks_available":36}"#,
    r#"{"last_updated":1700000030,"last_reported":1700000020,"num_bikes_available":9}"#,
    "null",
    r#"{"entity_id":"82","last_updated":"yesterday","last_reported":1700000020}"#,
    r#"{"entity_id":"79","_id":"65f0c0ffee","last_updated":1700000030,"last_reported":1700000025,"num_bikes_available":11}"#,
];

/// Number of CORPUS_NDJSON lines that translate successfully.
pub const CORPUS_NDJSON_VALID: usize = 4;

/// Number of CORPUS_NDJSON lines the translator rejects.
pub const CORPUS_NDJSON_REJECTED: usize = 3;

/// A GBFS `station_status` snapshot as published by a bike share system.
pub const GBFS_SNAPSHOT: &str = r#"{
  "last_updated": 1700000000,
  "ttl": 10,
  "data": {
    "stations": [
      {"station_id": "72", "num_bikes_available": 4, "num_docks_available": 35, "is_renting": 1, "last_reported": 1699999990},
      {"station_id": "79", "num_bikes_available": 12, "num_docks_available": 21, "is_renting": 1, "last_reported": 1699999995},
      {"station_id": "82", "num_bikes_available": 0, "num_docks_available": 27, "is_renting": 0, "last_reported": 1699999000}
    ]
  }
}"#;
