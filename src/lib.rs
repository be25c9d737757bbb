//! statusbucket: station status ingestion.
//!
//! Reads status events from a feed, translates each into one bucketed upsert
//! and emits the operations in bulk batches. The crate re-exports the core
//! and feed crates so integration tests and the binary share one import path.
//!
//! # Architecture
//!
//! ```text
//! feed reader ──► mpsc ──► Pipeline ──► stdout (operations)
//!                             │
//!                             └──► BucketStore (--simulate)
//! ```

pub mod pipeline;

pub use statusbucket_core;
pub use statusbucket_feeds;
