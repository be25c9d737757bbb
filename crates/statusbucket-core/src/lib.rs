//! statusbucket-core: bucketed status ingestion core.
//!
//! Turns per-entity status events into single upsert operations against a
//! bucketed document store, plus the supporting pieces a pipeline needs
//! around that step.
//!
//! # Architecture
//!
//! ```text
//! RawEvent ──► Translator ──► UpdateOperation ──► OperationBatch ──► store
//!                  │                                   │
//!             BucketPolicy                        BucketStore (reference executor)
//! ```
//!
//! Nothing in this crate performs I/O. The translator is pure and `Send +
//! Sync`; share one instance across as many workers as needed.

pub mod batch;
pub mod config;
pub mod error;
pub mod index;
pub mod station;
pub mod store;
pub mod translator;
pub mod types;
pub mod view;

pub use config::BucketPolicy;
pub use error::TranslateError;
pub use translator::Translator;
pub use types::{
    BucketMutation, BucketSelector, NormalizedEntry, RawEvent, Timestamp, UpdateOperation,
    UpdateOptions,
};
