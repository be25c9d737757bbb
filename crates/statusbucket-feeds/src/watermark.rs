//! Per-feed import watermark.
//!
//! Snapshot feeds republish the same data until the publisher refreshes it.
//! The watermark remembers the newest `last_updated` imported so a repeated
//! snapshot is not pushed into the buckets twice.

use crate::gbfs::StationStatusFeed;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedWatermark {
    feed: String,
    last_updated: i64,
}

impl FeedWatermark {
    /// A watermark that has seen nothing yet (`last_updated == 0`).
    pub fn new(feed: impl Into<String>) -> Self {
        Self::at(feed, 0)
    }

    pub fn at(feed: impl Into<String>, last_updated: i64) -> Self {
        Self {
            feed: feed.into(),
            last_updated,
        }
    }

    pub fn feed(&self) -> &str {
        &self.feed
    }

    pub fn last_updated(&self) -> i64 {
        self.last_updated
    }

    /// Accept `last_updated` if strictly newer, advancing the watermark.
    pub fn admit(&mut self, last_updated: i64) -> bool {
        if last_updated > self.last_updated {
            tracing::debug!(
                feed = %self.feed,
                from = self.last_updated,
                to = last_updated,
                "watermark advanced"
            );
            self.last_updated = last_updated;
            true
        } else {
            tracing::debug!(
                feed = %self.feed,
                watermark = self.last_updated,
                snapshot = last_updated,
                "stale snapshot skipped"
            );
            false
        }
    }

    /// Pass `snapshot` through only if it is newer than the watermark.
    pub fn admit_feed(&mut self, snapshot: StationStatusFeed) -> Option<StationStatusFeed> {
        self.admit(snapshot.last_updated).then_some(snapshot)
    }
}
