//! Pipeline: drives events through translation, batching and (optionally)
//! the reference store.
//!
//! The translator itself never logs; rejected events are logged once and
//! counted here, and the error is handed back so the caller can dead-letter
//! the event. [`StationRefresh`] batches station document replacements the
//! same way.

use statusbucket_core::batch::OperationBatch;
use statusbucket_core::config::Config;
use statusbucket_core::station::ReplaceOperation;
use statusbucket_core::store::{ApplyOutcome, BucketStore};
use statusbucket_core::{RawEvent, TranslateError, Translator, UpdateOperation};
use statusbucket_feeds::gbfs::StationInformationFeed;
use statusbucket_feeds::FeedError;
use tokio::sync::mpsc;

/// Running counters for one pipeline.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub translated: u64,
    pub rejected: u64,
    pub batches: u64,
    /// Buckets opened in the reference store (simulation only).
    pub upserts: u64,
}

pub struct Pipeline {
    translator: Translator,
    batch: OperationBatch,
    store: Option<BucketStore>,
    stats: PipelineStats,
}

impl Pipeline {
    /// With `simulate`, every flushed batch is also applied to an in-memory
    /// [`BucketStore`].
    pub fn new(config: &Config, simulate: bool) -> Self {
        Self {
            translator: Translator::new(config.bucket.clone()),
            batch: OperationBatch::new(config.pipeline.batch_size),
            store: simulate.then(BucketStore::new),
            stats: PipelineStats::default(),
        }
    }

    /// Translate and queue one event. Returns a batch when one fills up.
    pub fn process(
        &mut self,
        event: &RawEvent,
    ) -> Result<Option<Vec<UpdateOperation>>, TranslateError> {
        let op = match self.translator.translate(event) {
            Ok(op) => op,
            Err(err) => {
                self.stats.rejected += 1;
                tracing::warn!(error = %err, field = ?err.field(), "event rejected");
                return Err(err);
            }
        };
        self.stats.translated += 1;
        Ok(self.batch.push(op).map(|batch| self.flushed(batch)))
    }

    /// Drain the partial batch at the end of a run.
    pub fn finish(&mut self) -> Option<Vec<UpdateOperation>> {
        self.batch.flush().map(|batch| self.flushed(batch))
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn store(&self) -> Option<&BucketStore> {
        self.store.as_ref()
    }

    fn flushed(&mut self, batch: Vec<UpdateOperation>) -> Vec<UpdateOperation> {
        self.stats.batches += 1;
        if let Some(store) = self.store.as_mut() {
            for op in &batch {
                if let ApplyOutcome::Upserted { bucket } = store.apply(op) {
                    self.stats.upserts += 1;
                    tracing::debug!(entity = op.entity_id(), bucket, "bucket opened");
                }
            }
        }
        tracing::info!(operations = batch.len(), batch = self.stats.batches, "batch flushed");
        batch
    }
}

/// Consume events from `rx` until the channel closes, passing each flushed
/// batch to `sink`. Rejected events go to `dead_letter`, which must not log
/// them again.
pub async fn run<S, D>(
    mut rx: mpsc::Receiver<RawEvent>,
    pipeline: &mut Pipeline,
    mut sink: S,
    mut dead_letter: D,
) -> anyhow::Result<()>
where
    S: FnMut(&[UpdateOperation]) -> anyhow::Result<()>,
    D: FnMut(&RawEvent, &TranslateError) -> anyhow::Result<()>,
{
    while let Some(event) = rx.recv().await {
        match pipeline.process(&event) {
            Ok(Some(batch)) => sink(&batch)?,
            Ok(None) => {}
            Err(err) => dead_letter(&event, &err)?,
        }
    }
    if let Some(batch) = pipeline.finish() {
        sink(&batch)?;
    }
    Ok(())
}

/// Station information refresh: snapshots in, batched replacements out.
pub struct StationRefresh {
    identity_field: String,
    batch: OperationBatch<ReplaceOperation>,
    replaced: u64,
}

impl StationRefresh {
    pub fn new(config: &Config) -> Self {
        Self {
            identity_field: config.bucket.identity_field.clone(),
            batch: OperationBatch::new(config.pipeline.batch_size),
            replaced: 0,
        }
    }

    /// Queue every station of `feed`. Returns the batches that filled up.
    pub fn process(
        &mut self,
        feed: StationInformationFeed,
    ) -> Result<Vec<Vec<ReplaceOperation>>, FeedError> {
        let ops = feed.into_replacements(&self.identity_field)?;
        self.replaced += ops.len() as u64;
        Ok(ops.into_iter().filter_map(|op| self.batch.push(op)).collect())
    }

    pub fn finish(&mut self) -> Option<Vec<ReplaceOperation>> {
        self.batch.flush()
    }

    /// Stations queued so far.
    pub fn replaced(&self) -> u64 {
        self.replaced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn rejection_is_logged_once() {
        let mut pipe = Pipeline::new(&Config::defaults(), false);
        let event = RawEvent::from_value(json!({"last_updated": 1, "last_reported": 1}));
        assert!(pipe.process(&event).is_err());

        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|l| l.contains("event rejected")).count() {
                1 => Ok(()),
                n => Err(format!("expected one rejection line, found {n}")),
            }
        });
        assert!(logs_contain("entity_id"));
    }

    #[tokio::test]
    async fn run_leaves_logging_to_the_pipeline() {
        let (tx, rx) = mpsc::channel(2);
        tx.send(RawEvent::missing()).await.unwrap();
        drop(tx);

        let mut pipe = Pipeline::new(&Config::defaults(), false);
        let mut dead = 0;
        run(rx, &mut pipe, |_| Ok(()), |_, _| {
            dead += 1;
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(dead, 1);
        assert_eq!(pipe.stats().rejected, 1);
    }

    #[tokio::test]
    async fn dead_letter_failure_stops_the_run() {
        let (tx, rx) = mpsc::channel(2);
        tx.send(RawEvent::missing()).await.unwrap();
        drop(tx);

        let mut pipe = Pipeline::new(&Config::defaults(), false);
        let result = run(rx, &mut pipe, |_| Ok(()), |_, _| anyhow::bail!("disk full")).await;
        assert!(result.is_err());
    }

    #[test]
    fn station_refresh_batches_replacements() {
        let mut config = Config::defaults();
        config.pipeline.batch_size = 2;
        let mut refresh = StationRefresh::new(&config);

        let feed = StationInformationFeed::from_value(json!({
            "last_updated": 1,
            "data": {"stations": [
                {"station_id": "1", "lon": 0.0, "lat": 0.0},
                {"station_id": "2", "lon": 0.0, "lat": 0.0},
                {"station_id": "3", "lon": 0.0, "lat": 0.0}
            ]}
        }))
        .unwrap();

        let full = refresh.process(feed).unwrap();
        assert_eq!(full.len(), 1);
        assert_eq!(full[0][1].id, json!("2"));
        assert_eq!(refresh.finish().map(|b| b.len()), Some(1));
        assert_eq!(refresh.replaced(), 3);
    }
}
