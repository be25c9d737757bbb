use anyhow::Context;
use clap::Parser;
use statusbucket::pipeline::{self, Pipeline, StationRefresh};
use statusbucket_core::config::Config;
use statusbucket_core::index::bucket_indexes;
use statusbucket_core::station::ReplaceOperation;
use statusbucket_core::view::{bucket_views, STATIONS_COLLECTION, STATUS_COLLECTION};
use statusbucket_core::{RawEvent, UpdateOperation};
use statusbucket_feeds::gbfs::{StationInformationFeed, StationStatusFeed};
use statusbucket_feeds::ndjson;
use statusbucket_feeds::watermark::FeedWatermark;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(
    name = "statusbucket",
    about = "Turn station status events on stdin into bucketed upsert operations on stdout"
)]
struct Cli {
    /// Config file (TOML). Defaults to $XDG_CONFIG_HOME/statusbucket/config.toml if present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Log at debug level (stderr). RUST_LOG overrides.
    #[arg(long)]
    debug: bool,
    /// Apply operations to an in-memory bucket store and report the buckets at the end.
    #[arg(long)]
    simulate: bool,
    /// Read GBFS station_status snapshots (one per line) instead of single events.
    #[arg(long, conflicts_with = "stations")]
    gbfs: bool,
    /// Read GBFS station_information snapshots and emit station replacements.
    #[arg(long, conflicts_with = "simulate")]
    stations: bool,
    /// Append rejected events to this file, one JSON document per line.
    #[arg(long, value_name = "FILE")]
    dead_letter: Option<PathBuf>,
    /// Print the index and view descriptors for the collections and exit.
    #[arg(long)]
    plan: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    tracing::info!(
        cap = config.bucket.cap,
        expire_after_hours = config.bucket.expire_after_hours,
        entity_field = %config.bucket.entity_field,
        batch_size = config.pipeline.batch_size,
        "statusbucket started"
    );

    if cli.plan {
        return print_plan(&config);
    }
    if cli.stations {
        return refresh_stations(&config).await;
    }

    let mut dead_letters = cli
        .dead_letter
        .as_deref()
        .map(|path| {
            File::options()
                .create(true)
                .append(true)
                .open(path)
                .map(BufWriter::new)
                .with_context(|| format!("opening dead-letter file {}", path.display()))
        })
        .transpose()?;

    let (tx, rx) = mpsc::channel::<RawEvent>(config.pipeline.batch_size.saturating_mul(4));
    let reader = tokio::spawn(read_stdin(
        tx,
        cli.gbfs,
        config.bucket.entity_field.clone(),
        FeedWatermark::new(config.pipeline.feed.clone()),
    ));

    let mut pipe = Pipeline::new(&config, cli.simulate);
    let stdout = std::io::stdout();
    pipeline::run(
        rx,
        &mut pipe,
        |batch: &[UpdateOperation]| {
            let mut out = stdout.lock();
            for op in batch {
                serde_json::to_writer(&mut out, op)?;
                out.write_all(b"\n")?;
            }
            out.flush()?;
            Ok(())
        },
        |event, _err| {
            if let Some(out) = dead_letters.as_mut() {
                serde_json::to_writer(&mut *out, &event.payload())?;
                out.write_all(b"\n")?;
            }
            Ok(())
        },
    )
    .await?;
    if let Some(mut out) = dead_letters {
        out.flush().context("flushing dead-letter file")?;
    }

    reader.await.context("feed reader panicked")??;

    let stats = pipe.stats();
    tracing::info!(
        translated = stats.translated,
        rejected = stats.rejected,
        batches = stats.batches,
        "statusbucket finished"
    );

    if let Some(store) = pipe.store() {
        for bucket in store.iter() {
            tracing::info!(
                entity_field = %bucket.entity_field,
                entity = %bucket.entity_id,
                bucket_size = bucket.bucket_size,
                min_ts = %bucket.min_ts,
                max_ts = %bucket.max_ts,
                expire_on = %bucket.expire_on,
                "bucket"
            );
        }
    }

    Ok(())
}

fn print_plan(config: &Config) -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();
    for index in bucket_indexes(&config.bucket) {
        writeln!(out, "{}", index.to_json()?)?;
    }
    for view in bucket_views(&config.bucket, STATUS_COLLECTION, STATIONS_COLLECTION) {
        writeln!(out, "{}", view.to_json()?)?;
    }
    Ok(())
}

/// One station_information snapshot per stdin line; replacements go to stdout.
async fn refresh_stations(config: &Config) -> anyhow::Result<()> {
    let mut refresh = StationRefresh::new(config);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_no = 0u64;
    let stdout = std::io::stdout();

    let emit = |batch: Vec<ReplaceOperation>| -> anyhow::Result<()> {
        let mut out = stdout.lock();
        for op in &batch {
            serde_json::to_writer(&mut out, op)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        tracing::info!(operations = batch.len(), "station batch flushed");
        Ok(())
    };

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let batches = StationInformationFeed::parse(&line).and_then(|feed| refresh.process(feed));
        match batches {
            Ok(batches) => batches.into_iter().try_for_each(emit)?,
            Err(err) => tracing::warn!(line = line_no, error = %err, "snapshot skipped"),
        }
    }
    if let Some(batch) = refresh.finish() {
        emit(batch)?;
    }

    tracing::info!(stations = refresh.replaced(), "station refresh finished");
    Ok(())
}

/// Decode stdin line by line and forward events until EOF or the pipeline
/// hangs up.
async fn read_stdin(
    tx: mpsc::Sender<RawEvent>,
    gbfs: bool,
    entity_field: String,
    mut watermark: FeedWatermark,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_no = 0u64;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let events = if gbfs {
            match StationStatusFeed::parse(&line) {
                Ok(snapshot) => match watermark.admit_feed(snapshot) {
                    Some(snapshot) => snapshot.into_events(&entity_field),
                    None => continue,
                },
                Err(err) => {
                    tracing::warn!(line = line_no, error = %err, "snapshot skipped");
                    continue;
                }
            }
        } else {
            match ndjson::decode_line(&line) {
                Ok(Some(event)) => vec![event],
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(line = line_no, error = %err, "line skipped");
                    continue;
                }
            }
        };

        for event in events {
            if tx.send(event).await.is_err() {
                return Ok(());
            }
        }
    }
    Ok(())
}
