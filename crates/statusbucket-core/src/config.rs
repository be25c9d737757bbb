//! Configuration types for statusbucket.
//!
//! [`Config::load`] layers the embedded defaults, an optional TOML file and
//! `STATUSBUCKET_*` environment overrides. [`Config::defaults`] returns the
//! embedded defaults without touching the filesystem (useful in tests).

use crate::error::ConfigError;
use crate::types::{LAST_REPORTED_FIELD, LAST_UPDATED_FIELD, TS_FIELD};
use chrono::TimeDelta;
use serde::Deserialize;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Embedded defaults
// ---------------------------------------------------------------------------

const DEFAULT_CONFIG: &str = r#"
[bucket]
cap                = 120
expire_after_hours = 12
entity_field       = "entity_id"
identity_field     = "_id"

[pipeline]
batch_size = 100
feed       = "station_status"
"#;

const ENV_PREFIX: &str = "STATUSBUCKET";

/// Event fields the translator consumes itself; neither key field may use them.
const RESERVED_FIELDS: [&str; 3] = [TS_FIELD, LAST_UPDATED_FIELD, LAST_REPORTED_FIELD];

// ---------------------------------------------------------------------------
// Public config types
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bucket: BucketPolicy,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// `[bucket]` section: how events are grouped and expired.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BucketPolicy {
    /// Maximum number of entries per bucket document.
    #[serde(default = "default_cap")]
    pub cap: u32,
    /// Hours added to the newest event time to get `expire_on`.
    #[serde(default = "default_expire_after_hours")]
    pub expire_after_hours: u32,
    /// Event field naming the entity; also the bucket's key field.
    #[serde(default = "default_entity_field")]
    pub entity_field: String,
    /// Store-internal identity field, never copied into an entry.
    #[serde(default = "default_identity_field")]
    pub identity_field: String,
}

fn default_cap() -> u32 { 120 }
fn default_expire_after_hours() -> u32 { 12 }
fn default_entity_field() -> String { "entity_id".to_string() }
fn default_identity_field() -> String { "_id".to_string() }

impl Default for BucketPolicy {
    fn default() -> Self {
        Self {
            cap: default_cap(),
            expire_after_hours: default_expire_after_hours(),
            entity_field: default_entity_field(),
            identity_field: default_identity_field(),
        }
    }
}

impl BucketPolicy {
    pub fn expire_after(&self) -> TimeDelta {
        TimeDelta::hours(i64::from(self.expire_after_hours))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cap == 0 {
            return Err(ConfigError::Invalid("bucket.cap must be at least 1".into()));
        }
        if self.expire_after_hours == 0 {
            return Err(ConfigError::Invalid(
                "bucket.expire_after_hours must be at least 1".into(),
            ));
        }
        if self.entity_field.is_empty() || self.identity_field.is_empty() {
            return Err(ConfigError::Invalid(
                "bucket.entity_field and bucket.identity_field must not be empty".into(),
            ));
        }
        if self.entity_field == self.identity_field {
            return Err(ConfigError::Invalid(format!(
                "bucket.entity_field and bucket.identity_field are both {:?}",
                self.entity_field
            )));
        }
        for (key, name) in [
            ("entity_field", &self.entity_field),
            ("identity_field", &self.identity_field),
        ] {
            if RESERVED_FIELDS.contains(&name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "bucket.{key} cannot be the reserved field {name:?}"
                )));
            }
        }
        Ok(())
    }
}

/// `[pipeline]` section: batching and watermark bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PipelineConfig {
    /// Operations per flushed batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Watermark key for snapshot feeds.
    #[serde(default = "default_feed")]
    pub feed: String,
}

fn default_batch_size() -> usize { 100 }
fn default_feed() -> String { "station_status".to_string() }

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            feed: default_feed(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Config {
    /// Load the layered configuration.
    ///
    /// An explicit `path` must exist; without one the per-user file at
    /// `$XDG_CONFIG_HOME/statusbucket/config.toml` is read if present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::from(config_path().as_path()).required(false),
        };

        Self::layered(file, environment())
    }

    fn layered<F>(file: F, env: config::Environment) -> Result<Self, ConfigError>
    where
        F: config::Source + Send + Sync + 'static,
    {
        let cfg: Self = config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(file)
            .add_source(env)
            .build()?
            .try_deserialize()?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Return the built-in defaults without touching the filesystem.
    pub fn defaults() -> Self {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .build()
            .expect("built-in default config must be valid TOML")
            .try_deserialize()
            .expect("built-in default config must deserialize correctly")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bucket.validate()?;
        if self.pipeline.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.batch_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Source helpers
// ---------------------------------------------------------------------------

/// `STATUSBUCKET_BUCKET__CAP=60` sets `bucket.cap`.
fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn config_path() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
                .join(".config")
        })
        .join("statusbucket")
        .join("config.toml")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        environment().source(Some(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ))
    }

    fn toml(body: &str) -> config::File<config::FileSourceString, config::FileFormat> {
        config::File::from_str(body, config::FileFormat::Toml)
    }

    #[test]
    fn defaults_load() {
        let cfg = Config::defaults();
        assert_eq!(cfg.bucket.cap, 120);
        assert_eq!(cfg.bucket.expire_after(), TimeDelta::hours(12));
        assert_eq!(cfg.bucket.entity_field, "entity_id");
        assert_eq!(cfg.bucket.identity_field, "_id");
        assert_eq!(cfg.pipeline.batch_size, 100);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn defaults_match_policy_default() {
        assert_eq!(Config::defaults().bucket, BucketPolicy::default());
        assert_eq!(Config::defaults().pipeline, PipelineConfig::default());
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[bucket]\ncap = 60\nentity_field = \"station_id\"\n\n[pipeline]\nbatch_size = 10"
        )
        .unwrap();

        let cfg = Config::load(Some(file.path())).unwrap();
        assert_eq!(cfg.bucket.cap, 60);
        assert_eq!(cfg.bucket.entity_field, "station_id");
        assert_eq!(cfg.bucket.expire_after_hours, 12);
        assert_eq!(cfg.pipeline.batch_size, 10);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            Config::load(Some(&missing)),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn zero_cap_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[bucket]\ncap = 0").unwrap();
        assert!(matches!(
            Config::load(Some(file.path())),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn entity_and_identity_field_must_differ() {
        let policy = BucketPolicy {
            identity_field: "entity_id".into(),
            ..BucketPolicy::default()
        };
        assert!(matches!(policy.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn zero_batch_size_rejected() {
        let mut cfg = Config::defaults();
        cfg.pipeline.batch_size = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn environment_overrides_file() {
        let cfg = Config::layered(
            toml("[bucket]\ncap = 30\n\n[pipeline]\nbatch_size = 10"),
            env(&[
                ("STATUSBUCKET_BUCKET__CAP", "60"),
                ("STATUSBUCKET_PIPELINE__BATCH_SIZE", "7"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.bucket.cap, 60);
        assert_eq!(cfg.pipeline.batch_size, 7);
        assert_eq!(cfg.bucket.entity_field, "entity_id");
    }

    #[test]
    fn environment_string_fields_and_validation() {
        let cfg = Config::layered(
            toml(""),
            env(&[("STATUSBUCKET_BUCKET__ENTITY_FIELD", "station_id")]),
        )
        .unwrap();
        assert_eq!(cfg.bucket.entity_field, "station_id");

        let zero = Config::layered(toml(""), env(&[("STATUSBUCKET_BUCKET__CAP", "0")]));
        assert!(matches!(zero, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn unprefixed_variables_are_ignored() {
        let cfg = Config::layered(toml(""), env(&[("BUCKET__CAP", "5")])).unwrap();
        assert_eq!(cfg.bucket.cap, 120);
    }

    #[rstest]
    #[case::entity_ts("entity_field", "ts")]
    #[case::entity_last_updated("entity_field", "last_updated")]
    #[case::identity_last_reported("identity_field", "last_reported")]
    fn reserved_key_fields_rejected(#[case] key: &str, #[case] name: &str) {
        let mut policy = BucketPolicy::default();
        match key {
            "entity_field" => policy.entity_field = name.into(),
            _ => policy.identity_field = name.into(),
        }
        match policy.validate() {
            Err(ConfigError::Invalid(msg)) => assert!(msg.contains(key), "{msg}"),
            other => panic!("expected Invalid, got {other:?}"),
        }
    }
}
