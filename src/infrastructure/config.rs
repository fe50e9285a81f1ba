//! Application configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional file
//! named by `WORKQUEUE_CONFIG`, then `WORKQUEUE_*` environment variables.

use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

const ENV_PREFIX: &str = "WORKQUEUE";
const CONFIG_FILE_VAR: &str = "WORKQUEUE_CONFIG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Number of long-lived workers
    pub workers: usize,
    /// Maximum number of requests dispatched but not yet finished
    pub queue_size: usize,
    /// Workflow-manager status that makes a request eligible for intake
    pub request_status: String,
    /// Status after which a request's elements are reclaimed
    pub reclaim_status: String,
    /// Intake poll interval, seconds
    pub fetch_interval: u64,
    /// Reclaim poll interval, seconds
    pub cleanup_interval: u64,

    pub reqmgr_url: String,
    pub dbs_url: String,
    pub phedex_url: String,

    pub store_backend: StoreBackend,
    pub sqlite_path: String,

    /// Status server port
    pub server_port: u16,
    /// Remote-call diagnostics: 0 quiet, 1 per call, 2 with payloads
    pub verbose: u8,
    /// Linear retry backoff step, milliseconds
    pub retry_backoff_ms: u64,
}

impl AppConfig {
    /// Load configuration from defaults, the optional file and the environment
    pub fn load() -> Result<Self> {
        let file = env::var(CONFIG_FILE_VAR).ok();
        Self::build(file.as_deref(), Environment::with_prefix(ENV_PREFIX))
    }

    /// Built-in defaults only, ignoring the process environment
    #[cfg(test)]
    pub(crate) fn defaults() -> Self {
        let empty = std::collections::HashMap::new();
        Self::build(None, Environment::with_prefix(ENV_PREFIX).source(Some(empty)))
            .expect("built-in defaults are valid")
    }

    fn build(file: Option<&str>, environment: Environment) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("workers", 10_i64)?
            .set_default("queue_size", 100_i64)?
            .set_default("request_status", "assigned")?
            .set_default("reclaim_status", "running-closed")?
            .set_default("fetch_interval", 60_i64)?
            .set_default("cleanup_interval", 300_i64)?
            .set_default("reqmgr_url", "https://cmsweb.cern.ch/reqmgr2/data")?
            .set_default("dbs_url", "https://cmsweb.cern.ch/dbs/prod/global/DBSReader")?
            .set_default("phedex_url", "https://cmsweb.cern.ch/phedex/datasvc/json/prod")?
            .set_default("store_backend", "memory")?
            .set_default("sqlite_path", "workqueue.db")?
            .set_default("server_port", 8989_i64)?
            .set_default("verbose", 0_i64)?
            .set_default("retry_backoff_ms", 1000_i64)?;

        if let Some(path) = file {
            builder = builder.add_source(File::with_name(path));
        }
        builder = builder.add_source(environment.try_parsing(true));

        let config: AppConfig = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            bail!("workers must be at least 1");
        }
        if self.queue_size == 0 {
            bail!("queue_size must be at least 1");
        }
        if self.fetch_interval == 0 || self.cleanup_interval == 0 {
            bail!("fetch_interval and cleanup_interval must be at least 1 second");
        }
        for (key, url) in [
            ("reqmgr_url", &self.reqmgr_url),
            ("dbs_url", &self.dbs_url),
            ("phedex_url", &self.phedex_url),
        ] {
            reqwest::Url::parse(url).with_context(|| format!("{} is not a valid URL: {}", key, url))?;
        }
        Ok(())
    }

    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(self.fetch_interval)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}
