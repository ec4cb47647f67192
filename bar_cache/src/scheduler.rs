//! Wall-clock aligned driver for the refresh pipeline.

use std::{future::Future, path::PathBuf};

use chrono::{DateTime, Timelike, Utc};
use tracing::{debug, info, warn};

use crate::{
    config::{Config, load_config_path},
    pipeline::RefreshPipeline,
};

/// First :00 or :30 second mark strictly after `now`.
pub fn next_boundary(now: DateTime<Utc>) -> DateTime<Utc> {
    let secs = now.timestamp();
    let minute_start = secs - secs.rem_euclid(60);
    let next = if now.second() < 30 {
        minute_start + 30
    } else {
        minute_start + 60
    };
    DateTime::from_timestamp(next, 0).unwrap_or(now)
}

pub struct Scheduler {
    pipeline: RefreshPipeline,
    config: Config,
    config_path: Option<PathBuf>,
}

impl Scheduler {
    pub fn new(pipeline: RefreshPipeline, config: Config) -> Self {
        Self {
            pipeline,
            config,
            config_path: None,
        }
    }

    /// Re-reads `path` at the start of every tick.
    pub fn with_reload(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Swaps in the on-disk configuration. A file that fails to load keeps the
    /// current one.
    fn reload(&mut self) {
        let Some(path) = &self.config_path else {
            return;
        };
        match load_config_path(path) {
            Ok(config) if config == self.config => {}
            Ok(config) => {
                info!(path = %path.display(), auto_fetch = config.auto_fetch, "configuration reloaded");
                self.config = config;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %format!("{e:#}"), "reload failed, keeping previous configuration")
            }
        }
    }

    /// Runs passes until `shutdown` resolves. Returns the number of completed passes.
    ///
    /// With auto-fetch on, each pass starts at the next :00/:30 boundary.
    /// With auto-fetch off, the loop sleeps for the idle interval and checks again.
    ///
    /// `shutdown` is only observed while sleeping. A pass that has started runs
    /// to completion, including any in-flight fetch.
    pub async fn run<F>(mut self, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut passes = 0;

        loop {
            self.reload();

            if !self.config.auto_fetch {
                info!(idle = ?self.config.idle_interval, "auto-fetch disabled, idling");
                tokio::select! {
                    biased;
                    _ = &mut shutdown => break,
                    _ = tokio::time::sleep(self.config.idle_interval) => continue,
                }
            }

            let now = Utc::now();
            let boundary = next_boundary(now);
            let wait = (boundary - now).to_std().unwrap_or_default();
            debug!(%boundary, ?wait, "sleeping until next boundary");
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(wait) => {}
            }

            let report = self.pipeline.run_once(&self.config, Utc::now()).await;
            passes += 1;
            info!(
                symbol = %self.config.symbol,
                refreshed = report.refreshed(),
                failed = report.failed(),
                pruned = report.pruned,
                "pass complete"
            );
        }

        info!(passes, "scheduler stopped");
        passes
    }
}
