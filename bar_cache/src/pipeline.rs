//! One refresh pass over every tracked timeframe.
//!
//! Per timeframe the pass walks
//! `EVALUATE → (SKIP | FETCH_OR_AGGREGATE) → MERGE → PERSIST → VERSION`:
//!
//! - **EVALUATE**: the newest versioned artifact decides staleness; a missing
//!   canonical file is always stale.
//! - **FETCH_OR_AGGREGATE**: fetched timeframes ask the provider for their
//!   lookback window; composites read the base canonical and aggregate it.
//!   A leading bucket the base only partly covers is left out. Nothing to
//!   show (provider error, timeout, empty result, empty base) skips the
//!   timeframe for this pass.
//! - **MERGE**: the fresh series is merged over the cached one, then trimmed to
//!   the optional retention window.
//! - **PERSIST / VERSION**: canonical rewrite, then a capture-time copy.
//!
//! Timeframes run sequentially in declared order and never abort each other.
//! After the last one the symbol namespace is pruned.

use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use market_data_ingestor::{
    models::{request_params::BarsRequestParams, timeframe::Timeframe},
    providers::DataProvider,
};
use tracing::{debug, error, info, warn};

use crate::{
    aggregate::aggregate,
    config::{Config, TimeframeSpec},
    merge::merge,
    series::Series,
    snapshot::SnapshotStore,
    staleness,
};

/// What happened to one timeframe during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Newest version is younger than the staleness threshold.
    Fresh,
    /// Nothing new to merge; the cached artifacts were left alone.
    NoData { reason: String },
    /// Canonical rewritten. `version` is the new versioned file, if one was created.
    Refreshed { bars: usize, version: Option<String> },
    /// The store rejected the write.
    Failed { reason: String },
}

impl fmt::Display for RefreshOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshOutcome::Fresh => write!(f, "fresh"),
            RefreshOutcome::NoData { reason } => write!(f, "no data ({reason})"),
            RefreshOutcome::Refreshed {
                bars,
                version: Some(v),
            } => write!(f, "refreshed, {bars} bars, versioned as {v}"),
            RefreshOutcome::Refreshed {
                bars,
                version: None,
            } => write!(f, "refreshed, {bars} bars"),
            RefreshOutcome::Failed { reason } => write!(f, "failed ({reason})"),
        }
    }
}

/// Result of one pass, outcomes in declared timeframe order.
#[derive(Debug, Default)]
pub struct TickReport {
    pub outcomes: IndexMap<Timeframe, RefreshOutcome>,
    pub pruned: usize,
}

impl TickReport {
    pub fn refreshed(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| matches!(o, RefreshOutcome::Refreshed { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| matches!(o, RefreshOutcome::Failed { .. }))
            .count()
    }
}

pub struct RefreshPipeline {
    provider: Box<dyn DataProvider + Send + Sync>,
}

impl RefreshPipeline {
    pub fn new(provider: Box<dyn DataProvider + Send + Sync>) -> Self {
        Self { provider }
    }

    /// Runs one pass over `config.timeframes` as of `now`.
    pub async fn run_once(&self, config: &Config, now: DateTime<Utc>) -> TickReport {
        let store = SnapshotStore::new(&config.data_dir);
        let mut report = TickReport::default();

        for spec in &config.timeframes {
            let outcome = self.refresh_timeframe(&store, config, spec, now).await;
            let timeframe = spec.interval;
            match &outcome {
                RefreshOutcome::Fresh => {}
                RefreshOutcome::NoData { reason } => {
                    warn!(symbol = %config.symbol, %timeframe, %reason, "no data, skipping")
                }
                RefreshOutcome::Refreshed { bars, version } => {
                    info!(symbol = %config.symbol, %timeframe, bars, ?version, "refreshed")
                }
                RefreshOutcome::Failed { reason } => {
                    error!(symbol = %config.symbol, %timeframe, %reason, "refresh failed")
                }
            }
            report.outcomes.insert(timeframe, outcome);
        }

        report.pruned = store
            .prune(&config.symbol, &config.tracked(), config.max_versions)
            .unwrap_or_else(|e| {
                warn!(symbol = %config.symbol, error = %e, "prune failed");
                0
            });
        report
    }

    async fn refresh_timeframe(
        &self,
        store: &SnapshotStore,
        config: &Config,
        spec: &TimeframeSpec,
        now: DateTime<Utc>,
    ) -> RefreshOutcome {
        let symbol = config.symbol.as_str();
        let tf = spec.interval;

        // EVALUATE
        let latest = store.latest_version(symbol, tf).unwrap_or_else(|e| {
            warn!(symbol, timeframe = %tf, error = %e, "cannot list versions");
            None
        });
        let has_canonical = store.canonical_path(symbol, tf).is_file();
        if has_canonical && !staleness::needs_refresh(latest.as_deref(), symbol, tf, spec.staleness, now) {
            let age = latest
                .as_deref()
                .and_then(|name| staleness::age(name, symbol, tf, now));
            debug!(symbol, timeframe = %tf, ?age, "fresh, skipping");
            return RefreshOutcome::Fresh;
        }

        // FETCH_OR_AGGREGATE
        let fresh = match spec.base {
            Some(base) => aggregate_from_base(store, symbol, base, tf),
            None => self.fetch(config, spec, now).await,
        };
        let fresh = match fresh {
            Ok(series) if series.is_empty() => {
                return RefreshOutcome::NoData {
                    reason: "empty result".into(),
                };
            }
            Ok(series) => series,
            Err(reason) => return RefreshOutcome::NoData { reason },
        };

        // MERGE
        let existing = store.read(symbol, tf).unwrap_or_else(|e| {
            warn!(symbol, timeframe = %tf, error = %e, "unreadable canonical, rebuilding");
            Series::new()
        });
        let mut merged = merge(existing, fresh);
        if let Some(retain) = spec.retain {
            let dropped = merged.retain_since(retain.rewind(now));
            if dropped > 0 {
                debug!(symbol, timeframe = %tf, dropped, "trimmed to retention window");
            }
        }

        // PERSIST + VERSION
        if let Err(e) = store.write(symbol, tf, &merged) {
            return RefreshOutcome::Failed {
                reason: e.to_string(),
            };
        }
        match store.version(symbol, tf, now) {
            Ok(version) => RefreshOutcome::Refreshed {
                bars: merged.len(),
                version,
            },
            Err(e) => RefreshOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }

    async fn fetch(
        &self,
        config: &Config,
        spec: &TimeframeSpec,
        now: DateTime<Utc>,
    ) -> Result<Series, String> {
        let params = BarsRequestParams::lookback(&config.symbol, spec.interval, spec.lookback, now);
        debug!(
            symbol = %config.symbol,
            timeframe = %spec.interval,
            start = %params.start,
            end = %params.end,
            "fetching"
        );

        let call = self.provider.fetch_bars(params);
        let result = match config.fetch_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| format!("timed out after {}s", limit.as_secs()))?,
            None => call.await,
        };

        let series = result.map_err(|e| e.to_string())?;
        Ok(series.into_iter().flat_map(|s| s.bars).collect())
    }
}

fn aggregate_from_base(
    store: &SnapshotStore,
    symbol: &str,
    base: Timeframe,
    tf: Timeframe,
) -> Result<Series, String> {
    let base_series = store
        .read(symbol, base)
        .map_err(|e| format!("base {base} unreadable: {e}"))?;
    let Some(covered_from) = base_series.first().map(|b| b.timestamp) else {
        return Err(format!("base {base} is empty"));
    };
    let mut composite = aggregate(&base_series, tf);
    // a bucket opened before the base's first bar is partial and must not
    // replace the cached bar for it
    let partial = composite.retain_since(covered_from);
    if partial > 0 {
        debug!(symbol, timeframe = %tf, base = %base, %covered_from, "dropped partial leading bucket");
    }
    Ok(composite)
}
