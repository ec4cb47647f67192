//! Cache configuration: parsing, normalization, and loading.
//!
//! The TOML surface describes one instrument and the ordered list of
//! timeframes kept fresh for it:
//!
//! ```toml
//! symbol = "BTC-USD"
//! provider = "yahoo"
//! data_dir = "data"
//! auto_fetch = true
//!
//! [[timeframes]]
//! interval = "1h"
//! lookback = "2wk"
//!
//! [[timeframes]]
//! interval = "4h"
//! base = "1h"
//! ```
//!
//! Key behaviors:
//! - The symbol is trimmed and upper-cased.
//! - `lookback` and `staleness` default from the interval (see [`default_lookback`]).
//! - A timeframe with `base` is composite: it is aggregated from the base
//!   series, never fetched, so it cannot carry a `lookback`.
//! - A composite base must be declared earlier and be strictly finer, so the
//!   base is refreshed first within a pass.
//! - `staleness` cannot be finer than the version suffix of its interval
//!   (one minute, hour or day). A shorter threshold could never be satisfied
//!   by the newest version name, so every pass would refetch.
//! - Omitting `[[timeframes]]` tracks the default set (see [`Config::default`]).
//!
//! Entrypoints: [`load_config_str`] and [`load_config_path`].

use std::{collections::HashSet, num::NonZeroU32, path::PathBuf, time::Duration};

use anyhow::{Context, bail};
use market_data_ingestor::models::timeframe::{Timeframe, TimeframeUnit};
use serde::{Deserialize, Serialize};

use crate::{naming::Granularity, providers::ProviderId};

pub const DEFAULT_SYMBOL: &str = "BTC-USD";
pub const DEFAULT_DATA_DIR: &str = "data";
/// Sleep between configuration checks while auto-fetch is off.
pub const DEFAULT_IDLE_INTERVAL_SECS: u64 = 10_000;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

const DEFAULT_LOOKBACK_BARS: NonZeroU32 = NonZeroU32::new(100).unwrap();

/// Raw TOML document.
#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub symbol: String,
    #[serde(default)]
    pub provider: ProviderId,
    pub data_dir: Option<PathBuf>,
    pub auto_fetch: Option<bool>,
    pub idle_interval_secs: Option<u64>,
    /// `0` disables the timeout.
    pub fetch_timeout_secs: Option<u64>,
    pub max_versions: Option<usize>,
    #[serde(default)]
    pub timeframes: Vec<TimeframeCfg>,
}

/// One `[[timeframes]]` entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TimeframeCfg {
    pub interval: Timeframe,
    pub base: Option<Timeframe>,
    pub lookback: Option<Timeframe>,
    pub staleness: Option<Timeframe>,
    pub retain: Option<Timeframe>,
}

/// A tracked timeframe after defaults are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeframeSpec {
    pub interval: Timeframe,
    /// Present iff the timeframe is aggregated from a finer one.
    pub base: Option<Timeframe>,
    /// Span requested from the provider. Unused for composites.
    pub lookback: Timeframe,
    /// Age at which the newest version counts as stale.
    pub staleness: Timeframe,
    /// Bars older than `now - retain` are dropped after merging.
    pub retain: Option<Timeframe>,
}

impl TimeframeSpec {
    /// A fetched timeframe with default lookback and staleness.
    pub fn fetched(interval: Timeframe) -> Self {
        Self {
            interval,
            base: None,
            lookback: default_lookback(interval),
            staleness: interval,
            retain: None,
        }
    }

    /// A timeframe aggregated from `base`.
    pub fn composite(interval: Timeframe, base: Timeframe) -> Self {
        Self {
            base: Some(base),
            ..Self::fetched(interval)
        }
    }

    pub fn is_composite(&self) -> bool {
        self.base.is_some()
    }
}

/// Normalized configuration handed to the pipeline and scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub symbol: String,
    pub provider: ProviderId,
    pub data_dir: PathBuf,
    pub auto_fetch: bool,
    pub idle_interval: Duration,
    pub fetch_timeout: Option<Duration>,
    pub max_versions: Option<usize>,
    pub timeframes: Vec<TimeframeSpec>,
}

impl Config {
    /// Intervals in declared order.
    pub fn tracked(&self) -> Vec<Timeframe> {
        self.timeframes.iter().map(|t| t.interval).collect()
    }

    /// Checks the cross-field rules described in the module docs.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.symbol.is_empty() {
            bail!("symbol cannot be empty after trimming");
        }
        if self.symbol.contains(['/', '\\']) || self.symbol == "." || self.symbol == ".." {
            bail!("symbol '{}' cannot be used as a directory name", self.symbol);
        }
        if self.timeframes.is_empty() {
            bail!("at least one timeframe must be tracked");
        }
        if self.max_versions == Some(0) {
            bail!("max_versions must be at least 1 when set");
        }

        let mut seen: HashSet<Timeframe> = HashSet::new();
        for tf in &self.timeframes {
            if !seen.insert(tf.interval) {
                bail!("duplicate timeframe {}", tf.interval);
            }
            let stamp = Granularity::of(tf.interval);
            if tf.staleness.nominal_seconds() < stamp.seconds() {
                bail!(
                    "staleness {} of {} is finer than its version stamps ({:?})",
                    tf.staleness,
                    tf.interval,
                    stamp
                );
            }
            if let Some(base) = tf.base {
                // `seen` holds only earlier declarations at this point
                if base == tf.interval || !seen.contains(&base) {
                    bail!(
                        "composite {} needs base {} declared before it",
                        tf.interval,
                        base
                    );
                }
                if !base.is_finer_than(&tf.interval) {
                    bail!("base {} must be finer than composite {}", base, tf.interval);
                }
            } else if tf.lookback.is_finer_than(&tf.interval) {
                bail!(
                    "lookback {} of {} is shorter than one bar",
                    tf.lookback,
                    tf.interval
                );
            }
        }
        Ok(())
    }
}

impl Default for Config {
    /// `BTC-USD` on Yahoo, tracking 5m, 15m, 30m, 1h, 4h (from 1h), 1d and 1wk.
    fn default() -> Self {
        let h1 = span(1, TimeframeUnit::Hour);
        let timeframes = vec![
            TimeframeSpec::fetched(span(5, TimeframeUnit::Minute)),
            TimeframeSpec::fetched(span(15, TimeframeUnit::Minute)),
            TimeframeSpec::fetched(span(30, TimeframeUnit::Minute)),
            TimeframeSpec::fetched(h1),
            TimeframeSpec::composite(span(4, TimeframeUnit::Hour), h1),
            TimeframeSpec::fetched(span(1, TimeframeUnit::Day)),
            TimeframeSpec::fetched(span(1, TimeframeUnit::Week)),
        ];
        Self {
            symbol: DEFAULT_SYMBOL.to_string(),
            provider: ProviderId::default(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            auto_fetch: true,
            idle_interval: Duration::from_secs(DEFAULT_IDLE_INTERVAL_SECS),
            fetch_timeout: Some(Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS)),
            max_versions: None,
            timeframes,
        }
    }
}

fn span(amount: u32, unit: TimeframeUnit) -> Timeframe {
    Timeframe::new(NonZeroU32::new(amount).unwrap_or(NonZeroU32::MIN), unit)
}

/// Provider lookback used when a timeframe does not set one.
///
/// 5m→1d, 15m/30m→4d, 1h→2wk, 1d→6mo, 1wk→15mo; anything else gets 100 bars.
pub fn default_lookback(interval: Timeframe) -> Timeframe {
    match (interval.amount().get(), interval.unit()) {
        (5, TimeframeUnit::Minute) => span(1, TimeframeUnit::Day),
        (15 | 30, TimeframeUnit::Minute) => span(4, TimeframeUnit::Day),
        (1, TimeframeUnit::Hour) => span(2, TimeframeUnit::Week),
        (1, TimeframeUnit::Day) => span(6, TimeframeUnit::Month),
        (1, TimeframeUnit::Week) => span(15, TimeframeUnit::Month),
        _ => Timeframe::new(
            interval.amount().saturating_mul(DEFAULT_LOOKBACK_BARS),
            interval.unit(),
        ),
    }
}

/// Applies defaults and validation to a parsed file.
pub fn normalize_config(file: ConfigFile) -> anyhow::Result<Config> {
    let defaults = Config::default();

    let timeframes = if file.timeframes.is_empty() {
        defaults.timeframes
    } else {
        file.timeframes
            .into_iter()
            .map(|cfg| {
                if cfg.base.is_some() && cfg.lookback.is_some() {
                    bail!("composite {} cannot set a lookback", cfg.interval);
                }
                Ok(TimeframeSpec {
                    interval: cfg.interval,
                    base: cfg.base,
                    lookback: cfg.lookback.unwrap_or_else(|| default_lookback(cfg.interval)),
                    staleness: cfg.staleness.unwrap_or(cfg.interval),
                    retain: cfg.retain,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?
    };

    let fetch_timeout = match file.fetch_timeout_secs {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => defaults.fetch_timeout,
    };

    let config = Config {
        symbol: file.symbol.trim().to_uppercase(),
        provider: file.provider,
        data_dir: file.data_dir.unwrap_or(defaults.data_dir),
        auto_fetch: file.auto_fetch.unwrap_or(defaults.auto_fetch),
        idle_interval: file
            .idle_interval_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.idle_interval),
        fetch_timeout,
        max_versions: file.max_versions,
        timeframes,
    };
    config.validate()?;
    Ok(config)
}

/// Parse and normalize a configuration from a TOML string.
pub fn load_config_str(toml_str: &str) -> anyhow::Result<Config> {
    let file: ConfigFile = toml::from_str(toml_str).context("failed to parse config TOML")?;
    normalize_config(file).context("invalid configuration")
}

/// Read a configuration TOML file from disk, parse, and normalize it.
pub fn load_config_path(path: impl AsRef<std::path::Path>) -> anyhow::Result<Config> {
    let text = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("read config file {}", path.as_ref().display()))?;
    load_config_str(&text)
}
