#![allow(dead_code)]

use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use bar_cache::config::{Config, TimeframeSpec};
use chrono::{DateTime, TimeZone, Utc};
use market_data_ingestor::{
    models::{bar::Bar, bar_series::BarSeries, request_params::BarsRequestParams, timeframe::Timeframe},
    providers::{DataProvider, ProviderError},
};

pub const SYMBOL: &str = "SYM";

pub fn tf(s: &str) -> Timeframe {
    s.parse().expect("timeframe")
}

/// 2024-01-01 at `h:m` UTC.
pub fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
}

pub fn bar(ts: DateTime<Utc>, close: f64, volume: f64) -> Bar {
    Bar::new(ts, close, close + 1.0, close - 1.0, close, volume)
}

/// Hourly bars starting at 00:00, volume `i + 1` for the i-th bar.
pub fn hourly(n: u32) -> Vec<Bar> {
    (0..n)
        .map(|i| bar(at(i, 0), 100.0 + f64::from(i), f64::from(i + 1)))
        .collect()
}

pub fn config(dir: &Path, timeframes: Vec<TimeframeSpec>) -> Config {
    Config {
        symbol: SYMBOL.to_string(),
        data_dir: dir.to_path_buf(),
        fetch_timeout: None,
        timeframes,
        ..Config::default()
    }
}

/// Serves canned bars per timeframe and records every request.
#[derive(Default)]
pub struct ScriptedProvider {
    bars: HashMap<Timeframe, Vec<Bar>>,
    failing: Vec<Timeframe>,
    pub calls: Arc<Mutex<Vec<BarsRequestParams>>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(mut self, timeframe: Timeframe, bars: Vec<Bar>) -> Self {
        self.bars.insert(timeframe, bars);
        self
    }

    pub fn fail(mut self, timeframe: Timeframe) -> Self {
        self.failing.push(timeframe);
        self
    }

    pub fn requested(&self) -> Arc<Mutex<Vec<BarsRequestParams>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl DataProvider for ScriptedProvider {
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError> {
        self.calls.lock().unwrap().push(params.clone());
        if self.failing.contains(&params.timeframe) {
            return Err(ProviderError::Api("503 Service Unavailable".into()));
        }
        let Some(bars) = self.bars.get(&params.timeframe) else {
            return Ok(vec![]);
        };
        Ok(params
            .symbols
            .iter()
            .map(|symbol| BarSeries {
                symbol: symbol.clone(),
                timeframe: params.timeframe,
                bars: bars.clone(),
            })
            .collect())
    }
}

/// Never answers within any reasonable timeout.
pub struct SlowProvider(pub Duration);

#[async_trait]
impl DataProvider for SlowProvider {
    async fn fetch_bars(&self, _params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError> {
        tokio::time::sleep(self.0).await;
        Ok(vec![])
    }
}
