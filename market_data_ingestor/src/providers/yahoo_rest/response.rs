use chrono::DateTime;
use serde::Deserialize;

use crate::models::{bar::Bar, timeframe::Timeframe};

#[derive(Deserialize, Debug)]
pub struct ChartResponse {
    pub chart: Chart,
}

#[derive(Deserialize, Debug)]
pub struct Chart {
    pub result: Option<Vec<ChartResult>>,
    pub error: Option<ChartError>,
}

#[derive(Deserialize, Debug)]
pub struct ChartError {
    pub code: String,
    pub description: String,
}

#[derive(Deserialize, Debug)]
pub struct ChartResult {
    pub meta: ChartMeta,
    /// Bar start times in Unix seconds; absent when the window holds no bars.
    #[serde(default)]
    pub timestamp: Vec<i64>,
    pub indicators: Indicators,
}

#[derive(Deserialize, Debug)]
pub struct ChartMeta {
    pub symbol: String,
}

#[derive(Deserialize, Debug)]
pub struct Indicators {
    #[serde(default)]
    pub quote: Vec<Quote>,
}

/// Column-oriented OHLCV; individual cells are `null` for halted or empty slots.
#[derive(Deserialize, Debug, Default)]
pub struct Quote {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Vec<Option<f64>>,
}

impl ChartResult {
    /// Zips the columns into bars, skipping rows with a missing price.
    ///
    /// While a bar is still forming the endpoint stamps it with the quote time
    /// instead of the bar start; that trailing bar is snapped back onto the grid
    /// of the bar before it.
    pub fn into_bars(self, timeframe: &Timeframe) -> Vec<Bar> {
        let quote = self.indicators.quote.into_iter().next().unwrap_or_default();
        let mut bars: Vec<Bar> = self
            .timestamp
            .iter()
            .enumerate()
            .filter_map(|(i, &ts)| {
                Some(Bar {
                    timestamp: DateTime::from_timestamp(ts, 0)?,
                    open: cell(&quote.open, i)?,
                    high: cell(&quote.high, i)?,
                    low: cell(&quote.low, i)?,
                    close: cell(&quote.close, i)?,
                    volume: cell(&quote.volume, i).unwrap_or(0.0),
                })
            })
            .collect();

        snap_live_bar(&mut bars, timeframe);
        bars
    }
}

fn cell(col: &[Option<f64>], i: usize) -> Option<f64> {
    col.get(i).copied().flatten()
}

fn snap_live_bar(bars: &mut [Bar], timeframe: &Timeframe) {
    let Some(width) = timeframe.fixed_seconds() else {
        return;
    };
    let [.., prev, last] = bars else {
        return;
    };
    let delta = (last.timestamp - prev.timestamp).num_seconds();
    if delta > 0 && delta % width != 0 {
        last.timestamp = prev.timestamp + chrono::Duration::seconds((delta / width) * width);
    }
}
