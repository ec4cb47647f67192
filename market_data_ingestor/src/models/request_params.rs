use chrono::{DateTime, Utc};

use crate::models::timeframe::Timeframe;

/// Universal parameters for requesting time-series bar data from any market data provider.
#[derive(Clone, Debug)]
pub struct BarsRequestParams {
    /// List of symbols to request (e.g., `["BTC-USD"]`, `["AAPL"]`).
    pub symbols: Vec<String>,

    /// The time interval for each bar (e.g., 5 minutes, 1 day).
    ///
    /// **Validation of allowed values is performed by each data provider
    /// implementation, according to their own API rules.**
    pub timeframe: Timeframe,

    /// Start of the requested time range (inclusive, UTC).
    pub start: DateTime<Utc>,

    /// End of the requested time range (exclusive, UTC).
    pub end: DateTime<Utc>,
}

impl BarsRequestParams {
    /// Request for a single symbol covering `lookback` back from `end`.
    ///
    /// Month lookbacks step back by calendar months.
    pub fn lookback(
        symbol: impl Into<String>,
        timeframe: Timeframe,
        lookback: Timeframe,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            symbols: vec![symbol.into()],
            timeframe,
            start: lookback.rewind(end),
            end,
        }
    }
}
