use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::{
    models::{bar_series::BarSeries, request_params::BarsRequestParams},
    providers::{
        DataProvider, ProviderError, ProviderInitError,
        yahoo_rest::{
            params::{construct_params, validate_timeframe},
            response::ChartResponse,
        },
    },
};

const BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
/// The endpoint throttles requests without a browser-like agent.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) bar-cache";

pub struct YahooProvider {
    client: Client,
    base_url: String,
}

impl YahooProvider {
    /// Creates a provider against the public chart endpoint.
    pub fn new() -> Result<Self, ProviderInitError> {
        Self::with_base_url(BASE_URL)
    }

    /// Creates a provider against another chart endpoint (proxy, mirror).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ProviderInitError> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_symbol(
        &self,
        symbol: &str,
        params: &BarsRequestParams,
        query: &[(String, String)],
    ) -> Result<Option<BarSeries>, ProviderError> {
        let url = format!("{}/{}", self.base_url, symbol);
        let response = self.client.get(&url).query(query).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_msg = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown API error".to_string());
            return Err(ProviderError::Api(format!("{status}: {error_msg}")));
        }

        let chart = response.json::<ChartResponse>().await?.chart;
        if let Some(err) = chart.error {
            return Err(ProviderError::Api(format!("{}: {}", err.code, err.description)));
        }

        let Some(result) = chart.result.and_then(|r| r.into_iter().next()) else {
            return Ok(None);
        };
        if !result.meta.symbol.eq_ignore_ascii_case(symbol) {
            return Err(ProviderError::Internal(format!(
                "asked for {symbol}, chart is for {}",
                result.meta.symbol
            )));
        }
        let bars = result.into_bars(&params.timeframe);
        debug!(symbol, timeframe = %params.timeframe, bars = bars.len(), "chart fetched");

        Ok(Some(BarSeries {
            symbol: symbol.to_string(),
            timeframe: params.timeframe,
            bars,
        }))
    }
}

#[async_trait]
impl DataProvider for YahooProvider {
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError> {
        // Validate the timeframe before proceeding.
        validate_timeframe(&params.timeframe)?;
        let query = construct_params(&params)?;

        // One request per symbol; the chart endpoint has no batch form.
        let mut result = Vec::with_capacity(params.symbols.len());
        for symbol in &params.symbols {
            if let Some(series) = self.fetch_symbol(symbol, &params, &query).await? {
                result.push(series);
            }
        }
        Ok(result)
    }
}
