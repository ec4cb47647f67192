use crate::{
    models::{
        request_params::BarsRequestParams,
        timeframe::{Timeframe, TimeframeUnit},
    },
    providers::ProviderError,
};

/// Maps a [`Timeframe`] onto the interval codes the chart endpoint accepts.
///
/// Anything else (e.g. `4h`) has to be derived locally from a finer interval.
pub fn interval_code(tf: &Timeframe) -> Result<&'static str, ProviderError> {
    let code = match (tf.unit(), tf.amount().get()) {
        (TimeframeUnit::Minute, 1) => "1m",
        (TimeframeUnit::Minute, 2) => "2m",
        (TimeframeUnit::Minute, 5) => "5m",
        (TimeframeUnit::Minute, 15) => "15m",
        (TimeframeUnit::Minute, 30) => "30m",
        (TimeframeUnit::Minute, 60) | (TimeframeUnit::Hour, 1) => "1h",
        (TimeframeUnit::Minute, 90) => "90m",
        (TimeframeUnit::Day, 1) => "1d",
        (TimeframeUnit::Day, 5) => "5d",
        (TimeframeUnit::Week, 1) => "1wk",
        (TimeframeUnit::Month, 1) => "1mo",
        (TimeframeUnit::Month, 3) => "3mo",
        _ => {
            return Err(ProviderError::Validation(format!(
                "timeframe {tf} is not served by the Yahoo chart endpoint"
            )));
        }
    };
    Ok(code)
}

/// Validates the timeframe before any request is sent.
pub fn validate_timeframe(tf: &Timeframe) -> Result<(), ProviderError> {
    interval_code(tf).map(|_| ())
}

/// Builds the query string for one chart request.
pub fn construct_params(params: &BarsRequestParams) -> Result<Vec<(String, String)>, ProviderError> {
    if params.end <= params.start {
        return Err(ProviderError::Validation(format!(
            "empty request window {} .. {}",
            params.start, params.end
        )));
    }
    Ok(vec![
        ("period1".to_string(), params.start.timestamp().to_string()),
        ("period2".to_string(), params.end.timestamp().to_string()),
        (
            "interval".to_string(),
            interval_code(&params.timeframe)?.to_string(),
        ),
        ("includePrePost".to_string(), "false".to_string()),
        ("events".to_string(), "history".to_string()),
    ])
}
