use thiserror::Error;

/// Failure of a single `fetch_bars` call.
///
/// Callers in the cache treat every variant as transient: the timeframe is
/// skipped for this pass and retried on the next one.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure (DNS, TLS, connection reset, body decoding).
    #[error("request to provider failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-success HTTP status or an error object in the payload.
    #[error("API error: {0}")]
    Api(String),

    /// The request cannot be expressed against this provider (e.g. an unserved interval).
    #[error("unsupported request: {0}")]
    Validation(String),

    /// The payload was well-formed but inconsistent.
    #[error("malformed provider data: {0}")]
    Internal(String),
}

/// Errors raised while constructing a provider.
#[derive(Debug, Error)]
pub enum ProviderInitError {
    #[error("cannot build HTTP client: {0}")]
    ClientBuild(#[from] reqwest::Error),
}
