//! Yahoo Finance chart endpoint (`/v8/finance/chart/{symbol}`).
//!
//! The endpoint is public, serves one symbol per request and caps intraday
//! history (roughly 7 days for `1m`, 60 days below `1d`); lookbacks beyond that
//! come back truncated rather than as errors.

pub mod params;
pub mod provider;
pub mod response;

pub use provider::YahooProvider;
