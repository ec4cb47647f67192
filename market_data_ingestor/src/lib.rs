//! Vendor-agnostic OHLCV models and the provider abstraction used to fetch them.

pub mod models;
pub mod providers;
