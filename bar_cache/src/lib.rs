//! Local multi-timeframe OHLCV cache for one instrument.
//!
//! A [`scheduler::Scheduler`] wakes on :00/:30 boundaries and hands the
//! current [`config::Config`] to a [`pipeline::RefreshPipeline`], which keeps
//! the CSV snapshots under `{data_dir}/{symbol}/` fresh: stale timeframes are
//! fetched (or aggregated from a finer one), merged into the cached series,
//! written, versioned and finally garbage-collected.

pub mod aggregate;
pub mod bucket;
pub mod config;
pub mod merge;
pub mod naming;
pub mod pipeline;
pub mod providers;
pub mod scheduler;
pub mod series;
pub mod snapshot;
pub mod staleness;
