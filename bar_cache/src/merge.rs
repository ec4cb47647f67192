//! Incremental merge of freshly fetched bars into a cached series.
//!
//! The provider may re-send bars we already hold, and the most recent one is
//! usually still forming when first fetched. Merging therefore lets the
//! incoming side win on every shared timestamp.

use crate::series::Series;

/// Concatenates `existing` and `incoming`, deduplicates by timestamp with the
/// incoming bar winning, and returns the result in ascending order.
///
/// With either side empty this returns the other side unchanged.
pub fn merge(existing: Series, incoming: Series) -> Series {
    if existing.is_empty() {
        return incoming;
    }
    if incoming.is_empty() {
        return existing;
    }

    let mut bars = existing.into_bars();
    bars.extend(incoming.into_bars());
    Series::from_bars(bars)
}
