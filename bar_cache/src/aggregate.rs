//! Resampling a finer series into a composite timeframe.

use market_data_ingestor::models::{bar::Bar, timeframe::Timeframe};

use crate::{
    bucket::{bucket_id, bucket_start_utc},
    series::Series,
};

/// Buckets `base` into epoch-aligned windows of `width` and emits one bar per
/// non-empty bucket, stamped with the bucket start.
///
/// open/close come from the first/last bar of the bucket, high/low are the
/// extremes and volume is summed. Buckets without bars emit nothing.
pub fn aggregate(base: &Series, width: Timeframe) -> Series {
    let mut out: Vec<Bar> = Vec::new();
    let mut current: Option<(i64, Bar)> = None;

    // `base` is sorted, so buckets arrive in order and each is seen once
    for bar in base {
        let id = bucket_id(bar.timestamp, width);
        match current.as_mut() {
            Some((cur_id, acc)) if *cur_id == id => {
                acc.high = acc.high.max(bar.high);
                acc.low = acc.low.min(bar.low);
                acc.close = bar.close;
                acc.volume += bar.volume;
            }
            _ => {
                if let Some((_, done)) = current.take() {
                    out.push(done);
                }
                let mut acc = bar.clone();
                acc.timestamp = bucket_start_utc(id, width);
                current = Some((id, acc));
            }
        }
    }
    if let Some((_, done)) = current {
        out.push(done);
    }

    Series::from_bars(out)
}
