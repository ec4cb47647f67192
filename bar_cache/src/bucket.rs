//! Epoch-aligned bucketing of bar timestamps.
//!
//! Minute, hour and day widths count whole seconds from the Unix epoch. Weeks
//! count from Monday 1969-12-29 so every bucket opens on a Monday at 00:00 UTC.
//! Months count calendar months from 1970-01.
//!
//! Every boundary is a pure function of the timestamp and the width, so
//! bucketing a superset of bars reproduces the same boundaries.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use market_data_ingestor::models::timeframe::{Timeframe, TimeframeUnit};

const EPOCH_UNIX: DateTime<Utc> = DateTime::<Utc>::UNIX_EPOCH;

const SECS_PER_DAY: i64 = 24 * 60 * 60;

// 1970-01-01 was a Thursday
const WEEK_MONDAY_ANCHOR_OFFSET_SECS: i64 = 3 * SECS_PER_DAY;

/// Index of the `tf`-wide bucket holding `ts_utc`. Negative before the epoch.
pub fn bucket_id(ts_utc: DateTime<Utc>, tf: Timeframe) -> i64 {
    match tf.unit() {
        TimeframeUnit::Week => id_week(ts_utc, width_secs(tf)),
        TimeframeUnit::Month => id_month(ts_utc, tf.amount().get()),
        _ => id_fixed(ts_utc, width_secs(tf)),
    }
}

/// First instant of bucket `id`.
pub fn bucket_start_utc(id: i64, tf: Timeframe) -> DateTime<Utc> {
    match tf.unit() {
        TimeframeUnit::Week => start_week(id, width_secs(tf)),
        TimeframeUnit::Month => start_month(id, tf.amount().get()),
        _ => start_fixed(id, width_secs(tf)),
    }
}

/// Start of the bucket containing `ts_utc`.
pub fn bucket_floor(ts_utc: DateTime<Utc>, tf: Timeframe) -> DateTime<Utc> {
    bucket_start_utc(bucket_id(ts_utc, tf), tf)
}

fn width_secs(tf: Timeframe) -> i64 {
    // months never reach the fixed-size paths
    tf.fixed_seconds().unwrap_or(tf.nominal_seconds())
}

fn id_fixed(ts_utc: DateTime<Utc>, bucket_secs: i64) -> i64 {
    // timestamp() floors, also before the epoch
    ts_utc.timestamp().div_euclid(bucket_secs)
}

fn start_fixed(id: i64, bucket_secs: i64) -> DateTime<Utc> {
    EPOCH_UNIX + Duration::seconds(id * bucket_secs)
}

fn id_week(ts_utc: DateTime<Utc>, width: i64) -> i64 {
    (ts_utc.timestamp() + WEEK_MONDAY_ANCHOR_OFFSET_SECS).div_euclid(width)
}

fn start_week(id: i64, width: i64) -> DateTime<Utc> {
    EPOCH_UNIX + Duration::seconds(id * width - WEEK_MONDAY_ANCHOR_OFFSET_SECS)
}

fn id_month(ts_utc: DateTime<Utc>, amount: u32) -> i64 {
    let y = i64::from(ts_utc.year());
    let m = ts_utc.month0() as i64;
    let months_since_epoch = (y - 1970) * 12 + m;
    months_since_epoch.div_euclid(amount as i64)
}

fn start_month(id: i64, amount: u32) -> DateTime<Utc> {
    let start_idx = id * amount as i64;
    let y = 1970 + start_idx.div_euclid(12);
    let month = (start_idx.rem_euclid(12) + 1) as u32; // 1..12
    Utc.with_ymd_and_hms(y as i32, month, 1, 0, 0, 0)
        .single()
        .expect("first of month at midnight UTC always exists")
}
