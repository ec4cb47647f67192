//! Artifact naming policy.
//!
//! Canonical artifacts are `{symbol}_{interval}.csv`. Versioned artifacts carry
//! their capture time: `{symbol}_{interval}_{suffix}.csv`, where the suffix
//! resolution follows the timeframe:
//!
//! | unit               | suffix               |
//! |--------------------|----------------------|
//! | minute             | `dd.mm.YYYY__HH.MM`  |
//! | hour               | `dd.mm.YYYY__HH`     |
//! | day / week / month | `dd.mm.YYYY`         |
//!
//! All capture times are UTC.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use market_data_ingestor::models::timeframe::{Timeframe, TimeframeUnit};

pub const EXTENSION: &str = "csv";

const DATE_FMT: &str = "%d.%m.%Y";

/// Resolution of the capture-time suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Minute,
    Hour,
    Day,
}

impl Granularity {
    pub fn of(tf: Timeframe) -> Self {
        match tf.unit() {
            TimeframeUnit::Minute => Granularity::Minute,
            TimeframeUnit::Hour => Granularity::Hour,
            TimeframeUnit::Day | TimeframeUnit::Week | TimeframeUnit::Month => Granularity::Day,
        }
    }

    /// Width of one suffix step. Two captures less than this apart share a name.
    pub fn seconds(self) -> i64 {
        match self {
            Granularity::Minute => 60,
            Granularity::Hour => 3_600,
            Granularity::Day => 86_400,
        }
    }

    /// Drops everything below this resolution.
    pub fn truncate(self, t: DateTime<Utc>) -> DateTime<Utc> {
        let naive = t.naive_utc();
        let time = match self {
            Granularity::Minute => NaiveTime::from_hms_opt(naive.hour(), naive.minute(), 0),
            Granularity::Hour => NaiveTime::from_hms_opt(naive.hour(), 0, 0),
            Granularity::Day => Some(NaiveTime::MIN),
        };
        // hour/minute come from a valid time, so this is always Some
        time.map(|time| Utc.from_utc_datetime(&naive.date().and_time(time)))
            .unwrap_or(t)
    }
}

/// A file in a symbol namespace that the store recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactName {
    Canonical(Timeframe),
    Versioned {
        timeframe: Timeframe,
        captured: DateTime<Utc>,
    },
}

pub fn canonical_name(symbol: &str, tf: Timeframe) -> String {
    format!("{symbol}_{tf}.{EXTENSION}")
}

pub fn versioned_name(symbol: &str, tf: Timeframe, captured: DateTime<Utc>) -> String {
    let suffix = format_suffix(captured, Granularity::of(tf));
    format!("{symbol}_{tf}_{suffix}.{EXTENSION}")
}

pub fn format_suffix(captured: DateTime<Utc>, granularity: Granularity) -> String {
    let pattern = match granularity {
        Granularity::Minute => "%d.%m.%Y__%H.%M",
        Granularity::Hour => "%d.%m.%Y__%H",
        Granularity::Day => DATE_FMT,
    };
    captured.format(pattern).to_string()
}

/// Parses a capture-time suffix at the given resolution.
///
/// Only the exact form produced by [`format_suffix`] is accepted: no missing
/// zero padding, no trailing text, no coarser or finer variant.
pub fn parse_suffix(suffix: &str, granularity: Granularity) -> Option<DateTime<Utc>> {
    let (date_part, time_part) = match suffix.split_once("__") {
        Some((d, t)) => (d, Some(t)),
        None => (suffix, None),
    };
    let date = NaiveDate::parse_from_str(date_part, DATE_FMT).ok()?;

    let time = match (granularity, time_part) {
        (Granularity::Day, None) => NaiveTime::MIN,
        (Granularity::Hour, Some(hh)) => NaiveTime::from_hms_opt(two_digits(hh)?, 0, 0)?,
        (Granularity::Minute, Some(hhmm)) => {
            let (hh, mm) = hhmm.split_once('.')?;
            NaiveTime::from_hms_opt(two_digits(hh)?, two_digits(mm)?, 0)?
        }
        _ => return None,
    };

    let captured = Utc.from_utc_datetime(&date.and_time(time));
    (format_suffix(captured, granularity) == suffix).then_some(captured)
}

fn two_digits(s: &str) -> Option<u32> {
    if s.len() == 2 && s.bytes().all(|b| b.is_ascii_digit()) {
        s.parse().ok()
    } else {
        None
    }
}

/// Classifies `file_name` against the naming patterns of `tracked` timeframes
/// for `symbol`. Returns `None` for anything the store does not own.
pub fn classify(file_name: &str, symbol: &str, tracked: &[Timeframe]) -> Option<ArtifactName> {
    let stem = file_name
        .strip_prefix(symbol)?
        .strip_prefix('_')?
        .strip_suffix(EXTENSION)?
        .strip_suffix('.')?;

    tracked.iter().copied().find_map(|tf| {
        let interval = tf.to_string();
        if stem == interval {
            return Some(ArtifactName::Canonical(tf));
        }
        let suffix = stem.strip_prefix(interval.as_str())?.strip_prefix('_')?;
        parse_suffix(suffix, Granularity::of(tf)).map(|captured| ArtifactName::Versioned {
            timeframe: tf,
            captured,
        })
    })
}

/// Capture time encoded in a versioned artifact name for `tf`, if any.
pub fn captured_at(file_name: &str, symbol: &str, tf: Timeframe) -> Option<DateTime<Utc>> {
    match classify(file_name, symbol, &[tf])? {
        ArtifactName::Versioned { captured, .. } => Some(captured),
        ArtifactName::Canonical(_) => None,
    }
}
