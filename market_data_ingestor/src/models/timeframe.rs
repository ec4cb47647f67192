//! Timeframe utilities for expressing uniform bar intervals and lookback spans.
//!
//! A [`Timeframe`] pairs a non-zero amount with a [`TimeframeUnit`], covering
//! minute, hour, day, week and month intervals in UTC. The same type doubles as
//! a *span* (e.g. a `2wk` lookback or a `5m` staleness threshold).
//!
//! The textual form follows the market-data convention used in file names and
//! configuration: `5m`, `1h`, `1d`, `1wk`, `1mo`.
//!
//! ```
//! use market_data_ingestor::models::timeframe::{Timeframe, TimeframeUnit};
//!
//! let tf: Timeframe = "15m".parse().unwrap();
//! assert_eq!(tf.amount().get(), 15);
//! assert_eq!(tf.unit(), TimeframeUnit::Minute);
//! assert_eq!(tf.to_string(), "15m");
//! ```

use std::{fmt, num::NonZeroU32, str::FromStr};

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SECS_PER_MINUTE: i64 = 60;
const SECS_PER_HOUR: i64 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: i64 = 24 * SECS_PER_HOUR;
const SECS_PER_WEEK: i64 = 7 * SECS_PER_DAY;
/// Nominal month length, only used for ordering and rough sizing.
const SECS_PER_NOMINAL_MONTH: i64 = 30 * SECS_PER_DAY;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimeframeError {
    #[error("Invalid amount for {unit:?}: {message}")]
    InvalidAmount {
        unit: TimeframeUnit,
        message: String,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

/// Timeframe granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimeframeUnit {
    /// UTC minute
    Minute,
    /// UTC hour
    Hour,
    /// UTC day
    Day,
    /// Monday-based, UTC
    Week,
    /// calendar months, UTC
    Month,
}

impl TimeframeUnit {
    fn suffix(self) -> &'static str {
        match self {
            TimeframeUnit::Minute => "m",
            TimeframeUnit::Hour => "h",
            TimeframeUnit::Day => "d",
            TimeframeUnit::Week => "wk",
            TimeframeUnit::Month => "mo",
        }
    }
}

/// A timeframe = amount × unit (e.g., 5-Minute, 4-Hour, 1-Week, 15-Month).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timeframe {
    amount: NonZeroU32,
    unit: TimeframeUnit,
}

impl Timeframe {
    pub const fn new(amount: NonZeroU32, unit: TimeframeUnit) -> Self {
        Self { amount, unit }
    }

    pub const fn amount(&self) -> NonZeroU32 {
        self.amount
    }

    pub const fn unit(&self) -> TimeframeUnit {
        self.unit
    }

    pub fn minutes(amount: u32) -> Result<Self, TimeframeError> {
        Self::checked(amount, TimeframeUnit::Minute)
    }

    pub fn hours(amount: u32) -> Result<Self, TimeframeError> {
        Self::checked(amount, TimeframeUnit::Hour)
    }

    pub fn days(amount: u32) -> Result<Self, TimeframeError> {
        Self::checked(amount, TimeframeUnit::Day)
    }

    pub fn weeks(amount: u32) -> Result<Self, TimeframeError> {
        Self::checked(amount, TimeframeUnit::Week)
    }

    pub fn months(amount: u32) -> Result<Self, TimeframeError> {
        Self::checked(amount, TimeframeUnit::Month)
    }

    fn checked(amount: u32, unit: TimeframeUnit) -> Result<Self, TimeframeError> {
        let amount = NonZeroU32::new(amount).ok_or_else(|| TimeframeError::InvalidAmount {
            unit,
            message: "amount must be > 0".into(),
        })?;
        Ok(Self::new(amount, unit))
    }

    /// Exact width in seconds for fixed-size units; `None` for months.
    pub fn fixed_seconds(&self) -> Option<i64> {
        let per_unit = match self.unit {
            TimeframeUnit::Minute => SECS_PER_MINUTE,
            TimeframeUnit::Hour => SECS_PER_HOUR,
            TimeframeUnit::Day => SECS_PER_DAY,
            TimeframeUnit::Week => SECS_PER_WEEK,
            TimeframeUnit::Month => return None,
        };
        Some(per_unit * i64::from(self.amount.get()))
    }

    /// Width in seconds with months counted as 30 days.
    ///
    /// Good for comparing timeframes, not for calendar arithmetic.
    pub fn nominal_seconds(&self) -> i64 {
        self.fixed_seconds()
            .unwrap_or(SECS_PER_NOMINAL_MONTH * i64::from(self.amount.get()))
    }

    /// `true` if `self` is strictly narrower than `other`.
    pub fn is_finer_than(&self, other: &Timeframe) -> bool {
        self.nominal_seconds() < other.nominal_seconds()
    }

    /// The instant one span before `t`, stepping whole calendar months for `Month`.
    ///
    /// Saturates at [`DateTime::MIN_UTC`].
    pub fn rewind(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        match self.fixed_seconds() {
            Some(secs) => Duration::try_seconds(secs)
                .and_then(|d| t.checked_sub_signed(d))
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            None => t
                .checked_sub_months(Months::new(self.amount.get()))
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
        }
    }

    /// The instant one span after `t`, stepping whole calendar months for `Month`.
    ///
    /// Saturates at [`DateTime::MAX_UTC`].
    pub fn advance(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        match self.fixed_seconds() {
            Some(secs) => Duration::try_seconds(secs)
                .and_then(|d| t.checked_add_signed(d))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            None => t
                .checked_add_months(Months::new(self.amount.get()))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount.get(), self.unit.suffix())
    }
}

impl FromStr for Timeframe {
    type Err = TimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // small parser: 5m / 4h / 1d / 1wk / 15mo
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| TimeframeError::InvalidInput {
                message: format!("missing unit in timeframe '{s}'"),
            })?;
        let (digits, unit) = s.split_at(split);
        if digits.is_empty() {
            return Err(TimeframeError::InvalidInput {
                message: format!("missing amount in timeframe '{s}'"),
            });
        }

        let unit = match unit {
            "m" | "min" => TimeframeUnit::Minute,
            "h" | "H" => TimeframeUnit::Hour,
            "d" | "D" => TimeframeUnit::Day,
            "w" | "W" | "wk" => TimeframeUnit::Week,
            "M" | "mo" => TimeframeUnit::Month,
            _ => {
                return Err(TimeframeError::InvalidInput {
                    message: format!("unknown unit '{unit}' in timeframe '{s}'"),
                });
            }
        };
        let amount: u32 = digits.parse().map_err(|_| TimeframeError::InvalidAmount {
            unit,
            message: format!("'{digits}' is not a valid amount"),
        })?;
        Self::checked(amount, unit)
    }
}

impl TryFrom<String> for Timeframe {
    type Error = TimeframeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn parses_and_displays_market_notation() {
        for s in ["5m", "15m", "30m", "1h", "4h", "1d", "1wk", "15mo"] {
            let tf: Timeframe = s.parse().unwrap();
            assert_eq!(tf.to_string(), s);
        }
    }

    #[test]
    fn accepts_aliases() {
        assert_eq!("1W".parse::<Timeframe>().unwrap(), Timeframe::weeks(1).unwrap());
        assert_eq!("6M".parse::<Timeframe>().unwrap(), Timeframe::months(6).unwrap());
        assert_eq!("5min".parse::<Timeframe>().unwrap(), Timeframe::minutes(5).unwrap());
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            "".parse::<Timeframe>(),
            Err(TimeframeError::InvalidInput { .. })
        ));
        assert!(matches!(
            "h".parse::<Timeframe>(),
            Err(TimeframeError::InvalidInput { .. })
        ));
        assert!(matches!(
            "5y".parse::<Timeframe>(),
            Err(TimeframeError::InvalidInput { .. })
        ));
        assert!(matches!(
            "0m".parse::<Timeframe>(),
            Err(TimeframeError::InvalidAmount {
                unit: TimeframeUnit::Minute,
                ..
            })
        ));
    }

    #[test]
    fn ordering_by_width() {
        let m30 = Timeframe::minutes(30).unwrap();
        let h1 = Timeframe::hours(1).unwrap();
        let h4 = Timeframe::hours(4).unwrap();
        assert!(m30.is_finer_than(&h1));
        assert!(h1.is_finer_than(&h4));
        assert!(!h4.is_finer_than(&h4));
        assert!(Timeframe::weeks(1).unwrap().is_finer_than(&Timeframe::months(1).unwrap()));
    }

    #[test]
    fn rewind_is_calendar_aware_for_months() {
        let t = Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap();
        assert_eq!(
            Timeframe::months(1).unwrap().rewind(t),
            Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap()
        );
        assert_eq!(
            Timeframe::weeks(2).unwrap().rewind(t),
            Utc.with_ymd_and_hms(2024, 3, 17, 12, 0, 0).unwrap()
        );
        assert_eq!(Timeframe::hours(4).unwrap().advance(t).hour(), 16);
    }

    #[test]
    fn huge_spans_saturate_instead_of_overflowing() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let weeks: Timeframe = "4000000000wk".parse().unwrap();
        assert_eq!(weeks.advance(t), DateTime::<Utc>::MAX_UTC);
        assert_eq!(weeks.rewind(t), DateTime::<Utc>::MIN_UTC);

        let months: Timeframe = "4000000000mo".parse().unwrap();
        assert_eq!(months.advance(t), DateTime::<Utc>::MAX_UTC);
        assert_eq!(months.rewind(t), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn serde_uses_string_form() {
        let tf: Timeframe = serde_json::from_str("\"1wk\"").unwrap();
        assert_eq!(tf, Timeframe::weeks(1).unwrap());
        assert_eq!(serde_json::to_string(&tf).unwrap(), "\"1wk\"");
        assert!(serde_json::from_str::<Timeframe>("\"1x\"").is_err());
    }
}
