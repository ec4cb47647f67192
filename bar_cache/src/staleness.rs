//! Staleness decisions from artifact names.

use chrono::{DateTime, Duration, Utc};
use market_data_ingestor::models::timeframe::Timeframe;
use tracing::debug;

use crate::naming;

/// Decides whether the cached series behind `artifact` must be refreshed.
///
/// `artifact` is the file name of the newest versioned artifact for
/// (`symbol`, `tf`). The decision fails open: a missing artifact, a name that
/// does not parse, or a capture time later than `now` all mean "refresh".
/// Otherwise the series is stale once `now - captured >= threshold`.
pub fn needs_refresh(
    artifact: Option<&str>,
    symbol: &str,
    tf: Timeframe,
    threshold: Timeframe,
    now: DateTime<Utc>,
) -> bool {
    let Some(name) = artifact else {
        return true;
    };
    let Some(captured) = naming::captured_at(name, symbol, tf) else {
        debug!(artifact = name, "unparseable artifact name, treating as stale");
        return true;
    };
    if captured > now {
        debug!(artifact = name, %captured, "capture time in the future, treating as stale");
        return true;
    }
    now >= threshold.advance(captured)
}

/// Age of an artifact, if its name carries a capture time.
pub fn age(artifact: &str, symbol: &str, tf: Timeframe, now: DateTime<Utc>) -> Option<Duration> {
    naming::captured_at(artifact, symbol, tf).map(|captured| now - captured)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn tf(s: &str) -> Timeframe {
        s.parse().unwrap()
    }

    #[test]
    fn fresh_inside_window_stale_at_boundary() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let name = naming::versioned_name("SYM", tf("1h"), t0);
        let check = |now| needs_refresh(Some(&name), "SYM", tf("1h"), tf("1h"), now);

        assert!(!check(t0));
        assert!(!check(t0 + Duration::minutes(59) + Duration::seconds(59)));
        assert!(check(t0 + Duration::hours(1)));
        assert!(check(t0 + Duration::hours(5)));
    }

    #[test]
    fn threshold_can_differ_from_interval() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let name = naming::versioned_name("SYM", tf("1d"), t0);
        let now = t0 + Duration::hours(30);
        assert!(needs_refresh(Some(&name), "SYM", tf("1d"), tf("1d"), now));
        assert!(!needs_refresh(Some(&name), "SYM", tf("1d"), tf("2d"), now));
    }

    #[test]
    fn out_of_range_threshold_never_expires() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let name = naming::versioned_name("SYM", tf("1d"), t0);
        let now = t0 + Duration::days(365 * 100);
        assert!(!needs_refresh(Some(&name), "SYM", tf("1d"), tf("4000000000wk"), now));
        assert!(!needs_refresh(Some(&name), "SYM", tf("1d"), tf("4000000000mo"), now));
    }

    #[test]
    fn fails_open() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        assert!(needs_refresh(None, "SYM", tf("1h"), tf("1h"), now));
        assert!(needs_refresh(Some("SYM_1h_garbage.csv"), "SYM", tf("1h"), tf("1h"), now));
        assert!(needs_refresh(Some("SYM_1h.csv"), "SYM", tf("1h"), tf("1h"), now));
        // day-resolution suffix on an hourly timeframe
        assert!(needs_refresh(Some("SYM_1h_01.01.2024.csv"), "SYM", tf("1h"), tf("1h"), now));
        // captured after `now`
        assert!(needs_refresh(Some("SYM_1h_02.01.2024__10.csv"), "SYM", tf("1h"), tf("1h"), now));
    }

    #[test]
    fn age_reports_elapsed_time() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap();
        assert_eq!(
            age("SYM_1h_01.01.2024__10.csv", "SYM", tf("1h"), now),
            Some(Duration::minutes(150))
        );
        assert_eq!(age("SYM_junk.txt", "SYM", tf("1h"), now), None);
    }
}
