//! Market session calendar
//!
//! Determines whether the exchange is open at a given instant. All
//! comparisons happen in the exchange's own time zone (America/New_York),
//! so callers can pass plain UTC timestamps regardless of server locale.
//! Holidays are not modelled; a holiday weekday reads as open and the
//! stream falls back to synthesized quotes when the upstream returns
//! nothing.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::America::New_York;

/// Regular session opens at 09:30 exchange-local
const SESSION_OPEN_MINUTE: u32 = 9 * 60 + 30;
/// Regular session closes at 16:00 exchange-local (exclusive)
const SESSION_CLOSE_MINUTE: u32 = 16 * 60;

/// Whether the regular trading session is open at `now`
///
/// Open means a weekday with exchange-local time in [09:30, 16:00).
/// The 09:30 boundary is inclusive, the 16:00 boundary is exclusive.
pub fn is_session_open(now: DateTime<Utc>) -> bool {
    let local = now.with_timezone(&New_York);

    match local.weekday() {
        Weekday::Sat | Weekday::Sun => return false,
        _ => {}
    }

    let minute_of_day = local.hour() * 60 + local.minute();
    (SESSION_OPEN_MINUTE..SESSION_CLOSE_MINUTE).contains(&minute_of_day)
}

/// Convenience wrapper over [`is_session_open`] for the current instant
pub fn is_session_open_now() -> bool {
    is_session_open(Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_weekend_is_closed() {
        // Saturday 2024-01-06 10:00 EST (15:00 UTC)
        assert!(!is_session_open(utc(2024, 1, 6, 15, 0)));
        // Sunday 2024-01-07 12:00 EST
        assert!(!is_session_open(utc(2024, 1, 7, 17, 0)));
    }

    #[test]
    fn test_weekday_session_window() {
        // Wednesday 2024-01-10, EST (UTC-5)
        assert!(!is_session_open(utc(2024, 1, 10, 14, 29))); // 09:29 local
        assert!(is_session_open(utc(2024, 1, 10, 14, 30))); // 09:30 open boundary
        assert!(is_session_open(utc(2024, 1, 10, 18, 0))); // 13:00 local
        assert!(is_session_open(utc(2024, 1, 10, 20, 59))); // 15:59 local
        assert!(!is_session_open(utc(2024, 1, 10, 21, 0))); // 16:00 close boundary
        assert!(!is_session_open(utc(2024, 1, 10, 23, 0))); // 18:00 local
    }

    #[test]
    fn test_daylight_saving_offset() {
        // Wednesday 2024-07-10, EDT (UTC-4): open boundary shifts to 13:30 UTC
        assert!(!is_session_open(utc(2024, 7, 10, 13, 29)));
        assert!(is_session_open(utc(2024, 7, 10, 13, 30)));
        assert!(!is_session_open(utc(2024, 7, 10, 20, 0))); // 16:00 EDT
    }
}
