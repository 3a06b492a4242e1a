//! # clock — market wall time and the trading-day boundary
//!
//! The exchange behind the default `.NS` suffix trades on IST (UTC+05:30),
//! which has no daylight-saving transitions, so a `FixedOffset` is enough.
//! Every daily boundary in the system (tracker reset, digest date, status
//! counters) is drawn in this timezone, not UTC.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, TimeZone, Utc, Weekday};

/// IST offset in seconds east of UTC.
const MARKET_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

pub fn market_offset() -> FixedOffset {
    FixedOffset::east_opt(MARKET_OFFSET_SECS).expect("static offset is valid")
}

/// Current wall time in the market timezone.
pub fn market_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&market_offset())
}

/// The trading-day key (`YYYY-MM-DD` in market TZ) for a given instant.
pub fn trading_day_of(instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&market_offset()).date_naive()
}

/// Today's trading-day key.
pub fn trading_day() -> NaiveDate {
    market_now().date_naive()
}

pub fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// The next instant (in UTC) at which the daily digest should fire: the
/// coming `hour:minute` market-local time, skipping weekends, and skipping
/// today if the slot has already passed.
pub fn next_digest_instant(hour: u32, minute: u32) -> DateTime<Utc> {
    let now = market_now();
    let mut date = now.date_naive();

    loop {
        if let Some(naive) = date.and_hms_opt(hour, minute, 0) {
            if let Some(local) = market_offset().from_local_datetime(&naive).single() {
                if is_weekday(date) && local > now {
                    return local.with_timezone(&Utc);
                }
            }
        }
        date += Duration::days(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekday_classification() {
        // 2024-06-03 is a Monday
        assert!(is_weekday(NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()));
        assert!(!is_weekday(NaiveDate::from_ymd_opt(2024, 6, 8).unwrap()));
        assert!(!is_weekday(NaiveDate::from_ymd_opt(2024, 6, 9).unwrap()));
    }

    #[test]
    fn trading_day_uses_market_offset() {
        // 20:00 UTC is already the next day in IST (+05:30).
        let instant = Utc.with_ymd_and_hms(2024, 6, 3, 20, 0, 0).unwrap();
        assert_eq!(
            trading_day_of(instant),
            NaiveDate::from_ymd_opt(2024, 6, 4).unwrap()
        );
    }

    #[test]
    fn next_digest_is_in_the_future_and_on_a_weekday() {
        let next = next_digest_instant(15, 30);
        assert!(next > Utc::now());
        assert!(is_weekday(next.with_timezone(&market_offset()).date_naive()));
    }
}
