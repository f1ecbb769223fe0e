use {
    anyhow::{Result, anyhow, bail},
    chrono::{DateTime, NaiveDate, Utc},
};

pub struct TimeUtils;

impl TimeUtils {
    pub const MS_IN_S: i64 = 1000;
    pub const MS_IN_MIN: i64 = Self::MS_IN_S * 60;
    pub const MS_IN_H: i64 = Self::MS_IN_MIN * 60;
    pub const MS_IN_D: i64 = Self::MS_IN_H * 24;
    pub const MINUTES_IN_D: i64 = Self::MS_IN_D / Self::MS_IN_MIN;
    /// Fixed record timestamp format (UTC).
    pub const RECORD_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
    pub const STANDARD_DATE_FORMAT: &str = "%Y-%m-%d";
    /// Day-first format accepted on the command line for compatibility.
    pub const DAY_FIRST_DATE_FORMAT: &str = "%d-%m-%Y";
}

// Time Helper functions

/// Epoch milliseconds (UTC) to "YYYY-MM-DD HH:MM:SS". None if out of chrono's range.
pub fn epoch_ms_to_record_time(epoch_ms: i64) -> Option<String> {
    let dt = DateTime::from_timestamp_millis(epoch_ms)?;
    Some(dt.format(TimeUtils::RECORD_TIME_FORMAT).to_string())
}

/// Millisecond bounds of a UTC day: 00:00:00.000 and 23:59:59.999.
pub fn day_bounds_ms(day: NaiveDate) -> Result<(i64, i64)> {
    let start = day
        .and_hms_milli_opt(0, 0, 0, 0)
        .ok_or_else(|| anyhow!("no start of day for {}", day))?;
    let end = day
        .and_hms_milli_opt(23, 59, 59, 999)
        .ok_or_else(|| anyhow!("no end of day for {}", day))?;
    Ok((
        start.and_utc().timestamp_millis(),
        end.and_utc().timestamp_millis(),
    ))
}

/// Accepts "YYYY-MM-DD" or "DD-MM-YYYY".
pub fn parse_day(text: &str) -> Result<NaiveDate> {
    let text = text.trim();
    for format in [
        TimeUtils::STANDARD_DATE_FORMAT,
        TimeUtils::DAY_FIRST_DATE_FORMAT,
    ] {
        if let Ok(day) = NaiveDate::parse_from_str(text, format) {
            return Ok(day);
        }
    }
    bail!(
        "'{}' is not a date (expected YYYY-MM-DD or DD-MM-YYYY)",
        text
    )
}

pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_time_is_utc() {
        assert_eq!(
            epoch_ms_to_record_time(1_712_700_000_000).as_deref(),
            Some("2024-04-09 22:00:00")
        );
        assert_eq!(
            epoch_ms_to_record_time(0).as_deref(),
            Some("1970-01-01 00:00:00")
        );
    }

    #[test]
    fn day_bounds_cover_whole_day() {
        let day = NaiveDate::from_ymd_opt(2024, 4, 10).unwrap();
        let (start, end) = day_bounds_ms(day).unwrap();
        assert_eq!(start, 1_712_707_200_000);
        assert_eq!(end - start, TimeUtils::MS_IN_D - 1);
    }

    #[test]
    fn parse_day_accepts_both_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 4, 10).unwrap();
        assert_eq!(parse_day("2024-04-10").unwrap(), expected);
        assert_eq!(parse_day("10-04-2024").unwrap(), expected);
        assert!(parse_day("April 10").is_err());
    }
}
