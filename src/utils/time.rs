use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};

/// Returns start of the next day.
pub fn next_day_start<Tz: TimeZone>(date: DateTime<Tz>) -> Option<DateTime<Tz>> {
    (date + Duration::days(1)).with_time(NaiveTime::MIN).earliest()
}

/// Formats seconds as `HH:MM:SS`. Hours aren't capped at 24.
pub fn format_hhmmss(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

/// Hours and minutes of `seconds`, zero-padded. Used for the big clock in `status`.
pub fn format_hh_mm_parts(seconds: i64) -> (String, String) {
    let seconds = seconds.max(0);
    (
        format!("{:02}", seconds / 3600),
        format!("{:02}", (seconds % 3600) / 60),
    )
}

/// Parses `HH:MM` or `HH:MM:SS` into seconds.
pub fn parse_hhmmss(value: &str) -> Option<i64> {
    let parts = value
        .trim()
        .split(':')
        .map(|v| v.trim().parse::<u32>().ok())
        .collect::<Option<Vec<_>>>()?;

    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m] => (*h, *m, 0),
        [h, m, s] => (*h, *m, *s),
        _ => return None,
    };
    if minutes >= 60 || seconds >= 60 {
        return None;
    }
    Some(i64::from(hours) * 3600 + i64::from(minutes) * 60 + i64::from(seconds))
}

/// Relative description of a past moment, e.g. `5 min ago`.
pub fn format_time_ago(moment: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - moment).num_seconds();
    if seconds < 60 {
        "less than a minute ago".into()
    } else if seconds < 3600 {
        format!("{} min ago", seconds / 60)
    } else if seconds < 86400 {
        format!("{} hr ago", seconds / 3600)
    } else {
        let days = seconds / 86400;
        format!("{days} day{} ago", if days > 1 { "s" } else { "" })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{format_hh_mm_parts, format_hhmmss, format_time_ago, next_day_start, parse_hhmmss};

    #[test]
    fn test_hhmmss_formatting() {
        assert_eq!(format_hhmmss(0), "00:00:00");
        assert_eq!(format_hhmmss(1500), "00:25:00");
        assert_eq!(format_hhmmss(90061), "25:01:01");
        assert_eq!(format_hhmmss(-5), "00:00:00");
        assert_eq!(format_hh_mm_parts(3720), ("01".into(), "02".into()));
    }

    #[test]
    fn test_hhmmss_parsing() {
        assert_eq!(parse_hhmmss("00:25"), Some(1500));
        assert_eq!(parse_hhmmss(" 01:02:03 "), Some(3723));
        assert_eq!(parse_hhmmss("1:2:3:4"), None);
        assert_eq!(parse_hhmmss("12"), None);
        assert_eq!(parse_hhmmss("aa:bb"), None);
        assert_eq!(parse_hhmmss("00:75"), None);
        assert_eq!(parse_hhmmss("-1:00"), None);
    }

    #[test]
    fn test_time_ago_buckets() {
        let now = Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap();
        assert_eq!(format_time_ago(now - Duration::seconds(30), now), "less than a minute ago");
        assert_eq!(format_time_ago(now - Duration::minutes(5), now), "5 min ago");
        assert_eq!(format_time_ago(now - Duration::hours(3), now), "3 hr ago");
        assert_eq!(format_time_ago(now - Duration::days(1), now), "1 day ago");
        assert_eq!(format_time_ago(now - Duration::days(2), now), "2 days ago");
    }

    #[test]
    fn test_next_day_is_midnight() {
        let moment = Utc.with_ymd_and_hms(2024, 2, 28, 17, 30, 0).unwrap();
        assert_eq!(
            next_day_start(moment),
            Some(Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap())
        );
    }
}
