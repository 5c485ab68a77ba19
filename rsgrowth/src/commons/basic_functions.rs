use chrono::{DateTime, NaiveDate, Utc};

/// Round to a fixed number of decimals
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Share of `part` in `total` as a percentage; 0 when `total` is 0
pub fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 / total as f64 * 100.0
}

/// Epoch milliseconds as a UTC calendar date
pub fn date_from_millis(millis: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp_millis(millis).map(|dt| dt.date_naive())
}

/// Naive ISO-8601 UTC timestamp with microseconds, e.g. `2024-06-15T08:30:00.000000`
pub fn utc_timestamp_iso(now: DateTime<Utc>) -> String {
    now.naive_utc().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    #[test]
    fn test_round_to() {
        assert_relative_eq!(round_to(1.23456, 2), 1.23);
        assert_relative_eq!(round_to(0.995, 0), 1.0);
        assert_relative_eq!(round_to(2.0, 2), 2.0);
    }

    #[test]
    fn test_percentage() {
        assert_relative_eq!(percentage(1, 4), 25.0);
        assert_relative_eq!(percentage(0, 0), 0.0);
        assert_relative_eq!(percentage(7, 0), 0.0);
    }

    #[test]
    fn test_date_from_millis() {
        assert_eq!(
            date_from_millis(1_718_447_400_000),
            NaiveDate::from_ymd_opt(2024, 6, 15)
        );
        assert_eq!(date_from_millis(0), NaiveDate::from_ymd_opt(1970, 1, 1));
    }

    #[test]
    fn test_utc_timestamp_iso() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 8, 30, 0).unwrap();
        assert_eq!(utc_timestamp_iso(now), "2024-06-15T08:30:00.000000");
    }
}
