//! Small general-purpose helpers.

use chrono::{TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimeError {
    #[error("unknown timezone `{name}`")]
    UnknownTimezone { name: String },
}

/// Format "now" in the given timezone using a chrono format string
/// (e.g. `%Y-%m-%d %H:%M:%S`). With `only_date`, the time-of-day is
/// zeroed before formatting.
pub fn now_in_timezone(format: &str, timezone: &str, only_date: bool) -> Result<String, TimeError> {
    let tz: Tz = timezone.parse().map_err(|_| TimeError::UnknownTimezone {
        name: timezone.to_string(),
    })?;

    let mut now = Utc::now().with_timezone(&tz);
    if only_date {
        let date = now.date_naive();
        now = tz
            .from_local_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default())
            .earliest()
            .unwrap_or(now);
    }

    Ok(now.format(format).to_string())
}

/// Drop duplicate entries, keeping the first occurrence of each and the
/// original relative order.
pub fn dedup_preserving_order<I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = std::collections::HashSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_keeps_first_occurrence_in_order() {
        let values = ["b", "a", "b", "c", "a"].map(String::from);
        assert_eq!(dedup_preserving_order(values), ["b", "a", "c"]);
    }

    #[test]
    fn dedup_of_empty_input_is_empty() {
        assert!(dedup_preserving_order(Vec::<String>::new()).is_empty());
    }

    #[test]
    fn unknown_timezone_is_an_error() {
        assert!(matches!(
            now_in_timezone("%Y-%m-%d", "Mars/Olympus_Mons", false),
            Err(TimeError::UnknownTimezone { .. })
        ));
    }

    #[test]
    fn only_date_zeroes_the_time_of_day() {
        let formatted = now_in_timezone("%H:%M:%S", "America/Sao_Paulo", true)
            .expect("format with known timezone");
        assert_eq!(formatted, "00:00:00");
    }

    #[test]
    fn formats_with_chrono_patterns() {
        let formatted =
            now_in_timezone("%Y-%m-%d", "UTC", false).expect("format with known timezone");
        assert_eq!(formatted.len(), 10);
        assert_eq!(&formatted[4..5], "-");
    }
}
