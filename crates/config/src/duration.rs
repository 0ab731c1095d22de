//! ISO 8601 duration parsing.
//!
//! Calendar units use fixed conventions: a month is 30 days and a year is
//! 360 days. Fractional values are accepted for seconds only, to millisecond
//! precision.

use std::sync::LazyLock;

use chrono::Duration;
use regex::Regex;

use crate::ConfigError;

static DURATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(-?)P(?:(\d+)Y)?(?:(\d+)M)?(?:(\d+)([DW]))?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+(?:\.\d+)?)S)?)?$",
    )
    .expect("duration regex is valid")
});

const DAYS_IN_MONTH: i64 = 30;
const DAYS_IN_YEAR: i64 = DAYS_IN_MONTH * 12;
const SECONDS_IN_MINUTE: i64 = 60;
const SECONDS_IN_HOUR: i64 = 60 * 60;
const SECONDS_IN_DAY: i64 = 24 * SECONDS_IN_HOUR;

/// Convert an ISO 8601 duration (e.g. `P1D`, `-PT90S`, `P1DT2H`) to a
/// [`chrono::Duration`].
pub fn parse_duration(duration: &str) -> Result<Duration, ConfigError> {
    let captures = DURATION_REGEX
        .captures(duration)
        .ok_or_else(|| ConfigError::InvalidDuration(duration.to_string()))?;

    // `P` must be immediately followed by a digit, or by `T` and a digit;
    // this rejects bare "P" and "PT", which the anchored regex alone admits.
    let body = &duration[duration.find('P').unwrap_or(0) + 1..];
    if !starts_with_component(body) {
        return Err(ConfigError::InvalidDuration(duration.to_string()));
    }

    let sign: i64 = if captures.get(1).is_some_and(|m| m.as_str() == "-") {
        -1
    } else {
        1
    };
    let years = parse_int(captures.get(2));
    let months = parse_int(captures.get(3));
    let days_or_weeks = parse_int(captures.get(4));
    let is_weeks = captures.get(5).is_some_and(|m| m.as_str() == "W");
    let hours = parse_int(captures.get(6));
    let minutes = parse_int(captures.get(7));
    let seconds: f64 = captures
        .get(8)
        .map(|m| m.as_str().parse().unwrap_or(0.0))
        .unwrap_or(0.0);

    let mut total_days = if is_weeks { days_or_weeks * 7 } else { days_or_weeks };
    total_days += months * DAYS_IN_MONTH;
    total_days += years * DAYS_IN_YEAR;

    let whole_seconds =
        minutes * SECONDS_IN_MINUTE + hours * SECONDS_IN_HOUR + total_days * SECONDS_IN_DAY;
    let total_millis = sign * (whole_seconds * 1_000 + (seconds * 1_000.0).round() as i64);

    Ok(Duration::milliseconds(total_millis))
}

fn starts_with_component(body: &str) -> bool {
    let mut chars = body.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('T') => matches!(chars.next(), Some(c) if c.is_ascii_digit()),
        _ => false,
    }
}

fn parse_int(group: Option<regex::Match<'_>>) -> i64 {
    group.map(|m| m.as_str().parse().unwrap_or(0)).unwrap_or(0)
}

/// Serde adapter for ISO 8601 duration fields.
pub fn deserialize_iso8601<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = <String as serde::Deserialize>::deserialize(deserializer)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_units() {
        assert_eq!(parse_duration("P1D").unwrap(), Duration::days(1));
        assert_eq!(parse_duration("PT1H").unwrap(), Duration::hours(1));
        assert_eq!(parse_duration("PT15M").unwrap(), Duration::minutes(15));
        assert_eq!(parse_duration("PT90S").unwrap(), Duration::seconds(90));
        assert_eq!(parse_duration("P2W").unwrap(), Duration::days(14));
    }

    #[test]
    fn calendar_units_use_fixed_conventions() {
        assert_eq!(parse_duration("P1M").unwrap(), Duration::days(30));
        assert_eq!(parse_duration("P3M").unwrap(), Duration::days(90));
        assert_eq!(parse_duration("P1Y").unwrap(), Duration::days(360));
    }

    #[test]
    fn combines_date_and_time_components() {
        assert_eq!(
            parse_duration("P1DT2H3M4S").unwrap(),
            Duration::days(1) + Duration::hours(2) + Duration::minutes(3) + Duration::seconds(4)
        );
    }

    #[test]
    fn negative_durations() {
        assert_eq!(parse_duration("-P1W").unwrap(), Duration::days(-7));
        assert_eq!(parse_duration("-PT30S").unwrap(), Duration::seconds(-30));
    }

    #[test]
    fn fractional_seconds_round_to_milliseconds() {
        assert_eq!(
            parse_duration("PT1.5S").unwrap(),
            Duration::milliseconds(1_500)
        );
    }

    #[test]
    fn rejects_malformed_input() {
        for invalid in ["", "P", "PT", "-P", "1D", "P1H", "PxD", "one day"] {
            assert!(
                parse_duration(invalid).is_err(),
                "expected {invalid:?} to be rejected"
            );
        }
    }
}
