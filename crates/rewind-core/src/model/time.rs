//! Time bounds for point-in-time reads.
//!
//! Internally every time is unix microseconds (`i64`). Callers may supply
//! either an RFC 3339 timestamp or fractional unix seconds
//! (`1547560124.43204`), matching what HTTP clients of the log usually send.

use chrono::{DateTime, Utc};

/// Error returned for a time bound that cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid timestamp '{raw}': expected RFC 3339 or unix seconds")]
pub struct TimestampError {
    pub raw: String,
}

/// Current wall-clock time in unix microseconds.
#[must_use]
pub fn now_us() -> i64 {
    Utc::now().timestamp_micros()
}

/// Parse an RFC 3339 timestamp or fractional unix seconds into microseconds.
///
/// # Errors
///
/// Returns [`TimestampError`] when the input is neither form, or is out of
/// range.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn parse_timestamp(raw: &str) -> Result<i64, TimestampError> {
    let trimmed = raw.trim();
    let err = || TimestampError {
        raw: raw.to_string(),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc).timestamp_micros());
    }

    let secs: f64 = trimmed.parse().map_err(|_| err())?;
    if !secs.is_finite() {
        return Err(err());
    }
    let micros = (secs * 1_000_000.0).round();
    if micros < i64::MIN as f64 || micros > i64::MAX as f64 {
        return Err(err());
    }
    Ok(micros as i64)
}

/// Render microseconds as RFC 3339 for human output.
#[must_use]
pub fn format_us(us: i64) -> String {
    DateTime::<Utc>::from_timestamp_micros(us)
        .map_or_else(|| us.to_string(), |dt| dt.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unix_seconds_with_fraction() {
        assert_eq!(parse_timestamp("1547560124.43204"), Ok(1_547_560_124_432_040));
        assert_eq!(parse_timestamp("0"), Ok(0));
    }

    #[test]
    fn parses_rfc3339() {
        assert_eq!(parse_timestamp("1970-01-01T00:00:01Z"), Ok(1_000_000));
        assert_eq!(
            parse_timestamp("1970-01-01T01:00:00+01:00"),
            Ok(0),
            "offset is normalized to UTC"
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_timestamp("yesterday").is_err());
        assert!(parse_timestamp("NaN").is_err());
        assert!(parse_timestamp("").is_err());
    }

    #[test]
    fn now_is_after_2020() {
        assert!(now_us() > 1_577_836_800_000_000);
    }

    #[test]
    fn format_round_trips() {
        let us = 1_547_560_124_432_040;
        assert_eq!(parse_timestamp(&format_us(us)), Ok(us));
    }
}
