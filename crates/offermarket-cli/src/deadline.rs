//! Deadline argument parsing

use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Default deadline offset when none is given
pub const DEFAULT_OFFSET_SECS: i64 = 3600;

/// Parse a deadline relative to `now`.
///
/// Accepted forms: a Unix timestamp, an RFC 3339 date/time, a plain
/// `YYYY-MM-DD[THH:MM:SS]` in UTC, or `+<n>[smhd]` from now.
pub fn parse_deadline(value: &str, now: i64) -> anyhow::Result<i64> {
    let value = value.trim();

    if let Some(offset) = value.strip_prefix('+') {
        return now
            .checked_add(parse_offset(offset)?)
            .ok_or_else(|| anyhow!("relative deadline '+{offset}' is too far in the future"));
    }
    if let Ok(timestamp) = value.parse::<i64>() {
        return Ok(timestamp);
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Ok(t.timestamp());
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Ok(t.and_utc().timestamp());
    }
    if let Ok(d) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let midnight = d
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow!("invalid date '{value}'"))?;
        return Ok(midnight.and_utc().timestamp());
    }

    bail!("cannot read '{value}' as a deadline")
}

fn parse_offset(offset: &str) -> anyhow::Result<i64> {
    let (digits, unit) = match offset.char_indices().last() {
        Some((i, c)) if c.is_ascii_alphabetic() => (&offset[..i], c),
        _ => (offset, 's'),
    };
    let amount: i64 = digits
        .parse()
        .with_context(|| format!("invalid relative deadline '+{offset}'"))?;
    let scale = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        'd' => 86_400,
        other => bail!("unknown time unit '{other}', use s, m, h or d"),
    };
    amount
        .checked_mul(scale)
        .ok_or_else(|| anyhow!("relative deadline '+{offset}' is too large"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_relative() {
        assert_eq!(parse_deadline("+90", NOW).unwrap(), NOW + 90);
        assert_eq!(parse_deadline("+15m", NOW).unwrap(), NOW + 900);
        assert_eq!(parse_deadline("+2h", NOW).unwrap(), NOW + 7200);
        assert_eq!(parse_deadline("+1d", NOW).unwrap(), NOW + 86_400);
        assert!(parse_deadline("+3w", NOW).is_err());
        assert!(parse_deadline("+h", NOW).is_err());
    }

    #[test]
    fn test_relative_overflow() {
        assert!(parse_deadline("+99999999999999999d", NOW).is_err());
        assert!(parse_deadline(&format!("+{}", i64::MAX), NOW).is_err());
        assert_eq!(parse_deadline("+0", i64::MAX).unwrap(), i64::MAX);
    }

    #[test]
    fn test_absolute() {
        assert_eq!(parse_deadline("2000000000", NOW).unwrap(), 2_000_000_000);
        assert_eq!(
            parse_deadline("2033-05-18T03:33:20+00:00", NOW).unwrap(),
            2_000_000_000
        );
        assert_eq!(parse_deadline("2033-05-18T03:33:20", NOW).unwrap(), 2_000_000_000);
        assert_eq!(parse_deadline("1970-01-02", NOW).unwrap(), 86_400);
    }

    #[test]
    fn test_garbage() {
        assert!(parse_deadline("tomorrowish", NOW).is_err());
    }
}
