use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};

/// Parses an RFC 3339 timestamp or a plain `YYYY-MM-DD` date (midnight UTC).
pub fn parse_date(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| {
            anyhow!(
                "Invalid date '{}': expected RFC 3339 (2024-01-31T09:00:00Z) or YYYY-MM-DD",
                input
            )
        })
}
