//! Time string parsing

use super::{TimeRange, TimeRangeOptions};
use crate::error::{Error, Result};

/// Parse `HH:MM:SS`, `MM:SS` or bare seconds into whole seconds
///
/// Blank input reads as `None`. Components after the leading one must be
/// below 60.
pub fn parse_time(value: &str) -> Result<Option<u64>> {
    parse_seconds(value.trim()).map_err(|message| Error::Config { message, key: None })
}

fn parse_seconds(value: &str) -> std::result::Result<Option<u64>, String> {
    if value.is_empty() {
        return Ok(None);
    }

    let parts: Vec<&str> = value.split(':').collect();
    if parts.len() > 3 {
        return Err(format!("invalid time string '{value}'"));
    }

    let mut total: u64 = 0;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("invalid time string '{value}'"));
        }
        let n: u64 = part
            .parse()
            .map_err(|_| format!("time component out of range in '{value}'"))?;
        if i > 0 && n >= 60 {
            return Err(format!(
                "minutes and seconds must be below 60 in '{value}'"
            ));
        }
        total = total
            .checked_mul(60)
            .and_then(|t| t.checked_add(n))
            .ok_or_else(|| format!("time component out of range in '{value}'"))?;
    }

    Ok(Some(total))
}

pub(super) fn resolve(options: &TimeRangeOptions) -> Result<Option<TimeRange>> {
    let start = parse_field(options.start.as_deref(), "time_range.start")?;
    let end = parse_field(options.end.as_deref(), "time_range.end")?;

    if let (Some(s), Some(e)) = (start, end)
        && s >= e
    {
        return Err(Error::config(
            format!("time range start ({s}s) must be before end ({e}s)"),
            "time_range",
        ));
    }

    if start.is_none() && end.is_none() {
        return Ok(None);
    }
    Ok(Some(TimeRange { start, end }))
}

fn parse_field(value: Option<&str>, key: &str) -> Result<Option<u64>> {
    match value {
        None => Ok(None),
        Some(v) => parse_seconds(v.trim()).map_err(|message| Error::config(message, key)),
    }
}
