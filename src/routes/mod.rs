pub mod auth;
pub mod campaigns;
pub mod followups;
pub mod members;
pub mod orders;
pub mod reports;
pub mod summary;

use chrono::{DateTime, Utc};

pub(crate) const DEFAULT_LIST_LIMIT: i64 = 20;
pub(crate) const MAX_LIMIT: i64 = 100;

/// Lenient integer query parameter: missing or unparseable values fall back,
/// out-of-range values clamp.
pub(crate) fn parse_bounded(raw: Option<&str>, fallback: i64, min: i64, max: i64) -> i64 {
    match raw.filter(|value| !value.is_empty()) {
        Some(value) => value
            .parse::<i64>()
            .map(|parsed| parsed.clamp(min, max))
            .unwrap_or(fallback),
        None => fallback,
    }
}

pub(crate) fn parse_limit(raw: Option<&str>, fallback: i64) -> u64 {
    parse_bounded(raw, fallback, 1, MAX_LIMIT) as u64
}

/// Trimmed value, `None` when blank.
pub(crate) fn non_blank(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Blank means "not given"; anything else must be strict RFC 3339.
pub(crate) fn parse_optional_rfc3339(
    raw: Option<&str>,
) -> Result<Option<DateTime<Utc>>, chrono::ParseError> {
    match non_blank(raw) {
        Some(value) => DateTime::parse_from_rfc3339(&value).map(|parsed| Some(parsed.with_timezone(&Utc))),
        None => Ok(None),
    }
}
