//! Leaf-value coercion shared by every mapped field.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

const NAIVE_ISO_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
];

const OFFSET_ISO_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%z",
];

const SQL_AND_US_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M:%S",
];

const FALLBACK_DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %H:%M",
    "%Y%m%d%H%M%S",
];

const FALLBACK_DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y%m%d"];

/// Blank text is absent; anything else is kept exactly as written.
pub fn string_or_null(value: Option<&str>) -> Option<String> {
    value
        .filter(|text| !text.trim().is_empty())
        .map(ToOwned::to_owned)
}

pub fn boolean(value: Option<&str>) -> bool {
    value
        .map(|text| {
            let text = text.trim();
            ["true", "1", "yes"]
                .iter()
                .any(|truthy| text.eq_ignore_ascii_case(truthy))
        })
        .unwrap_or(false)
}

/// Empty or `nil` means absent; `Err` carries text that is present but not a number.
pub fn integer_or_null(value: Option<&str>) -> Result<Option<i64>, String> {
    let Some(text) = numeric_text(value) else {
        return Ok(None);
    };
    text.parse::<i64>()
        .map(Some)
        .map_err(|_| text.to_string())
}

pub fn decimal_or_null(value: Option<&str>) -> Result<Option<f64>, String> {
    let Some(text) = numeric_text(value) else {
        return Ok(None);
    };
    match text.parse::<f64>() {
        Ok(number) if number.is_finite() => Ok(Some(number)),
        _ => Err(text.to_string()),
    }
}

fn numeric_text(value: Option<&str>) -> Option<&str> {
    let text = value?.trim();
    if text.is_empty() || text.eq_ignore_ascii_case("nil") {
        return None;
    }
    Some(text)
}

/// Offsets are folded into UTC; unrecognized text yields `None`.
pub fn datetime_or_null(value: Option<&str>) -> Option<NaiveDateTime> {
    let text = value?.trim();
    if text.is_empty() {
        return None;
    }

    for format in NAIVE_ISO_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed);
        }
    }

    for format in OFFSET_ISO_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(text, format) {
            return Some(parsed.naive_utc());
        }
    }

    for format in SQL_AND_US_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed);
        }
    }

    parse_datetime_fallback(text)
}

fn parse_datetime_fallback(text: &str) -> Option<NaiveDateTime> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.naive_utc());
    }
    if let Ok(parsed) = DateTime::parse_from_rfc2822(text) {
        return Some(parsed.naive_utc());
    }

    for format in FALLBACK_DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed);
        }
    }

    FALLBACK_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}
