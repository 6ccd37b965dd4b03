//! Validators (C2): `value → {valid, reason?}` per declared type.
//!
//! A value enters any result only if its validator returns valid — this
//! module is the single place that decision is made.

use crate::types::FieldType;
use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").unwrap();
}

static CURRENCY_GLYPHS: &[char] = &['$', '€', '£', '¥', '₹', ','];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%B %d, %Y", "%b %d, %Y"];

/// `string`: non-empty after trim, within `[min_len, max_len]`.
pub fn validate_string(value: &str, min_len: usize, max_len: usize) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && trimmed.chars().count() >= min_len && trimmed.chars().count() <= max_len
}

/// `richtext`: string with printable content, same length bounds as
/// `string` but a larger default ceiling (callers of `canonical_extract`
/// use [`validate_richtext`] directly when they need non-default bounds).
pub fn validate_richtext(value: &str, max_len: usize) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && trimmed.chars().any(|c| !c.is_control()) && trimmed.chars().count() <= max_len
}

/// `email`: local@domain, no whitespace, domain has a dot.
pub fn validate_email(value: &str) -> bool {
    !value.chars().any(char::is_whitespace) && EMAIL_RE.is_match(value)
}

/// `url`: absolute http/https with a valid host.
pub fn validate_url(value: &str) -> bool {
    match url::Url::parse(value) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host().is_some(),
        Err(_) => false,
    }
}

/// `number`: finite, parses from localized/monetary forms after currency
/// glyphs and thousands separators are stripped.
pub fn validate_number(value: &str) -> Option<f64> {
    let cleaned: String = value.trim().chars().filter(|c| !CURRENCY_GLYPHS.contains(c)).collect();
    let parsed: f64 = cleaned.trim().parse().ok()?;
    parsed.is_finite().then_some(parsed)
}

/// `date`: parses to ISO-8601; undated strings rejected.
pub fn validate_date(value: &str) -> Option<String> {
    let trimmed = value.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }
    None
}

/// `enum`: member of a declared set, case-insensitive.
pub fn validate_enum(value: &str, allowed: &[String]) -> bool {
    allowed.iter().any(|a| a.eq_ignore_ascii_case(value.trim()))
}

/// `array-of-X`: every element satisfies `element_valid`.
pub fn validate_array_of<T>(values: &[T], mut element_valid: impl FnMut(&T) -> bool) -> bool {
    !values.is_empty() && values.iter().all(|v| element_valid(v))
}

/// Canonical extraction for a node's full text given a declared field
/// type: applies the matching validator and, on success, returns the
/// typed (and where relevant, normalized) value. Used by
/// [`crate::anchor::AnchorIndex::re_extract`] for cross-validation.
pub fn canonical_extract(text: &str, field_type: FieldType) -> Option<serde_json::Value> {
    let trimmed = text.trim();
    match field_type {
        FieldType::String => validate_string(trimmed, 1, 5000).then(|| serde_json::json!(trimmed)),
        FieldType::Richtext => validate_richtext(trimmed, 20_000).then(|| serde_json::json!(trimmed)),
        FieldType::Email => validate_email(trimmed).then(|| serde_json::json!(trimmed)),
        FieldType::Url => validate_url(trimmed).then(|| serde_json::json!(trimmed)),
        FieldType::Number => validate_number(trimmed).map(|n| serde_json::json!(n)),
        FieldType::Date => validate_date(trimmed).map(|d| serde_json::json!(d)),
        FieldType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(serde_json::json!(true)),
            "false" | "no" => Some(serde_json::json!(false)),
            _ => None,
        },
        FieldType::Enum => validate_string(trimmed, 1, 500).then(|| serde_json::json!(trimmed)),
        FieldType::ArrayOfString => {
            let items: Vec<&str> = trimmed.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
            validate_array_of(&items, |s| validate_string(s, 1, 500))
                .then(|| serde_json::json!(items))
        }
    }
}
