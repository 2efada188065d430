//! Cell normalization: loosely formatted sheet values to typed values.
//!
//! Each conversion function is total. Anything unparseable comes back as
//! `None`, never as an error, so one bad cell costs one NULL in the script
//! instead of failing the run. Callers that want to surface fallback rates
//! count the `None`s (see the `check` command).

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::data::{RawCell, Value, format_number};
use crate::mapping::SemanticType;

/// Characters stripped from currency text before parsing: thousands
/// separators, dollar signs, and whitespace.
fn currency_junk() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[,$\s]").expect("currency pattern is valid"))
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Parses a currency amount: strips `$`, commas, and whitespace, then reads
/// an accounting-style parenthesized value as negative.
///
/// `"$1,200.50"` becomes `1200.5`; `"(500)"` becomes `-500.0`.
pub fn parse_currency(raw: &RawCell) -> Option<f64> {
    if raw.is_missing() {
        return None;
    }
    match raw {
        RawCell::Number(value) => finite(*value),
        RawCell::Text(text) => {
            let cleaned = currency_junk().replace_all(text, "");
            let cleaned = match cleaned
                .strip_prefix('(')
                .and_then(|inner| inner.strip_suffix(')'))
            {
                Some(inner) => format!("-{inner}"),
                None => cleaned.into_owned(),
            };
            cleaned.parse::<f64>().ok().and_then(finite)
        }
        RawCell::Missing => None,
    }
}

/// Parses a percentage. Only text containing a `%` sign qualifies; the
/// numeric magnitude is kept as-is (`"5.25%"` becomes `5.25`, not `0.0525`).
/// Bare numbers are rejected because without the sign there is no way to
/// tell `0.05` meaning five percent from `5` meaning five percent.
pub fn parse_percentage(raw: &RawCell) -> Option<f64> {
    if raw.is_missing() {
        return None;
    }
    match raw {
        RawCell::Text(text) if text.contains('%') => text
            .replace('%', "")
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(finite),
        _ => None,
    }
}

/// Slash-date formats, keyed by the width of the year segment so that a
/// two-digit year never reaches `%Y`, which would happily read `"24"` as
/// the year 24.
const SLASH_DATE_FORMATS: &[(usize, &str)] = &[(4, "%m/%d/%Y"), (2, "%m/%d/%y")];

/// Parses a date in US order (`01/15/2024`, `01/15/24`) or ISO
/// (`2024-01-15`). Day-first text such as `15/01/2024` fails the month
/// range check and comes back `None`.
pub fn parse_date(raw: &RawCell) -> Option<NaiveDate> {
    if raw.is_missing() {
        return None;
    }
    let RawCell::Text(text) = raw else {
        return None;
    };
    let trimmed = text.trim();
    if let Some((_, year)) = trimmed.rsplit_once('/') {
        for (year_width, format) in SLASH_DATE_FORMATS {
            if year.len() == *year_width
                && let Ok(parsed) = NaiveDate::parse_from_str(trimmed, format)
            {
                return Some(parsed);
            }
        }
        return None;
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok()
}

/// Parses a yes/no flag, case-insensitively. `yes`/`true`/`1` are true,
/// `no`/`false`/`0` are false, everything else is `None`.
pub fn parse_boolean(raw: &RawCell) -> Option<bool> {
    if raw.is_missing() {
        return None;
    }
    let RawCell::Text(text) = raw else {
        return None;
    };
    match text.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" => Some(true),
        "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

fn integer_shaped(value: &str) -> bool {
    let digits = value.strip_prefix(['+', '-']).unwrap_or(value);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn truncate_to_i64(value: f64) -> Option<i64> {
    value.is_finite().then(|| value.trunc() as i64)
}

/// Parses an integer count. Plain digit strings parse directly as `i64`;
/// anything else goes through a float parse and truncates toward zero, so
/// `"42.9"` becomes `42` and `"-3.7"` becomes `-3`.
pub fn parse_integer(raw: &RawCell) -> Option<i64> {
    if raw.is_missing() {
        return None;
    }
    match raw {
        RawCell::Number(value) => truncate_to_i64(*value),
        RawCell::Text(text) => {
            let trimmed = text.trim();
            if integer_shaped(trimmed)
                && let Ok(parsed) = trimmed.parse::<i64>()
            {
                return Some(parsed);
            }
            trimmed.parse::<f64>().ok().and_then(truncate_to_i64)
        }
        RawCell::Missing => None,
    }
}

/// Parses a plain decimal number. No symbol stripping here; `"$5"` is not
/// a decimal.
pub fn parse_decimal(raw: &RawCell) -> Option<f64> {
    if raw.is_missing() {
        return None;
    }
    match raw {
        RawCell::Number(value) => finite(*value),
        RawCell::Text(text) => text.trim().parse::<f64>().ok().and_then(finite),
        RawCell::Missing => None,
    }
}

/// Applies the conversion for `datatype` to one cell. Missing input and
/// failed parses both come back as `None`.
pub fn normalize_cell(raw: &RawCell, datatype: SemanticType) -> Option<Value> {
    if raw.is_missing() {
        return None;
    }
    match datatype {
        SemanticType::Currency => parse_currency(raw).map(Value::Number),
        SemanticType::Percentage => parse_percentage(raw).map(Value::Number),
        SemanticType::Date => parse_date(raw).map(Value::Date),
        SemanticType::Boolean => parse_boolean(raw).map(Value::Boolean),
        SemanticType::Integer => parse_integer(raw).map(Value::Integer),
        SemanticType::Decimal => parse_decimal(raw).map(Value::Number),
        SemanticType::Text => match raw {
            RawCell::Text(text) => Some(Value::Text(text.clone())),
            RawCell::Number(value) => Some(Value::Text(format_number(*value))),
            RawCell::Missing => None,
        },
    }
}
