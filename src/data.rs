//! Raw and typed cell values shared by the normalizer and the SQL renderer.
//!
//! [`RawCell`] is a cell as read from the source sheet, before any coercion;
//! [`Value`] is the typed result of normalization. "No usable value" is
//! `Option<Value>::None` throughout the pipeline and renders as SQL NULL.

use chrono::NaiveDate;

/// An untyped cell from the source sheet.
///
/// The CSV reader only ever produces `Missing` and `Text`; `Number` is part
/// of the contract so callers feeding cells from a typed source (a
/// spreadsheet SDK, a JSON export) get the same coercion rules. Every
/// conversion function handles all three variants.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Missing,
    Text(String),
    Number(f64),
}

impl RawCell {
    /// Classifies one CSV field: empty becomes `Missing`, anything else `Text`.
    pub fn from_field(field: &str) -> Self {
        if field.is_empty() {
            RawCell::Missing
        } else {
            RawCell::Text(field.to_string())
        }
    }

    /// True for `Missing` and for empty text, which the pipeline treats
    /// identically.
    pub fn is_missing(&self) -> bool {
        match self {
            RawCell::Missing => true,
            RawCell::Text(text) => text.is_empty(),
            RawCell::Number(_) => false,
        }
    }
}

/// A successfully normalized cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Currency, percentage, and decimal results.
    Number(f64),
    Integer(i64),
    Boolean(bool),
    Date(NaiveDate),
    Text(String),
}

/// Decimal string form of a float: integral values keep a trailing `.0`
/// (`250000.0`), fractional values use the shortest round-trip form
/// (`1200.5`). This is the shape the migration scripts have always carried,
/// so existing diffs against older script runs stay quiet.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}
