//! SQL rendering: typed values to literals, rows to INSERT statements.

use itertools::Itertools;

use crate::data::{Value, format_number};

/// Renders a normalized cell as a SQL literal. `None` is NULL; text is
/// quoted with embedded single quotes doubled.
pub fn literal(value: Option<&Value>) -> String {
    match value {
        None => "NULL".to_string(),
        Some(Value::Number(number)) => format_number(*number),
        Some(Value::Integer(integer)) => integer.to_string(),
        Some(Value::Boolean(true)) => "TRUE".to_string(),
        Some(Value::Boolean(false)) => "FALSE".to_string(),
        Some(Value::Date(date)) => format!("'{}'", date.format("%Y-%m-%d")),
        Some(Value::Text(text)) => quote(text),
    }
}

/// Wraps text in single quotes, doubling any embedded quote.
pub fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

pub fn insert_statement(table: &str, columns: &[&str], values: &[String]) -> String {
    format!(
        "INSERT INTO {table} ({}) VALUES ({});",
        columns.iter().join(", "),
        values.iter().join(", ")
    )
}

/// The statement every script ends with, so reruns leave a visible audit
/// trail in the target table.
pub fn refresh_timestamps(table: &str) -> String {
    format!("UPDATE {table} SET updated_at = NOW();")
}

/// Bare table name without its schema qualifier, for script comments.
pub fn bare_table_name(table: &str) -> &str {
    table.rsplit('.').next().unwrap_or(table)
}
