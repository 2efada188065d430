//! The `probe` command: sample a sheet and write a starter mapping file.
//!
//! Inference is deliberately conservative. A column only keeps a datatype
//! while every sampled non-empty cell agrees with it, and currency is only
//! chosen when at least one cell carries currency markers, so plain numeric
//! columns come out as `decimal` rather than `currency`. The written file
//! is a starting point for hand editing, not a finished mapping.

use std::io::Read;

use anyhow::Result;
use heck::ToSnakeCase;
use log::{info, warn};

use crate::{
    cli::ProbeArgs,
    data::RawCell,
    io_utils,
    mapping::{FieldMap, FieldMapping, INVESTMENTS_TABLE, SemanticType},
    normalize,
};

pub fn execute(args: &ProbeArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let mut reader = io_utils::open_sheet_reader(&args.input, delimiter, encoding)?;
    let headers = io_utils::read_header_row(&mut reader, args.banner_rows)?;

    let mapping = infer_mapping(&mut reader, &headers, args.sample_rows, args.table.as_deref())?;
    mapping.save(&args.mapping)?;
    info!(
        "Mapping with {} column(s) for table {} written to {:?}",
        mapping.columns.len(),
        mapping.table,
        args.mapping
    );
    Ok(())
}

#[derive(Debug, Clone)]
struct TypeCandidate {
    possible_boolean: bool,
    possible_integer: bool,
    possible_date: bool,
    possible_percentage: bool,
    possible_currency: bool,
    possible_decimal: bool,
    currency_markers: bool,
}

impl TypeCandidate {
    fn new() -> Self {
        Self {
            possible_boolean: true,
            possible_integer: true,
            possible_date: true,
            possible_percentage: true,
            possible_currency: true,
            possible_decimal: true,
            currency_markers: false,
        }
    }

    fn observe(&mut self, text: &str) {
        let raw = RawCell::Text(text.to_string());
        if self.possible_boolean && normalize::parse_boolean(&raw).is_none() {
            self.possible_boolean = false;
        }
        if self.possible_integer && text.trim().parse::<i64>().is_err() {
            self.possible_integer = false;
        }
        if self.possible_date && normalize::parse_date(&raw).is_none() {
            self.possible_date = false;
        }
        if self.possible_percentage && normalize::parse_percentage(&raw).is_none() {
            self.possible_percentage = false;
        }
        if self.possible_currency {
            if normalize::parse_currency(&raw).is_none() {
                self.possible_currency = false;
            } else if text.contains(['$', '(', ',']) {
                self.currency_markers = true;
            }
        }
        if self.possible_decimal && normalize::parse_decimal(&raw).is_none() {
            self.possible_decimal = false;
        }
    }

    fn decide(&self) -> SemanticType {
        if self.possible_boolean {
            SemanticType::Boolean
        } else if self.possible_integer {
            SemanticType::Integer
        } else if self.possible_date {
            SemanticType::Date
        } else if self.possible_percentage {
            SemanticType::Percentage
        } else if self.possible_currency && self.currency_markers {
            SemanticType::Currency
        } else if self.possible_decimal {
            SemanticType::Decimal
        } else {
            SemanticType::Text
        }
    }
}

/// Samples up to `sample_rows` data rows (0 means all) and assembles a
/// mapping: destination names are snake_case forms of the source headers,
/// the first mapped column becomes the provisional key.
pub fn infer_mapping<R>(
    reader: &mut csv::Reader<R>,
    headers: &[String],
    sample_rows: usize,
    table: Option<&str>,
) -> Result<FieldMapping>
where
    R: Read,
{
    let mut candidates = vec![TypeCandidate::new(); headers.len()];
    let mut record = csv::StringRecord::new();
    let mut processed = 0usize;
    while reader.read_record(&mut record)? {
        if sample_rows > 0 && processed >= sample_rows {
            break;
        }
        for (idx, field) in record.iter().enumerate() {
            if field.is_empty() {
                continue;
            }
            if let Some(candidate) = candidates.get_mut(idx) {
                candidate.observe(field);
            }
        }
        processed += 1;
    }

    let mut columns: Vec<FieldMap> = Vec::with_capacity(headers.len());
    for (header, candidate) in headers.iter().zip(&candidates) {
        if header.is_empty() {
            warn!("Skipping an unnamed column in the header row");
            continue;
        }
        let mut column = header.to_snake_case();
        if column.starts_with(|c: char| c.is_ascii_digit()) {
            column.insert(0, '_');
        }
        if column.is_empty() {
            warn!("Skipping column '{header}': no usable destination name");
            continue;
        }
        if columns.iter().any(|existing| existing.column == column) {
            warn!("Skipping column '{header}': destination '{column}' is already mapped");
            continue;
        }
        columns.push(FieldMap {
            source: header.clone(),
            column,
            datatype: candidate.decide(),
        });
    }

    Ok(FieldMapping {
        table: table.unwrap_or(INVESTMENTS_TABLE).to_string(),
        key_column: columns.first().map(|map| map.source.clone()),
        columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader_over(data: &str) -> csv::Reader<Box<dyn Read>> {
        let cursor: Box<dyn Read> = Box::new(std::io::Cursor::new(data.as_bytes().to_vec()));
        let mut builder = csv::ReaderBuilder::new();
        builder.has_headers(false).flexible(true);
        builder.from_reader(cursor)
    }

    fn infer(data: &str, headers: &[&str]) -> FieldMapping {
        let mut reader = reader_over(data);
        let headers: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        infer_mapping(&mut reader, &headers, 0, None).expect("infer mapping")
    }

    #[test]
    fn recognizes_each_datatype_from_samples() {
        let data = "\
            A100,Yes,24,01/15/2024,5.25%,\"$1,200.50\",2.5\n\
            A200,No,8,2024-02-01,4.00%,(500),1.0\n";
        let mapping = infer(
            data,
            &[
                "Asset ID",
                "New Const?",
                "Units",
                "Assessment Date",
                "Cap Rate",
                "Purchase Price",
                "Baths",
            ],
        );

        let types: Vec<SemanticType> = mapping.columns.iter().map(|m| m.datatype).collect();
        assert_eq!(
            types,
            vec![
                SemanticType::Text,
                SemanticType::Boolean,
                SemanticType::Integer,
                SemanticType::Date,
                SemanticType::Percentage,
                SemanticType::Currency,
                SemanticType::Decimal,
            ]
        );
    }

    #[test]
    fn plain_numbers_stay_decimal_without_currency_markers() {
        let mapping = infer("1200.5\n98.25\n", &["Amount"]);
        assert_eq!(mapping.columns[0].datatype, SemanticType::Decimal);
    }

    #[test]
    fn destination_names_are_snake_case_identifiers() {
        let mapping = infer("x,y,z\n", &["Asset ID + Name", "Exp - R&M", "2024 Total"]);
        let names: Vec<&str> = mapping
            .columns
            .iter()
            .map(|m| m.column.as_str())
            .collect();
        assert_eq!(names, vec!["asset_id_name", "exp_r_m", "_2024_total"]);
        mapping.validate().expect("inferred mapping validates");
    }

    #[test]
    fn first_mapped_column_becomes_the_key() {
        let mapping = infer("A100,Hartford\n", &["Asset ID", "City"]);
        assert_eq!(mapping.key_column.as_deref(), Some("Asset ID"));
        assert_eq!(mapping.table, INVESTMENTS_TABLE);
    }

    #[test]
    fn unnamed_and_colliding_headers_are_dropped() {
        let mapping = infer("a,b,c\n", &["", "Asset ID", "Asset - ID"]);
        let sources: Vec<&str> = mapping
            .columns
            .iter()
            .map(|m| m.source.as_str())
            .collect();
        assert_eq!(sources, vec!["Asset ID"]);
    }

    #[test]
    fn sample_limit_stops_early() {
        // The third row would disqualify the boolean type; sampling two
        // rows never sees it.
        let data = "Yes\nNo\nmaybe\n";
        let mut reader = reader_over(data);
        let headers = vec!["Flag".to_string()];
        let mapping = infer_mapping(&mut reader, &headers, 2, None).expect("infer mapping");
        assert_eq!(mapping.columns[0].datatype, SemanticType::Boolean);
    }
}
