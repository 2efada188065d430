//! The `check` command: per-column parse and fallback accounting.
//!
//! Runs the same skip rules and conversions as `generate` without writing
//! any SQL, so a high `fallback` count can be investigated before the
//! script lands NULLs in the target table.

use std::io::Read;

use anyhow::{Context, Result, bail};
use itertools::Itertools;
use log::{info, warn};
use serde::Serialize;

use crate::{
    cli::CheckArgs,
    data::RawCell,
    io_utils,
    mapping::{FieldMapping, SemanticType},
    normalize, table,
};

pub fn execute(args: &CheckArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let mapping = FieldMapping::resolve(args.mapping.as_deref())?;
    let limit = (args.limit > 0).then_some(args.limit);

    let mut reader = io_utils::open_sheet_reader(&args.input, delimiter, encoding)?;
    let report = scan(&mut reader, &mapping, args.banner_rows, limit)?;

    if args.json {
        let stdout = std::io::stdout().lock();
        serde_json::to_writer_pretty(stdout, &report).context("Writing JSON report")?;
        println!();
    } else {
        let headers: Vec<String> = [
            "source", "column", "datatype", "parsed", "missing", "fallback", "fallback %",
        ]
        .iter()
        .map(|h| h.to_string())
        .collect();
        table::print_table(&headers, &render_rows(&report));
    }

    info!(
        "Checked {} row(s) against {} mapped column(s); {} row(s) skipped",
        report.rows_scanned,
        report.columns.len(),
        report.rows_skipped
    );
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub table: String,
    pub rows_scanned: usize,
    pub rows_skipped: usize,
    pub columns: Vec<ColumnCheck>,
}

#[derive(Debug, Serialize)]
pub struct ColumnCheck {
    pub source: String,
    pub column: String,
    pub datatype: SemanticType,
    /// Non-empty cells the conversion accepted.
    pub parsed: usize,
    /// Empty cells, NULL by definition.
    pub missing: usize,
    /// Non-empty cells the conversion rejected; these become NULL in the
    /// generated script.
    pub fallbacks: usize,
}

/// Scans up to `limit` usable data rows and tallies, per mapped column,
/// how each cell fares under its conversion. Skip rules match `generate`:
/// fully empty rows and rows without a key value are not counted.
pub fn scan<R>(
    reader: &mut csv::Reader<R>,
    mapping: &FieldMapping,
    banner_rows: usize,
    limit: Option<usize>,
) -> Result<CheckReport>
where
    R: Read,
{
    let headers = io_utils::read_header_row(reader, banner_rows)?;
    let bound = mapping.bind(&headers);
    if !bound.missing.is_empty() {
        warn!(
            "{} mapped column(s) absent from the sheet: {}",
            bound.missing.len(),
            bound.missing.iter().join(", ")
        );
    }
    if bound.columns.is_empty() {
        bail!("None of the mapped source columns appear in the sheet header row");
    }
    if let Some(key) = &mapping.key_column
        && bound.key_index.is_none()
    {
        bail!("Key column '{key}' not found in the sheet header row");
    }

    let mut columns: Vec<ColumnCheck> = bound
        .columns
        .iter()
        .map(|(_, map)| ColumnCheck {
            source: map.source.clone(),
            column: map.column.clone(),
            datatype: map.datatype,
            parsed: 0,
            missing: 0,
            fallbacks: 0,
        })
        .collect();

    let mut rows_scanned = 0usize;
    let mut rows_skipped = 0usize;
    let mut record = csv::StringRecord::new();
    let mut position = banner_rows + 1;
    loop {
        if limit.is_some_and(|limit| rows_scanned >= limit) {
            break;
        }
        let more = reader
            .read_record(&mut record)
            .with_context(|| format!("Reading row {}", position + 1))?;
        if !more {
            break;
        }
        position += 1;

        if record.iter().all(str::is_empty)
            || bound
                .key_index
                .is_some_and(|key| record.get(key).is_none_or(str::is_empty))
        {
            rows_skipped += 1;
            continue;
        }

        for ((index, map), check) in bound.columns.iter().zip(columns.iter_mut()) {
            let raw = record
                .get(*index)
                .map_or(RawCell::Missing, RawCell::from_field);
            if raw.is_missing() {
                check.missing += 1;
            } else if normalize::normalize_cell(&raw, map.datatype).is_some() {
                check.parsed += 1;
            } else {
                check.fallbacks += 1;
            }
        }
        rows_scanned += 1;
    }

    Ok(CheckReport {
        table: mapping.table.clone(),
        rows_scanned,
        rows_skipped,
        columns,
    })
}

pub fn render_rows(report: &CheckReport) -> Vec<Vec<String>> {
    report
        .columns
        .iter()
        .map(|check| {
            let attempted = check.parsed + check.fallbacks;
            let rate = if attempted == 0 {
                "-".to_string()
            } else {
                format!("{:.1}%", check.fallbacks as f64 * 100.0 / attempted as f64)
            };
            vec![
                check.source.clone(),
                check.column.clone(),
                check.datatype.to_string(),
                check.parsed.to_string(),
                check.missing.to_string(),
                check.fallbacks.to_string(),
                rate,
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::mapping::FieldMap;

    use super::*;

    fn reader_over(data: &str) -> csv::Reader<Box<dyn Read>> {
        let cursor: Box<dyn Read> = Box::new(std::io::Cursor::new(data.as_bytes().to_vec()));
        let mut builder = csv::ReaderBuilder::new();
        builder.has_headers(false).flexible(true);
        builder.from_reader(cursor)
    }

    fn sample_mapping() -> FieldMapping {
        FieldMapping {
            table: "public.investments".to_string(),
            key_column: Some("Asset ID".to_string()),
            columns: vec![
                FieldMap {
                    source: "Asset ID".to_string(),
                    column: "asset_id".to_string(),
                    datatype: SemanticType::Text,
                },
                FieldMap {
                    source: "Purchase Price".to_string(),
                    column: "purchase_price".to_string(),
                    datatype: SemanticType::Currency,
                },
            ],
        }
    }

    #[test]
    fn tallies_parses_misses_and_fallbacks() {
        let data = "Workbook Export\n\
                    Asset ID,Purchase Price\n\
                    A100,\"$250,000.00\"\n\
                    A200,pending\n\
                    A300,\n\
                    ,1\n";
        let mut reader = reader_over(data);
        let report = scan(&mut reader, &sample_mapping(), 1, None).expect("scan");

        assert_eq!(report.rows_scanned, 3);
        assert_eq!(report.rows_skipped, 1);

        let price = &report.columns[1];
        assert_eq!(price.parsed, 1);
        assert_eq!(price.fallbacks, 1);
        assert_eq!(price.missing, 1);
    }

    #[test]
    fn limit_stops_the_scan() {
        let data = "banner\nAsset ID,Purchase Price\nA1,1\nA2,2\nA3,3\n";
        let mut reader = reader_over(data);
        let report = scan(&mut reader, &sample_mapping(), 1, Some(2)).expect("scan");
        assert_eq!(report.rows_scanned, 2);
    }

    #[test]
    fn rendered_rows_carry_fallback_rates() {
        let data = "banner\n\
                    Asset ID,Purchase Price\n\
                    A1,\"$100\"\n\
                    A2,unknown\n";
        let mut reader = reader_over(data);
        let report = scan(&mut reader, &sample_mapping(), 1, None).expect("scan");
        let rows = render_rows(&report);

        assert_eq!(rows[1][0], "Purchase Price");
        assert_eq!(rows[1][2], "currency");
        assert_eq!(rows[1][6], "50.0%");
        // The key column parses every value, so its rate is 0.0%.
        assert_eq!(rows[0][6], "0.0%");
    }

    #[test]
    fn report_serializes_to_json() {
        let data = "banner\nAsset ID,Purchase Price\nA1,\"$100\"\n";
        let mut reader = reader_over(data);
        let report = scan(&mut reader, &sample_mapping(), 1, None).expect("scan");
        let json = serde_json::to_value(&report).expect("serialize report");

        assert_eq!(json["table"], "public.investments");
        assert_eq!(json["rows_scanned"], 1);
        assert_eq!(json["columns"][1]["datatype"], "currency");
        assert_eq!(json["columns"][1]["parsed"], 1);
    }
}
