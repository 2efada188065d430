//! The `generate` command: sheet in, INSERT script out.

use std::io::{Read, Write};

use anyhow::{Context, Result, bail};
use itertools::Itertools;
use log::{debug, info, warn};

use crate::{
    cli::GenerateArgs,
    data::RawCell,
    io_utils,
    mapping::FieldMapping,
    normalize, sql,
};

pub fn execute(args: &GenerateArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let mut mapping = FieldMapping::resolve(args.mapping.as_deref())?;
    if let Some(table) = &args.table {
        mapping.table = table.clone();
        mapping.validate()?;
    }
    info!(
        "Generating SQL for '{}' -> {} (table {})",
        args.input.display(),
        args.output
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "stdout".into()),
        mapping.table
    );

    let mut reader = io_utils::open_sheet_reader(&args.input, delimiter, encoding)?;
    let mut writer = io_utils::open_text_writer(args.output.as_deref())?;
    let summary = write_script(
        &mut reader,
        &mapping,
        args.banner_rows,
        args.limit,
        &mut writer,
    )?;
    writer.flush().context("Flushing output")?;

    info!(
        "Wrote {} insert statement(s) for {}; skipped {} empty row(s) and {} row(s) without a key value",
        summary.emitted, mapping.table, summary.skipped_empty, summary.skipped_missing_key
    );
    Ok(())
}

/// Counters from one generation run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub emitted: usize,
    pub skipped_empty: usize,
    pub skipped_missing_key: usize,
}

/// Reads every data row and writes the full script: a comment header, one
/// INSERT per usable row in source order, and the trailing timestamp
/// refresh. Rows that are entirely empty, or whose key cell is empty, are
/// left out.
pub fn write_script<R, W>(
    reader: &mut csv::Reader<R>,
    mapping: &FieldMapping,
    banner_rows: usize,
    limit: Option<usize>,
    out: &mut W,
) -> Result<RunSummary>
where
    R: Read,
    W: Write,
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

    writeln!(
        out,
        "-- Insert statements for {} table",
        sql::bare_table_name(&mapping.table)
    )?;
    writeln!(out)?;

    let mut summary = RunSummary::default();
    let mut record = csv::StringRecord::new();
    // 1-based position of the last row read, starting at the header row.
    let mut position = banner_rows + 1;
    loop {
        if limit.is_some_and(|limit| summary.emitted >= limit) {
            break;
        }
        let more = reader
            .read_record(&mut record)
            .with_context(|| format!("Reading row {}", position + 1))?;
        if !more {
            break;
        }
        position += 1;

        if record.iter().all(str::is_empty) {
            summary.skipped_empty += 1;
            continue;
        }
        if let Some(key) = bound.key_index
            && record.get(key).is_none_or(str::is_empty)
        {
            summary.skipped_missing_key += 1;
            debug!("Skipping row {position}: key cell is empty");
            continue;
        }

        let mut columns = Vec::with_capacity(bound.columns.len());
        let mut values = Vec::with_capacity(bound.columns.len());
        for (index, map) in &bound.columns {
            let raw = record
                .get(*index)
                .map_or(RawCell::Missing, RawCell::from_field);
            let value = normalize::normalize_cell(&raw, map.datatype);
            columns.push(map.column.as_str());
            values.push(sql::literal(value.as_ref()));
        }
        writeln!(out, "{}", sql::insert_statement(&mapping.table, &columns, &values))?;
        summary.emitted += 1;
    }

    writeln!(out)?;
    writeln!(out, "-- Update timestamps")?;
    writeln!(out, "{}", sql::refresh_timestamps(&mapping.table))?;

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use crate::mapping::{FieldMap, SemanticType};

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
                FieldMap {
                    source: "Units".to_string(),
                    column: "units".to_string(),
                    datatype: SemanticType::Integer,
                },
            ],
        }
    }

    fn run(data: &str, mapping: &FieldMapping, limit: Option<usize>) -> (String, RunSummary) {
        let mut reader = reader_over(data);
        let mut out = Vec::new();
        let summary = write_script(&mut reader, mapping, 1, limit, &mut out).expect("script");
        (String::from_utf8(out).expect("utf-8 script"), summary)
    }

    #[test]
    fn script_frames_inserts_with_comments_and_refresh() {
        let data = "Workbook Export\n\
                    Asset ID,Purchase Price,Units\n\
                    A100,\"$250,000.00\",24\n";
        let (script, summary) = run(data, &sample_mapping(), None);

        assert_eq!(
            script,
            "-- Insert statements for investments table\n\n\
             INSERT INTO public.investments (asset_id, purchase_price, units) VALUES ('A100', 250000.0, 24);\n\n\
             -- Update timestamps\n\
             UPDATE public.investments SET updated_at = NOW();\n"
        );
        assert_eq!(summary.emitted, 1);
    }

    #[test]
    fn rows_without_a_key_value_are_left_out() {
        let data = "Workbook Export\n\
                    Asset ID,Purchase Price,Units\n\
                    ,\"$1.00\",1\n\
                    A200,,8\n";
        let (script, summary) = run(data, &sample_mapping(), None);

        assert!(!script.contains("1.0, 1"));
        assert!(script.contains("('A200', NULL, 8)"));
        assert_eq!(summary.emitted, 1);
        assert_eq!(summary.skipped_missing_key, 1);
    }

    #[test]
    fn entirely_empty_rows_are_counted_separately() {
        let data = "Workbook Export\n\
                    Asset ID,Purchase Price,Units\n\
                    ,,\n\
                    A300,,\n";
        let (_, summary) = run(data, &sample_mapping(), None);
        assert_eq!(summary.skipped_empty, 1);
        assert_eq!(summary.emitted, 1);
    }

    #[test]
    fn limit_caps_emitted_statements() {
        let data = "Workbook Export\n\
                    Asset ID,Purchase Price,Units\n\
                    A1,,1\n\
                    A2,,2\n\
                    A3,,3\n";
        let (script, summary) = run(data, &sample_mapping(), Some(2));
        assert_eq!(summary.emitted, 2);
        assert!(script.contains("'A2'"));
        assert!(!script.contains("'A3'"));
        // The refresh statement still closes the script.
        assert!(script.ends_with("UPDATE public.investments SET updated_at = NOW();\n"));
    }

    #[test]
    fn unmatched_sources_shrink_the_column_list() {
        let data = "Workbook Export\n\
                    Asset ID,Units\n\
                    A400,12\n";
        let (script, _) = run(data, &sample_mapping(), None);
        assert!(script.contains("INSERT INTO public.investments (asset_id, units) VALUES ('A400', 12);"));
    }

    #[test]
    fn missing_key_column_is_an_error() {
        let data = "Workbook Export\n\
                    Purchase Price,Units\n\
                    \"$1.00\",1\n";
        let mut reader = reader_over(data);
        let mut out = Vec::new();
        let err = write_script(&mut reader, &sample_mapping(), 1, None, &mut out).unwrap_err();
        assert!(err.to_string().contains("Key column 'Asset ID'"));
    }

    #[test]
    fn quotes_in_text_cells_are_escaped() {
        let mapping = FieldMapping {
            table: "t".to_string(),
            key_column: None,
            columns: vec![FieldMap {
                source: "Owner".to_string(),
                column: "owner_llc".to_string(),
                datatype: SemanticType::Text,
            }],
        };
        let data = "banner\nOwner\nO'Brien Holdings\n";
        let (script, _) = run(data, &mapping, None);
        assert!(script.contains("VALUES ('O''Brien Holdings');"));
    }
}
