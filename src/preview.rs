//! The `preview` command: the first few rows as their SQL literals.

use anyhow::{Context, Result, bail};
use log::info;

use crate::{
    cli::PreviewArgs,
    data::RawCell,
    io_utils,
    mapping::FieldMapping,
    normalize, sql, table,
};

pub fn execute(args: &PreviewArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let mapping = FieldMapping::resolve(args.mapping.as_deref())?;

    let mut reader = io_utils::open_sheet_reader(&args.input, delimiter, encoding)?;
    let headers = io_utils::read_header_row(&mut reader, args.banner_rows)?;
    let bound = mapping.bind(&headers);
    if bound.columns.is_empty() {
        bail!("None of the mapped source columns appear in the sheet header row");
    }

    let display_headers: Vec<String> = bound
        .columns
        .iter()
        .map(|(_, map)| map.column.clone())
        .collect();

    let mut rows = Vec::new();
    let mut record = csv::StringRecord::new();
    let mut position = args.banner_rows + 1;
    while rows.len() < args.rows {
        let more = reader
            .read_record(&mut record)
            .with_context(|| format!("Reading row {}", position + 1))?;
        if !more {
            break;
        }
        position += 1;

        let rendered: Vec<String> = bound
            .columns
            .iter()
            .map(|(index, map)| {
                let raw = record
                    .get(*index)
                    .map_or(RawCell::Missing, RawCell::from_field);
                let value = normalize::normalize_cell(&raw, map.datatype);
                sql::literal(value.as_ref())
            })
            .collect();
        rows.push(rendered);
    }

    table::print_table(&display_headers, &rows);
    info!("Displayed {} row(s) from {:?}", rows.len(), args.input);
    Ok(())
}
