//! I/O utilities: delimiter and encoding resolution, reader and writer
//! construction, and the two-row header convention.
//!
//! All file I/O in sheet-to-sql flows through this module. The `-` path
//! convention routes through standard streams on both sides.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow, bail};
use encoding_rs::{Encoding, UTF_8};
use encoding_rs_io::DecodeReaderBytesBuilder;

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

/// Opens the sheet for reading, decoding from `encoding` to UTF-8 on the
/// fly. A leading byte order mark is consumed; spreadsheet exports
/// routinely carry one.
pub fn open_sheet_reader(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<csv::Reader<Box<dyn Read>>> {
    let raw: Box<dyn Read> = if is_dash(path) {
        Box::new(std::io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        ))
    };
    let decoded: Box<dyn Read> = Box::new(
        DecodeReaderBytesBuilder::new()
            .encoding(Some(encoding))
            .build(raw),
    );

    let mut builder = csv::ReaderBuilder::new();
    // Banner rows rarely carry the same field count as data rows, so the
    // reader must tolerate ragged records. No record is treated as headers;
    // read_header_row handles that.
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    Ok(builder.from_reader(decoded))
}

/// Skips `banner_rows` records, then reads the next record as the column
/// header row. Names are whitespace-trimmed.
pub fn read_header_row<R>(reader: &mut csv::Reader<R>, banner_rows: usize) -> Result<Vec<String>>
where
    R: Read,
{
    let mut record = csv::StringRecord::new();
    for _ in 0..banner_rows {
        if !reader.read_record(&mut record)? {
            bail!("Input ended while skipping {banner_rows} banner row(s)");
        }
    }
    if !reader.read_record(&mut record)? {
        bail!("Input ended before the column header row");
    }
    Ok(record.iter().map(|name| name.trim().to_string()).collect())
}

/// Opens the script output for writing. No path, or `-`, means stdout.
pub fn open_text_writer(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(p) if !is_dash(p) => Ok(Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        ))),
        _ => Ok(Box::new(std::io::stdout())),
    }
}
