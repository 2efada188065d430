use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Turn spreadsheet exports into SQL insert scripts", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Convert a sheet export into an INSERT script for the target table
    Generate(GenerateArgs),
    /// Inspect a sheet and write a starter mapping file from a sample
    Probe(ProbeArgs),
    /// Show the first few rows as the SQL literals they would produce
    Preview(PreviewArgs),
    /// Report how many cells parse cleanly and how many fall back to NULL
    Check(CheckArgs),
    /// List the column mapping in effect
    Columns(ColumnsArgs),
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Input sheet export to convert
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Output SQL script (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Mapping file to apply (defaults to the built-in investments mapping)
    #[arg(short, long)]
    pub mapping: Option<PathBuf>,
    /// Destination table, overriding the mapping's table
    #[arg(long)]
    pub table: Option<String>,
    /// Rows discarded before the column header row
    #[arg(long = "banner-rows", default_value_t = 1)]
    pub banner_rows: usize,
    /// Limit number of data rows emitted
    #[arg(long)]
    pub limit: Option<usize>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// Input sheet export to inspect
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Destination mapping file path
    #[arg(short, long)]
    pub mapping: PathBuf,
    /// Destination table recorded in the mapping (defaults to public.investments)
    #[arg(long)]
    pub table: Option<String>,
    /// Number of rows to sample when inferring datatypes (0 means full scan)
    #[arg(long, default_value_t = 2000)]
    pub sample_rows: usize,
    /// Rows discarded before the column header row
    #[arg(long = "banner-rows", default_value_t = 1)]
    pub banner_rows: usize,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// Input sheet export to preview
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Mapping file to apply (defaults to the built-in investments mapping)
    #[arg(short, long)]
    pub mapping: Option<PathBuf>,
    /// Number of rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
    /// Rows discarded before the column header row
    #[arg(long = "banner-rows", default_value_t = 1)]
    pub banner_rows: usize,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Input sheet export to check
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Mapping file to apply (defaults to the built-in investments mapping)
    #[arg(short, long)]
    pub mapping: Option<PathBuf>,
    /// Emit the report as JSON instead of a table
    #[arg(long)]
    pub json: bool,
    /// Maximum data rows to scan (0 = all)
    #[arg(long, default_value_t = 0)]
    pub limit: usize,
    /// Rows discarded before the column header row
    #[arg(long = "banner-rows", default_value_t = 1)]
    pub banner_rows: usize,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ColumnsArgs {
    /// Mapping file to list (defaults to the built-in investments mapping)
    #[arg(short, long)]
    pub mapping: Option<PathBuf>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_delimiter_accepts_names_and_single_characters() {
        assert_eq!(parse_delimiter("tab").unwrap(), b'\t');
        assert_eq!(parse_delimiter("comma").unwrap(), b',');
        assert_eq!(parse_delimiter(";").unwrap(), b';');
        assert!(parse_delimiter("ab").is_err());
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter("€").is_err());
    }
}
