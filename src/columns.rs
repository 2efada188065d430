//! Column listing from a mapping.
//!
//! Renders the mapping's source names, destination columns, and datatypes
//! as an ASCII table, with the key column marked.

use anyhow::Result;
use log::info;

use crate::{cli::ColumnsArgs, mapping::FieldMapping, table};

pub fn execute(args: &ColumnsArgs) -> Result<()> {
    let mapping = FieldMapping::resolve(args.mapping.as_deref())?;

    let mut rows = Vec::with_capacity(mapping.columns.len());
    for (idx, map) in mapping.columns.iter().enumerate() {
        let position = (idx + 1).to_string();
        let key_marker = if mapping.key_column.as_deref() == Some(map.source.as_str()) {
            "yes".to_string()
        } else {
            String::new()
        };
        rows.push(vec![
            position,
            map.source.clone(),
            map.column.clone(),
            map.datatype.to_string(),
            key_marker,
        ]);
    }

    let headers = vec![
        "#".to_string(),
        "source".to_string(),
        "column".to_string(),
        "datatype".to_string(),
        "key".to_string(),
    ];
    table::print_table(&headers, &rows);
    info!(
        "Listed {} column(s) for table {}",
        mapping.columns.len(),
        mapping.table
    );
    Ok(())
}
