// File I/O: input tables in, processed workbook out

pub mod csv;
pub mod xlsx;

use std::path::Path;

use billrate_recon::Table;

/// Where to find a table inside a file and how to read its first row.
#[derive(Debug, Clone, Default)]
pub struct TableSource {
    /// Sheet name for workbooks. `None` means the first sheet. Ignored for CSV.
    pub sheet: Option<String>,
    /// The first row is data, not headers.
    pub headerless: bool,
}

/// Load a table, dispatching on file extension.
///
/// `.csv`, `.tsv` and `.txt` go through the CSV reader; everything else is
/// handed to calamine (xlsx, xlsm, xls, xlsb, ods).
pub fn load_table(path: &Path, source: &TableSource) -> Result<Table, String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "csv" | "txt" => crate::csv::read_table(path, source.headerless),
        "tsv" => crate::csv::read_table_with_delimiter(path, b'\t', source.headerless),
        _ => xlsx::read_table(path, source.sheet.as_deref(), source.headerless),
    }
}

/// Shape raw string rows into a `Table`.
///
/// Blank rows are dropped, headers trimmed, and every row padded to the
/// table width. Headerless input gets synthetic `Column N` headers.
pub fn rows_to_table(name: &str, rows: Vec<Vec<String>>, headerless: bool) -> Table {
    let mut rows: Vec<Vec<String>> = rows
        .into_iter()
        .filter(|r| r.iter().any(|v| !v.trim().is_empty()))
        .collect();

    let headers: Vec<String> = if headerless || rows.is_empty() {
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        (1..=width).map(|i| format!("Column {i}")).collect()
    } else {
        rows.remove(0).into_iter().map(|h| h.trim().to_string()).collect()
    };

    let width = rows
        .iter()
        .map(|r| r.len())
        .max()
        .unwrap_or(0)
        .max(headers.len());

    let mut headers = headers;
    headers.resize(width, String::new());
    for row in &mut rows {
        row.resize(width, String::new());
    }

    Table::new(name, headers, rows)
}
