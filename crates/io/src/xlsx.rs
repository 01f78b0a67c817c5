// Excel table import (calamine) and processed workbook export (rust_xlsxwriter)

use std::path::Path;
use std::time::Instant;

use billrate_recon::{OutputBundle, Sheet, Table, Value};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Duration, NaiveDate};
use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook, Worksheet};
use tracing::debug;

/// Excel's day zero in the 1900 date system (accounts for the 1900 leap-year bug).
fn excel_epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 30)
}

/// Number format for computed rates.
const RATE_FORMAT: &str = "0.00";

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// Read one sheet of a workbook (xlsx, xlsm, xls, xlsb, ods) into a `Table`.
///
/// `sheet = None` (or an empty name) takes the first sheet. Every cell is
/// converted to its display string; date cells become ISO dates.
pub fn read_table(path: &Path, sheet: Option<&str>, headerless: bool) -> Result<Table, String> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| format!("Failed to open Excel file '{}': {}", path.display(), e))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let name = match sheet.filter(|s| !s.is_empty()) {
        Some(wanted) => sheet_names
            .iter()
            .find(|n| n.as_str() == wanted)
            .cloned()
            .ok_or_else(|| {
                format!(
                    "Sheet '{}' not found in '{}' (available: {})",
                    wanted,
                    path.display(),
                    sheet_names.join(", ")
                )
            })?,
        None => sheet_names
            .first()
            .cloned()
            .ok_or_else(|| format!("Excel file '{}' contains no sheets", path.display()))?,
    };

    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| format!("Failed to read sheet '{}': {}", name, e))?;

    let (height, width) = range.get_size();
    debug!(path = %path.display(), sheet = %name, height, width, "read worksheet range");

    let rows: Vec<Vec<String>> = range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();

    Ok(crate::rows_to_table(&name, rows, headerless))
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(n) => {
            // Integers without decimals
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        Data::Int(n) => format!("{}", n),
        Data::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Data::Error(e) => format!("#{:?}", e),
        Data::DateTime(dt) => serial_to_string(dt.as_f64()),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}

/// Render an Excel serial as `YYYY-MM-DD`, or `YYYY-MM-DD HH:MM:SS` when it
/// carries a time part. Falls back to the bare number when out of range.
fn serial_to_string(serial: f64) -> String {
    let days = serial.floor();
    let seconds = ((serial - days) * 86_400.0).round() as i64;

    let date = excel_epoch().and_then(|epoch| epoch.checked_add_signed(Duration::days(days as i64)));
    match date {
        Some(date) if seconds == 0 => date.format("%Y-%m-%d").to_string(),
        Some(date) => {
            let dt = date.and_hms_opt(0, 0, 0).map(|d| d + Duration::seconds(seconds));
            match dt {
                Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
                None => format!("{}", serial),
            }
        }
        None => format!("{}", serial),
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Result of writing the processed workbook
#[derive(Debug, Default)]
pub struct ExportResult {
    pub sheets_exported: usize,
    /// Non-empty cells written, headers included
    pub cells_exported: usize,
    pub export_duration_ms: u128,
}

impl ExportResult {
    pub fn summary(&self) -> String {
        format!(
            "{} sheet{}, {} cells",
            self.sheets_exported,
            if self.sheets_exported == 1 { "" } else { "s" },
            self.cells_exported
        )
    }
}

/// Write every sheet of the bundle, in order, to a new workbook at `path`.
///
/// Headers go in bold on row 1. Text cells are written as strings (blank
/// text is left empty), numbers with a two-decimal format.
pub fn write_bundle(bundle: &OutputBundle, path: &Path) -> Result<ExportResult, String> {
    let start_time = Instant::now();
    let mut result = ExportResult::default();

    let mut xlsx_workbook = XlsxWorkbook::new();
    let header_format = Format::new().set_bold();
    let rate_format = Format::new().set_num_format(RATE_FORMAT);

    for sheet in &bundle.sheets {
        let worksheet = xlsx_workbook
            .add_worksheet()
            .set_name(&sheet.name)
            .map_err(|e| format!("Failed to create sheet '{}': {}", sheet.name, e))?;

        result.cells_exported += write_sheet(worksheet, sheet, &header_format, &rate_format)?;
        result.sheets_exported += 1;
    }

    xlsx_workbook
        .save(path)
        .map_err(|e| format!("Failed to save XLSX file '{}': {}", path.display(), e))?;

    result.export_duration_ms = start_time.elapsed().as_millis();
    Ok(result)
}

fn column_index(col: usize, sheet: &str) -> Result<u16, String> {
    u16::try_from(col).map_err(|_| format!("Sheet '{}' has too many columns ({})", sheet, col + 1))
}

fn write_sheet(
    worksheet: &mut Worksheet,
    sheet: &Sheet,
    header_format: &Format,
    rate_format: &Format,
) -> Result<usize, String> {
    let mut cells = 0;

    for (col, header) in sheet.headers.iter().enumerate() {
        if header.is_empty() {
            continue;
        }
        worksheet
            .write_string_with_format(0, column_index(col, &sheet.name)?, header, header_format)
            .map_err(|e| format!("Failed to write header in '{}': {}", sheet.name, e))?;
        cells += 1;
    }

    for (row_idx, row) in sheet.rows.iter().enumerate() {
        let row32 = u32::try_from(row_idx + 1)
            .map_err(|_| format!("Sheet '{}' has too many rows", sheet.name))?;
        for (col, value) in row.iter().enumerate() {
            let col16 = column_index(col, &sheet.name)?;
            let written = match value {
                Value::Text(s) if s.is_empty() => continue,
                Value::Number(n) if !n.is_finite() => continue,
                Value::Text(s) => worksheet.write_string(row32, col16, s),
                Value::Number(n) => worksheet.write_number_with_format(row32, col16, *n, rate_format),
            };
            written.map_err(|e| format!("Failed to write cell in '{}': {}", sheet.name, e))?;
            cells += 1;
        }
    }

    Ok(cells)
}
