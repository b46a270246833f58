use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};
use tracing::{error, info};

use super::ParsedSheet;
use crate::domain::cell::RawCell;
use crate::domain::error::{AppError, Result};

/// Read the first worksheet of an `.xlsx` / `.xls` workbook.
pub fn read_workbook(path: &Path) -> Result<ParsedSheet> {
    let mut workbook = open_workbook_auto(path).map_err(|e| {
        error!(path = %path.display(), error = %e, "Failed to open workbook");
        AppError::InternalParseError(format!("Failed to open workbook: {}", e))
    })?;

    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(|e| {
            error!(path = %path.display(), error = %e, "Failed to read worksheet range");
            AppError::InternalParseError(format!("Failed to read worksheet: {}", e))
        })?,
        // A workbook without sheets has nothing to map.
        None => return Ok(ParsedSheet::default()),
    };

    let sheet = sheet_from_range(&range);
    info!(
        path = %path.display(),
        columns = sheet.headers.len(),
        rows = sheet.rows.len(),
        "Workbook parsed"
    );
    Ok(sheet)
}

/// Convert a calamine range into header labels and raw data rows.
/// Trailing empty cells are dropped so short rows stay short. A fully blank
/// row becomes an empty row and keeps its position.
pub fn sheet_from_range(range: &Range<Data>) -> ParsedSheet {
    let rows: Vec<Vec<RawCell>> = range
        .rows()
        .map(|row| {
            let mut cells: Vec<RawCell> = row.iter().map(raw_cell).collect();
            while matches!(cells.last(), Some(RawCell::Empty)) {
                cells.pop();
            }
            cells
        })
        .collect();

    ParsedSheet::from_rows(rows)
}

fn raw_cell(cell: &Data) -> RawCell {
    match cell {
        Data::Empty => RawCell::Empty,
        Data::String(s) => RawCell::Text(s.clone()),
        Data::Float(f) => RawCell::Number(*f),
        Data::Int(i) => RawCell::Number(*i as f64),
        Data::Bool(b) => RawCell::Bool(*b),
        other => RawCell::Text(other.to_string()),
    }
}
