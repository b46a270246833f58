// ============================================================
// SPREADSHEET READERS
// ============================================================
// Turn an uploaded file into a header row plus raw data rows

mod csv_reader;
mod workbook;

pub use csv_reader::{decode_csv_bytes, detect_delimiter, parse_csv_content, read_csv_file};
pub use workbook::{read_workbook, sheet_from_range};

use std::path::Path;

use crate::domain::cell::RawCell;
use crate::domain::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Xlsx,
    Xls,
    Csv,
}

impl SheetFormat {
    /// Case-insensitive match on the file extension.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let extension = Path::new(name.trim()).extension()?.to_str()?;
        match extension.to_ascii_lowercase().as_str() {
            "xlsx" => Some(SheetFormat::Xlsx),
            "xls" => Some(SheetFormat::Xls),
            "csv" => Some(SheetFormat::Csv),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SheetFormat::Xlsx => "xlsx",
            SheetFormat::Xls => "xls",
            SheetFormat::Csv => "csv",
        }
    }
}

/// First row of the sheet as headers, the remaining rows untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedSheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<RawCell>>,
}

impl ParsedSheet {
    /// Split raw rows into header labels and data rows.
    ///
    /// Header labels are kept verbatim. Blank rows inside the data stay as empty
    /// rows so they still occupy their position; blank rows at the end are dropped.
    pub fn from_rows(mut rows: Vec<Vec<RawCell>>) -> Self {
        if rows.is_empty() {
            return Self::default();
        }
        let header_row = rows.remove(0);
        let headers = header_row.iter().map(RawCell::display_text).collect();
        while matches!(rows.last(), Some(cells) if cells.is_empty()) {
            rows.pop();
        }
        Self { headers, rows }
    }

    /// True when there is no header row or every header cell is blank.
    pub fn has_no_headers(&self) -> bool {
        self.headers.iter().all(|h| h.trim().is_empty())
    }
}

/// Read the first sheet of a stored upload.
pub fn read_sheet(path: &Path, format: SheetFormat) -> Result<ParsedSheet> {
    match format {
        SheetFormat::Xlsx | SheetFormat::Xls => read_workbook(path),
        SheetFormat::Csv => read_csv_file(path),
    }
}
