use std::path::Path;
use std::sync::Arc;

use tracing::{error, info};

use super::record_mapper::map_rows;
use super::value_coercion::ValueConverter;
use crate::domain::error::{AppError, Result};
use crate::domain::mapping::FieldMapping;
use crate::domain::record::MappedRecord;
use crate::infrastructure::spreadsheet::{read_sheet, ParsedSheet, SheetFormat};

/// Parses a stored upload and maps it to product records.
#[derive(Debug, Clone)]
pub struct SheetImportUseCase {
    mapping: Arc<FieldMapping>,
    converter: ValueConverter,
}

impl SheetImportUseCase {
    pub fn new(mapping: Arc<FieldMapping>) -> Self {
        let converter = ValueConverter::new(mapping.clone());
        Self { mapping, converter }
    }

    pub fn import(&self, path: &Path, format: SheetFormat) -> Result<Vec<MappedRecord>> {
        let sheet = read_sheet(path, format).map_err(|e| {
            error!(path = %path.display(), format = ?format, error = %e, "Spreadsheet parse failed");
            match e {
                AppError::InternalParseError(_) => e,
                other => AppError::InternalParseError(other.to_string()),
            }
        })?;
        self.map_sheet(&sheet)
    }

    /// Map an already parsed sheet. A sheet without a usable header row is an error here,
    /// even though the mapper alone would just return nothing.
    pub fn map_sheet(&self, sheet: &ParsedSheet) -> Result<Vec<MappedRecord>> {
        if sheet.has_no_headers() {
            return Err(AppError::EmptySheet);
        }

        let records = map_rows(&sheet.headers, &sheet.rows, &self.mapping, |field, raw| {
            self.converter.convert(field, raw)
        });

        info!(
            data_rows = sheet.rows.len(),
            retained = records.len(),
            "Sheet mapped"
        );
        Ok(records)
    }
}
