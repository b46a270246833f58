// ============================================================
// CSV READER
// ============================================================
// Parse CSV uploads with encoding fallback and delimiter detection

use std::path::Path;

use csv::ReaderBuilder;
use encoding_rs::GB18030;
use tracing::{info, warn};

use super::ParsedSheet;
use crate::domain::cell::RawCell;
use crate::domain::error::{AppError, Result};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Read and parse a CSV file from disk.
pub fn read_csv_file(path: &Path) -> Result<ParsedSheet> {
    let bytes = std::fs::read(path).map_err(|e| {
        AppError::InternalParseError(format!("Failed to read CSV file: {}", e))
    })?;
    let content = decode_csv_bytes(&bytes);
    let sheet = parse_csv_content(&content)?;
    info!(
        path = %path.display(),
        columns = sheet.headers.len(),
        rows = sheet.rows.len(),
        "CSV parsed"
    );
    Ok(sheet)
}

/// UTF-8 first (BOM stripped); otherwise GB18030, which is what
/// Chinese-locale spreadsheet tools export by default.
pub fn decode_csv_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if let Ok(content) = std::str::from_utf8(bytes) {
        return content.to_string();
    }

    let (decoded, _, had_errors) = GB18030.decode(bytes);
    if had_errors {
        warn!("CSV is neither valid UTF-8 nor GB18030; invalid bytes were replaced");
    }
    decoded.into_owned()
}

/// Parse CSV text into a header row and raw data rows.
///
/// The header row is taken verbatim; data cells are trimmed. A row of
/// delimiters only becomes an empty row and keeps its position.
pub fn parse_csv_content(content: &str) -> Result<ParsedSheet> {
    let delimiter = detect_delimiter(content);
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows: Vec<Vec<RawCell>> = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result.map_err(|e| {
            AppError::InternalParseError(format!("Failed to parse CSV row {}: {}", index + 1, e))
        })?;

        let mut cells: Vec<RawCell> = if index == 0 {
            record.iter().map(raw_cell).collect()
        } else {
            record.iter().map(|field| raw_cell(field.trim())).collect()
        };
        while matches!(cells.last(), Some(RawCell::Empty)) {
            cells.pop();
        }
        rows.push(cells);
    }

    Ok(ParsedSheet::from_rows(rows))
}

fn raw_cell(field: &str) -> RawCell {
    if field.is_empty() {
        RawCell::Empty
    } else {
        RawCell::Text(field.to_string())
    }
}

/// Detect delimiter from content (comma, semicolon, tab, pipe)
pub fn detect_delimiter(content: &str) -> u8 {
    let candidates = [b',', b';', b'\t', b'|'];
    let sample_lines: Vec<_> = content.lines().take(10).collect();

    let mut best_delimiter = b',';
    let mut best_score = 0.0f32;

    if sample_lines.is_empty() {
        return best_delimiter;
    }

    for &delimiter in &candidates {
        let field_counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| line.bytes().filter(|&b| b == delimiter).count())
            .collect();

        // Score by consistency (low standard deviation) and frequency
        let avg = field_counts.iter().sum::<usize>() as f32 / field_counts.len() as f32;
        let variance = field_counts
            .iter()
            .map(|&x| (x as f32 - avg).powi(2))
            .sum::<f32>()
            / field_counts.len() as f32;

        let score = avg / (1.0 + variance.sqrt());
        if score > best_score {
            best_score = score;
            best_delimiter = delimiter;
        }
    }

    best_delimiter
}
