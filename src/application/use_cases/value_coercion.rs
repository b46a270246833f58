use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use crate::domain::cell::{format_number, RawCell};
use crate::domain::mapping::{FieldKind, FieldMapping};
use crate::domain::record::FieldValue;

static CURRENCY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[¥￥$]|RMB|CNY").unwrap());

static THOUSANDS_SEPARATOR_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,，]").unwrap());

/// Field-aware coercion of raw cells, driven by the kinds in the mapping table.
#[derive(Debug, Clone)]
pub struct ValueConverter {
    mapping: Arc<FieldMapping>,
}

impl ValueConverter {
    pub fn new(mapping: Arc<FieldMapping>) -> Self {
        Self { mapping }
    }

    /// Coerce one raw cell for a canonical field. Absent cells and unknown fields give `Null`.
    pub fn convert(&self, field: &str, raw: Option<&RawCell>) -> FieldValue {
        let Some(kind) = self.mapping.kind_of(field) else {
            return FieldValue::Null;
        };
        match raw {
            None | Some(RawCell::Empty) => FieldValue::Null,
            Some(cell) => match kind {
                FieldKind::Number => coerce_number(cell),
                FieldKind::Text => coerce_text(cell),
            },
        }
    }
}

fn coerce_number(cell: &RawCell) -> FieldValue {
    match cell {
        RawCell::Number(n) if n.is_finite() => FieldValue::Number(*n),
        RawCell::Text(s) => parse_numeric_text(s)
            .map(FieldValue::Number)
            .unwrap_or(FieldValue::Null),
        _ => FieldValue::Null,
    }
}

fn coerce_text(cell: &RawCell) -> FieldValue {
    match cell {
        RawCell::Empty => FieldValue::Null,
        RawCell::Text(s) => FieldValue::Text(s.trim().to_string()),
        RawCell::Number(n) => FieldValue::Text(format_number(*n)),
        RawCell::Bool(b) => FieldValue::Text(b.to_string()),
    }
}

/// Parse a numeric string after stripping currency markers and thousands separators.
/// A trailing percent sign scales the value ("13%" -> 0.13).
pub fn parse_numeric_text(raw: &str) -> Option<f64> {
    let stripped = CURRENCY_PATTERN.replace_all(raw, "");
    let cleaned = THOUSANDS_SEPARATOR_PATTERN.replace_all(stripped.trim(), "");
    let cleaned = cleaned.trim();

    let (digits, scale) = match cleaned.strip_suffix('%') {
        Some(rest) => (rest.trim_end(), 100.0),
        None => (cleaned, 1.0),
    };
    if digits.is_empty() {
        return None;
    }

    // `f64::from_str` accepts "inf" and "NaN"; spreadsheets never mean those.
    let value: f64 = digits.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(value / scale)
}
