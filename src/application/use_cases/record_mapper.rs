// ============================================================
// RECORD MAPPER
// ============================================================
// Raw sheet rows -> normalized product records, via the field mapping table

use crate::domain::cell::RawCell;
use crate::domain::mapping::{FieldMapping, PURCHASE_PRICE_FIELD, TAX_RATE_FIELD};
use crate::domain::record::{FieldValue, MappedRecord};

/// Only this many leading data rows are ever considered.
pub const MAX_DATA_ROWS: usize = 10;

/// Map the first `MAX_DATA_ROWS` rows through `mapping`, coercing each mapped cell
/// with `convert`, and keep the records that pass the retention filter.
///
/// An empty header row yields no records without touching `rows`. Malformed rows
/// never fail the call; they just come out with fewer populated fields and are
/// usually filtered.
pub fn map_rows<F>(
    headers: &[String],
    rows: &[Vec<RawCell>],
    mapping: &FieldMapping,
    convert: F,
) -> Vec<MappedRecord>
where
    F: Fn(&str, Option<&RawCell>) -> FieldValue,
{
    if headers.is_empty() {
        return Vec::new();
    }

    // Resolve header -> field once per sheet rather than once per cell.
    let columns: Vec<(usize, &str)> = headers
        .iter()
        .enumerate()
        .filter_map(|(index, header)| {
            mapping
                .rule_for_header(header)
                .map(|rule| (index, rule.field.as_str()))
        })
        .collect();

    rows.iter()
        .take(MAX_DATA_ROWS)
        .map(|row| map_row(row, &columns, &convert))
        .filter(is_retained)
        .collect()
}

fn map_row<F>(row: &[RawCell], columns: &[(usize, &str)], convert: &F) -> MappedRecord
where
    F: Fn(&str, Option<&RawCell>) -> FieldValue,
{
    let mut record = MappedRecord::new();
    for &(index, field) in columns {
        // Duplicate headers: the first column mapped to a field wins.
        if record.contains(field) {
            continue;
        }
        record.insert_if_absent(field, convert(field, row.get(index)));
    }
    record
}

/// Retention filter: both predicates must hold.
pub fn is_retained(record: &MappedRecord) -> bool {
    has_required_values(record) && passes_business_rules(record)
}

/// Parse-failure check: purchase price and tax rate are both present and non-null.
pub fn has_required_values(record: &MappedRecord) -> bool {
    [PURCHASE_PRICE_FIELD, TAX_RATE_FIELD]
        .iter()
        .all(|field| record.get(field).is_some_and(|value| !value.is_null()))
}

/// Business-rule check: neither purchase price nor tax rate is numerically zero.
/// Runs on coerced values, so a "0" cell is excluded here too.
pub fn passes_business_rules(record: &MappedRecord) -> bool {
    [PURCHASE_PRICE_FIELD, TAX_RATE_FIELD]
        .iter()
        .all(|field| !record.get(field).is_some_and(FieldValue::is_zero))
}
