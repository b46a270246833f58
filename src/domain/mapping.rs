// ============================================================
// FIELD MAPPING TABLE
// ============================================================
// Header label -> canonical field name, plus the value kind of each field

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::error::{AppError, Result};

pub const PRODUCT_CODE_FIELD: &str = "productCode";
pub const PRODUCT_NAME_FIELD: &str = "productName";
pub const PURCHASE_PRICE_FIELD: &str = "purchasePrice";
pub const TAX_RATE_FIELD: &str = "taxRate";
pub const PURCHASE_PRICE_EXCL_TAX_FIELD: &str = "purchasePriceExclTax";

/// Fields the retention filter reads; the table must map both as numbers.
pub const REQUIRED_NUMERIC_FIELDS: [&str; 2] = [PURCHASE_PRICE_FIELD, TAX_RATE_FIELD];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Number,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRule {
    pub field: String,
    pub kind: FieldKind,
}

/// One row of the mapping table as it appears in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMappingEntry {
    pub header: String,
    pub field: String,
    pub kind: FieldKind,
}

impl FieldMappingEntry {
    pub fn new(header: &str, field: &str, kind: FieldKind) -> Self {
        Self {
            header: header.to_string(),
            field: field.to_string(),
            kind,
        }
    }
}

/// Built-in table for the product purchase sheet
pub fn default_entries() -> Vec<FieldMappingEntry> {
    vec![
        FieldMappingEntry::new("产品编码", PRODUCT_CODE_FIELD, FieldKind::Text),
        FieldMappingEntry::new("产品名称", PRODUCT_NAME_FIELD, FieldKind::Text),
        FieldMappingEntry::new("采购价", PURCHASE_PRICE_FIELD, FieldKind::Number),
        FieldMappingEntry::new("税点", TAX_RATE_FIELD, FieldKind::Number),
        FieldMappingEntry::new(
            "不含税采购价",
            PURCHASE_PRICE_EXCL_TAX_FIELD,
            FieldKind::Number,
        ),
    ]
}

/// Immutable lookup table. Built once at startup and passed explicitly to the mapper.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMapping {
    by_header: HashMap<String, FieldRule>,
    kinds: HashMap<String, FieldKind>,
}

impl FieldMapping {
    /// Build and validate a table from configuration entries.
    pub fn from_entries(entries: &[FieldMappingEntry]) -> Result<Self> {
        let mut by_header = HashMap::new();
        let mut kinds: HashMap<String, FieldKind> = HashMap::new();

        for entry in entries {
            let header = entry.header.as_str();
            let field = entry.field.trim();
            if header.trim().is_empty() || field.is_empty() {
                return Err(AppError::ConfigError(
                    "mapping entries need a non-empty header and field".to_string(),
                ));
            }

            if let Some(existing) = kinds.get(field) {
                if *existing != entry.kind {
                    return Err(AppError::ConfigError(format!(
                        "field '{}' is declared as both {:?} and {:?}",
                        field, existing, entry.kind
                    )));
                }
            }

            let rule = FieldRule {
                field: field.to_string(),
                kind: entry.kind,
            };
            if by_header.insert(header.to_string(), rule).is_some() {
                return Err(AppError::ConfigError(format!(
                    "header '{}' is mapped more than once",
                    header
                )));
            }
            kinds.insert(field.to_string(), entry.kind);
        }

        for required in REQUIRED_NUMERIC_FIELDS {
            if kinds.get(required) != Some(&FieldKind::Number) {
                return Err(AppError::ConfigError(format!(
                    "mapping must declare '{}' as a number field",
                    required
                )));
            }
        }

        Ok(Self { by_header, kinds })
    }

    /// Exact-match lookup on a header label. Padding is part of the label.
    pub fn rule_for_header(&self, header: &str) -> Option<&FieldRule> {
        self.by_header.get(header)
    }

    pub fn kind_of(&self, field: &str) -> Option<FieldKind> {
        self.kinds.get(field).copied()
    }

    pub fn len(&self) -> usize {
        self.by_header.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_header.is_empty()
    }
}

impl Default for FieldMapping {
    fn default() -> Self {
        let mut by_header = HashMap::new();
        let mut kinds = HashMap::new();
        for entry in default_entries() {
            kinds.insert(entry.field.clone(), entry.kind);
            by_header.insert(
                entry.header,
                FieldRule {
                    field: entry.field,
                    kind: entry.kind,
                },
            );
        }
        Self { by_header, kinds }
    }
}
