// ============================================================
// MAPPED RECORD TYPES
// ============================================================
// Output side of the record mapper: coerced values keyed by canonical field name

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// A cell value after field-specific coercion
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Null,
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Value-based zero check: only a coerced number can equal zero.
    pub fn is_zero(&self) -> bool {
        matches!(self, FieldValue::Number(n) if *n == 0.0)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

// Integral numbers go out as JSON integers (10, not 10.0).
impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Number(n) if n.fract() == 0.0 && n.abs() < 9.0e15 => {
                serializer.serialize_i64(*n as i64)
            }
            FieldValue::Number(n) => serializer.serialize_f64(*n),
            FieldValue::Text(s) => serializer.serialize_str(s),
            FieldValue::Null => serializer.serialize_none(),
        }
    }
}

/// One output record. Keys keep first-insertion order so the JSON object
/// follows the column order of the source sheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappedRecord {
    fields: Vec<(String, FieldValue)>,
}

impl MappedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field unless it is already set. Returns whether the value was stored.
    pub fn insert_if_absent(&mut self, field: &str, value: FieldValue) -> bool {
        if self.contains(field) {
            return false;
        }
        self.fields.push((field.to_string(), value));
        true
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|(name, _)| name == field)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for MappedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
