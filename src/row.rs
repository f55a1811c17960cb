//! Tabular result values.
//!
//! `Row` is an ordered column-name-to-value mapping, the shape every executor
//! returns and the only shape the query cache ever persists. Values are a
//! closed set of scalar variants so that decode failures are exhaustive
//! rather than hidden behind an open "any" type.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A decoded column value.
///
/// Serializes untagged, so a `Row` round-trips through plain JSON objects:
/// `null`, booleans, numbers, strings, and arrays of strings. Anything else
/// in a stored payload fails decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    StringArray(Vec<String>),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Borrow the string content, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_string_array(&self) -> Option<&[String]> {
        match self {
            CellValue::StringArray(items) => Some(items.as_slice()),
            _ => None,
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::String(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::String(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl From<Vec<String>> for CellValue {
    fn from(items: Vec<String>) -> Self {
        CellValue::StringArray(items)
    }
}

/// One result row: column names mapped to values, in result-set order.
///
/// An empty row means "no rows matched"; executors return it without an
/// error, and the cache layer refuses to persist it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<(String, CellValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column, or replace the value in place when the name already
    /// exists (map semantics, position preserved).
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<CellValue>) {
        let name = name.into();
        let value = value.into();
        match self.columns.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.columns.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&CellValue> {
        self.columns
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column names in result-set order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.columns
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }
}

impl FromIterator<(String, CellValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, CellValue)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (name, value) in iter {
            row.insert(name, value);
        }
        row
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

struct RowVisitor;

impl<'de> Visitor<'de> for RowVisitor {
    type Value = Row;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a JSON object of scalar column values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Row, A::Error> {
        let mut row = Row::new();
        while let Some((name, value)) = access.next_entry::<String, CellValue>()? {
            row.insert(name, value);
        }
        Ok(row)
    }
}

impl<'de> Deserialize<'de> for Row {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Row, D::Error> {
        deserializer.deserialize_map(RowVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> Row {
        let mut row = Row::new();
        row.insert("name", "Ana");
        row.insert("age", 34.0);
        row.insert("active", true);
        row.insert("nickname", CellValue::Null);
        row.insert("tags", vec!["astro".to_string(), "link".to_string()]);
        row
    }

    #[test]
    fn insert_preserves_order_and_replaces_in_place() {
        let mut row = sample_row();
        row.insert("age", 35.0);

        let names: Vec<&str> = row.column_names().collect();
        assert_eq!(names, vec!["name", "age", "active", "nickname", "tags"]);
        assert_eq!(row.get("age"), Some(&CellValue::Number(35.0)));
    }

    #[test]
    fn json_round_trip_keeps_column_order() {
        let row = sample_row();
        let encoded = serde_json::to_string(&row).expect("encode row");
        let decoded: Row = serde_json::from_str(&encoded).expect("decode row");
        assert_eq!(decoded, row);

        let names: Vec<&str> = decoded.column_names().collect();
        assert_eq!(names, vec!["name", "age", "active", "nickname", "tags"]);
    }

    #[test]
    fn encodes_as_plain_json_object() {
        let mut row = Row::new();
        row.insert("name", "Ana");
        let encoded = serde_json::to_string(&row).expect("encode row");
        assert_eq!(encoded, r#"{"name":"Ana"}"#);
    }

    #[test]
    fn rejects_nested_objects() {
        let result = serde_json::from_str::<Row>(r#"{"outer":{"inner":1}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_mixed_arrays() {
        let result = serde_json::from_str::<Row>(r#"{"items":["a",1]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn null_decodes_to_null_variant() {
        let row: Row = serde_json::from_str(r#"{"gone":null}"#).expect("decode row");
        assert!(row.get("gone").expect("column present").is_null());
    }

    #[test]
    fn empty_row_is_empty() {
        let row = Row::new();
        assert!(row.is_empty());
        assert_eq!(serde_json::to_string(&row).expect("encode row"), "{}");
    }
}
