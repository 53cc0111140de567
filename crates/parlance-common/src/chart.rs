//! Chart specifications and tabular results found in tool output.
//!
//! Tools that answer data questions return either a Vega / Vega-Lite
//! specification or a SQL-style `{ columns, rows }` table. Both shapes are
//! decoded strictly here; the heuristics that dig them out of arbitrary
//! output live in the classifier.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Substring of a `$schema` URL that identifies a chart specification.
pub const SCHEMA_MARKER: &str = "vega";

/// Keys that give a spec its visual structure.
pub const STRUCTURAL_KEYS: &[&str] = &["mark", "layer", "concat", "hconcat", "vconcat", "facet", "repeat"];

/// Keys that carry the data a spec plots.
pub const DATA_KEYS: &[&str] = &["data", "datasets"];

const COMPOSITE_KEYS: &[&str] = &["layer", "concat", "hconcat", "vconcat", "facet", "repeat"];

/// A chart specification recognized as renderable.
///
/// Construct one through [`ChartSpec::recognize`] or `TryFrom<Value>`;
/// both apply the same predicate, so a `ChartSpec` always satisfies it.
///
/// ```
/// use parlance_common::chart::ChartSpec;
/// use serde_json::json;
///
/// let spec = ChartSpec::recognize(&json!({
///     "$schema": "https://vega.github.io/schema/vega-lite/v5.json",
///     "mark": "bar",
///     "data": { "values": [{ "a": 1 }, { "a": 2 }] }
/// }))
/// .unwrap();
///
/// assert_eq!(spec.mark(), Some("bar"));
/// assert_eq!(spec.data_row_count(), Some(2));
/// assert!(ChartSpec::recognize(&json!({ "mark": "bar" })).is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct ChartSpec(Map<String, Value>);

impl ChartSpec {
    /// Returns `true` if the object looks like a chart specification.
    ///
    /// Either the `$schema` string names a Vega library, or the object has
    /// a structural key together with a data key.
    #[must_use]
    pub fn is_spec_object(map: &Map<String, Value>) -> bool {
        let schema_marked = map
            .get("$schema")
            .and_then(Value::as_str)
            .is_some_and(|s| s.to_ascii_lowercase().contains(SCHEMA_MARKER));
        if schema_marked {
            return true;
        }

        STRUCTURAL_KEYS.iter().any(|k| map.contains_key(*k))
            && DATA_KEYS.iter().any(|k| map.contains_key(*k))
    }

    /// Recognizes a chart spec without taking ownership of the value.
    #[must_use]
    pub fn recognize(value: &Value) -> Option<Self> {
        match value {
            Value::Object(map) if Self::is_spec_object(map) => Some(Self(map.clone())),
            _ => None,
        }
    }

    /// The `$schema` URL, if any.
    #[must_use]
    pub fn schema(&self) -> Option<&str> {
        self.0.get("$schema").and_then(Value::as_str)
    }

    /// The mark type, whether given as `"bar"` or `{ "type": "bar" }`.
    #[must_use]
    pub fn mark(&self) -> Option<&str> {
        match self.0.get("mark")? {
            Value::String(s) => Some(s),
            Value::Object(m) => m.get("type").and_then(Value::as_str),
            _ => None,
        }
    }

    /// Returns `true` for layered, concatenated, faceted or repeated specs.
    #[must_use]
    pub fn is_composite(&self) -> bool {
        COMPOSITE_KEYS.iter().any(|k| self.0.contains_key(*k))
    }

    /// Number of inline data rows, when the data is given as `values`.
    #[must_use]
    pub fn data_row_count(&self) -> Option<usize> {
        self.0
            .get("data")
            .and_then(|d| d.get("values"))
            .and_then(Value::as_array)
            .map(Vec::len)
    }

    /// Field names referenced by encodings, including nested views.
    #[must_use]
    pub fn encoded_fields(&self) -> Vec<String> {
        let mut fields = Vec::new();
        collect_fields(&self.0, &mut fields);
        fields
    }

    /// The spec as a JSON object.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// The spec as an owned JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

fn collect_fields(view: &Map<String, Value>, out: &mut Vec<String>) {
    if let Some(Value::Object(encoding)) = view.get("encoding") {
        for channel in encoding.values() {
            if let Some(field) = channel.get("field").and_then(Value::as_str)
                && !out.iter().any(|f| f == field)
            {
                out.push(field.to_string());
            }
        }
    }

    for key in COMPOSITE_KEYS {
        match view.get(*key) {
            Some(Value::Array(children)) => {
                for child in children.iter().filter_map(Value::as_object) {
                    collect_fields(child, out);
                }
            }
            Some(Value::Object(child)) => collect_fields(child, out),
            _ => {}
        }
    }
    if let Some(Value::Object(inner)) = view.get("spec") {
        collect_fields(inner, out);
    }
}

impl TryFrom<Value> for ChartSpec {
    type Error = Value;

    /// Hands the value back unchanged if it is not a chart spec.
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) if Self::is_spec_object(&map) => Ok(Self(map)),
            other => Err(other),
        }
    }
}

impl From<ChartSpec> for Value {
    fn from(spec: ChartSpec) -> Self {
        spec.into_value()
    }
}

/// A SQL-style result as returned by data query tools.
///
/// The decode is strict and is only used for display. Chart detection reads
/// the raw value through [`TabularResult::sniff`], which tolerates column
/// descriptors and ragged rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularResult {
    /// Column names.
    pub columns: Vec<String>,
    /// Rows of cells, positionally matching `columns`.
    pub rows: Vec<Vec<Value>>,
}

impl TabularResult {
    /// Checks for a `columns` array and a `rows` array, returning the first
    /// cell of the first row when there is one.
    ///
    /// Nothing else about the table is decoded. The outer `None` means the
    /// value is not tabular; `Some(None)` is a table with no first cell.
    #[must_use]
    pub fn sniff(value: &Value) -> Option<Option<&Value>> {
        let map = value.as_object()?;
        if !map.get("columns")?.is_array() {
            return None;
        }
        let rows = map.get("rows")?.as_array()?;
        Some(rows.first().and_then(|row| row.get(0)))
    }

    /// Decodes a value strictly as a tabular result.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        Self::deserialize(value).ok()
    }

    /// Rows as objects keyed by column name.
    ///
    /// Extra cells beyond the column list are dropped; missing cells are
    /// left out of the record.
    #[must_use]
    pub fn records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }
}
