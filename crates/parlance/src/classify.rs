//! Chart detection in arbitrary tool output.
//!
//! Tools return whatever their backend produced: a spec object, a SQL-style
//! table whose first cell holds a spec, a JSON string wrapping either, or a
//! status envelope from the structured-data tools. [`OutputShape::sniff`]
//! decodes a value into one of these shapes and [`OutputClassifier`] digs
//! through them in priority order:
//!
//! 1. a spec object is returned unchanged;
//! 2. a `{ columns, rows }` table yields the spec in `rows[0][0]`, either an
//!    object or a JSON string holding one;
//! 3. a `{ format: "vega…", output }` envelope is unwrapped;
//! 4. a string is decoded as JSON and classified again.
//!
//! Classification is total: malformed input is "not found", never an error.
//! Nested decoding is bounded by `max_decode_depth`.

use parlance_common::{
    ChartSpec, ClassifierBranch, NoopObserver, PipelineEvent, PipelineObserver, TabularResult,
};
use serde_json::Value;

use crate::config::RenderConfig;

/// Default bound on nested decode/unwrap steps.
pub const DEFAULT_MAX_DECODE_DEPTH: usize = 5;

/// Recognized top-level shapes of a tool output.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputShape<'a> {
    /// A chart spec object.
    Chart(ChartSpec),
    /// A SQL-style result, holding its first cell if it has one.
    Tabular(Option<&'a Value>),
    /// A tool envelope whose `output` field holds a chart.
    Envelope(&'a Value),
    /// A string that may hold JSON.
    Encoded(&'a str),
    /// Anything else.
    Opaque,
}

impl<'a> OutputShape<'a> {
    /// Decodes `value` against each shape in priority order.
    #[must_use]
    pub fn sniff(value: &'a Value) -> Self {
        if let Some(spec) = ChartSpec::recognize(value) {
            return Self::Chart(spec);
        }
        if let Some(cell) = TabularResult::sniff(value) {
            return Self::Tabular(cell);
        }
        if let Some(inner) = envelope_output(value) {
            return Self::Envelope(inner);
        }
        match value {
            Value::String(s) => Self::Encoded(s),
            _ => Self::Opaque,
        }
    }
}

/// The `output` of a `{ "format": "vega-lite", "output": … }` envelope.
fn envelope_output(value: &Value) -> Option<&Value> {
    let map = value.as_object()?;
    let format = map.get("format")?.as_str()?;
    if !format.to_ascii_lowercase().contains("vega") {
        return None;
    }
    map.get("output")
}

/// Finds chart specs in tool output.
#[derive(Debug, Clone, Copy)]
pub struct OutputClassifier {
    max_depth: usize,
}

impl Default for OutputClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DECODE_DEPTH)
    }
}

impl OutputClassifier {
    /// Creates a classifier with the given recursion bound.
    #[must_use]
    pub const fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Creates a classifier from configuration.
    #[must_use]
    pub const fn from_config(config: &RenderConfig) -> Self {
        Self::new(config.max_decode_depth)
    }

    /// Returns the chart spec in `output`, if there is one.
    #[must_use]
    pub fn classify(&self, output: &Value) -> Option<ChartSpec> {
        self.classify_with(output, &NoopObserver)
    }

    /// Like [`classify`](Self::classify), reporting each branch to `observer`.
    pub fn classify_with(
        &self,
        output: &Value,
        observer: &dyn PipelineObserver,
    ) -> Option<ChartSpec> {
        let found = self.classify_at(output, 0, observer);
        if found.is_none() {
            observer.observe(&PipelineEvent::Classified {
                branch: ClassifierBranch::NotFound,
                depth: 0,
            });
        }
        found
    }

    fn classify_at(
        &self,
        value: &Value,
        depth: usize,
        observer: &dyn PipelineObserver,
    ) -> Option<ChartSpec> {
        if depth > self.max_depth {
            observer.observe(&PipelineEvent::DepthExceeded {
                limit: self.max_depth,
            });
            return None;
        }

        let (branch, found) = match OutputShape::sniff(value) {
            OutputShape::Chart(spec) => (ClassifierBranch::DirectSpec, Some(spec)),
            OutputShape::Tabular(cell) => (
                ClassifierBranch::TabularCell,
                cell.and_then(|cell| Self::spec_in_cell(cell, observer)),
            ),
            OutputShape::Envelope(inner) => (
                ClassifierBranch::Envelope,
                self.classify_at(inner, depth + 1, observer),
            ),
            OutputShape::Encoded(text) => (
                ClassifierBranch::DecodedString,
                decode_json(text, observer)
                    .and_then(|decoded| self.classify_at(&decoded, depth + 1, observer)),
            ),
            OutputShape::Opaque => return None,
        };

        if found.is_some() {
            observer.observe(&PipelineEvent::Classified { branch, depth });
        }
        found
    }

    /// Only the spec predicate applies to the cell; a table inside a cell
    /// is data, not a chart.
    fn spec_in_cell(cell: &Value, observer: &dyn PipelineObserver) -> Option<ChartSpec> {
        match cell {
            Value::String(text) => {
                decode_json(text, observer).and_then(|v| ChartSpec::try_from(v).ok())
            }
            cell @ Value::Object(_) => ChartSpec::recognize(cell),
            _ => None,
        }
    }
}

/// Returns the chart spec in `output` using the default recursion bound.
#[must_use]
pub fn classify(output: &Value) -> Option<ChartSpec> {
    OutputClassifier::default().classify(output)
}

fn decode_json(text: &str, observer: &dyn PipelineObserver) -> Option<Value> {
    let trimmed = text.trim();
    // Plain prose cannot decode to anything chart-shaped.
    if !trimmed.starts_with(['{', '[', '"']) {
        return None;
    }
    match serde_json::from_str(trimmed) {
        Ok(value) => Some(value),
        Err(e) => {
            observer.observe(&PipelineEvent::DecodeFailed {
                reason: e.to_string(),
            });
            None
        }
    }
}
