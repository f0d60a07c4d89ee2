//! Schema-tolerant metric extraction.
//!
//! A result document is a mapping from entry name to entry. Each entry is
//! offered to a chain of [`ResultShape`] recognizers in priority order; the
//! first recognizer that accepts the entry produces its metrics and the rest
//! are not consulted. Entries no recognizer accepts are skipped on their own.

use log::{debug, warn};
use serde_json::{Map, Number, Value};

use super::types::{CanonicalMetric, MetricCategory};

/// Top-level key under which raw job artifacts wrap their payload.
const ENVELOPE_KEY: &str = "results";

/// One known layout of a result entry.
pub trait ResultShape {
    fn name(&self) -> &'static str;

    /// Extracts the entry's metrics, or returns `None` when the entry does not
    /// have this shape. A shape either accepts the whole entry or nothing.
    fn recognize(&self, scope: Option<&str>, entry: &Value) -> Option<Vec<CanonicalMetric>>;
}

/// `[{perf_metric_name, perf_metric_value, perf_metric_type}, ...]`, either bare
/// or under a `perf_metrics` field of an object.
pub struct RecordList;

impl RecordList {
    fn records(entry: &Value) -> Option<&Vec<Value>> {
        match entry {
            Value::Array(records) => Some(records),
            Value::Object(fields) => fields.get("perf_metrics")?.as_array(),
            _ => None,
        }
    }

    fn record(scope: Option<&str>, record: &Value) -> Option<CanonicalMetric> {
        let name = record.get("perf_metric_name")?.as_str()?;
        let value = number(record.get("perf_metric_value")?)?;
        let tag = record.get("perf_metric_type")?.as_str()?;

        Some(metric(scope, name.to_string(), value, MetricCategory::from_type_tag(tag)))
    }
}

impl ResultShape for RecordList {
    fn name(&self) -> &'static str {
        "record-list"
    }

    fn recognize(&self, scope: Option<&str>, entry: &Value) -> Option<Vec<CanonicalMetric>> {
        Self::records(entry)?
            .iter()
            .map(|record| Self::record(scope, record))
            .collect()
    }
}

/// `{"perf_metrics": {"<metric>": {"THROUGHPUT": <number>}, ...}}`
pub struct NamedPerfMetrics;

impl ResultShape for NamedPerfMetrics {
    fn name(&self) -> &'static str {
        "named-perf-metrics"
    }

    fn recognize(&self, scope: Option<&str>, entry: &Value) -> Option<Vec<CanonicalMetric>> {
        entry
            .get("perf_metrics")?
            .as_object()?
            .iter()
            .map(|(name, fields)| {
                let value = number(fields.get("THROUGHPUT")?)?;
                Some(metric(scope, name.clone(), value, MetricCategory::Throughput))
            })
            .collect()
    }
}

/// `{"name": "<op>", "<phase>": {"time": <number>, "tput": <number>}, ...}`
///
/// Each phase yields a latency metric for `time` and a throughput metric for
/// `tput`, both named `<op>-<phase>`. Non-object fields are ignored.
pub struct TimeTputPairs;

impl TimeTputPairs {
    fn phase_metrics(
        scope: Option<&str>,
        op: &str,
        phase: &str,
        fields: &Map<String, Value>,
    ) -> Option<Vec<CanonicalMetric>> {
        let name = format!("{op}-{phase}");
        let mut metrics = Vec::with_capacity(2);

        if let Some(time) = fields.get("time") {
            metrics.push(metric(scope, name.clone(), number(time)?, MetricCategory::Latency));
        }
        if let Some(tput) = fields.get("tput") {
            metrics.push(metric(scope, name, number(tput)?, MetricCategory::Throughput));
        }

        Some(metrics)
    }
}

impl ResultShape for TimeTputPairs {
    fn name(&self) -> &'static str {
        "time-tput-pairs"
    }

    fn recognize(&self, scope: Option<&str>, entry: &Value) -> Option<Vec<CanonicalMetric>> {
        let fields = entry.as_object()?;
        let op = fields.get("name")?.as_str()?;

        let mut metrics = Vec::new();
        for (phase, value) in fields {
            if phase == "name" {
                continue;
            }
            let Some(phase_fields) = value.as_object() else {
                continue;
            };
            metrics.extend(Self::phase_metrics(scope, op, phase, phase_fields)?);
        }

        Some(metrics)
    }
}

fn number(value: &Value) -> Option<Number> {
    match value {
        Value::Number(n) => Some(n.clone()),
        _ => None,
    }
}

fn metric(
    scope: Option<&str>,
    name: String,
    value: Number,
    category: MetricCategory,
) -> CanonicalMetric {
    CanonicalMetric {
        scope: scope.map(ToString::to_string),
        name,
        value,
        category,
    }
}

/// Metrics recovered from one document, with the entries that were skipped.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Extraction {
    pub metrics: Vec<CanonicalMetric>,
    pub skipped: Vec<String>,
}

/// Priority-ordered recognizer chain.
pub struct ShapeChain {
    shapes: Vec<Box<dyn ResultShape>>,
}

impl Default for ShapeChain {
    fn default() -> Self {
        Self::new(vec![
            Box::new(RecordList),
            Box::new(NamedPerfMetrics),
            Box::new(TimeTputPairs),
        ])
    }
}

impl ShapeChain {
    pub fn new(shapes: Vec<Box<dyn ResultShape>>) -> Self {
        Self { shapes }
    }

    /// Splits a document into `(scope, entry)` pairs.
    ///
    /// A document with a top-level `results` object is a raw job artifact; its
    /// payload is a single entry without a scope.
    pub fn entries(document: &Value) -> Vec<(Option<&str>, &Value)> {
        if let Some(payload) = Self::envelope(document) {
            return vec![(None, payload)];
        }

        document
            .as_object()
            .map(|fields| {
                fields
                    .iter()
                    .map(|(key, entry)| (Some(key.as_str()), entry))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn envelope(document: &Value) -> Option<&Value> {
        document
            .get(ENVELOPE_KEY)
            .filter(|payload| payload.is_object())
    }

    /// Top-level keys next to a `results` envelope. They are not extracted.
    fn envelope_siblings(document: &Value) -> Vec<&str> {
        match (Self::envelope(document), document.as_object()) {
            (Some(_), Some(fields)) => fields
                .keys()
                .map(String::as_str)
                .filter(|key| *key != ENVELOPE_KEY)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Runs the chain over a single entry.
    pub fn recognize(&self, scope: Option<&str>, entry: &Value) -> Option<Vec<CanonicalMetric>> {
        self.shapes.iter().find_map(|shape| {
            let metrics = shape.recognize(scope, entry)?;
            debug!(
                "Entry '{}' matched shape {} ({} metrics)",
                scope.unwrap_or(ENVELOPE_KEY),
                shape.name(),
                metrics.len()
            );
            Some(metrics)
        })
    }

    pub fn extract(&self, document: &Value) -> Extraction {
        if !document.is_object() {
            warn!("Result document is not a JSON object, skipping");
            return Extraction {
                metrics: Vec::new(),
                skipped: vec!["<document>".to_string()],
            };
        }

        let mut extraction = Extraction::default();
        for sibling in Self::envelope_siblings(document) {
            warn!("Entry '{sibling}' sits next to a results envelope, skipping");
            extraction.skipped.push(sibling.to_string());
        }

        for (scope, entry) in Self::entries(document) {
            let label = scope.unwrap_or(ENVELOPE_KEY);
            match self.recognize(scope, entry) {
                Some(metrics) => extraction.metrics.extend(metrics),
                None => {
                    warn!("No known result shape for entry '{label}', skipping");
                    extraction.skipped.push(label.to_string());
                }
            }
        }

        extraction
    }
}
