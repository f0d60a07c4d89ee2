use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{PerfLensError, Result};
use crate::metrics::{FamilyTables, JobFamily, MetricAggregator, ShapeChain};

/// Raw result entries per family, keyed by entry name (or job id for
/// enveloped artifacts). Written back out so a run can be re-converted offline.
pub type RawDocuments = IndexMap<JobFamily, Map<String, Value>>;

#[derive(Debug, Serialize)]
pub struct PerfReport {
    pub provider: String,
    pub source: String,
    pub collected_at: DateTime<Utc>,
    pub total_builds: usize,
    pub total_metrics: usize,
    pub jobs: Vec<JobReport>,
    #[serde(skip)]
    pub tables: FamilyTables,
    #[serde(skip)]
    pub raw: RawDocuments,
}

impl PerfReport {
    pub fn count_outcomes(&self, predicate: impl Fn(&JobOutcome) -> bool) -> usize {
        self.jobs.iter().filter(|job| predicate(&job.outcome)).count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub name: String,
    pub job_id: String,
    pub family: JobFamily,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    pub outcome: JobOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum JobOutcome {
    Extracted {
        metrics: usize,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        skipped_entries: Vec<String>,
    },
    NoResults {
        reason: String,
    },
    Failed {
        error: String,
    },
}

impl JobOutcome {
    pub fn is_extracted(&self) -> bool {
        matches!(self, JobOutcome::Extracted { .. })
    }
}

/// Accumulates job outcomes and their metrics during one run.
///
/// Nothing leaves the builder until [`ReportBuilder::finish`], so an aborted
/// run produces no partial tables.
pub struct ReportBuilder<'a> {
    shapes: &'a ShapeChain,
    aggregator: MetricAggregator,
    raw: RawDocuments,
    jobs: Vec<JobReport>,
}

impl<'a> ReportBuilder<'a> {
    pub fn new(shapes: &'a ShapeChain) -> Self {
        Self {
            shapes,
            aggregator: MetricAggregator::new(),
            raw: RawDocuments::new(),
            jobs: Vec::new(),
        }
    }

    /// Extracts a decoded result document and merges its metrics.
    ///
    /// # Errors
    ///
    /// Fails on a composite key collision, or when an entry key reused from an
    /// earlier job cannot be merged into the raw dump without losing metrics.
    /// Unrecognized entries are reported in the outcome instead.
    pub fn add_document(
        &mut self,
        family: JobFamily,
        job_id: &str,
        document: &Value,
    ) -> Result<JobOutcome> {
        let extraction = self.shapes.extract(document);
        let metrics = self
            .aggregator
            .insert_job(family, job_id, &extraction.metrics)?;
        let merged = self.merge_raw_entries(family, job_id, document)?;

        self.raw.entry(family).or_default().extend(merged);

        Ok(JobOutcome::Extracted {
            metrics,
            skipped_entries: extraction.skipped,
        })
    }

    /// Computes the raw entries a document adds to its family's dump.
    ///
    /// An entry key already present from an earlier job is merged with that
    /// entry so the dump still reconverts to the same tables. Fails when the
    /// two entries have no lossless merge.
    fn merge_raw_entries(
        &self,
        family: JobFamily,
        job_id: &str,
        document: &Value,
    ) -> Result<Vec<(String, Value)>> {
        let existing = self.raw.get(&family);
        let mut merged = Vec::new();

        for (scope, entry) in ShapeChain::entries(document) {
            let key = scope.unwrap_or(job_id).to_string();
            let value = match existing.and_then(|raw| raw.get(&key)) {
                None => entry.clone(),
                Some(previous) => self
                    .merge_lossless(&key, previous, entry)
                    .ok_or_else(|| PerfLensError::RawEntryConflict {
                        family,
                        key: key.clone(),
                        job_id: job_id.to_string(),
                    })?,
            };
            merged.push((key, value));
        }

        Ok(merged)
    }

    /// Merges two entries only if the result recognizes to exactly the
    /// metrics of `previous` followed by those of `incoming`.
    fn merge_lossless(&self, key: &str, previous: &Value, incoming: &Value) -> Option<Value> {
        let recognized =
            |value: &Value| self.shapes.recognize(Some(key), value).unwrap_or_default();

        let incoming_metrics = recognized(incoming);
        if incoming_metrics.is_empty() {
            return Some(previous.clone());
        }
        let mut expected = recognized(previous);
        if expected.is_empty() {
            return Some(incoming.clone());
        }
        expected.extend(incoming_metrics);

        let merged = merge_entry(previous, incoming)?;
        (recognized(&merged) == expected).then_some(merged)
    }

    pub fn record(&mut self, job: JobReport) {
        self.jobs.push(job);
    }

    pub fn finish(self, provider: &str, source: String, total_builds: usize) -> PerfReport {
        let tables = self.aggregator.finish();
        let total_metrics = tables.values().map(|t| t.total()).sum();

        PerfReport {
            provider: provider.to_string(),
            source,
            collected_at: Utc::now(),
            total_builds,
            total_metrics,
            jobs: self.jobs,
            tables,
            raw: self.raw,
        }
    }
}

/// Combines two raw entries stored under the same key.
///
/// Record lists are concatenated. Named metric maps, and the phases of two
/// time/tput entries for the same operation, are unioned. Anything else, or a
/// field both sides define differently, has no merge.
fn merge_entry(previous: &Value, incoming: &Value) -> Option<Value> {
    if let (Some(_), Some(records)) = (record_list(previous), record_list(incoming)) {
        let mut merged = previous.clone();
        let target = match &mut merged {
            Value::Array(list) => list,
            Value::Object(fields) => fields.get_mut("perf_metrics")?.as_array_mut()?,
            _ => return None,
        };
        target.extend(records.iter().cloned());
        return Some(merged);
    }

    let (Some(previous_fields), Some(incoming_fields)) =
        (previous.as_object(), incoming.as_object())
    else {
        return None;
    };

    if let (Some(Value::Object(left)), Some(Value::Object(right))) = (
        previous_fields.get("perf_metrics"),
        incoming_fields.get("perf_metrics"),
    ) {
        let mut metrics = left.clone();
        union_fields(&mut metrics, right)?;
        let mut merged = previous_fields.clone();
        merged.insert("perf_metrics".to_string(), Value::Object(metrics));
        return Some(Value::Object(merged));
    }

    match (previous_fields.get("name"), incoming_fields.get("name")) {
        (Some(Value::String(left)), Some(Value::String(right))) if left == right => {
            let mut merged = previous_fields.clone();
            union_fields(&mut merged, incoming_fields)?;
            Some(Value::Object(merged))
        }
        _ => None,
    }
}

fn record_list(entry: &Value) -> Option<&Vec<Value>> {
    match entry {
        Value::Array(records) => Some(records),
        Value::Object(fields) => fields.get("perf_metrics")?.as_array(),
        _ => None,
    }
}

/// Adds `incoming` fields to `target`; a field both define differently fails.
fn union_fields(target: &mut Map<String, Value>, incoming: &Map<String, Value>) -> Option<()> {
    for (key, value) in incoming {
        match target.get(key) {
            Some(existing) if existing != value => return None,
            Some(_) => {}
            None => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
    Some(())
}
