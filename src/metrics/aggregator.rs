use std::collections::HashSet;

use indexmap::IndexMap;
use log::debug;
use serde::Serialize;
use serde_json::Number;

use crate::error::{PerfLensError, Result};

use super::types::{CanonicalMetric, JobFamily, MetricCategory};

/// Composite metric name to value, in insertion order.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetricTable(IndexMap<String, Number>);

impl MetricTable {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&Number> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Number)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }
}

/// One table per metric category.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct MetricTables {
    pub throughput: MetricTable,
    pub latency: MetricTable,
    pub unclassified: MetricTable,
}

impl MetricTables {
    pub fn table(&self, category: MetricCategory) -> &MetricTable {
        match category {
            MetricCategory::Throughput => &self.throughput,
            MetricCategory::Latency => &self.latency,
            MetricCategory::Unclassified => &self.unclassified,
        }
    }

    fn table_mut(&mut self, category: MetricCategory) -> &mut MetricTable {
        match category {
            MetricCategory::Throughput => &mut self.throughput,
            MetricCategory::Latency => &mut self.latency,
            MetricCategory::Unclassified => &mut self.unclassified,
        }
    }

    pub fn total(&self) -> usize {
        self.throughput.len() + self.latency.len() + self.unclassified.len()
    }
}

pub type FamilyTables = IndexMap<JobFamily, MetricTables>;

/// Merges per-job metrics into per-family category tables.
///
/// A composite key may appear once per category across the whole run, in any
/// family. A job whose metrics would reuse a key is rejected as a whole and
/// nothing of it is inserted.
#[derive(Debug, Default)]
pub struct MetricAggregator {
    families: FamilyTables,
    seen: HashSet<(MetricCategory, String)>,
}

impl MetricAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts one job's metrics and returns how many were added.
    ///
    /// # Errors
    ///
    /// Returns [`PerfLensError::DuplicateMetric`] if a composite key was already
    /// inserted by an earlier job, or appears twice within this job.
    pub fn insert_job(
        &mut self,
        family: JobFamily,
        job_id: &str,
        metrics: &[CanonicalMetric],
    ) -> Result<usize> {
        let mut pending = HashSet::with_capacity(metrics.len());
        let keyed: Vec<_> = metrics
            .iter()
            .map(|metric| (metric.category, metric.composite_key(job_id), &metric.value))
            .collect();

        for (category, key, _) in &keyed {
            let slot = (*category, key.clone());
            if self.seen.contains(&slot) || !pending.insert(slot) {
                return Err(PerfLensError::DuplicateMetric {
                    category: category.as_str(),
                    key: key.clone(),
                    job_id: job_id.to_string(),
                });
            }
        }

        let tables = self.families.entry(family).or_default();
        for (category, key, value) in keyed {
            tables.table_mut(category).0.insert(key, value.clone());
        }
        self.seen.extend(pending);

        debug!("Merged {} metrics from {job_id} into {family}", metrics.len());

        Ok(metrics.len())
    }

    pub fn finish(self) -> FamilyTables {
        self.families
    }
}
