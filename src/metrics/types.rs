use serde::{Deserialize, Serialize};
use serde_json::Number;

/// Benchmark family a CI job belongs to.
///
/// Variant order is the classification priority: a job name matching rules of
/// several families is assigned to the first one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobFamily {
    Core,
    Data,
    Serving,
}

impl JobFamily {
    pub const ALL: [JobFamily; 3] = [JobFamily::Core, JobFamily::Data, JobFamily::Serving];

    /// Prefix used for the family's output files (`core_latency.csv`, `serve.json`, ...).
    pub fn file_stem(self) -> &'static str {
        match self {
            JobFamily::Core => "core",
            JobFamily::Data => "data",
            JobFamily::Serving => "serve",
        }
    }

    /// Name of the raw document an offline conversion reads for this family.
    pub fn raw_document_name(self) -> &'static str {
        match self {
            JobFamily::Core => "result.json",
            JobFamily::Data => "data.json",
            JobFamily::Serving => "serve.json",
        }
    }
}

impl std::fmt::Display for JobFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            JobFamily::Core => "core",
            JobFamily::Data => "data",
            JobFamily::Serving => "serving",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricCategory {
    Throughput,
    Latency,
    Unclassified,
}

impl MetricCategory {
    pub const ALL: [MetricCategory; 3] = [
        MetricCategory::Throughput,
        MetricCategory::Latency,
        MetricCategory::Unclassified,
    ];

    /// Classifies a `perf_metric_type` tag by case-sensitive prefix.
    pub fn from_type_tag(tag: &str) -> Self {
        if tag.starts_with("THROUGHPUT") {
            MetricCategory::Throughput
        } else if tag.starts_with("LATENCY") {
            MetricCategory::Latency
        } else {
            MetricCategory::Unclassified
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MetricCategory::Throughput => "throughput",
            MetricCategory::Latency => "latency",
            MetricCategory::Unclassified => "unclassified",
        }
    }
}

/// A normalized metric recovered from a result document.
///
/// `value` keeps the number exactly as it appeared in the document so exports
/// reproduce it without float reformatting.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalMetric {
    /// Document entry the metric came from; `None` for unnamed (enveloped) entries.
    pub scope: Option<String>,
    pub name: String,
    pub value: Number,
    pub category: MetricCategory,
}

impl CanonicalMetric {
    /// Globally unique table key: `<scope or job id>/<name>`.
    pub fn composite_key(&self, job_id: &str) -> String {
        let prefix = self.scope.as_deref().unwrap_or(job_id);
        format!("{prefix}/{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(scope: Option<&str>, name: &str) -> CanonicalMetric {
        CanonicalMetric {
            scope: scope.map(ToString::to_string),
            name: name.to_string(),
            value: Number::from(1),
            category: MetricCategory::Latency,
        }
    }

    #[test]
    fn type_tag_prefixes_classify() {
        assert_eq!(
            MetricCategory::from_type_tag("THROUGHPUT_USER"),
            MetricCategory::Throughput
        );
        assert_eq!(
            MetricCategory::from_type_tag("LATENCY_P99"),
            MetricCategory::Latency
        );
        assert_eq!(
            MetricCategory::from_type_tag("OTHER"),
            MetricCategory::Unclassified
        );
    }

    #[test]
    fn type_tag_match_is_case_sensitive() {
        assert_eq!(
            MetricCategory::from_type_tag("latency_p50"),
            MetricCategory::Unclassified
        );
    }

    #[test]
    fn composite_key_prefers_scope() {
        assert_eq!(
            metric(Some("many_actors"), "p50").composite_key("many_actors.aws"),
            "many_actors/p50"
        );
    }

    #[test]
    fn composite_key_falls_back_to_job_id() {
        assert_eq!(
            metric(None, "p50").composite_key("many_actors.aws"),
            "many_actors.aws/p50"
        );
    }

    #[test]
    fn families_order_by_priority() {
        let mut families = vec![JobFamily::Serving, JobFamily::Core, JobFamily::Data];
        families.sort();
        assert_eq!(families, JobFamily::ALL.to_vec());
    }
}
