use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::types::JobFamily;

pub const DEFAULT_RESULT_ARTIFACT: &str = "result.json";

/// How a canonical job identifier is derived from a CI job name.
///
/// One mode applies to the whole run. The default is `FirstToken`, so
/// `"many_actors.aws (4 nodes)"` becomes `many_actors.aws`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobIdMode {
    #[default]
    FirstToken,
    Underscored,
}

impl JobIdMode {
    pub fn derive(self, job_name: &str) -> String {
        match self {
            JobIdMode::FirstToken => job_name
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string(),
            JobIdMode::Underscored => job_name.replace(' ', "_"),
        }
    }
}

/// Declarative rule set for one family, as written in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FamilyRule {
    pub family: JobFamily,

    /// Artifact file holding the job's results
    #[serde(default = "default_artifact")]
    pub artifact: String,

    /// Regular expressions tried in order against the job name
    pub patterns: Vec<String>,
}

fn default_artifact() -> String {
    DEFAULT_RESULT_ARTIFACT.to_string()
}

/// Built-in rules for the release benchmark pipeline.
pub fn default_family_rules() -> Vec<FamilyRule> {
    let rule = |family, patterns: &[&str]| FamilyRule {
        family,
        artifact: default_artifact(),
        patterns: patterns.iter().map(ToString::to_string).collect(),
    };

    vec![
        rule(
            JobFamily::Core,
            &[
                r"^many_.+",
                r"^object_store\.aws .+",
                r"^single_node\.aws .+",
                r"^agent_stress_test\.aws .+",
                r"^stress_test_.+",
                r"^microbenchmark\.aws .+",
            ],
        ),
        rule(
            JobFamily::Data,
            &[r"^autoscaling_shuffle_1tb_1000_partitions\.aws .+"],
        ),
        rule(
            JobFamily::Serving,
            &[
                r"^serve_microbenchmarks\.aws .+",
                r"^serve_autoscaling_load_test\.aws .+",
            ],
        ),
    ]
}

/// Outcome of classifying a job name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobMatch<'a> {
    pub family: JobFamily,
    pub job_id: String,
    pub artifact: &'a str,
}

struct CompiledRule {
    family: JobFamily,
    artifact: String,
    patterns: Vec<Regex>,
}

/// Stateless job name classifier.
///
/// Families are evaluated in priority order (core, data, serving) and the
/// first matching pattern decides; later families are never consulted.
pub struct JobClassifier {
    rules: Vec<CompiledRule>,
    id_mode: JobIdMode,
}

impl JobClassifier {
    /// Compiles the rule set. Rules are reordered by family priority; rules of
    /// the same family keep their relative order.
    ///
    /// # Errors
    ///
    /// Returns an error if any pattern is not a valid regular expression.
    pub fn new(rules: &[FamilyRule], id_mode: JobIdMode) -> Result<Self> {
        let mut compiled = rules
            .iter()
            .map(|rule| -> Result<CompiledRule> {
                let patterns = rule
                    .patterns
                    .iter()
                    .map(|pattern| Regex::new(pattern))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(CompiledRule {
                    family: rule.family,
                    artifact: rule.artifact.clone(),
                    patterns,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        compiled.sort_by_key(|rule| rule.family);

        Ok(Self {
            rules: compiled,
            id_mode,
        })
    }

    pub fn classify(&self, job_name: &str) -> Option<JobMatch<'_>> {
        let rule = self
            .rules
            .iter()
            .find(|rule| rule.patterns.iter().any(|p| p.is_match(job_name)))?;

        let job_id = self.id_mode.derive(job_name);
        debug!("Job '{job_name}' classified as {} ({job_id})", rule.family);

        Some(JobMatch {
            family: rule.family,
            job_id,
            artifact: &rule.artifact,
        })
    }
}
