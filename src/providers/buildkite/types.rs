use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A Buildkite build: one execution of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildkiteBuild {
    /// Build number within the pipeline
    pub number: u64,
    /// Final build state (e.g., "passed", "failed", "canceled")
    pub state: String,
    /// Commit the build ran against
    #[serde(default)]
    pub commit: Option<String>,
    /// When the build was created
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// All jobs in this build, in pipeline order
    #[serde(default)]
    pub jobs: Vec<BuildkiteJob>,
}

/// A job within a build.
///
/// Waiter and block steps come back as jobs without a name or state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildkiteJob {
    pub id: String,
    /// Job label as rendered in the Buildkite UI
    #[serde(default)]
    pub name: Option<String>,
    /// Job state (e.g., "passed", "failed", "broken")
    #[serde(default)]
    pub state: Option<String>,
    /// Web page of the job
    #[serde(default)]
    pub web_url: Option<String>,
}

impl BuildkiteJob {
    pub fn is_passed(&self) -> bool {
        self.state.as_deref() == Some("passed")
    }
}

/// A file uploaded by a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildkiteArtifact {
    pub id: String,
    /// Path of the artifact relative to the job's working directory
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}
