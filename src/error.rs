use thiserror::Error;

use crate::metrics::JobFamily;

#[derive(Error, Debug)]
pub enum PerfLensError {
    #[error("API request failed with status {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("API request failed with status {status} after {retries} retries")]
    ApiErrorAfterRetries { status: u16, retries: u32 },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Artifact {filename} not found for job {job_id}")]
    ArtifactNotFound { job_id: String, filename: String },

    #[error("Duplicate {category} metric {key} (emitted again by job {job_id})")]
    DuplicateMetric {
        category: &'static str,
        key: String,
        job_id: String,
    },

    #[error("Raw {family} entry {key} from job {job_id} cannot be merged with an earlier job's entry")]
    RawEntryConflict {
        family: JobFamily,
        key: String,
        job_id: String,
    },

    #[error("Invalid job pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PerfLensError>;
