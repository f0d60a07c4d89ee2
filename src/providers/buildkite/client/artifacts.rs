use log::debug;

use super::core::BuildkiteClient;
use crate::error::{PerfLensError, Result};
use crate::providers::buildkite::types::BuildkiteArtifact;

/// Finds the artifact whose filename equals `filename` exactly.
///
/// Matching is case-sensitive and never partial; artifacts without a filename
/// are ignored.
pub fn find_artifact<'a>(
    artifacts: &'a [BuildkiteArtifact],
    filename: &str,
) -> Option<&'a BuildkiteArtifact> {
    artifacts
        .iter()
        .find(|artifact| artifact.filename.as_deref() == Some(filename))
}

impl BuildkiteClient {
    pub async fn list_artifacts(
        &self,
        build_number: u64,
        job_id: &str,
    ) -> Result<Vec<BuildkiteArtifact>> {
        let url = self.url(&format!("builds/{build_number}/jobs/{job_id}/artifacts"))?;
        Ok(self.get(url).await?.json().await?)
    }

    pub async fn download_artifact(
        &self,
        build_number: u64,
        job_id: &str,
        artifact_id: &str,
    ) -> Result<Vec<u8>> {
        let url = self.url(&format!(
            "builds/{build_number}/jobs/{job_id}/artifacts/{artifact_id}/download"
        ))?;
        let bytes = self.get(url).await?.bytes().await?;
        debug!("Downloaded artifact {artifact_id} ({} bytes)", bytes.len());
        Ok(bytes.to_vec())
    }

    /// Returns the id of the job's artifact named `filename`.
    ///
    /// # Errors
    ///
    /// Returns [`PerfLensError::ArtifactNotFound`] when the job has no such
    /// artifact, or the transport error of the listing call.
    pub async fn locate_artifact(
        &self,
        build_number: u64,
        job_id: &str,
        filename: &str,
    ) -> Result<String> {
        let artifacts = self.list_artifacts(build_number, job_id).await?;
        find_artifact(&artifacts, filename)
            .map(|artifact| {
                debug!(
                    "Found {filename} for job {job_id} ({} bytes)",
                    artifact.file_size.unwrap_or_default()
                );
                artifact.id.clone()
            })
            .ok_or_else(|| PerfLensError::ArtifactNotFound {
                job_id: job_id.to_string(),
                filename: filename.to_string(),
            })
    }
}
