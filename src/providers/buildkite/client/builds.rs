use log::debug;

use super::core::BuildkiteClient;
use crate::error::Result;
use crate::providers::buildkite::types::BuildkiteBuild;

const PAGE_SIZE: usize = 100;

impl BuildkiteClient {
    /// Lists every build of the pipeline for a commit, optionally restricted to
    /// a branch. Pages are fetched in order until a short page is returned.
    pub async fn list_builds(&self, branch: Option<&str>, commit: &str) -> Result<Vec<BuildkiteBuild>> {
        let mut all_builds = Vec::new();
        let mut page = 1;

        loop {
            let mut url = self.url("builds")?;
            {
                let mut query = url.query_pairs_mut();
                if let Some(branch) = branch {
                    query.append_pair("branch", branch);
                }
                query
                    .append_pair("commit", commit)
                    .append_pair("per_page", &PAGE_SIZE.to_string())
                    .append_pair("page", &page.to_string());
            }

            let builds: Vec<BuildkiteBuild> = self.get(url).await?.json().await?;
            let fetched = builds.len();
            debug!("Fetched {fetched} builds from page {page}");
            all_builds.extend(builds);

            if fetched < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        Ok(all_builds)
    }
}
