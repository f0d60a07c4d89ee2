use log::{debug, info, warn};
use serde_json::Value;

use crate::error::{PerfLensError, Result};
use crate::metrics::{JobClassifier, ShapeChain};
use crate::output::PhaseProgress;
use crate::report::{JobOutcome, JobReport, PerfReport, ReportBuilder};

use super::client::BuildkiteClient;
use super::types::{BuildkiteBuild, BuildkiteJob};

/// Buildkite benchmark metrics provider.
///
/// Lists the builds of one commit, picks the passed benchmark jobs by name,
/// downloads each job's result artifact and normalizes it into metric tables.
/// Jobs are processed one at a time in build and pipeline order.
pub struct BuildkiteProvider {
    client: BuildkiteClient,
    classifier: JobClassifier,
    shapes: ShapeChain,
    source: String,
}

impl BuildkiteProvider {
    /// # Arguments
    ///
    /// * `client` - Client bound to the target organization and pipeline
    /// * `classifier` - Job name rules deciding which jobs are benchmarks
    /// * `source` - Human-readable pipeline label for reports (e.g., "ray-project/release")
    pub fn new(client: BuildkiteClient, classifier: JobClassifier, source: String) -> Self {
        Self {
            client,
            classifier,
            shapes: ShapeChain::default(),
            source,
        }
    }

    /// Collects normalized benchmark metrics for a commit.
    ///
    /// A job whose artifact is missing, cannot be downloaded or is not JSON is
    /// recorded with its outcome and the run continues.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Listing builds fails
    /// - Two jobs produce the same composite metric key
    /// - Two jobs reuse a raw entry key in a way that cannot be merged
    pub async fn collect_metrics(&self, branch: Option<&str>, commit: &str) -> Result<PerfReport> {
        info!("Collecting benchmark metrics for {} at {commit}", self.source);

        let progress = PhaseProgress::start_listing(commit);
        let builds = self.client.list_builds(branch, commit).await?;
        if builds.is_empty() {
            warn!("No builds found for commit {commit}");
        }

        let progress = progress.finish_listing_start_extraction(builds.len());

        let mut builder = ReportBuilder::new(&self.shapes);
        for build in &builds {
            debug!(
                "Build #{} ({}) at {} created {:?}",
                build.number,
                build.state,
                build.commit.as_deref().unwrap_or(commit),
                build.created_at
            );
            for job in &build.jobs {
                if let Some(report) = self.process_job(&mut builder, build, job, &progress).await? {
                    builder.record(report);
                }
            }
        }

        let report = builder.finish("Buildkite", format!("{}@{commit}", self.source), builds.len());
        progress.finish_extraction(report.jobs.len());

        info!(
            "Extracted {} metrics from {} jobs",
            report.total_metrics,
            report.count_outcomes(JobOutcome::is_extracted)
        );

        Ok(report)
    }

    async fn process_job(
        &self,
        builder: &mut ReportBuilder<'_>,
        build: &BuildkiteBuild,
        job: &BuildkiteJob,
        progress: &PhaseProgress,
    ) -> Result<Option<JobReport>> {
        let Some(name) = job.name.as_deref() else {
            return Ok(None);
        };
        if !job.is_passed() {
            debug!("Skipping job '{name}' in state {:?}", job.state);
            return Ok(None);
        }
        let Some(matched) = self.classifier.classify(name) else {
            debug!("Skipping job '{name}': no benchmark pattern matches");
            return Ok(None);
        };

        info!("Matched job '{name}' as {} ({})", matched.family, matched.job_id);
        progress.set_job(name);

        let outcome = match self.fetch_document(build.number, &job.id, matched.artifact).await {
            Ok(document) => builder.add_document(matched.family, &matched.job_id, &document)?,
            Err(PerfLensError::ArtifactNotFound { filename, .. }) => {
                warn!("Job '{name}' produced no {filename}");
                JobOutcome::NoResults {
                    reason: format!("artifact {filename} not found"),
                }
            }
            Err(e) => {
                warn!("Failed to fetch results for job '{name}': {e}");
                JobOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        Ok(Some(JobReport {
            name: name.to_string(),
            job_id: matched.job_id,
            family: matched.family,
            build_number: Some(build.number),
            web_url: job.web_url.clone(),
            outcome,
        }))
    }

    async fn fetch_document(
        &self,
        build_number: u64,
        job_id: &str,
        artifact: &str,
    ) -> Result<Value> {
        let artifact_id = self
            .client
            .locate_artifact(build_number, job_id, artifact)
            .await?;
        let bytes = self
            .client
            .download_artifact(build_number, job_id, &artifact_id)
            .await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Token;
    use crate::config::OutputFormat;
    use crate::metrics::{default_family_rules, JobFamily, JobIdMode};
    use crate::output::render_tables;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::time::Duration;

    const PIPELINE: &str = "/v2/organizations/ray-project/pipelines/release";

    fn provider(server: &Server) -> BuildkiteProvider {
        let client = BuildkiteClient::new(&server.url(), "ray-project", "release", Token::from("t"))
            .unwrap()
            .with_retry_policy(0, Duration::ZERO);
        let classifier =
            JobClassifier::new(&default_family_rules(), JobIdMode::FirstToken).unwrap();
        BuildkiteProvider::new(client, classifier, "ray-project/release".to_string())
    }

    async fn mock_builds(server: &mut Server, jobs: serde_json::Value) {
        server
            .mock("GET", format!("{PIPELINE}/builds").as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!([{"number": 1, "state": "passed", "jobs": jobs}]).to_string())
            .create_async()
            .await;
    }

    async fn mock_artifact(server: &mut Server, job_id: &str, body: &str) {
        let artifacts = format!("{PIPELINE}/builds/1/jobs/{job_id}/artifacts");
        server
            .mock("GET", artifacts.as_str())
            .with_status(200)
            .with_body(json!([{"id": format!("{job_id}-art"), "filename": "result.json"}]).to_string())
            .create_async()
            .await;
        server
            .mock("GET", format!("{artifacts}/{job_id}-art/download").as_str())
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;
    }

    fn rows(report: &PerfReport, format: OutputFormat) -> Vec<(String, String)> {
        render_tables(report, format, false)
            .unwrap()
            .into_iter()
            // report.json carries the collection timestamp
            .filter(|(name, _)| name != "report.json")
            .map(|(name, bytes)| (name, String::from_utf8(bytes).unwrap()))
            .collect()
    }

    #[tokio::test]
    async fn end_to_end_two_passed_jobs() {
        let mut server = Server::new_async().await;
        mock_builds(
            &mut server,
            json!([
                {"id": "a", "name": "many_actors.aws (4 nodes)", "state": "passed"},
                {"id": "b", "name": "object_store.aws (1 node)", "state": "passed"}
            ]),
        )
        .await;
        mock_artifact(
            &mut server,
            "a",
            r#"{"many_actors": [{"perf_metric_name":"p50","perf_metric_value":12.3,"perf_metric_type":"LATENCY_P50"}]}"#,
        )
        .await;
        mock_artifact(
            &mut server,
            "b",
            r#"{"object_store": {"name":"put","get":{"time":5.0,"tput":200}}}"#,
        )
        .await;

        let report = provider(&server).collect_metrics(None, "abc").await.unwrap();

        let core = &report.tables[&JobFamily::Core];
        let latency: Vec<_> = core.latency.iter().map(|(k, v)| format!("{k},{v}")).collect();
        let throughput: Vec<_> = core.throughput.iter().map(|(k, v)| format!("{k},{v}")).collect();
        assert_eq!(latency, vec!["many_actors/p50,12.3", "object_store/put-get,5.0"]);
        assert_eq!(throughput, vec!["object_store/put-get,200"]);
        assert_eq!(report.count_outcomes(JobOutcome::is_extracted), 2);
    }

    #[tokio::test]
    async fn failed_job_contributes_nothing() {
        let mut server = Server::new_async().await;
        mock_builds(
            &mut server,
            json!([
                {"id": "a", "name": "many_actors.aws (4 nodes)", "state": "failed"},
                {"id": "w", "type": "waiter"},
                {"id": "l", "name": "lint", "state": "passed"}
            ]),
        )
        .await;
        let never = server
            .mock("GET", Matcher::Regex(r"/artifacts".to_string()))
            .expect(0)
            .create_async()
            .await;

        let report = provider(&server).collect_metrics(None, "abc").await.unwrap();

        assert!(report.jobs.is_empty());
        assert!(report.tables.is_empty());
        never.assert_async().await;
    }

    #[tokio::test]
    async fn malformed_artifact_is_isolated() {
        let mut server = Server::new_async().await;
        mock_builds(
            &mut server,
            json!([
                {"id": "a", "name": "many_actors.aws (4 nodes)", "state": "passed"},
                {"id": "b", "name": "many_tasks.aws (4 nodes)", "state": "passed"},
                {"id": "c", "name": "many_pgs.aws (4 nodes)", "state": "passed"}
            ]),
        )
        .await;
        mock_artifact(
            &mut server,
            "a",
            r#"{"results": {"perf_metrics": [{"perf_metric_name":"x","perf_metric_value":1,"perf_metric_type":"THROUGHPUT"}]}}"#,
        )
        .await;
        mock_artifact(&mut server, "b", "this is not json").await;
        mock_artifact(
            &mut server,
            "c",
            r#"{"results": {"perf_metrics": [{"perf_metric_name":"x","perf_metric_value":3,"perf_metric_type":"THROUGHPUT"}]}}"#,
        )
        .await;

        let report = provider(&server).collect_metrics(None, "abc").await.unwrap();

        assert_eq!(report.count_outcomes(JobOutcome::is_extracted), 2);
        assert!(matches!(report.jobs[1].outcome, JobOutcome::Failed { .. }));
        let keys: Vec<_> = report.tables[&JobFamily::Core]
            .throughput
            .iter()
            .map(|(k, _)| k.to_string())
            .collect();
        assert_eq!(keys, vec!["many_actors.aws/x", "many_pgs.aws/x"]);
    }

    #[tokio::test]
    async fn missing_artifact_and_transport_errors_are_recorded() {
        let mut server = Server::new_async().await;
        mock_builds(
            &mut server,
            json!([
                {"id": "a", "name": "many_actors.aws (4 nodes)", "state": "passed"},
                {"id": "b", "name": "single_node.aws (1 node)", "state": "passed"}
            ]),
        )
        .await;
        server
            .mock("GET", format!("{PIPELINE}/builds/1/jobs/a/artifacts").as_str())
            .with_status(200)
            .with_body(r#"[{"id": "x", "filename": "logs.txt"}]"#)
            .create_async()
            .await;
        server
            .mock("GET", format!("{PIPELINE}/builds/1/jobs/b/artifacts").as_str())
            .with_status(403)
            .with_body("forbidden")
            .create_async()
            .await;

        let report = provider(&server).collect_metrics(None, "abc").await.unwrap();

        assert!(matches!(report.jobs[0].outcome, JobOutcome::NoResults { .. }));
        match &report.jobs[1].outcome {
            JobOutcome::Failed { error } => assert!(error.contains("403")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn download_failure_only_fails_its_job() {
        let mut server = Server::new_async().await;
        mock_builds(
            &mut server,
            json!([
                {"id": "a", "name": "many_actors.aws (4 nodes)", "state": "passed"},
                {"id": "b", "name": "many_tasks.aws (4 nodes)", "state": "passed"}
            ]),
        )
        .await;
        let artifacts = format!("{PIPELINE}/builds/1/jobs/a/artifacts");
        server
            .mock("GET", artifacts.as_str())
            .with_status(200)
            .with_body(r#"[{"id": "a-art", "filename": "result.json"}]"#)
            .create_async()
            .await;
        let download = server
            .mock("GET", format!("{artifacts}/a-art/download").as_str())
            .with_status(500)
            .with_body("storage unavailable")
            .create_async()
            .await;
        mock_artifact(
            &mut server,
            "b",
            r#"{"many_tasks": [{"perf_metric_name":"p50","perf_metric_value":7,"perf_metric_type":"LATENCY"}]}"#,
        )
        .await;

        let report = provider(&server).collect_metrics(None, "abc").await.unwrap();

        match &report.jobs[0].outcome {
            JobOutcome::Failed { error } => assert!(error.contains("500")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(report.jobs[1].outcome.is_extracted());
        let keys: Vec<_> = report.tables[&JobFamily::Core]
            .latency
            .iter()
            .map(|(k, _)| k.to_string())
            .collect();
        assert_eq!(keys, vec!["many_tasks/p50"]);
        download.assert_async().await;
    }

    #[tokio::test]
    async fn duplicate_metric_aborts_run() {
        let mut server = Server::new_async().await;
        mock_builds(
            &mut server,
            json!([
                {"id": "a", "name": "many_actors.aws (4 nodes)", "state": "passed"},
                {"id": "b", "name": "many_actors.aws (8 nodes)", "state": "passed"}
            ]),
        )
        .await;
        let body = r#"{"many_actors": [{"perf_metric_name":"p50","perf_metric_value":1,"perf_metric_type":"LATENCY"}]}"#;
        mock_artifact(&mut server, "a", body).await;
        mock_artifact(&mut server, "b", body).await;

        let err = provider(&server).collect_metrics(None, "abc").await.unwrap_err();
        assert!(matches!(err, PerfLensError::DuplicateMetric { .. }));
    }

    #[tokio::test]
    async fn repeated_runs_export_identical_tables() {
        let mut server = Server::new_async().await;
        mock_builds(
            &mut server,
            json!([
                {"id": "a", "name": "many_actors.aws (4 nodes)", "state": "passed"},
                {"id": "b", "name": "serve_microbenchmarks.aws (1 node)", "state": "passed"}
            ]),
        )
        .await;
        mock_artifact(
            &mut server,
            "a",
            r#"{"many_actors": [{"perf_metric_name":"p50","perf_metric_value":12.3,"perf_metric_type":"LATENCY_P50"}]}"#,
        )
        .await;
        mock_artifact(
            &mut server,
            "b",
            r#"{"results": {"perf_metrics": {"http_rps": {"THROUGHPUT": 810.5}}}}"#,
        )
        .await;

        let provider = provider(&server);
        let first = provider.collect_metrics(None, "abc").await.unwrap();
        let second = provider.collect_metrics(None, "abc").await.unwrap();

        assert_eq!(rows(&first, OutputFormat::Csv), rows(&second, OutputFormat::Csv));
        assert!(rows(&first, OutputFormat::Csv)
            .iter()
            .any(|(name, body)| name == "serve_throughput.csv"
                && body.contains("serve_microbenchmarks.aws/http_rps,810.5")));
    }
}
