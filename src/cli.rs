use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::Token;
use crate::config::{Config, OutputFormat};
use crate::metrics::JobClassifier;
use crate::output::{print_summary, render_tables, write_files};
use crate::providers::{BuildkiteClient, BuildkiteProvider, LocalProvider};
use crate::report::PerfReport;

#[derive(Parser)]
#[command(name = "perflens")]
#[command(author, version, about = "CI Benchmark Metrics Tool", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./perflens.{toml,json,yaml,yml})
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory receiving the exported tables
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, value_enum)]
    format: Option<OutputFormat>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch benchmark results for a commit from Buildkite
    Buildkite {
        #[arg(short, long, env = "BUILDKITE_TOKEN", hide_env_values = true)]
        token: Option<String>,

        #[arg(short, long)]
        url: Option<String>,

        #[arg(long)]
        organization: Option<String>,

        #[arg(long)]
        pipeline: Option<String>,

        #[arg(short, long)]
        branch: Option<String>,

        #[arg(short = 'C', long)]
        commit: String,
    },
    /// Convert previously fetched result documents in a directory
    Convert {
        #[arg(short, long)]
        datadir: PathBuf,
    },
}

impl Cli {
    #[allow(clippy::too_many_arguments)]
    async fn execute_buildkite(
        &self,
        config: &Config,
        token: Option<&str>,
        url: Option<&str>,
        organization: Option<&str>,
        pipeline: Option<&str>,
        branch: Option<&str>,
        commit: &str,
    ) -> Result<PerfReport> {
        let settings = &config.buildkite;

        // Resolved before any request is made.
        let token = Token::resolve([token, settings.token.as_deref()])?;

        let url = url.unwrap_or(&settings.base_url);
        let organization = organization.unwrap_or(&settings.organization);
        let pipeline = pipeline.unwrap_or(&settings.pipeline);
        let branch = branch.or(settings.branch.as_deref());

        info!("Collecting benchmark metrics for {organization}/{pipeline} at {commit}");

        let client = BuildkiteClient::new(url, organization, pipeline, token)?.with_retry_policy(
            settings.max_retries,
            Duration::from_secs(settings.retry_delay_seconds),
        );
        let classifier = JobClassifier::new(
            &config.extraction.families,
            config.extraction.job_id_mode,
        )?;

        let provider =
            BuildkiteProvider::new(client, classifier, format!("{organization}/{pipeline}"));

        Ok(provider.collect_metrics(branch, commit).await?)
    }

    fn export(&self, config: &Config, report: &PerfReport, default_dir: Option<PathBuf>) -> Result<()> {
        let format = self.format.unwrap_or(config.output.format);
        let pretty = self.pretty || config.output.pretty;
        let directory = self
            .output
            .clone()
            .or(default_dir)
            .unwrap_or_else(|| config.output.directory.clone());

        // Render everything before touching the filesystem.
        let files = render_tables(report, format, pretty)?;
        write_files(&directory, &files)?;

        print_summary(report);
        info!("Results written to: {}", directory.display());

        Ok(())
    }

    pub async fn execute(&self) -> Result<()> {
        let config = Config::load(self.config.as_deref()).context("Failed to load configuration")?;

        match &self.command {
            Commands::Buildkite {
                token,
                url,
                organization,
                pipeline,
                branch,
                commit,
            } => {
                let report = self
                    .execute_buildkite(
                        &config,
                        token.as_deref(),
                        url.as_deref(),
                        organization.as_deref(),
                        pipeline.as_deref(),
                        branch.as_deref(),
                        commit,
                    )
                    .await?;
                self.export(&config, &report, None)
            }
            Commands::Convert { datadir } => {
                let report = LocalProvider::new(datadir.clone()).collect_metrics()?;
                self.export(&config, &report, Some(datadir.clone()))
            }
        }
    }
}
