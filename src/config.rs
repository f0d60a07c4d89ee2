use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::metrics::{default_family_rules, FamilyRule, JobIdMode};

/// Configuration file structure for PerfLens.
///
/// Lets users pin the pipeline, output and extraction settings for repeated
/// runs. Command-line flags override anything set here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Buildkite connection settings
    #[serde(default)]
    pub buildkite: BuildkiteConfig,

    /// Output format preferences
    #[serde(default)]
    pub output: OutputConfig,

    /// Job classification and extraction settings
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildkiteConfig {
    /// Buildkite API token
    pub token: Option<String>,

    /// Buildkite REST API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Organization slug
    #[serde(default = "default_organization")]
    pub organization: String,

    /// Pipeline slug
    #[serde(default = "default_pipeline")]
    pub pipeline: String,

    /// Restrict builds to this branch
    pub branch: Option<String>,

    /// Retries for rate-limited or failed requests
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay between retries
    #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Table file format
    #[serde(default)]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,

    /// Directory receiving the exported files
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExtractionConfig {
    /// Job identifier derivation, applied to every job in the run
    #[serde(default)]
    pub job_id_mode: JobIdMode,

    /// Job classification rules, replacing the built-in set when given
    #[serde(default = "default_family_rules")]
    pub families: Vec<FamilyRule>,
}

impl Default for BuildkiteConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: default_base_url(),
            organization: default_organization(),
            pipeline: default_pipeline(),
            branch: None,
            max_retries: default_max_retries(),
            retry_delay_seconds: default_retry_delay_seconds(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Csv,
            pretty: false,
            directory: default_output_directory(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            job_id_mode: JobIdMode::default(),
            families: default_family_rules(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.buildkite.com".to_string()
}

fn default_organization() -> String {
    "ray-project".to_string()
}

fn default_pipeline() -> String {
    "release".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_seconds() -> u64 {
    5
}

fn default_output_directory() -> PathBuf {
    PathBuf::from(".")
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./perflens.toml
    /// 3. ./perflens.json
    /// 4. ./perflens.yaml
    /// 5. ./perflens.yml
    /// 6. <user config dir>/perflens/perflens.toml
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let mut candidates: Vec<PathBuf> = [
            "perflens.toml",
            "perflens.json",
            "perflens.yaml",
            "perflens.yml",
        ]
        .iter()
        .map(PathBuf::from)
        .collect();
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("perflens").join("perflens.toml"));
        }

        for candidate in &candidates {
            if candidate.exists() {
                log::debug!("Loading configuration from {}", candidate.display());
                return Self::load_from_path(candidate);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");

        match extension {
            "toml" => {
                toml::from_str(&contents)
                    .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
            }
            "json" => {
                serde_json::from_str(&contents)
                    .with_context(|| format!("Failed to parse JSON config: {}", path.display()))
            }
            "yaml" | "yml" => {
                serde_yaml::from_str(&contents)
                    .with_context(|| format!("Failed to parse YAML config: {}", path.display()))
            }
            _ => {
                // Try TOML first, then JSON, then YAML
                toml::from_str(&contents)
                    .or_else(|_| serde_json::from_str(&contents))
                    .or_else(|_| serde_yaml::from_str(&contents))
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))
            }
        }
    }
}
