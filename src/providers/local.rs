use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::metrics::{JobFamily, ShapeChain};
use crate::report::{JobOutcome, JobReport, PerfReport, ReportBuilder};

/// Offline provider reading previously fetched result documents.
///
/// Looks for one raw document per family in `datadir` (`result.json`,
/// `data.json`, `serve.json`). Absent documents are skipped.
pub struct LocalProvider {
    datadir: PathBuf,
    shapes: ShapeChain,
}

impl LocalProvider {
    pub fn new(datadir: PathBuf) -> Self {
        Self {
            datadir,
            shapes: ShapeChain::default(),
        }
    }

    /// # Errors
    ///
    /// Returns an error only on a composite key collision. Unreadable or
    /// undecodable documents are recorded as failed.
    pub fn collect_metrics(&self) -> Result<PerfReport> {
        info!("Converting result documents in {}", self.datadir.display());

        let mut builder = ReportBuilder::new(&self.shapes);
        for family in JobFamily::ALL {
            let path = self.datadir.join(family.raw_document_name());
            if !path.exists() {
                continue;
            }

            let job_id = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or_else(|| family.file_stem())
                .to_string();

            let outcome = match read_document(&path) {
                Ok(document) => builder.add_document(family, &job_id, &document)?,
                Err(e) => {
                    warn!("Failed to read {}: {e}", path.display());
                    JobOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };

            builder.record(JobReport {
                name: family.raw_document_name().to_string(),
                job_id,
                family,
                build_number: None,
                web_url: None,
                outcome,
            });
        }

        let mut report = builder.finish("Local", self.datadir.display().to_string(), 0);
        // The inputs are the raw documents; never write them back.
        report.raw.clear();
        Ok(report)
    }
}

fn read_document(path: &Path) -> Result<serde_json::Value> {
    let contents = fs::read(path)?;
    Ok(serde_json::from_slice(&contents)?)
}
