use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{heading, highlight, success};

/// Progress tracking for the two-phase metric collection
pub struct PhaseProgress {
    pb: ProgressBar,
}

impl PhaseProgress {
    pub fn start_listing(commit: &str) -> Self {
        eprintln!("{}  {}", heading("⚙️"), heading("Phases").underlined());
        let pb = create_spinner(
            highlight(format!("Phase 1/2: Listing builds for {commit}")).to_string(),
        );
        Self { pb }
    }

    pub fn finish_listing_start_extraction(self, build_count: usize) -> Self {
        self.pb.finish_with_message(
            success(format!("Phase 1/2: Listed {build_count} builds ✓")).to_string(),
        );
        let pb = create_spinner(highlight("Phase 2/2: Extracting job metrics").to_string());
        Self { pb }
    }

    /// Updates the spinner with the job currently being processed.
    pub fn set_job(&self, job_name: &str) {
        self.pb.set_message(
            highlight(format!("Phase 2/2: Extracting job metrics ({job_name})")).to_string(),
        );
    }

    pub fn finish_extraction(self, job_count: usize) {
        self.pb.finish_with_message(
            success(format!("Phase 2/2: Processed {job_count} jobs ✓")).to_string(),
        );
        eprintln!();
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    if let Ok(style) = ProgressStyle::default_spinner().template("  {msg} {spinner}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
