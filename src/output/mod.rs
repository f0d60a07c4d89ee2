mod exports;
mod progress;
mod styling;
mod summary;
mod tables;

pub use exports::{render_tables, write_files};
pub use progress::PhaseProgress;
pub use summary::print_summary;

use styling::{brand, label};

/// Prints the `PerfLens` banner to stderr.
///
/// Displays the tool name, version, and description at the start of execution.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        brand("📈 PerfLens"),
        label(env!("CARGO_PKG_VERSION")),
        label("CI Benchmark Metrics Tool")
    );
}
