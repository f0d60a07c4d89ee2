use std::fmt::Write;

use crate::metrics::{JobFamily, MetricCategory};
use crate::report::{JobOutcome, JobReport, PerfReport};
use comfy_table::{Cell, Color as TableColor};

use super::styling::{failure, heading, highlight, label, source, success};
use super::tables::{color_coded_outcome_cell, count_cell, create_table};

/// Prints a human-readable summary of a metric collection run to stdout.
///
/// Displays:
/// - Overview: source, build and job counts, extracted metrics
/// - Jobs: per-job outcome (extracted, partial, no results, failed)
/// - Tables: row counts per family and category
pub fn print_summary(report: &PerfReport) {
    println!("{}", render_summary(report));
}

fn header_cells(titles: &[&str]) -> Vec<Cell> {
    titles
        .iter()
        .map(|title| Cell::new(*title).fg(TableColor::Cyan))
        .collect()
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{} {}", heading(emoji), heading(title).underlined());
}

fn outcome_detail(job: &JobReport) -> String {
    match &job.outcome {
        JobOutcome::Extracted {
            metrics,
            skipped_entries,
        } if skipped_entries.is_empty() => format!("{metrics} metrics"),
        JobOutcome::Extracted {
            metrics,
            skipped_entries,
        } => format!(
            "{metrics} metrics, skipped: {}",
            skipped_entries.join(", ")
        ),
        JobOutcome::NoResults { reason } => reason.clone(),
        JobOutcome::Failed { error } => error.clone(),
    }
}

#[allow(clippy::format_push_string)]
fn render_summary(report: &PerfReport) -> String {
    let mut output = String::new();

    add_section_header(&mut output, "📊", "Overview");

    let extracted = report.count_outcomes(JobOutcome::is_extracted);
    let failed = report.count_outcomes(|o| matches!(o, JobOutcome::Failed { .. }));
    let failed_display = if failed == 0 {
        success(failed)
    } else {
        failure(failed)
    };

    output.push_str(&format!(
        "  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n\n",
        label("Source:"),
        source(&report.source),
        label("Builds scanned:"),
        highlight(report.total_builds),
        label("Benchmark jobs:"),
        highlight(report.jobs.len()),
        label("Jobs extracted:"),
        success(extracted),
        label("Jobs failed:"),
        failed_display,
        label("Metrics:"),
        highlight(report.total_metrics),
    ));

    if report.jobs.is_empty() {
        output.push_str(&format!("{}\n", highlight("No benchmark jobs found.")));
        return output;
    }

    add_section_header(&mut output, "🧪", "Jobs");

    let mut jobs_table = create_table();
    jobs_table.set_header(header_cells(&["Job", "Family", "Build", "Status", "Details"]));
    for job in &report.jobs {
        jobs_table.add_row(vec![
            Cell::new(&job.name),
            Cell::new(job.family),
            Cell::new(job.build_number.map_or_else(|| "-".to_string(), |n| n.to_string())),
            color_coded_outcome_cell(&job.outcome),
            Cell::new(outcome_detail(job)),
        ]);
    }
    output.push_str(&format!("{jobs_table}\n\n"));

    add_section_header(&mut output, "📋", "Metric Tables");

    let mut counts_table = create_table();
    counts_table.set_header(header_cells(&[
        "Family",
        "Throughput",
        "Latency",
        "Unclassified",
    ]));
    for family in JobFamily::ALL {
        let Some(tables) = report.tables.get(&family) else {
            continue;
        };
        let mut row = vec![Cell::new(family)];
        row.extend(
            MetricCategory::ALL
                .iter()
                .map(|category| count_cell(tables.table(*category).len())),
        );
        counts_table.add_row(row);
    }
    output.push_str(&format!("{counts_table}\n"));

    output
}
