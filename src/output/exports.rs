use anyhow::{Context, Result};
use std::borrow::Cow;
use std::io::Write;
use std::path::Path;

use crate::config::OutputFormat;
use crate::metrics::{MetricCategory, MetricTable};
use crate::report::PerfReport;

const CSV_HEADER: &str = "perf_metric_name,perf_metric_value";

/// Writes one metric table to `output` as rows of `(name, value)`.
///
/// Rows keep the table's insertion order. Values are written exactly as they
/// appeared in the source documents.
pub fn export_table(
    table: &MetricTable,
    format: OutputFormat,
    pretty: bool,
    output: &mut dyn Write,
) -> Result<()> {
    match format {
        OutputFormat::Csv => export_csv(table, output),
        OutputFormat::Json => export_json(table, pretty, output),
    }
}

fn export_csv(table: &MetricTable, output: &mut dyn Write) -> Result<()> {
    writeln!(output, "{CSV_HEADER}")?;
    for (name, value) in table.iter() {
        writeln!(output, "{},{}", csv_field(name), value)?;
    }
    Ok(())
}

fn export_json(table: &MetricTable, pretty: bool, output: &mut dyn Write) -> Result<()> {
    let rows: Vec<_> = table
        .iter()
        .map(|(name, value)| {
            serde_json::json!({
                "perf_metric_name": name,
                "perf_metric_value": value,
            })
        })
        .collect();

    let json = if pretty {
        serde_json::to_string_pretty(&rows)?
    } else {
        serde_json::to_string(&rows)?
    };
    writeln!(output, "{}", json)?;
    Ok(())
}

/// Quotes a CSV field when it contains a delimiter, quote or line break.
fn csv_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Renders every output file of a run in memory.
///
/// Per family with data: `<stem>_throughput` and `<stem>_latency` tables,
/// `<stem>_unclassified` when non-empty, and the family's raw result entries.
/// The run report is rendered last as `report.json`.
pub fn render_tables(
    report: &PerfReport,
    format: OutputFormat,
    pretty: bool,
) -> Result<Vec<(String, Vec<u8>)>> {
    let mut files = Vec::new();

    for (family, tables) in &report.tables {
        for category in MetricCategory::ALL {
            let table = tables.table(category);
            if category == MetricCategory::Unclassified && table.is_empty() {
                continue;
            }

            let mut buffer = Vec::new();
            export_table(table, format, pretty, &mut buffer)?;
            files.push((
                format!("{}_{}.{}", family.file_stem(), category.as_str(), format.extension()),
                buffer,
            ));
        }
    }

    for (family, entries) in &report.raw {
        let json = if pretty {
            serde_json::to_vec_pretty(entries)?
        } else {
            serde_json::to_vec(entries)?
        };
        files.push((family.raw_document_name().to_string(), json));
    }

    files.push(("report.json".to_string(), serde_json::to_vec_pretty(report)?));

    Ok(files)
}

/// Writes rendered files into `directory`, creating it if needed.
pub fn write_files(directory: &Path, files: &[(String, Vec<u8>)]) -> Result<()> {
    std::fs::create_dir_all(directory)
        .with_context(|| format!("Failed to create output directory: {}", directory.display()))?;

    for (name, contents) in files {
        let path = directory.join(name);
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Wrote {}", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{JobFamily, ShapeChain};
    use crate::report::ReportBuilder;
    use serde_json::{json, Value};

    fn table_with(rows: &[(&str, Value)]) -> MetricTable {
        let records: Vec<_> = rows
            .iter()
            .map(|(name, value)| {
                json!({"perf_metric_name": name, "perf_metric_value": value, "perf_metric_type": "LATENCY"})
            })
            .collect();
        let shapes = ShapeChain::default();
        let mut builder = ReportBuilder::new(&shapes);
        builder
            .add_document(JobFamily::Core, "job", &json!({ "job": records }))
            .unwrap();
        builder.finish("Local", "test".to_string(), 0).tables[&JobFamily::Core]
            .latency
            .clone()
    }

    fn sample_report() -> PerfReport {
        let shapes = ShapeChain::default();
        let mut builder = ReportBuilder::new(&shapes);
        builder
            .add_document(
                JobFamily::Core,
                "many_actors.aws",
                &json!({"many_actors": [
                    {"perf_metric_name": "p50", "perf_metric_value": 12.3, "perf_metric_type": "LATENCY_P50"},
                    {"perf_metric_name": "actors", "perf_metric_value": 500, "perf_metric_type": "THROUGHPUT"}
                ]}),
            )
            .unwrap();
        builder.finish("Buildkite", "ray-project/release@abc".to_string(), 1)
    }

    #[test]
    fn test_export_csv_rows_in_insertion_order() {
        let table = table_with(&[("zeta", json!(1.5)), ("alpha", json!(2))]);
        let mut output = Vec::new();
        export_table(&table, OutputFormat::Csv, false, &mut output).unwrap();

        let csv = String::from_utf8(output).unwrap();
        assert_eq!(csv, "perf_metric_name,perf_metric_value\njob/zeta,1.5\njob/alpha,2\n");
    }

    #[test]
    fn test_export_csv_quotes_special_names() {
        let table = table_with(&[("a,b \"c\"", json!(1))]);
        let mut output = Vec::new();
        export_table(&table, OutputFormat::Csv, false, &mut output).unwrap();

        let csv = String::from_utf8(output).unwrap();
        assert!(csv.contains("\"job/a,b \"\"c\"\"\",1"));
    }

    #[test]
    fn test_export_empty_table_has_header_only() {
        let mut output = Vec::new();
        export_table(&MetricTable::default(), OutputFormat::Csv, false, &mut output).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), format!("{CSV_HEADER}\n"));
    }

    #[test]
    fn test_export_json_rows() {
        let table = table_with(&[("p99", json!(40))]);
        let mut output = Vec::new();
        export_table(&table, OutputFormat::Json, false, &mut output).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(
            value,
            json!([{"perf_metric_name": "job/p99", "perf_metric_value": 40}])
        );
    }

    #[test]
    fn test_export_keeps_number_literals_verbatim() {
        let document: Value = serde_json::from_str(
            r#"{"j": [
                {"perf_metric_name": "a", "perf_metric_value": 1e3, "perf_metric_type": "LATENCY"},
                {"perf_metric_name": "b", "perf_metric_value": 1.50, "perf_metric_type": "LATENCY"},
                {"perf_metric_name": "c", "perf_metric_value": 123456789012345678901234, "perf_metric_type": "LATENCY"}
            ]}"#,
        )
        .unwrap();
        let shapes = ShapeChain::default();
        let mut builder = ReportBuilder::new(&shapes);
        builder.add_document(JobFamily::Core, "job", &document).unwrap();
        let report = builder.finish("Local", "test".to_string(), 0);

        let mut output = Vec::new();
        export_table(
            &report.tables[&JobFamily::Core].latency,
            OutputFormat::Csv,
            false,
            &mut output,
        )
        .unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "perf_metric_name,perf_metric_value\nj/a,1e3\nj/b,1.50\nj/c,123456789012345678901234\n"
        );
    }

    #[test]
    fn test_render_tables_file_layout() {
        let files = render_tables(&sample_report(), OutputFormat::Csv, false).unwrap();
        let names: Vec<_> = files.iter().map(|(name, _)| name.as_str()).collect();

        assert_eq!(
            names,
            vec!["core_throughput.csv", "core_latency.csv", "result.json", "report.json"]
        );
        let latency = String::from_utf8(files[1].1.clone()).unwrap();
        assert!(latency.contains("many_actors/p50,12.3"));
    }

    #[test]
    fn test_write_files_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("out");
        let files = render_tables(&sample_report(), OutputFormat::Json, true).unwrap();

        write_files(&target, &files).unwrap();

        assert!(target.join("core_throughput.json").exists());
        let raw = std::fs::read_to_string(target.join("result.json")).unwrap();
        assert!(raw.contains("many_actors"));
    }
}
