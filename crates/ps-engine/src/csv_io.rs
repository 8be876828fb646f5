//! Metrics CSV produced by a benchmark run, and the combined results file.

use std::path::{Path, PathBuf};

use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};
use serde::Deserialize;
use tracing::debug;

use ps_optimizer::ScoreBook;
use ps_types::{Metric, PsError, PsResult};

use crate::transform::configuration_label;

/// Column layout shared by the metrics and results files.
pub const CSV_HEADERS: [&str; 3] = ["configuration", "metric_name", "metric_value"];

/// One row of a run's metrics file.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub configuration: String,
    pub metric_name: String,
    pub metric_value: Metric,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    configuration: String,
    metric_name: String,
    metric_value: String,
}

fn csv_error(path: &Path, err: csv::Error) -> PsError {
    PsError::Csv(format!("{}: {err}", path.display()))
}

fn unquote(field: &str) -> String {
    field.replace('"', "")
}

/// Metrics reported by one run.
#[derive(Debug, Clone, Default)]
pub struct MetricsCsv {
    pub records: Vec<MetricRecord>,
}

impl MetricsCsv {
    pub fn read<P: AsRef<Path>>(path: P) -> PsResult<Self> {
        let path = path.as_ref();
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(|e| csv_error(path, e))?;

        let mut records = Vec::new();
        for result in reader.deserialize() {
            let raw: RawRecord = result.map_err(|e| csv_error(path, e))?;
            let metric_value = Metric::parse_text(&unquote(&raw.metric_value))?;
            records.push(MetricRecord {
                configuration: unquote(&raw.configuration),
                metric_name: unquote(&raw.metric_name),
                metric_value,
            });
        }

        debug!("Read {} metric records from {}", records.len(), path.display());
        Ok(Self { records })
    }

    /// Average over every record, `None` for an empty file.
    pub fn summarized_metric(&self) -> PsResult<Option<Metric>> {
        let values: Vec<Metric> = self.records.iter().map(|r| r.metric_value).collect();
        Ok(Metric::average(&values)?)
    }

    pub fn metric_name(&self) -> Option<&str> {
        self.records.first().map(|r| r.metric_name.as_str())
    }
}

/// Writes the averaged score of every configuration to one CSV file.
#[derive(Debug, Clone)]
pub struct ResultsCsvWriter {
    pub path: PathBuf,
}

impl ResultsCsvWriter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn write(&self, scores: &ScoreBook, metric_name: Option<&str>) -> PsResult<()> {
        let path = self.path.as_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::NonNumeric)
            .from_path(path)
            .map_err(|e| csv_error(path, e))?;
        writer
            .write_record(CSV_HEADERS)
            .map_err(|e| csv_error(path, e))?;

        let metric_name = metric_name.unwrap_or_default();
        for entry in scores.iter() {
            let Some(average) = Metric::average(&entry.samples)? else {
                continue;
            };
            let label = configuration_label(&entry.config);
            let value = average.to_string();
            writer
                .write_record([label.as_str(), metric_name, value.as_str()])
                .map_err(|e| csv_error(path, e))?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ps_types::Configuration;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn reads_and_averages_records() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("metrics.csv");
        fs::write(
            &path,
            "configuration,metric_name,metric_value\n\
             \"a=1\",\"runtime_ms\",\"[10]\"\n\
             \"a=1\",\"runtime_ms\",\"[15]\"\n",
        )
        .unwrap();

        let metrics = MetricsCsv::read(&path).unwrap();
        assert_eq!(metrics.records.len(), 2);
        assert_eq!(metrics.metric_name(), Some("runtime_ms"));
        assert_eq!(metrics.records[0].configuration, "a=1");
        // Scalar averages truncate.
        assert_eq!(metrics.summarized_metric().unwrap(), Some(Metric::Scalar(12)));
    }

    #[test]
    fn tuple_metrics_are_parsed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("metrics.csv");
        fs::write(
            &path,
            "configuration,metric_name,metric_value\nx,latency,\"[1.5,2.5]\"\n",
        )
        .unwrap();

        let metrics = MetricsCsv::read(&path).unwrap();
        assert_eq!(metrics.summarized_metric().unwrap(), Some(Metric::Pair(1.5, 2.5)));
    }

    #[test]
    fn empty_file_has_no_summary() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("metrics.csv");
        fs::write(&path, "configuration,metric_name,metric_value\n").unwrap();

        let metrics = MetricsCsv::read(&path).unwrap();
        assert!(metrics.summarized_metric().unwrap().is_none());
        assert!(metrics.metric_name().is_none());
    }

    #[test]
    fn bad_metric_literal_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("metrics.csv");
        fs::write(&path, "configuration,metric_name,metric_value\nx,m,fast\n").unwrap();
        assert!(MetricsCsv::read(&path).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            MetricsCsv::read(temp_dir.path().join("absent.csv")),
            Err(PsError::Csv(_))
        ));
    }

    #[test]
    fn results_file_quotes_text_fields() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out").join("results.csv");

        let mut scores = ScoreBook::default();
        let config = Configuration::new().with("a", "1").with("b", "x");
        scores.record(&config, Metric::Scalar(10));
        scores.record(&config, Metric::Scalar(20));

        ResultsCsvWriter::new(&path)
            .write(&scores, Some("runtime_ms"))
            .unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines,
            [
                "\"configuration\",\"metric_name\",\"metric_value\"",
                "\"a=1,b=x\",\"runtime_ms\",\"[15]\"",
            ]
        );
    }
}
