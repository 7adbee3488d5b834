//! Benchmark reports: one row per stage, serialized as CSV or JSON.
//!
//! The column set depends only on the algorithm (its parameter names and
//! metric type), so rows from repeated invocations can be concatenated and
//! compared.

use crate::dtype::DType;
use crate::error::{BenchError, Result};
use crate::metrics::AccuracyType;
use crate::params::{BenchParams, OutputFormat, OutputParams};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;

/// Measured phase of an estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Training,
    Prediction,
}

impl Stage {
    pub const ALL: [Stage; 2] = [Stage::Training, Stage::Prediction];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Training => "training",
            Self::Prediction => "prediction",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hyperparameters as passed to the estimator, keyed by name.
pub type AlgorithmParameters = BTreeMap<String, serde_json::Value>;

/// Shape and identity of the partition a stage ran on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputData {
    pub data_type: DType,
    pub dataset_name: Option<String>,
    pub rows: usize,
    pub columns: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classes: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_clusters: Option<usize>,
}

/// Run identity copied from the parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    pub batch: String,
    pub arch: String,
    pub prefix: String,
    pub threads: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub library: String,
    pub algorithm: String,
    pub stage: Stage,
    pub function: String,
    pub device: String,
    pub timestamp: DateTime<Utc>,
    pub input_data: InputData,
    pub algorithm_parameters: AlgorithmParameters,
    pub run: RunInfo,
    #[serde(rename = "time[s]")]
    pub time_secs: f64,
    /// Single entry keyed by the accuracy type label.
    #[serde(flatten)]
    pub metric: BTreeMap<String, f64>,
}

impl ReportRow {
    pub fn metric_value(&self) -> Option<f64> {
        self.metric.values().next().copied()
    }
}

/// Everything a report is built from; slices are indexed by stage.
#[derive(Debug, Clone)]
pub struct ReportInput<'a> {
    pub library: &'a str,
    pub algorithm: &'a str,
    pub params: &'a BenchParams,
    pub stages: &'a [Stage],
    pub functions: &'a [&'a str],
    pub times: &'a [f64],
    pub accuracy_type: AccuracyType,
    pub accuracies: &'a [f64],
    /// `(rows, columns)` of the partition each stage ran on.
    pub shapes: &'a [(usize, usize)],
    pub dataset_name: Option<&'a str>,
    pub algorithm_parameters: AlgorithmParameters,
    pub classes: Option<usize>,
    pub n_clusters: Option<usize>,
}

/// A finished report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub accuracy_type: AccuracyType,
    pub rows: Vec<ReportRow>,
}

impl Report {
    /// Build one row per stage. Every per-stage slice must have one entry per
    /// stage and every metric must lie in its domain.
    pub fn build(input: ReportInput<'_>) -> Result<Self> {
        let n = input.stages.len();
        if n == 0 {
            return Err(BenchError::report("a report needs at least one stage"));
        }
        let lengths = [
            ("functions", input.functions.len()),
            ("times", input.times.len()),
            ("accuracies", input.accuracies.len()),
            ("shapes", input.shapes.len()),
        ];
        for (name, len) in lengths {
            if len != n {
                return Err(BenchError::report(format!(
                    "{len} {name} for {n} stages"
                )));
            }
        }

        let params = input.params;
        let run = RunInfo {
            batch: params.run.batch.clone(),
            arch: params.run.arch.clone(),
            prefix: params.run.prefix.clone(),
            threads: params.run.effective_threads(),
            seed: params.run.seed,
        };
        let timestamp = Utc::now();

        let mut rows = Vec::with_capacity(n);
        for i in 0..n {
            let value = input.accuracy_type.validate(input.accuracies[i])?;
            let (rows_i, columns_i) = input.shapes[i];
            rows.push(ReportRow {
                library: input.library.to_string(),
                algorithm: input.algorithm.to_string(),
                stage: input.stages[i],
                function: input.functions[i].to_string(),
                device: params.run.device.clone(),
                timestamp,
                input_data: InputData {
                    data_type: params.run.dtype,
                    dataset_name: input.dataset_name.map(str::to_string),
                    rows: rows_i,
                    columns: columns_i,
                    classes: input.classes,
                    n_clusters: input.n_clusters,
                },
                algorithm_parameters: input.algorithm_parameters.clone(),
                run: run.clone(),
                time_secs: input.times[i],
                metric: BTreeMap::from([(input.accuracy_type.as_str().to_string(), value)]),
            });
        }
        Ok(Self {
            accuracy_type: input.accuracy_type,
            rows,
        })
    }

    /// CSV header: fixed columns, parameter names, then time and metric.
    pub fn csv_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = [
            "library", "algorithm", "stage", "function", "batch", "arch", "prefix", "device",
            "threads", "dtype", "size",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect();
        if let Some(first) = self.rows.first() {
            columns.extend(first.algorithm_parameters.keys().cloned());
        }
        columns.push("time".to_string());
        columns.push(self.accuracy_type.as_str().to_string());
        columns
    }

    pub fn write_csv<W: Write>(&self, writer: W, header: bool) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        if header {
            csv.write_record(self.csv_columns())?;
        }
        for row in &self.rows {
            let mut record = vec![
                row.library.clone(),
                row.algorithm.clone(),
                row.stage.to_string(),
                row.function.clone(),
                row.run.batch.clone(),
                row.run.arch.clone(),
                row.run.prefix.clone(),
                row.device.clone(),
                row.run.threads.to_string(),
                row.input_data.data_type.to_string(),
                format!("{}x{}", row.input_data.rows, row.input_data.columns),
            ];
            record.extend(row.algorithm_parameters.values().map(csv_cell));
            record.push(row.time_secs.to_string());
            record.push(row.metric_value().map(|v| v.to_string()).unwrap_or_default());
            csv.write_record(&record)?;
        }
        csv.flush()?;
        Ok(())
    }

    pub fn write_json<W: Write>(&self, mut writer: W) -> Result<()> {
        serde_json::to_writer_pretty(&mut writer, &self.rows)?;
        writeln!(writer)?;
        Ok(())
    }

    /// Write to the configured destination in the configured format.
    ///
    /// When appending to a non-empty file the CSV header is skipped; JSON
    /// appends one array per run.
    pub fn emit(&self, output: &OutputParams) -> Result<()> {
        match &output.path {
            None => {
                let stdout = std::io::stdout();
                self.write_format(stdout.lock(), output.format, output.header)
            }
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .write(true)
                    .append(output.append)
                    .truncate(!output.append)
                    .open(path)?;
                let has_content = output.append && file.metadata()?.len() > 0;
                tracing::info!(path = %path.display(), append = output.append, "Writing report");
                self.write_format(file, output.format, output.header && !has_content)
            }
        }
    }

    fn write_format<W: Write>(&self, writer: W, format: OutputFormat, header: bool) -> Result<()> {
        match format {
            OutputFormat::Csv => self.write_csv(writer, header),
            OutputFormat::Json => self.write_json(writer),
        }
    }
}

fn csv_cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
