//! Shared benchmark parameters.
//!
//! `BenchParams` is the namespace every driver shares: run identity, numeric
//! precision, seed, thread count, data sources, timing policy and output
//! settings. It is resolved once (see [`crate::config::load_params`]) and only
//! read afterwards; values derived from loaded data live elsewhere.

use crate::dtype::DType;
use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Complete parameter set of one benchmark invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchParams {
    #[serde(default)]
    pub run: RunParams,
    #[serde(default)]
    pub data: DataParams,
    #[serde(default)]
    pub timing: TimingParams,
    #[serde(default)]
    pub output: OutputParams,
}

impl BenchParams {
    /// Reject values no run can proceed with.
    pub fn validate(&self) -> Result<()> {
        self.timing.validate()?;
        self.data.synthetic.validate()?;
        if let Some(0) = self.run.threads {
            return Err(BenchError::config("n_jobs must be at least 1"));
        }
        Ok(())
    }
}

/// Identity and global knobs of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParams {
    /// Free-form batch label carried into every report row.
    #[serde(default = "default_unknown")]
    pub batch: String,
    /// Architecture label carried into every report row.
    #[serde(default = "default_unknown")]
    pub arch: String,
    /// Library prefix of the report.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_device")]
    pub device: String,
    #[serde(default)]
    pub dtype: DType,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Requested worker threads; `None` means all available cores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            batch: default_unknown(),
            arch: default_unknown(),
            prefix: default_prefix(),
            device: default_device(),
            dtype: DType::default(),
            seed: default_seed(),
            threads: None,
        }
    }
}

impl RunParams {
    pub fn effective_threads(&self) -> usize {
        self.threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

fn default_unknown() -> String {
    "?".to_string()
}

fn default_prefix() -> String {
    "linfa".to_string()
}

fn default_device() -> String {
    "cpu".to_string()
}

fn default_seed() -> u64 {
    12345
}

/// Where the train/test partitions come from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_x_train: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_x_test: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_y_train: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_y_test: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_name: Option<String>,
    /// Generator settings used when no training file is given.
    #[serde(default)]
    pub synthetic: SyntheticParams,
}

/// Gaussian blob generator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticParams {
    #[serde(default = "default_train_rows")]
    pub train_rows: usize,
    #[serde(default = "default_test_rows")]
    pub test_rows: usize,
    #[serde(default = "default_features")]
    pub features: usize,
    #[serde(default = "default_classes")]
    pub classes: usize,
    /// Standard deviation of each blob.
    #[serde(default = "default_spread")]
    pub spread: f64,
}

impl Default for SyntheticParams {
    fn default() -> Self {
        Self {
            train_rows: default_train_rows(),
            test_rows: default_test_rows(),
            features: default_features(),
            classes: default_classes(),
            spread: default_spread(),
        }
    }
}

impl SyntheticParams {
    fn validate(&self) -> Result<()> {
        if self.train_rows == 0 || self.test_rows == 0 {
            return Err(BenchError::config("synthetic row counts must be positive"));
        }
        if self.features == 0 {
            return Err(BenchError::config("synthetic feature count must be positive"));
        }
        if self.classes == 0 {
            return Err(BenchError::config("synthetic class count must be positive"));
        }
        if !(self.spread.is_finite() && self.spread > 0.0) {
            return Err(BenchError::config("synthetic spread must be a positive number"));
        }
        Ok(())
    }
}

fn default_train_rows() -> usize {
    1000
}

fn default_test_rows() -> usize {
    200
}

fn default_features() -> usize {
    8
}

fn default_classes() -> usize {
    3
}

fn default_spread() -> f64 {
    1.0
}

/// Statistic the timing harness reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeMethod {
    /// Mean of the samples inside the 1.5 IQR fences.
    #[default]
    BoxFilter,
    /// Minimum over outer batches of the per-call mean of inner loops.
    MeanMin,
    Median,
}

impl TimeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BoxFilter => "box_filter",
            Self::MeanMin => "mean_min",
            Self::Median => "median",
        }
    }
}

impl fmt::Display for TimeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "box_filter" => Ok(Self::BoxFilter),
            "mean_min" => Ok(Self::MeanMin),
            "median" => Ok(Self::Median),
            other => Err(format!(
                "unknown time method '{other}' (expected box_filter, mean_min or median)"
            )),
        }
    }
}

/// Loop counts overriding the global ones for one stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageLoops {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_loops: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outer_loops: Option<usize>,
}

/// Timing harness settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingParams {
    #[serde(default)]
    pub method: TimeMethod,
    #[serde(default = "default_loops")]
    pub inner_loops: usize,
    #[serde(default = "default_loops")]
    pub outer_loops: usize,
    #[serde(default = "default_goal_outer_loops")]
    pub goal_outer_loops: usize,
    #[serde(default = "default_time_limit")]
    pub time_limit_secs: f64,
    #[serde(default = "default_loops")]
    pub box_filter_measurements: usize,
    #[serde(default)]
    pub fit: StageLoops,
    #[serde(default)]
    pub predict: StageLoops,
}

impl Default for TimingParams {
    fn default() -> Self {
        Self {
            method: TimeMethod::default(),
            inner_loops: default_loops(),
            outer_loops: default_loops(),
            goal_outer_loops: default_goal_outer_loops(),
            time_limit_secs: default_time_limit(),
            box_filter_measurements: default_loops(),
            fit: StageLoops::default(),
            predict: StageLoops::default(),
        }
    }
}

impl TimingParams {
    fn validate(&self) -> Result<()> {
        let counts = [
            ("inner_loops", Some(self.inner_loops)),
            ("outer_loops", Some(self.outer_loops)),
            ("goal_outer_loops", Some(self.goal_outer_loops)),
            ("box_filter_measurements", Some(self.box_filter_measurements)),
            ("fit.inner_loops", self.fit.inner_loops),
            ("fit.outer_loops", self.fit.outer_loops),
            ("predict.inner_loops", self.predict.inner_loops),
            ("predict.outer_loops", self.predict.outer_loops),
        ];
        for (name, value) in counts {
            if value == Some(0) {
                return Err(BenchError::config(format!("{name} must be at least 1")));
            }
        }
        let inner = [
            ("inner_loops", Some(self.inner_loops)),
            ("fit.inner_loops", self.fit.inner_loops),
            ("predict.inner_loops", self.predict.inner_loops),
        ];
        for (name, value) in inner {
            if value.is_some_and(|v| u32::try_from(v).is_err()) {
                return Err(BenchError::config(format!("{name} must be at most {}", u32::MAX)));
            }
        }
        if !(self.time_limit_secs.is_finite() && self.time_limit_secs > 0.0) {
            return Err(BenchError::config("time_limit_secs must be a positive number"));
        }
        Ok(())
    }
}

fn default_loops() -> usize {
    100
}

fn default_goal_outer_loops() -> usize {
    10
}

fn default_time_limit() -> f64 {
    10.0
}

/// Report serialization format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown output format '{other}' (expected csv or json)")),
        }
    }
}

/// Where and how the report is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputParams {
    #[serde(default)]
    pub format: OutputFormat,
    /// Emit the CSV header row.
    #[serde(default = "default_true")]
    pub header: bool,
    /// Report file; stdout when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Append to `path` instead of truncating it.
    #[serde(default)]
    pub append: bool,
}

impl Default for OutputParams {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            header: true,
            path: None,
            append: false,
        }
    }
}

fn default_true() -> bool {
    true
}
