//! Flags shared by every benchmark subcommand.
//!
//! All of them are optional on the command line; an absent flag leaves the
//! value from the configuration files, environment or defaults in place.

use clap::Args;
use mlbench_core::{DType, OutputFormat, TimeMethod};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct SharedArgs {
    /// Batch label carried into the report
    #[arg(long, help_heading = "Run")]
    pub batch: Option<String>,

    /// Architecture label carried into the report
    #[arg(long, help_heading = "Run")]
    pub arch: Option<String>,

    /// Library prefix of the report
    #[arg(long, help_heading = "Run")]
    pub prefix: Option<String>,

    /// Device label carried into the report
    #[arg(long, help_heading = "Run")]
    pub device: Option<String>,

    /// Numeric precision: float32 or float64
    #[arg(short, long, help_heading = "Run")]
    pub dtype: Option<DType>,

    /// Random seed
    #[arg(long, help_heading = "Run")]
    pub seed: Option<u64>,

    /// Number of threads (defaults to all cores)
    #[arg(short = 'j', long, help_heading = "Run")]
    pub n_jobs: Option<usize>,

    /// Training features (.npy or .csv)
    #[arg(long, help_heading = "Data")]
    pub file_x_train: Option<PathBuf>,

    /// Test features (defaults to the training features)
    #[arg(long, help_heading = "Data")]
    pub file_x_test: Option<PathBuf>,

    /// Training labels
    #[arg(long, help_heading = "Data")]
    pub file_y_train: Option<PathBuf>,

    /// Test labels
    #[arg(long, help_heading = "Data")]
    pub file_y_test: Option<PathBuf>,

    /// Dataset name carried into the report
    #[arg(long, help_heading = "Data")]
    pub dataset_name: Option<String>,

    /// Synthetic training rows, used without --file-x-train
    #[arg(long, help_heading = "Data")]
    pub synthetic_train_rows: Option<usize>,

    /// Synthetic test rows
    #[arg(long, help_heading = "Data")]
    pub synthetic_test_rows: Option<usize>,

    /// Synthetic feature count
    #[arg(long, help_heading = "Data")]
    pub synthetic_features: Option<usize>,

    /// Synthetic class (blob) count
    #[arg(long, help_heading = "Data")]
    pub synthetic_classes: Option<usize>,

    /// Standard deviation of each synthetic blob
    #[arg(long, help_heading = "Data")]
    pub synthetic_spread: Option<f64>,

    /// Timing statistic: box_filter, mean_min or median
    #[arg(long, help_heading = "Timing")]
    pub time_method: Option<TimeMethod>,

    /// Calls per timed batch (mean_min)
    #[arg(long, help_heading = "Timing")]
    pub inner_loops: Option<usize>,

    /// Timed batches (mean_min)
    #[arg(long, help_heading = "Timing")]
    pub outer_loops: Option<usize>,

    /// Batches to run before the time limit applies (mean_min)
    #[arg(long, help_heading = "Timing")]
    pub goal_outer_loops: Option<usize>,

    /// Seconds after which sampling stops
    #[arg(long, help_heading = "Timing")]
    pub time_limit: Option<f64>,

    /// Measurements taken by box_filter and median
    #[arg(long, help_heading = "Timing")]
    pub box_filter_measurements: Option<usize>,

    #[arg(long, help_heading = "Timing")]
    pub fit_inner_loops: Option<usize>,

    #[arg(long, help_heading = "Timing")]
    pub fit_outer_loops: Option<usize>,

    #[arg(long, help_heading = "Timing")]
    pub predict_inner_loops: Option<usize>,

    #[arg(long, help_heading = "Timing")]
    pub predict_outer_loops: Option<usize>,

    /// Report format: csv or json
    #[arg(long, help_heading = "Output")]
    pub output_format: Option<OutputFormat>,

    /// Print the CSV header row
    #[arg(long, overrides_with = "no_header", help_heading = "Output")]
    pub header: bool,

    /// Omit the CSV header row
    #[arg(long, overrides_with = "header", help_heading = "Output")]
    pub no_header: bool,

    /// Report file (stdout when omitted)
    #[arg(short, long, help_heading = "Output")]
    pub output: Option<PathBuf>,

    /// Append to the report file instead of truncating it
    #[arg(long, help_heading = "Output")]
    pub append: bool,
}

/// The flags in the nested shape of `BenchParams`, absent ones skipped.
#[derive(Debug, Default, Serialize)]
pub struct ParamOverrides<'a> {
    run: RunOverrides<'a>,
    data: DataOverrides<'a>,
    timing: TimingOverrides,
    output: OutputOverrides<'a>,
}

#[derive(Debug, Default, Serialize)]
struct RunOverrides<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    batch: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    arch: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    prefix: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dtype: Option<DType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    threads: Option<usize>,
}

#[derive(Debug, Default, Serialize)]
struct DataOverrides<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    file_x_train: Option<&'a PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_x_test: Option<&'a PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_y_train: Option<&'a PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_y_test: Option<&'a PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dataset_name: Option<&'a str>,
    synthetic: SyntheticOverrides,
}

#[derive(Debug, Default, Serialize)]
struct SyntheticOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    train_rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    test_rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    features: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    classes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    spread: Option<f64>,
}

#[derive(Debug, Default, Serialize)]
struct TimingOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    method: Option<TimeMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inner_loops: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    outer_loops: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    goal_outer_loops: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_limit_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    box_filter_measurements: Option<usize>,
    fit: StageOverrides,
    predict: StageOverrides,
}

#[derive(Debug, Default, Serialize)]
struct StageOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    inner_loops: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    outer_loops: Option<usize>,
}

#[derive(Debug, Default, Serialize)]
struct OutputOverrides<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<OutputFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    header: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<&'a PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    append: Option<bool>,
}

impl SharedArgs {
    pub fn overrides(&self) -> ParamOverrides<'_> {
        let header = match (self.header, self.no_header) {
            (_, true) => Some(false),
            (true, false) => Some(true),
            (false, false) => None,
        };
        ParamOverrides {
            run: RunOverrides {
                batch: self.batch.as_deref(),
                arch: self.arch.as_deref(),
                prefix: self.prefix.as_deref(),
                device: self.device.as_deref(),
                dtype: self.dtype,
                seed: self.seed,
                threads: self.n_jobs,
            },
            data: DataOverrides {
                file_x_train: self.file_x_train.as_ref(),
                file_x_test: self.file_x_test.as_ref(),
                file_y_train: self.file_y_train.as_ref(),
                file_y_test: self.file_y_test.as_ref(),
                dataset_name: self.dataset_name.as_deref(),
                synthetic: SyntheticOverrides {
                    train_rows: self.synthetic_train_rows,
                    test_rows: self.synthetic_test_rows,
                    features: self.synthetic_features,
                    classes: self.synthetic_classes,
                    spread: self.synthetic_spread,
                },
            },
            timing: TimingOverrides {
                method: self.time_method,
                inner_loops: self.inner_loops,
                outer_loops: self.outer_loops,
                goal_outer_loops: self.goal_outer_loops,
                time_limit_secs: self.time_limit,
                box_filter_measurements: self.box_filter_measurements,
                fit: StageOverrides {
                    inner_loops: self.fit_inner_loops,
                    outer_loops: self.fit_outer_loops,
                },
                predict: StageOverrides {
                    inner_loops: self.predict_inner_loops,
                    outer_loops: self.predict_outer_loops,
                },
            },
            output: OutputOverrides {
                format: self.output_format,
                header,
                path: self.output.as_ref(),
                append: self.append.then_some(true),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[derive(Parser, Debug)]
    struct Cli {
        #[command(flatten)]
        shared: SharedArgs,
    }

    fn overrides(args: &[&str]) -> serde_json::Value {
        let cli = Cli::try_parse_from(std::iter::once("mlbench").chain(args.iter().copied()))
            .unwrap();
        serde_json::to_value(cli.shared.overrides()).unwrap()
    }

    #[test]
    fn test_absent_flags_are_skipped() {
        assert_eq!(
            overrides(&[]),
            json!({
                "run": {},
                "data": { "synthetic": {} },
                "timing": { "fit": {}, "predict": {} },
                "output": {}
            })
        );
    }

    #[test]
    fn test_flags_land_in_sections() {
        let value = overrides(&[
            "-d",
            "float32",
            "--seed",
            "42",
            "-j",
            "4",
            "--time-method",
            "mean_min",
            "--predict-inner-loops",
            "3",
            "--time-limit",
            "2.5",
            "--output-format",
            "json",
            "--no-header",
            "--append",
        ]);
        assert_eq!(value["run"]["dtype"], "float32");
        assert_eq!(value["run"]["seed"], 42);
        assert_eq!(value["run"]["threads"], 4);
        assert_eq!(value["timing"]["method"], "mean_min");
        assert_eq!(value["timing"]["predict"]["inner_loops"], 3);
        assert_eq!(value["timing"]["time_limit_secs"], 2.5);
        assert_eq!(value["output"]["format"], "json");
        assert_eq!(value["output"]["header"], false);
        assert_eq!(value["output"]["append"], true);
    }

    #[test]
    fn test_invalid_enum_values_rejected() {
        let parse = |args: &[&str]| {
            Cli::try_parse_from(std::iter::once("mlbench").chain(args.iter().copied()))
        };
        assert!(parse(&["--dtype", "float16"]).is_err());
        assert!(parse(&["--time-method", "fastest"]).is_err());
        assert!(parse(&["--seed", "abc"]).is_err());
    }
}
