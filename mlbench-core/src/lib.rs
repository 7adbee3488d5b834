//! # mlbench core
//!
//! Shared machinery of the mlbench drivers: the parameter model and its
//! layered configuration, train/test data loading, the timing harness,
//! quality metrics and report emission.

pub mod config;
pub mod data;
pub mod dtype;
pub mod error;
pub mod metrics;
pub mod params;
pub mod report;
pub mod timing;

// Re-export commonly used types at the crate root.
pub use config::load_params;
pub use data::{Dataset, count_classes, load_data};
pub use dtype::{BenchFloat, DType};
pub use error::{BenchError, Result};
pub use metrics::{AccuracyType, accuracy_percent, accuracy_score};
pub use params::{
    BenchParams, DataParams, OutputFormat, OutputParams, RunParams, StageLoops, SyntheticParams,
    TimeMethod, TimingParams,
};
pub use report::{AlgorithmParameters, Report, ReportInput, ReportRow, Stage};
pub use timing::{LoopPolicy, TimingResult, measure};
