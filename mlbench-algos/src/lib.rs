//! # mlbench algorithms
//!
//! Estimator adapters that drive `linfa` models through the mlbench timing
//! harness: K-means clustering and a bagged decision-tree forest.

pub mod estimator;
pub mod forest;
pub mod kmeans;

pub use estimator::{BenchAlgorithm, ModelFloat, run_benchmark};
pub use forest::{FloatOrInt, ForestBench, ForestParams, SplitAlgorithm, SplitCriterion};
pub use kmeans::{KMeansBench, KMeansParams, sample_initial_centroids};
