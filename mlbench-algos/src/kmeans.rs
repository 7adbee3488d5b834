//! K-means clustering benchmark.
//!
//! Initial centroids are fixed before timing starts: either loaded from a file
//! (which also fixes the cluster count) or sampled from the training rows with
//! replacement using the run seed. Every timed fit starts from the same
//! centroids.

use crate::estimator::{BenchAlgorithm, ModelFloat};
use clap::Args;
use linfa::DatasetBase;
use linfa::traits::{Fit, Predict};
use linfa_clustering::{KMeans, KMeansInit};
use linfa_nn::distance::L2Dist;
use mlbench_core::data::read_features;
use mlbench_core::{AccuracyType, AlgorithmParameters, BenchError, Dataset, Result};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;

/// K-means hyperparameters.
#[derive(Debug, Clone, PartialEq, Args, Serialize)]
pub struct KMeansParams {
    /// Initial centroids (.npy or .csv); sets the cluster count
    #[arg(short = 'i', long = "init", visible_alias = "filei", value_name = "PATH")]
    pub init: Option<PathBuf>,

    /// Absolute convergence threshold
    #[arg(short = 't', long = "tol", default_value_t = 0.0)]
    pub tol: f64,

    /// Maximum number of iterations
    #[arg(long, default_value_t = 100)]
    pub maxiter: u64,

    /// Maximum samples per batch
    #[arg(long, default_value_t = 32768)]
    pub samples_per_batch: usize,

    /// Number of clusters (required without --init)
    #[arg(long)]
    pub n_clusters: Option<usize>,
}

impl Default for KMeansParams {
    fn default() -> Self {
        Self {
            init: None,
            tol: 0.0,
            maxiter: 100,
            samples_per_batch: 32768,
            n_clusters: None,
        }
    }
}

/// Pick `k` training rows uniformly at random, with replacement.
///
/// Duplicate picks are kept, so the result may hold repeated centroids.
pub fn sample_initial_centroids<F: Clone>(x: &Array2<F>, k: usize, seed: u64) -> Result<Array2<F>> {
    if k == 0 {
        return Err(BenchError::invalid_input("n_clusters must be at least 1"));
    }
    if x.nrows() == 0 {
        return Err(BenchError::data("cannot sample centroids from an empty matrix"));
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let idx: Vec<usize> = (0..k).map(|_| rng.gen_range(0..x.nrows())).collect();
    Ok(x.select(Axis(0), &idx))
}

/// K-means adapter with its initial centroids resolved.
#[derive(Debug, Clone)]
pub struct KMeansBench<F> {
    params: KMeansParams,
    init: Array2<F>,
    seed: u64,
}

impl<F: ModelFloat> KMeansBench<F> {
    /// Resolve the initial centroids against the loaded training data.
    pub fn prepare(params: &KMeansParams, data: &Dataset<F>, seed: u64) -> Result<Self> {
        let init = match &params.init {
            Some(path) => {
                let init: Array2<F> = read_features(path)?;
                if init.nrows() == 0 {
                    return Err(BenchError::data(format!(
                        "{} holds no centroids",
                        path.display()
                    )));
                }
                if init.ncols() != data.n_features() {
                    return Err(BenchError::data(format!(
                        "{} has {} columns, training data has {}",
                        path.display(),
                        init.ncols(),
                        data.n_features()
                    )));
                }
                if let Some(k) = params.n_clusters.filter(|&k| k != init.nrows()) {
                    tracing::warn!(
                        requested = k,
                        from_file = init.nrows(),
                        "--n-clusters ignored, using the centroid count of --init"
                    );
                }
                init
            }
            None => {
                let k = params.n_clusters.ok_or_else(|| {
                    BenchError::invalid_input("either --init or --n-clusters is required")
                })?;
                sample_initial_centroids(&data.x_train, k, seed)?
            }
        };
        if params.samples_per_batch != KMeansParams::default().samples_per_batch {
            tracing::info!(
                samples_per_batch = params.samples_per_batch,
                "linfa K-means has no batch size, value recorded only"
            );
        }
        Ok(Self {
            params: params.clone(),
            init,
            seed,
        })
    }

    pub fn initial_centroids(&self) -> &Array2<F> {
        &self.init
    }

    /// Tolerance as passed to linfa, which rejects non-positive values.
    fn tolerance(&self) -> Result<F> {
        let tol = F::from_f64(self.params.tol)
            .ok_or_else(|| BenchError::invalid_input(format!("tol {} out of range", self.params.tol)))?;
        Ok(if tol > F::zero() {
            tol
        } else {
            <F as num_traits::Float>::min_positive_value()
        })
    }
}

impl<F: ModelFloat> BenchAlgorithm<F> for KMeansBench<F> {
    type Model = KMeans<F, L2Dist>;

    fn name(&self) -> &'static str {
        "kmeans"
    }

    fn functions(&self) -> [&'static str; 2] {
        ["KMeans.fit", "KMeans.predict"]
    }

    fn accuracy_type(&self) -> AccuracyType {
        AccuracyType::Inertia
    }

    fn fit(&self, data: &Dataset<F>) -> Result<Self::Model> {
        let records = DatasetBase::from(data.x_train.view());
        KMeans::params_with_rng(self.init.nrows(), ChaCha8Rng::seed_from_u64(self.seed))
            .init_method(KMeansInit::Precomputed(self.init.clone()))
            .n_runs(1)
            .max_n_iterations(self.params.maxiter)
            .tolerance(self.tolerance()?)
            .fit(&records)
            .map_err(|e| BenchError::estimator(e.to_string()))
    }

    fn predict(&self, model: &Self::Model, data: &Dataset<F>) -> Result<Array1<usize>> {
        Ok(model.predict(&data.x_test))
    }

    fn training_metric(&self, model: &Self::Model, _data: &Dataset<F>) -> Result<f64> {
        inertia(model)
    }

    /// linfa models are immutable, so this is the inertia of the training fit.
    fn prediction_metric(
        &self,
        model: &Self::Model,
        _predictions: &Array1<usize>,
        _data: &Dataset<F>,
    ) -> Result<f64> {
        inertia(model)
    }

    fn parameters(&self) -> AlgorithmParameters {
        let init = match &self.params.init {
            Some(path) => json!(path.display().to_string()),
            None => json!("random"),
        };
        AlgorithmParameters::from([
            ("init".to_string(), init),
            ("n_clusters".to_string(), json!(self.init.nrows())),
            ("tol".to_string(), json!(self.params.tol)),
            ("maxiter".to_string(), json!(self.params.maxiter)),
            ("samples_per_batch".to_string(), json!(self.params.samples_per_batch)),
        ])
    }

    fn n_clusters(&self) -> Option<usize> {
        Some(self.init.nrows())
    }
}

fn inertia<F: ModelFloat>(model: &KMeans<F, L2Dist>) -> Result<f64> {
    let value = model.inertia();
    let value = value
        .to_f64()
        .ok_or_else(|| BenchError::metric(format!("inertia {value} is not representable")))?;
    AccuracyType::Inertia.validate(value)
}
