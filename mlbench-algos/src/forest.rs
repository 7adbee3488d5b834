//! Random forest classification benchmark.
//!
//! The forest is a `linfa-ensemble` bag of `linfa-trees` decision trees. Closed
//! string options map to integer codes through explicit tables; options linfa
//! has no counterpart for are kept in the report and logged.

use crate::estimator::{BenchAlgorithm, ModelFloat};
use clap::{ArgAction, Args, ValueEnum};
use linfa::DatasetBase;
use linfa::traits::{Fit, Predict};
use linfa_ensemble::{EnsembleLearner, EnsembleLearnerParams};
use linfa_trees::{DecisionTree, SplitQuality};
use mlbench_core::metrics::accuracy_percent;
use mlbench_core::{AccuracyType, AlgorithmParameters, BenchError, Dataset, Result, count_classes};
use ndarray::Array1;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use serde_json::json;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

/// Split quality function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitCriterion {
    #[default]
    Gini,
    Entropy,
}

impl SplitCriterion {
    /// Integer code of the criterion.
    pub fn code(self) -> u8 {
        match self {
            Self::Gini => 0,
            Self::Entropy => 1,
        }
    }

    fn quality(self) -> SplitQuality {
        match self {
            Self::Gini => SplitQuality::Gini,
            Self::Entropy => SplitQuality::Entropy,
        }
    }
}

/// Node split search strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitAlgorithm {
    #[default]
    Hist,
    #[value(name = "global_quantile")]
    GlobalQuantile,
}

impl SplitAlgorithm {
    /// Integer code of the strategy.
    pub fn code(self) -> u8 {
        match self {
            Self::Hist => 0,
            Self::GlobalQuantile => 1,
        }
    }
}

/// An absolute count, or a fraction of the training rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FloatOrInt {
    Int(u64),
    Float(f64),
}

impl FloatOrInt {
    /// Absolute value against `n_rows` training rows. Fractions round up.
    pub fn resolve(self, n_rows: usize) -> usize {
        match self {
            Self::Int(n) => usize::try_from(n).unwrap_or(usize::MAX),
            Self::Float(f) => ((f * n_rows as f64).ceil() as usize).max(1),
        }
    }
}

impl FromStr for FloatOrInt {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if let Ok(n) = s.parse::<u64>() {
            return match n {
                0 => Err(format!("'{s}' must be a count of at least 1")),
                n => Ok(Self::Int(n)),
            };
        }
        match s.parse::<f64>() {
            Ok(f) if f > 0.0 && f <= 1.0 => Ok(Self::Float(f)),
            _ => Err(format!(
                "'{s}' is neither a positive integer nor a fraction in (0, 1]"
            )),
        }
    }
}

impl fmt::Display for FloatOrInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Random forest hyperparameters.
#[derive(Debug, Clone, PartialEq, Args, Serialize)]
pub struct ForestParams {
    /// Function measuring the quality of a split
    #[arg(long, value_enum, default_value_t = SplitCriterion::Gini)]
    pub criterion: SplitCriterion,

    /// How nodes are split in the tree
    #[arg(long, value_enum, default_value_t = SplitAlgorithm::Hist)]
    pub split_algorithm: SplitAlgorithm,

    /// Number of trees in the forest
    #[arg(long, default_value_t = 100)]
    pub num_trees: usize,

    /// Upper bound on features used at each split (count or fraction)
    #[arg(long)]
    pub max_features: Option<FloatOrInt>,

    /// Upper bound on the depth of constructed trees
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Minimum samples needed to split a node (count or fraction)
    #[arg(long, default_value = "2")]
    pub min_samples_split: FloatOrInt,

    /// Maximum leaf nodes per tree (-1 for unlimited)
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub max_leaf_nodes: i64,

    /// Impurity decrease needed to split a node
    #[arg(long, default_value_t = 0.0)]
    pub min_impurity_decrease: f64,

    /// Don't bootstrap samples per tree
    #[arg(long = "no-bootstrap", action = ArgAction::SetFalse)]
    pub bootstrap: bool,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            criterion: SplitCriterion::Gini,
            split_algorithm: SplitAlgorithm::Hist,
            num_trees: 100,
            max_features: None,
            max_depth: None,
            min_samples_split: FloatOrInt::Int(2),
            max_leaf_nodes: -1,
            min_impurity_decrease: 0.0,
            bootstrap: true,
        }
    }
}

/// Forest adapter bound to one training partition.
#[derive(Debug, Clone)]
pub struct ForestBench<F> {
    params: ForestParams,
    n_classes: usize,
    min_samples_split: usize,
    seed: u64,
    _float: PhantomData<F>,
}

impl<F: ModelFloat> ForestBench<F> {
    /// Derive the class count and resolve fractional options against `data`.
    pub fn prepare(params: &ForestParams, data: &Dataset<F>, seed: u64) -> Result<Self> {
        let (y_train, _) = data.labels()?;
        if params.num_trees == 0 {
            return Err(BenchError::invalid_input("--num-trees must be at least 1"));
        }
        let n_rows = data.x_train.nrows();
        let n_classes = count_classes(y_train);
        let min_samples_split = params.min_samples_split.resolve(n_rows);
        log_unsupported(params);
        tracing::debug!(n_classes, min_samples_split, "Prepared forest");
        Ok(Self {
            params: params.clone(),
            n_classes,
            min_samples_split,
            seed,
            _float: PhantomData,
        })
    }

    pub fn classes(&self) -> usize {
        self.n_classes
    }

    /// Impurity threshold as passed to linfa, which rejects values below
    /// machine epsilon.
    fn min_impurity_decrease(&self) -> Result<F> {
        let value = F::from_f64(self.params.min_impurity_decrease).ok_or_else(|| {
            BenchError::invalid_input(format!(
                "min_impurity_decrease {} out of range",
                self.params.min_impurity_decrease
            ))
        })?;
        Ok(<F as num_traits::Float>::max(
            value,
            <F as num_traits::Float>::epsilon(),
        ))
    }
}

fn log_unsupported(params: &ForestParams) {
    let defaults = ForestParams::default();
    if params.split_algorithm != defaults.split_algorithm {
        tracing::info!(
            split_algorithm = params.split_algorithm.code(),
            "linfa trees search exact splits, value recorded only"
        );
    }
    if let Some(max_features) = params.max_features {
        tracing::info!(%max_features, "linfa trees consider every feature, value recorded only");
    }
    if params.max_leaf_nodes != defaults.max_leaf_nodes {
        tracing::info!(
            max_leaf_nodes = params.max_leaf_nodes,
            "linfa trees have no leaf limit, value recorded only"
        );
    }
    if !params.bootstrap {
        tracing::warn!("linfa ensembles always bootstrap, --no-bootstrap recorded only");
    }
}

impl<F: ModelFloat> BenchAlgorithm<F> for ForestBench<F> {
    type Model = EnsembleLearner<DecisionTree<F, usize>>;

    fn name(&self) -> &'static str {
        "decision_forest_classification"
    }

    fn functions(&self) -> [&'static str; 2] {
        ["df_clsf.fit", "df_clsf.predict"]
    }

    fn accuracy_type(&self) -> AccuracyType {
        AccuracyType::AccuracyPercent
    }

    /// linfa ensembles only fit owned records, so the partition is copied per call.
    fn fit(&self, data: &Dataset<F>) -> Result<Self::Model> {
        let (y_train, _) = data.labels()?;
        let train = DatasetBase::new(data.x_train.clone(), y_train.clone());
        let tree = DecisionTree::<F, usize>::params()
            .split_quality(self.params.criterion.quality())
            .max_depth(self.params.max_depth)
            .min_weight_split(self.min_samples_split as f32)
            .min_impurity_decrease(self.min_impurity_decrease()?);
        EnsembleLearnerParams::new_fixed_rng(tree, ChaCha8Rng::seed_from_u64(self.seed))
            .ensemble_size(self.params.num_trees)
            .bootstrap_proportion(1.0)
            .fit(&train)
            .map_err(|e| BenchError::estimator(e.to_string()))
    }

    fn predict(&self, model: &Self::Model, data: &Dataset<F>) -> Result<Array1<usize>> {
        Ok(model.predict(&data.x_test))
    }

    /// Accuracy on the training partition, from an untimed predict.
    fn training_metric(&self, model: &Self::Model, data: &Dataset<F>) -> Result<f64> {
        let (y_train, _) = data.labels()?;
        let predicted: Array1<usize> = model.predict(&data.x_train);
        accuracy_percent(predicted.view(), y_train.view())
    }

    fn prediction_metric(
        &self,
        _model: &Self::Model,
        predictions: &Array1<usize>,
        data: &Dataset<F>,
    ) -> Result<f64> {
        let (_, y_test) = data.labels()?;
        accuracy_percent(predictions.view(), y_test.view())
    }

    fn parameters(&self) -> AlgorithmParameters {
        let p = &self.params;
        AlgorithmParameters::from([
            ("criterion".to_string(), json!(p.criterion.code())),
            ("split_algorithm".to_string(), json!(p.split_algorithm.code())),
            ("num_trees".to_string(), json!(p.num_trees)),
            ("max_features".to_string(), json!(p.max_features)),
            ("max_depth".to_string(), json!(p.max_depth)),
            ("min_samples_split".to_string(), json!(self.min_samples_split)),
            ("max_leaf_nodes".to_string(), json!(p.max_leaf_nodes)),
            ("min_impurity_decrease".to_string(), json!(p.min_impurity_decrease)),
            ("bootstrap".to_string(), json!(p.bootstrap)),
        ])
    }

    fn n_classes(&self) -> Option<usize> {
        Some(self.n_classes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use ndarray::{Array2, array};

    #[derive(Debug, Parser)]
    struct Cli {
        #[command(flatten)]
        forest: ForestParams,
    }

    fn parse(args: &[&str]) -> std::result::Result<ForestParams, clap::Error> {
        Cli::try_parse_from(std::iter::once("df-clsf").chain(args.iter().copied()))
            .map(|cli| cli.forest)
    }

    fn separable() -> Dataset<f64> {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| {
            let offset = if i < 20 { 0.0 } else { 10.0 };
            offset + ((i * 7 + j * 3) % 5) as f64 * 0.1
        });
        let y = Array1::from_shape_fn(40, |i| usize::from(i >= 20));
        Dataset::new(x.clone(), x, Some(y.clone()), Some(y)).unwrap()
    }

    #[test]
    fn test_defaults() {
        let params = parse(&[]).unwrap();
        assert_eq!(params, ForestParams::default());
        assert_eq!(params.num_trees, 100);
        assert!(params.bootstrap);
    }

    #[test]
    fn test_code_tables() {
        assert_eq!(parse(&["--criterion", "entropy"]).unwrap().criterion.code(), 1);
        assert_eq!(parse(&["--criterion", "gini"]).unwrap().criterion.code(), 0);
        assert!(parse(&["--criterion", "mse"]).is_err());
        let p = parse(&["--split-algorithm", "global_quantile"]).unwrap();
        assert_eq!(p.split_algorithm.code(), 1);
        assert_eq!(SplitAlgorithm::Hist.code(), 0);
    }

    #[test]
    fn test_flags() {
        let p = parse(&[
            "--no-bootstrap",
            "--max-leaf-nodes",
            "-1",
            "--max-depth",
            "4",
            "--min-samples-split",
            "0.25",
        ])
        .unwrap();
        assert!(!p.bootstrap);
        assert_eq!(p.max_depth, Some(4));
        assert_eq!(p.min_samples_split, FloatOrInt::Float(0.25));
    }

    #[test]
    fn test_float_or_int() {
        assert_eq!("3".parse::<FloatOrInt>().unwrap(), FloatOrInt::Int(3));
        assert_eq!("0.5".parse::<FloatOrInt>().unwrap(), FloatOrInt::Float(0.5));
        assert_eq!("1.0".parse::<FloatOrInt>().unwrap(), FloatOrInt::Float(1.0));
        assert!("-2".parse::<FloatOrInt>().is_err());
        assert!("0".parse::<FloatOrInt>().is_err());
        assert!("0.0".parse::<FloatOrInt>().is_err());
        assert!("1.5".parse::<FloatOrInt>().is_err());
        assert!("inf".parse::<FloatOrInt>().is_err());
        assert!("NaN".parse::<FloatOrInt>().is_err());
        assert!(parse(&["--min-samples-split", "1.5"]).is_err());
        assert!(parse(&["--max-features", "0"]).is_err());
        assert!("abc".parse::<FloatOrInt>().is_err());
        assert_eq!(FloatOrInt::Float(0.1).resolve(25), 3);
        assert_eq!(FloatOrInt::Int(7).resolve(25), 7);
        assert_eq!(serde_json::to_string(&FloatOrInt::Int(7)).unwrap(), "7");
    }

    #[test]
    fn test_prepare_counts_classes() {
        let bench = ForestBench::prepare(&ForestParams::default(), &separable(), 1).unwrap();
        assert_eq!(bench.classes(), 2);
        assert!(bench.min_impurity_decrease().unwrap() > 0.0);
    }

    #[test]
    fn test_prepare_requires_labels() {
        let x = array![[1.0, 2.0]];
        let data = Dataset::new(x.clone(), x, None, None).unwrap();
        assert!(ForestBench::prepare(&ForestParams::default(), &data, 1).is_err());
    }

    #[test]
    fn test_fit_separable_data() {
        let params = ForestParams {
            num_trees: 5,
            ..ForestParams::default()
        };
        let data = separable();
        let bench = ForestBench::prepare(&params, &data, 3).unwrap();
        let model = bench.fit(&data).unwrap();
        let predictions = bench.predict(&model, &data).unwrap();
        let acc = bench.prediction_metric(&model, &predictions, &data).unwrap();
        assert!(acc > 90.0, "accuracy {acc}");
        assert!(bench.training_metric(&model, &data).unwrap() > 90.0);
    }

    #[test]
    fn test_fit_uses_the_given_partition() {
        let params = ForestParams {
            num_trees: 5,
            ..ForestParams::default()
        };
        let data = separable();
        let bench = ForestBench::prepare(&params, &data, 3).unwrap();

        let flipped_y = data.y_train.as_ref().unwrap().mapv(|label| 1 - label);
        let flipped = Dataset::new(
            data.x_train.clone(),
            data.x_test.clone(),
            Some(flipped_y.clone()),
            Some(flipped_y),
        )
        .unwrap();
        let model = bench.fit(&flipped).unwrap();
        let predictions = bench.predict(&model, &flipped).unwrap();
        let acc = bench.prediction_metric(&model, &predictions, &flipped).unwrap();
        assert!(acc > 90.0, "accuracy {acc}");
        assert!(bench.prediction_metric(&model, &predictions, &data).unwrap() < 10.0);
    }

    #[test]
    fn test_parameters_use_codes() {
        let params = ForestParams {
            criterion: SplitCriterion::Entropy,
            ..ForestParams::default()
        };
        let bench = ForestBench::prepare(&params, &separable(), 1).unwrap();
        let recorded = BenchAlgorithm::<f64>::parameters(&bench);
        assert_eq!(recorded["criterion"], json!(1));
        assert_eq!(recorded["max_depth"], json!(null));
        assert_eq!(recorded["min_samples_split"], json!(2));
    }
}
