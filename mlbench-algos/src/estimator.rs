//! The estimator seam and the fit/predict benchmark sequence.

use mlbench_core::timing::{LoopPolicy, measure};
use mlbench_core::{
    AccuracyType, AlgorithmParameters, BenchFloat, BenchParams, Dataset, Report, ReportInput,
    Result, Stage,
};
use ndarray::Array1;

/// Element types both the loaders and `linfa` accept.
pub trait ModelFloat: BenchFloat + linfa::Float {}

impl<T: BenchFloat + linfa::Float> ModelFloat for T {}

/// An algorithm that can be timed by [`run_benchmark`].
///
/// `fit` borrows the adapter and returns a fresh model, so repeated calls are
/// independent; `predict` borrows that model.
pub trait BenchAlgorithm<F: ModelFloat> {
    type Model;

    /// Algorithm label of the report.
    fn name(&self) -> &'static str;

    /// Function labels of the training and prediction rows.
    fn functions(&self) -> [&'static str; 2];

    fn accuracy_type(&self) -> AccuracyType;

    fn fit(&self, data: &Dataset<F>) -> Result<Self::Model>;

    fn predict(&self, model: &Self::Model, data: &Dataset<F>) -> Result<Array1<usize>>;

    /// Metric of the training row, computed after the timed fit.
    fn training_metric(&self, model: &Self::Model, data: &Dataset<F>) -> Result<f64>;

    /// Metric of the prediction row, given the timed predict's output.
    fn prediction_metric(
        &self,
        model: &Self::Model,
        predictions: &Array1<usize>,
        data: &Dataset<F>,
    ) -> Result<f64>;

    /// Hyperparameters as passed to the estimator.
    fn parameters(&self) -> AlgorithmParameters;

    fn n_classes(&self) -> Option<usize> {
        None
    }

    fn n_clusters(&self) -> Option<usize> {
        None
    }
}

/// Time fit on the training partition and predict on the test partition,
/// then assemble the two-row report.
pub fn run_benchmark<F, A>(algorithm: &A, params: &BenchParams, data: &Dataset<F>) -> Result<Report>
where
    F: ModelFloat,
    A: BenchAlgorithm<F>,
{
    let fit_policy = LoopPolicy::for_stage(&params.timing, Stage::Training);
    tracing::debug!(algorithm = algorithm.name(), policy = ?fit_policy, "Timing fit");
    let fit = measure(&fit_policy, || algorithm.fit(data))?;
    let fit_secs = fit.secs();
    tracing::info!(
        algorithm = algorithm.name(),
        secs = fit_secs,
        calls = fit.samples.len(),
        "Fit finished"
    );
    let model = fit.value;
    let train_metric = algorithm.training_metric(&model, data)?;

    let predict_policy = LoopPolicy::for_stage(&params.timing, Stage::Prediction);
    tracing::debug!(algorithm = algorithm.name(), policy = ?predict_policy, "Timing predict");
    let predict = measure(&predict_policy, || algorithm.predict(&model, data))?;
    let test_metric = algorithm.prediction_metric(&model, &predict.value, data)?;
    tracing::info!(
        algorithm = algorithm.name(),
        secs = predict.elapsed.as_secs_f64(),
        calls = predict.samples.len(),
        "Predict finished"
    );

    let library = params.run.prefix.as_str();
    let functions = algorithm.functions();
    Report::build(ReportInput {
        library,
        algorithm: algorithm.name(),
        params,
        stages: &Stage::ALL,
        functions: &functions,
        times: &[fit_secs, predict.secs()],
        accuracy_type: algorithm.accuracy_type(),
        accuracies: &[train_metric, test_metric],
        shapes: &[data.x_train.dim(), data.x_test.dim()],
        dataset_name: data.name.as_deref(),
        algorithm_parameters: algorithm.parameters(),
        classes: algorithm.n_classes(),
        n_clusters: algorithm.n_clusters(),
    })
}
