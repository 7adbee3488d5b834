//! Train/test data loading.
//!
//! Features come from `.npy` or `.csv` files, or from the seeded blob generator
//! when no training file is configured. A missing test file reuses the training
//! partition.

pub mod csv;
pub mod npy;
pub mod synthetic;

use crate::dtype::{BenchFloat, DType};
use crate::error::{BenchError, Result};
use crate::params::DataParams;
use ndarray::{Array1, Array2};
use std::collections::BTreeSet;
use std::path::Path;

/// Supported on-disk formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Npy,
    Csv,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("npy") => Ok(Self::Npy),
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Ok(Self::Csv),
            _ => Err(BenchError::data(format!(
                "unsupported data file '{}' (expected .npy or .csv)",
                path.display()
            ))),
        }
    }
}

/// Read a feature matrix in the run precision.
pub fn read_features<F: BenchFloat>(path: &Path) -> Result<Array2<F>> {
    match FileFormat::from_path(path)? {
        FileFormat::Npy => npy::read_matrix(path),
        FileFormat::Csv => csv::read_matrix(path),
    }
}

/// Read an integer label vector.
pub fn read_labels(path: &Path) -> Result<Array1<usize>> {
    match FileFormat::from_path(path)? {
        FileFormat::Npy => npy::read_labels(path),
        FileFormat::Csv => csv::read_labels(path),
    }
}

/// Train/test partitions of one run.
#[derive(Debug, Clone)]
pub struct Dataset<F> {
    pub x_train: Array2<F>,
    pub x_test: Array2<F>,
    pub y_train: Option<Array1<usize>>,
    pub y_test: Option<Array1<usize>>,
    pub name: Option<String>,
}

impl<F: BenchFloat> Dataset<F> {
    /// Assemble a dataset, checking the partitions agree on shape.
    pub fn new(
        x_train: Array2<F>,
        x_test: Array2<F>,
        y_train: Option<Array1<usize>>,
        y_test: Option<Array1<usize>>,
    ) -> Result<Self> {
        if x_train.nrows() == 0 {
            return Err(BenchError::data("training partition has no rows"));
        }
        if x_train.ncols() != x_test.ncols() {
            return Err(BenchError::data(format!(
                "feature count mismatch: train has {}, test has {}",
                x_train.ncols(),
                x_test.ncols()
            )));
        }
        check_label_len("train", &x_train, y_train.as_ref())?;
        check_label_len("test", &x_test, y_test.as_ref())?;
        Ok(Self {
            x_train,
            x_test,
            y_train,
            y_test,
            name: None,
        })
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn dtype(&self) -> DType {
        F::DTYPE
    }

    pub fn n_features(&self) -> usize {
        self.x_train.ncols()
    }

    /// `"<rows>x<cols>"` of the training partition.
    pub fn size_label(&self) -> String {
        format!("{}x{}", self.x_train.nrows(), self.x_train.ncols())
    }

    /// Labels of both partitions, for supervised algorithms.
    pub fn labels(&self) -> Result<(&Array1<usize>, &Array1<usize>)> {
        match (&self.y_train, &self.y_test) {
            (Some(train), Some(test)) => Ok((train, test)),
            _ => Err(BenchError::data(
                "this algorithm needs labels for both train and test partitions",
            )),
        }
    }
}

fn check_label_len<F>(part: &str, x: &Array2<F>, y: Option<&Array1<usize>>) -> Result<()> {
    match y {
        Some(y) if y.len() != x.nrows() => Err(BenchError::data(format!(
            "{part} partition has {} rows but {} labels",
            x.nrows(),
            y.len()
        ))),
        _ => Ok(()),
    }
}

/// Number of distinct label values.
pub fn count_classes(labels: &Array1<usize>) -> usize {
    labels.iter().collect::<BTreeSet<_>>().len()
}

/// Load the partitions described by `params`.
///
/// `seed` drives the synthetic generator; `with_labels` makes missing label
/// files an error instead of leaving the labels empty.
pub fn load_data<F: BenchFloat>(
    params: &DataParams,
    seed: u64,
    with_labels: bool,
) -> Result<Dataset<F>> {
    let Some(train_path) = params.file_x_train.as_deref() else {
        tracing::info!(
            rows = params.synthetic.train_rows,
            features = params.synthetic.features,
            classes = params.synthetic.classes,
            seed,
            "No training file given, generating synthetic blobs"
        );
        let name = params
            .dataset_name
            .clone()
            .or_else(|| Some("synthetic_blobs".to_string()));
        return Ok(synthetic::blobs::<F>(&params.synthetic, seed)?.with_name(name));
    };

    let x_train: Array2<F> = read_features(train_path)?;
    let x_test: Array2<F> = match params.file_x_test.as_deref() {
        Some(path) => read_features(path)?,
        None => {
            tracing::debug!("No test features given, reusing the training partition");
            x_train.clone()
        }
    };

    let y_train = params.file_y_train.as_deref().map(read_labels).transpose()?;
    let y_test = match (params.file_y_test.as_deref(), &y_train) {
        (Some(path), _) => Some(read_labels(path)?),
        (None, Some(y)) if params.file_x_test.is_none() => Some(y.clone()),
        _ => None,
    };
    if with_labels && (y_train.is_none() || y_test.is_none()) {
        return Err(BenchError::data(
            "label files are required: pass --file-y-train (and --file-y-test with --file-x-test)",
        ));
    }

    let dataset = Dataset::new(x_train, x_test, y_train, y_test)?;
    tracing::info!(
        train = %dataset.size_label(),
        test_rows = dataset.x_test.nrows(),
        dtype = %F::DTYPE,
        "Loaded dataset"
    );
    Ok(dataset.with_name(params.dataset_name.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            FileFormat::from_path(Path::new("a/x.NPY")).unwrap(),
            FileFormat::Npy
        );
        assert_eq!(FileFormat::from_path(Path::new("x.csv")).unwrap(), FileFormat::Csv);
        assert!(FileFormat::from_path(Path::new("x.parquet")).is_err());
    }

    #[test]
    fn test_dataset_shape_checks() {
        let x = array![[1.0f64, 2.0], [3.0, 4.0]];
        let wide = array![[1.0f64, 2.0, 3.0]];
        assert!(Dataset::new(x.clone(), wide, None, None).is_err());
        assert!(Dataset::new(x.clone(), x.clone(), Some(array![0, 1, 1]), None).is_err());
        let ds = Dataset::new(x.clone(), x, Some(array![0, 1]), Some(array![1, 0])).unwrap();
        assert_eq!(ds.size_label(), "2x2");
        assert_eq!(ds.dtype(), DType::F64);
    }

    #[test]
    fn test_count_classes() {
        assert_eq!(count_classes(&array![3, 1, 3, 0, 1]), 3);
    }

    #[test]
    fn test_load_without_test_file_reuses_train() {
        let dir = TempDir::new().unwrap();
        let x_path = dir.path().join("x.csv");
        let y_path = dir.path().join("y.csv");
        std::fs::write(&x_path, "1.0,2.0\n3.0,4.0\n5.0,6.0\n").unwrap();
        std::fs::write(&y_path, "0\n1\n0\n").unwrap();

        let params = DataParams {
            file_x_train: Some(x_path),
            file_y_train: Some(y_path),
            ..DataParams::default()
        };
        let ds: Dataset<f32> = load_data(&params, 1, true).unwrap();
        assert_eq!(ds.x_test, ds.x_train);
        assert_eq!(ds.y_test, ds.y_train);
    }

    #[test]
    fn test_missing_labels_is_an_error_when_required() {
        let dir = TempDir::new().unwrap();
        let x_path = dir.path().join("x.csv");
        std::fs::write(&x_path, "1.0,2.0\n").unwrap();
        let params = DataParams {
            file_x_train: Some(x_path),
            ..DataParams::default()
        };
        assert!(load_data::<f64>(&params, 1, true).is_err());
        assert!(load_data::<f64>(&params, 1, false).is_ok());
    }

    #[test]
    fn test_missing_file_propagates() {
        let params = DataParams {
            file_x_train: Some(PathBuf::from("/nonexistent/x.npy")),
            ..DataParams::default()
        };
        assert!(load_data::<f64>(&params, 1, false).is_err());
    }
}
