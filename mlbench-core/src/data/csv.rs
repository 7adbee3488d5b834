//! CSV reading. A first row that does not parse as numbers is taken as a header.

use crate::dtype::BenchFloat;
use crate::error::{BenchError, Result};
use ndarray::{Array1, Array2};
use std::path::Path;

fn reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    Ok(csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)?)
}

fn parse_row<F: BenchFloat>(record: &csv::StringRecord) -> Option<Vec<F>> {
    record.iter().map(|field| field.parse::<F>().ok()).collect()
}

/// Read a numeric matrix, one sample per line.
pub fn read_matrix<F: BenchFloat>(path: &Path) -> Result<Array2<F>> {
    let mut values = Vec::new();
    let mut n_cols = 0;
    let mut n_rows = 0;

    for (line, record) in reader(path)?.records().enumerate() {
        let record = record?;
        let Some(row) = parse_row::<F>(&record) else {
            if line == 0 {
                tracing::debug!(path = %path.display(), "Skipping CSV header row");
                continue;
            }
            return Err(BenchError::data(format!(
                "{}: non-numeric value on line {}",
                path.display(),
                line + 1
            )));
        };
        if n_rows == 0 {
            n_cols = row.len();
        }
        values.extend(row);
        n_rows += 1;
    }

    if n_rows == 0 {
        return Err(BenchError::data(format!("{} has no data rows", path.display())));
    }
    Array2::from_shape_vec((n_rows, n_cols), values)
        .map_err(|e| BenchError::data(format!("{}: {e}", path.display())))
}

/// Read labels from the first column.
pub fn read_labels(path: &Path) -> Result<Array1<usize>> {
    let mut labels = Vec::new();
    for (line, record) in reader(path)?.records().enumerate() {
        let record = record?;
        let field = record.get(0).unwrap_or_default();
        match field.parse::<f64>() {
            Ok(v) if v >= 0.0 && v.fract() == 0.0 => labels.push(v as usize),
            Ok(_) => {
                return Err(BenchError::data(format!(
                    "{}: label '{field}' on line {} is not a non-negative integer",
                    path.display(),
                    line + 1
                )));
            }
            Err(_) if line == 0 => continue,
            Err(_) => {
                return Err(BenchError::data(format!(
                    "{}: non-numeric label on line {}",
                    path.display(),
                    line + 1
                )));
            }
        }
    }
    Ok(Array1::from(labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::TempDir;

    #[test]
    fn test_header_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.csv");
        std::fs::write(&path, "a,b\n1,2\n3.5, 4\n").unwrap();
        let m: Array2<f64> = read_matrix(&path).unwrap();
        assert_eq!(m, array![[1.0, 2.0], [3.5, 4.0]]);
    }

    #[test]
    fn test_ragged_rows_fail() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.csv");
        std::fs::write(&path, "1,2\n3\n").unwrap();
        assert!(read_matrix::<f32>(&path).is_err());
    }

    #[test]
    fn test_non_numeric_body_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.csv");
        std::fs::write(&path, "1,2\n3,x\n").unwrap();
        assert!(read_matrix::<f64>(&path).is_err());
    }

    #[test]
    fn test_labels_first_column() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("y.csv");
        std::fs::write(&path, "label,weight\n1,0.5\n0,0.1\n2.0,1\n").unwrap();
        assert_eq!(read_labels(&path).unwrap(), array![1usize, 0, 2]);

        std::fs::write(&path, "1\n-1\n").unwrap();
        assert!(read_labels(&path).is_err());
    }
}
