//! `.npy` reading and writing.
//!
//! Feature files may be stored in any float or integer dtype; they are cast to
//! the run precision. Label files must hold non-negative integral values.

use crate::dtype::BenchFloat;
use crate::error::{BenchError, Result};
use ndarray::{Array1, Array2, ArrayBase, Data, Dimension};
use ndarray_npy::{ReadNpyError, ReadableElement, read_npy, write_npy};
use num_traits::{NumCast, ToPrimitive};
use std::path::Path;

/// Read `path` as `A`, returning `Ok(None)` if the stored dtype or ndim differs.
fn try_read<A: ndarray_npy::ReadNpyExt>(path: &Path) -> Result<Option<A>> {
    match read_npy::<_, A>(path) {
        Ok(array) => Ok(Some(array)),
        Err(ReadNpyError::WrongDescriptor(_) | ReadNpyError::WrongNdim(..)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn cast_array<S, T, F, D>(array: &ArrayBase<S, D>) -> Option<ndarray::Array<F, D>>
where
    S: Data<Elem = T>,
    T: ToPrimitive + Copy,
    F: NumCast,
    D: Dimension,
{
    let values: Option<Vec<F>> = array.iter().map(|&v| <F as NumCast>::from(v)).collect();
    ndarray::Array::from_shape_vec(array.raw_dim(), values?).ok()
}

fn read_matrix_as<T, F>(path: &Path) -> Result<Option<Array2<F>>>
where
    T: ReadableElement + ToPrimitive + Copy,
    F: BenchFloat,
{
    match try_read::<Array2<T>>(path)? {
        Some(raw) => cast_array::<_, T, F, _>(&raw).map(Some).ok_or_else(|| {
            BenchError::data(format!(
                "values in {} do not fit {}",
                path.display(),
                F::DTYPE
            ))
        }),
        None => Ok(None),
    }
}

/// Read a 2-D array and cast it to `F`.
pub fn read_matrix<F: BenchFloat>(path: &Path) -> Result<Array2<F>> {
    if let Some(m) = try_read::<Array2<F>>(path)? {
        return Ok(m);
    }
    if let Some(m) = read_matrix_as::<f64, F>(path)? {
        return Ok(m);
    }
    if let Some(m) = read_matrix_as::<f32, F>(path)? {
        return Ok(m);
    }
    if let Some(m) = read_matrix_as::<i64, F>(path)? {
        return Ok(m);
    }
    if let Some(m) = read_matrix_as::<i32, F>(path)? {
        return Ok(m);
    }
    Err(BenchError::data(format!(
        "{} is not a float or integer matrix",
        path.display()
    )))
}

fn labels_from_floats<T>(values: &Array1<T>, path: &Path) -> Result<Array1<usize>>
where
    T: num_traits::Float,
{
    let mut out = Vec::with_capacity(values.len());
    for &v in values {
        if v.fract() != T::zero() || v < T::zero() {
            return Err(BenchError::data(format!(
                "{} holds a non-integral or negative label",
                path.display()
            )));
        }
        out.push(v.to_usize().ok_or_else(|| {
            BenchError::data(format!("label out of range in {}", path.display()))
        })?);
    }
    Ok(Array1::from(out))
}

fn labels_from_ints<T>(values: &Array1<T>, path: &Path) -> Result<Array1<usize>>
where
    T: ToPrimitive + Copy,
{
    let cast: Option<Array1<usize>> = cast_array(values);
    cast.ok_or_else(|| BenchError::data(format!("{} holds a negative label", path.display())))
}

/// Read a 1-D label array. Column vectors of shape `(n, 1)` are accepted too.
pub fn read_labels(path: &Path) -> Result<Array1<usize>> {
    if let Some(v) = try_read::<Array1<i64>>(path)? {
        return labels_from_ints(&v, path);
    }
    if let Some(v) = try_read::<Array1<i32>>(path)? {
        return labels_from_ints(&v, path);
    }
    if let Some(v) = try_read::<Array1<f64>>(path)? {
        return labels_from_floats(&v, path);
    }
    if let Some(v) = try_read::<Array1<f32>>(path)? {
        return labels_from_floats(&v, path);
    }
    match read_npy::<_, Array2<i64>>(path) {
        Ok(column) if column.ncols() == 1 => {
            labels_from_ints(&column.column(0).to_owned(), path)
        }
        _ => Err(BenchError::data(format!(
            "{} is not an integer label vector",
            path.display()
        ))),
    }
}

pub fn write_matrix<F: BenchFloat>(path: &Path, matrix: &Array2<F>) -> Result<()> {
    write_npy(path, matrix)?;
    Ok(())
}

/// Labels are stored as `int64`, the default integer dtype of numpy.
pub fn write_labels(path: &Path, labels: &Array1<usize>) -> Result<()> {
    let stored: Array1<i64> = labels.mapv(|v| v as i64);
    write_npy(path, &stored)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use tempfile::TempDir;

    #[test]
    fn test_float64_file_read_as_float32() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.npy");
        write_npy(&path, &array![[1.5f64, -2.0], [0.25, 8.0]]).unwrap();

        let m: Array2<f32> = read_matrix(&path).unwrap();
        assert_eq!(m, array![[1.5f32, -2.0], [0.25, 8.0]]);
    }

    #[test]
    fn test_integer_matrix_is_cast() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.npy");
        write_npy(&path, &array![[1i64, 2], [3, 4]]).unwrap();

        let m: Array2<f64> = read_matrix(&path).unwrap();
        assert_eq!(m, array![[1.0, 2.0], [3.0, 4.0]]);
    }

    #[test]
    fn test_labels_from_integral_floats() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("y.npy");
        write_npy(&path, &array![0.0f64, 2.0, 1.0]).unwrap();
        assert_eq!(read_labels(&path).unwrap(), array![0usize, 2, 1]);

        write_npy(&path, &array![0.5f64, 1.0]).unwrap();
        assert!(read_labels(&path).is_err());
    }

    #[test]
    fn test_negative_int_labels_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("y.npy");
        write_npy(&path, &array![1i64, -1]).unwrap();
        assert!(read_labels(&path).is_err());
    }

    #[test]
    fn test_written_labels_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("y.npy");
        write_labels(&path, &array![2usize, 0, 1]).unwrap();
        assert_eq!(read_labels(&path).unwrap(), array![2usize, 0, 1]);
    }
}
