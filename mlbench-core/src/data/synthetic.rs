//! Seeded Gaussian blob generator.

use crate::data::Dataset;
use crate::dtype::BenchFloat;
use crate::error::{BenchError, Result};
use crate::params::SyntheticParams;
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal, Uniform};

/// Half-width of the box blob centers are drawn from.
const CENTER_BOX: f64 = 10.0;

/// Generate labelled blobs for both partitions from one RNG stream.
pub fn blobs<F: BenchFloat>(params: &SyntheticParams, seed: u64) -> Result<Dataset<F>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let centers = Array2::from_shape_simple_fn((params.classes, params.features), || {
        Uniform::new(-CENTER_BOX, CENTER_BOX).sample(&mut rng)
    });
    let noise = Normal::new(0.0, params.spread)
        .map_err(|e| BenchError::config(format!("invalid blob spread: {e}")))?;

    let (x_train, y_train) = sample(&centers, &noise, params.train_rows, &mut rng)?;
    let (x_test, y_test) = sample(&centers, &noise, params.test_rows, &mut rng)?;
    Dataset::new(x_train, x_test, Some(y_train), Some(y_test))
}

fn sample<F: BenchFloat>(
    centers: &Array2<f64>,
    noise: &Normal<f64>,
    rows: usize,
    rng: &mut ChaCha8Rng,
) -> Result<(Array2<F>, Array1<usize>)> {
    let (classes, features) = centers.dim();
    let mut x = Array2::<F>::zeros((rows, features));
    let mut y = Array1::<usize>::zeros(rows);
    for (i, mut row) in x.rows_mut().into_iter().enumerate() {
        let label = rng.gen_range(0..classes);
        y[i] = label;
        for (j, value) in row.iter_mut().enumerate() {
            let v = centers[[label, j]] + noise.sample(rng);
            *value = F::from_f64(v)
                .ok_or_else(|| BenchError::data(format!("{v} does not fit {}", F::DTYPE)))?;
        }
    }
    Ok((x, y))
}
