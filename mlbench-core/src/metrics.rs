//! Quality metrics attached to report rows.

use crate::error::{BenchError, Result};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Metric family of an algorithm. Fixed per algorithm, shared by all its rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccuracyType {
    /// Sum of squared distances to the nearest centroid; lower is better.
    #[serde(rename = "inertia")]
    Inertia,
    /// Percentage of exactly matching labels.
    #[serde(rename = "accuracy[%]")]
    AccuracyPercent,
}

impl AccuracyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inertia => "inertia",
            Self::AccuracyPercent => "accuracy[%]",
        }
    }

    /// Check `value` lies in the metric's domain and return it.
    pub fn validate(&self, value: f64) -> Result<f64> {
        let ok = match self {
            Self::Inertia => value.is_finite() && value >= 0.0,
            Self::AccuracyPercent => (0.0..=100.0).contains(&value),
        };
        if ok {
            Ok(value)
        } else {
            Err(BenchError::metric(format!("{} out of range: {value}", self.as_str())))
        }
    }
}

impl fmt::Display for AccuracyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fraction of positions where `predicted` equals `truth`.
pub fn accuracy_score(predicted: ArrayView1<usize>, truth: ArrayView1<usize>) -> Result<f64> {
    if predicted.len() != truth.len() {
        return Err(BenchError::metric(format!(
            "{} predictions for {} labels",
            predicted.len(),
            truth.len()
        )));
    }
    if truth.is_empty() {
        return Err(BenchError::metric("accuracy of an empty partition"));
    }
    let hits = predicted
        .iter()
        .zip(truth.iter())
        .filter(|(p, t)| p == t)
        .count();
    Ok(hits as f64 / truth.len() as f64)
}

/// `accuracy_score` scaled to percent.
pub fn accuracy_percent(predicted: ArrayView1<usize>, truth: ArrayView1<usize>) -> Result<f64> {
    AccuracyType::AccuracyPercent.validate(100.0 * accuracy_score(predicted, truth)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_accuracy_percent() {
        let pred = array![0usize, 1, 2, 1];
        let truth = array![0usize, 1, 1, 1];
        assert_eq!(accuracy_percent(pred.view(), truth.view()).unwrap(), 75.0);
    }

    #[test]
    fn test_accuracy_length_mismatch() {
        let pred = array![0usize, 1];
        let truth = array![0usize];
        assert!(accuracy_score(pred.view(), truth.view()).is_err());
    }

    #[test]
    fn test_metric_domains() {
        assert!(AccuracyType::Inertia.validate(0.0).is_ok());
        assert!(AccuracyType::Inertia.validate(-1.0).is_err());
        assert!(AccuracyType::Inertia.validate(f64::INFINITY).is_err());
        assert!(AccuracyType::AccuracyPercent.validate(100.0).is_ok());
        assert!(AccuracyType::AccuracyPercent.validate(100.5).is_err());
        assert!(AccuracyType::AccuracyPercent.validate(f64::NAN).is_err());
    }

    #[test]
    fn test_labels() {
        assert_eq!(AccuracyType::AccuracyPercent.to_string(), "accuracy[%]");
        assert_eq!(
            serde_json::to_string(&AccuracyType::Inertia).unwrap(),
            "\"inertia\""
        );
    }
}
