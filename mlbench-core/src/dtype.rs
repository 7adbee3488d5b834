//! Numeric precision of a benchmark run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Floating point precision used for features, centroids and the estimator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    #[serde(rename = "float32")]
    F32,
    #[default]
    #[serde(rename = "float64")]
    F64,
}

impl DType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::F32 => "float32",
            Self::F64 => "float64",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "float32" | "f32" => Ok(Self::F32),
            "float64" | "f64" => Ok(Self::F64),
            other => Err(format!(
                "unknown dtype '{other}' (expected float32 or float64)"
            )),
        }
    }
}

/// Element types a run can be instantiated with.
pub trait BenchFloat:
    num_traits::Float
    + num_traits::FromPrimitive
    + ndarray_npy::ReadableElement
    + ndarray_npy::WritableElement
    + FromStr
    + fmt::Debug
    + fmt::Display
    + Send
    + Sync
    + 'static
{
    const DTYPE: DType;
}

impl BenchFloat for f32 {
    const DTYPE: DType = DType::F32;
}

impl BenchFloat for f64 {
    const DTYPE: DType = DType::F64;
}
