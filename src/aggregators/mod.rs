//! Aggregation of per-partner model snapshots.
//!
//! Every policy reduces to a weighted element-wise mean
//! ([`weighted_average`]); policies only differ in how weights are chosen:
//!
//! | Weighting | Weight of partner *i* |
//! |-----------|----------------------|
//! | [`AggregationWeighting::Uniform`] | `1 / n` |
//! | [`AggregationWeighting::DataVolume`] | `volume_i / Σ volume_j` |
//! | [`AggregationWeighting::LocalScore`] | `score_i / Σ score_j` (last local validation accuracy) |

pub mod fedavg;

pub use fedavg::{fedavg, weighted_average};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MplcError, Result};
use crate::snapshot::ParamSnapshot;

/// How partner snapshots are weighted during aggregation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggregationWeighting {
    /// Equal weights
    Uniform,
    /// Proportional to the number of training samples
    #[default]
    #[serde(alias = "data_volume")]
    DataVolume,
    /// Proportional to the latest local validation accuracy
    #[serde(alias = "local_score")]
    LocalScore,
}

impl AggregationWeighting {
    /// Normalized weights for partners with the given data volumes and local scores.
    ///
    /// `local_scores` is only read by [`AggregationWeighting::LocalScore`]; when
    /// every score is zero the weighting falls back to uniform.
    pub fn weights(&self, data_volumes: &[usize], local_scores: &[f64]) -> Result<Vec<f64>> {
        let n = data_volumes.len();
        if n == 0 {
            return Err(MplcError::EmptyInput);
        }

        let raw: Vec<f64> = match self {
            AggregationWeighting::Uniform => vec![1.0; n],
            AggregationWeighting::DataVolume => {
                data_volumes.iter().map(|&v| v as f64).collect()
            }
            AggregationWeighting::LocalScore => {
                if local_scores.len() != n {
                    return Err(MplcError::CountMismatch {
                        expected: n,
                        actual: local_scores.len(),
                    });
                }
                local_scores.iter().map(|s| s.max(0.0)).collect()
            }
        };

        let total: f64 = raw.iter().sum();
        if total <= 0.0 {
            if *self == AggregationWeighting::DataVolume {
                return Err(MplcError::Configuration(
                    "data-volume weighting over partners without training data".to_string(),
                ));
            }
            log::warn!("all local scores are zero, falling back to uniform weights");
            return Ok(vec![1.0 / n as f64; n]);
        }
        Ok(raw.into_iter().map(|w| w / total).collect())
    }
}

impl FromStr for AggregationWeighting {
    type Err = MplcError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "uniform" => Ok(AggregationWeighting::Uniform),
            "data-volume" | "data_volume" => Ok(AggregationWeighting::DataVolume),
            "local-score" | "local_score" => Ok(AggregationWeighting::LocalScore),
            other => Err(MplcError::UnknownWeighting(other.to_string())),
        }
    }
}

impl fmt::Display for AggregationWeighting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregationWeighting::Uniform => "uniform",
            AggregationWeighting::DataVolume => "data-volume",
            AggregationWeighting::LocalScore => "local-score",
        };
        f.write_str(name)
    }
}

/// Aggregation step bound to one weighting policy.
///
/// # Example
///
/// ```rust
/// use mplc::aggregators::{AggregationWeighting, Aggregator};
/// use mplc::ParamSnapshot;
///
/// let agg = Aggregator::new(AggregationWeighting::DataVolume);
/// let snapshots = vec![
///     ParamSnapshot::filled(&[vec![3]], 1.0),
///     ParamSnapshot::filled(&[vec![3]], 2.0),
///     ParamSnapshot::filled(&[vec![3]], 3.0),
/// ];
///
/// let result = agg.aggregate(&snapshots, &[100, 200, 300], &[]).unwrap();
/// assert!((result.tensors()[0][[0]] - 7.0 / 3.0).abs() < 1e-5);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregator {
    weighting: AggregationWeighting,
}

impl Aggregator {
    /// Create an aggregator using `weighting`.
    pub fn new(weighting: AggregationWeighting) -> Self {
        Self { weighting }
    }

    /// The weighting policy in use.
    pub fn weighting(&self) -> AggregationWeighting {
        self.weighting
    }

    /// Aggregate snapshots, one per partner, aligned with `data_volumes` and `local_scores`.
    pub fn aggregate(
        &self,
        snapshots: &[ParamSnapshot],
        data_volumes: &[usize],
        local_scores: &[f64],
    ) -> Result<ParamSnapshot> {
        if snapshots.is_empty() {
            return Err(MplcError::EmptyInput);
        }
        if data_volumes.len() != snapshots.len() {
            return Err(MplcError::CountMismatch {
                expected: snapshots.len(),
                actual: data_volumes.len(),
            });
        }
        let weights = self.weighting.weights(data_volumes, local_scores)?;
        weighted_average(snapshots, &weights)
    }
}
