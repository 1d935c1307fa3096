//! Trainable model abstraction.
//!
//! The learning engine never looks inside a model: it only asks for fresh
//! parameters, one local training pass, and an evaluation. Parameters travel
//! as [`ParamSnapshot`]s so that they can be aggregated between passes.

pub mod softmax;

pub use softmax::SoftmaxRegression;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::dataset::DataSlice;
use crate::error::Result;
use crate::snapshot::ParamSnapshot;

/// Loss and accuracy measured on one data slice.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Mean loss over the slice
    pub loss: f64,
    /// Fraction of correctly classified samples
    pub accuracy: f64,
}

/// Metrics reported by one local training pass.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PassMetrics {
    /// Metrics on the partner's training slice after the pass
    pub train: Metrics,
    /// Metrics on the partner's validation slice, if it has one
    pub val: Option<Metrics>,
}

impl PassMetrics {
    /// Validation accuracy, falling back to training accuracy.
    pub fn score(&self) -> f64 {
        self.val.map_or(self.train.accuracy, |m| m.accuracy)
    }
}

/// Opaque trainable model used by the learning engine.
///
/// Implementations must be stateless with respect to parameters: every
/// call receives the snapshot it works on, so the same model can serve
/// several partners concurrently.
pub trait TrainableModel: Sync {
    /// Produce freshly initialised parameters.
    fn init_params(&self, rng: &mut dyn RngCore) -> Result<ParamSnapshot>;

    /// Run exactly one local pass over `train` starting from `params`.
    fn train_one_pass(
        &self,
        params: ParamSnapshot,
        train: &DataSlice,
        val: &DataSlice,
        batch_size: usize,
    ) -> Result<(ParamSnapshot, PassMetrics)>;

    /// Evaluate `params` on `data`.
    fn evaluate(&self, params: &ParamSnapshot, data: &DataSlice) -> Result<Metrics>;
}
