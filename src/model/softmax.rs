//! Multinomial logistic regression trained by mini-batch SGD.
//!
//! Parameters are `[W: (d, k), b: (k)]`. A pass walks the training slice
//! in row order, one gradient step per mini-batch.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, Ix1, Ix2};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use super::{Metrics, PassMetrics, TrainableModel};
use crate::dataset::DataSlice;
use crate::error::{MplcError, Result};
use crate::snapshot::ParamSnapshot;

const LOG_EPSILON: f32 = 1e-7;

/// Linear softmax classifier.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SoftmaxRegression {
    /// Feature width `d`
    pub input_dim: usize,
    /// Number of classes `k`
    pub class_count: usize,
    /// SGD step size
    pub learning_rate: f32,
    /// Initial weights are drawn uniformly from `[-init_scale, init_scale]`
    pub init_scale: f32,
}

impl SoftmaxRegression {
    /// Create a classifier with default step size 0.5 and init scale 0.01.
    pub fn new(input_dim: usize, class_count: usize) -> Self {
        Self {
            input_dim,
            class_count,
            learning_rate: 0.5,
            init_scale: 0.01,
        }
    }

    /// Override the learning rate.
    pub fn with_learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    fn view_params<'a>(
        &self,
        params: &'a ParamSnapshot,
    ) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        let tensors = params.tensors();
        if tensors.len() != 2 {
            return Err(MplcError::CountMismatch {
                expected: 2,
                actual: tensors.len(),
            });
        }
        let w = tensors[0].view().into_dimensionality::<Ix2>()?;
        let b = tensors[1].view().into_dimensionality::<Ix1>()?;
        if w.dim() != (self.input_dim, self.class_count) || b.len() != self.class_count {
            return Err(MplcError::ShapeMismatch {
                index: 0,
                expected: vec![self.input_dim, self.class_count],
                actual: w.shape().to_vec(),
            });
        }
        Ok((w, b))
    }

    fn check_data(&self, data: &DataSlice) -> Result<()> {
        if data.feature_dim() != self.input_dim || data.class_count() != self.class_count {
            return Err(MplcError::compute(
                "softmax regression",
                format!(
                    "data is ({}, {}) wide, model expects ({}, {})",
                    data.feature_dim(),
                    data.class_count(),
                    self.input_dim,
                    self.class_count
                ),
            ));
        }
        Ok(())
    }

    fn probabilities(
        features: ArrayView2<f32>,
        w: ArrayView2<f32>,
        b: ArrayView1<f32>,
    ) -> Array2<f32> {
        let mut z = features.dot(&w) + &b;
        for mut row in z.axis_iter_mut(Axis(0)) {
            let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
            row.mapv_inplace(|v| (v - max).exp());
            let sum = row.sum();
            row.mapv_inplace(|v| v / sum);
        }
        z
    }
}

impl TrainableModel for SoftmaxRegression {
    fn init_params(&self, rng: &mut dyn RngCore) -> Result<ParamSnapshot> {
        let scale = self.init_scale;
        let w = Array2::from_shape_fn((self.input_dim, self.class_count), |_| {
            rng.gen_range(-1.0f32..=1.0) * scale
        });
        let b = Array1::<f32>::zeros(self.class_count);
        Ok(ParamSnapshot::new(vec![w.into_dyn(), b.into_dyn()]))
    }

    fn train_one_pass(
        &self,
        params: ParamSnapshot,
        train: &DataSlice,
        val: &DataSlice,
        batch_size: usize,
    ) -> Result<(ParamSnapshot, PassMetrics)> {
        self.check_data(train)?;
        if train.is_empty() {
            return Err(MplcError::compute("softmax regression", "empty training slice"));
        }

        let (w, b) = self.view_params(&params)?;
        let mut w = w.to_owned();
        let mut b = b.to_owned();

        for batch in train.batches(batch_size) {
            let m = batch.len() as f32;
            let mut delta = Self::probabilities(batch.features.view(), w.view(), b.view());
            delta -= &batch.labels;
            delta /= m;

            let dw = batch.features.t().dot(&delta);
            let db = delta.sum_axis(Axis(0));
            w.scaled_add(-self.learning_rate, &dw);
            b.scaled_add(-self.learning_rate, &db);
        }

        if w.iter().any(|v| !v.is_finite()) {
            return Err(MplcError::compute(
                "softmax regression",
                "parameters diverged to a non-finite value",
            ));
        }

        let updated = ParamSnapshot::new(vec![w.into_dyn(), b.into_dyn()]);
        let train_metrics = self.evaluate(&updated, train)?;
        let val_metrics = if val.is_empty() {
            None
        } else {
            Some(self.evaluate(&updated, val)?)
        };

        Ok((
            updated,
            PassMetrics {
                train: train_metrics,
                val: val_metrics,
            },
        ))
    }

    fn evaluate(&self, params: &ParamSnapshot, data: &DataSlice) -> Result<Metrics> {
        self.check_data(data)?;
        if data.is_empty() {
            return Err(MplcError::compute("softmax regression", "empty evaluation slice"));
        }

        let (w, b) = self.view_params(params)?;
        let probs = Self::probabilities(data.features.view(), w, b);

        let mut loss = 0.0f64;
        let mut correct = 0usize;
        for (p, y) in probs.axis_iter(Axis(0)).zip(data.labels.axis_iter(Axis(0))) {
            loss -= p
                .iter()
                .zip(y.iter())
                .map(|(&p, &y)| (y * (p + LOG_EPSILON).ln()) as f64)
                .sum::<f64>();
            if argmax(p) == argmax(y) {
                correct += 1;
            }
        }

        let n = data.len() as f64;
        Ok(Metrics {
            loss: loss / n,
            accuracy: correct as f64 / n,
        })
    }
}

fn argmax(row: ArrayView1<f32>) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best, max), (i, &v)| {
            if v > max {
                (i, v)
            } else {
                (best, max)
            }
        })
        .0
}
